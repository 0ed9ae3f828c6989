//! Benchmarks for expression compilation and compiled-function invocation
//!
//! Measures the two costs that matter for an interactive session: how long
//! one line takes to JIT-compile, and how fast the resulting native
//! function runs once compiled.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use funcalc::jit::{ExprCompiler, FunctionTable};
use funcalc::parser::parse_line;

fn parsed(line: &str) -> funcalc::Expr {
    parse_line(line).expect("parse failed").expr
}

fn bench_compile(c: &mut Criterion) {
    let small = parsed("2*x + 1");
    let nested = parsed("|2*x - 10| / (Sin(x) + 2) * Sqrt(x*x + 1)");

    let mut group = c.benchmark_group("compile");

    group.bench_function("small_expr", |b| {
        let mut compiler = ExprCompiler::new().unwrap();
        let table = FunctionTable::new();
        b.iter(|| compiler.compile(black_box(&small), &table).unwrap());
    });

    group.bench_function("nested_expr", |b| {
        let mut compiler = ExprCompiler::new().unwrap();
        let table = FunctionTable::with_builtins();
        b.iter(|| compiler.compile(black_box(&nested), &table).unwrap());
    });

    group.finish();
}

fn bench_invoke(c: &mut Criterion) {
    let mut compiler = ExprCompiler::new().unwrap();
    let mut table = FunctionTable::with_builtins();

    let f = compiler.compile(&parsed("2*x + 1"), &table).unwrap();
    table.insert("F".to_string(), f);
    let chained = compiler
        .compile(&parsed("F(x) * F(x) + Sin(F(x))"), &table)
        .unwrap();
    let direct = table.lookup("F").unwrap().clone();

    let mut group = c.benchmark_group("invoke");

    group.bench_function("direct", |b| {
        b.iter(|| direct.call(black_box(3.0)));
    });

    group.bench_function("cross_function", |b| {
        b.iter(|| chained.call(black_box(3.0)));
    });

    group.finish();
}

criterion_group!(benches, bench_compile, bench_invoke);
criterion_main!(benches);
