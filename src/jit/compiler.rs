//! Expression-to-native JIT compiler
//!
//! This module translates expression trees into native code using Cranelift.
//! The compilation process:
//!
//! 1. Open a fresh JIT module with the host absolute-value symbol registered
//! 2. Build Cranelift IR in one post-order traversal of the tree
//! 3. Generate native code via the Cranelift JIT module
//! 4. Package the entry point with the code memory it depends on
//!
//! # Register discipline
//!
//! The traversal keeps exactly one live "current value" at all times (the
//! running intermediate result); binary and negate nodes spill through one
//! explicit 4-byte stack slot. Binary operands are evaluated right-then-left
//! so a single spill slot suffices; the supported operators are pure
//! arithmetic, so the order is unobservable, but it is fixed here and pinned
//! by tests rather than left to codegen accident.
//!
//! Working precision is f32. Absolute value widens to f64, calls the host
//! primitive out of line, and narrows back; it is the one place generated
//! code re-enters process-native code other than function application.

use cranelift::codegen::ir::FuncRef;
use cranelift::codegen::isa::OwnedTargetIsa;
use cranelift::prelude::*;
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Linkage, Module};
use std::sync::Arc;
use tracing::trace;

use super::error::{CompileError, CompileResult};
use super::runtime;
use super::table::{CompiledFunction, FunctionTable, JitMemory};
use crate::ast::{BinaryOp, Expr, UnaryOp};

/// JIT compiler for expression trees
///
/// One compiler serves a whole session: it owns the target ISA and hands
/// each [`compile`] call a fresh JIT module, so every compiled expression
/// gets its own code memory with an independent lifetime.
///
/// [`compile`]: ExprCompiler::compile
pub struct ExprCompiler {
    isa: OwnedTargetIsa,

    /// Counter for generating unique function names
    func_counter: u64,
}

impl ExprCompiler {
    /// Create a compiler targeting the host machine.
    pub fn new() -> CompileResult<Self> {
        let mut flag_builder = settings::builder();
        flag_builder
            .set("opt_level", "speed")
            .map_err(|e| CompileError::Backend(format!("failed to set opt_level: {}", e)))?;

        let isa_builder = cranelift_native::builder()
            .map_err(|e| CompileError::Backend(format!("failed to create ISA builder: {}", e)))?;

        let isa = isa_builder
            .finish(settings::Flags::new(flag_builder))
            .map_err(|e| CompileError::Backend(format!("failed to create ISA: {}", e)))?;

        Ok(ExprCompiler {
            isa,
            func_counter: 0,
        })
    }

    /// Compile an expression tree into a directly callable native function.
    ///
    /// Named applications inside the tree are resolved against `table` at
    /// compile time, so a definition can only call names already present:
    /// forward and recursive references fail with
    /// [`CompileError::UnresolvedName`]. On any failure the partially
    /// emitted code is discarded and the table is left untouched.
    pub fn compile(
        &mut self,
        expr: &Expr,
        table: &FunctionTable,
    ) -> CompileResult<CompiledFunction> {
        let mut jit_builder =
            JITBuilder::with_isa(self.isa.clone(), cranelift_module::default_libcall_names());
        jit_builder.symbol("host_fabs", runtime::host_fabs as *const u8);
        let mut module = JITModule::new(jit_builder);

        match self.build(&mut module, expr, table) {
            Ok((func_id, callee_memory)) => {
                let entry = module.get_finalized_function(func_id);
                // The new function's own module comes first; the modules of
                // everything it calls ride along so its call targets stay
                // mapped for its whole lifetime.
                let mut memory = vec![Arc::new(JitMemory::new(module))];
                memory.extend(callee_memory);
                Ok(CompiledFunction::new(entry, memory))
            }
            Err(e) => {
                unsafe { module.free_memory() };
                Err(e)
            }
        }
    }

    /// Build, define, and finalize the function inside `module`.
    fn build(
        &mut self,
        module: &mut JITModule,
        expr: &Expr,
        table: &FunctionTable,
    ) -> CompileResult<(FuncId, Vec<Arc<JitMemory>>)> {
        let ptr_type = module.target_config().pointer_type();

        // host_fabs: fn(f64) -> f64
        let mut fabs_sig = module.make_signature();
        fabs_sig.params.push(AbiParam::new(types::F64));
        fabs_sig.returns.push(AbiParam::new(types::F64));
        let fabs_id = module
            .declare_function("host_fabs", Linkage::Import, &fabs_sig)
            .map_err(|e| CompileError::Backend(format!("failed to declare host_fabs: {}", e)))?;

        // The fixed single-argument signature: fn(f32) -> f32
        let mut sig = module.make_signature();
        sig.params.push(AbiParam::new(types::F32));
        sig.returns.push(AbiParam::new(types::F32));

        let func_name = format!("expr_fn_{}", self.func_counter);
        self.func_counter += 1;

        let func_id = module
            .declare_function(&func_name, Linkage::Local, &sig)
            .map_err(|e| CompileError::Backend(format!("failed to declare function: {}", e)))?;

        let mut ctx = module.make_context();
        ctx.func.signature = sig.clone();

        let mut func_ctx = FunctionBuilderContext::new();
        let callee_memory;
        {
            let mut builder = FunctionBuilder::new(&mut ctx.func, &mut func_ctx);

            let entry_block = builder.create_block();
            builder.append_block_params_for_function_params(entry_block);
            builder.switch_to_block(entry_block);
            builder.seal_block(entry_block);
            let input = builder.block_params(entry_block)[0];

            let fabs_func = module.declare_func_in_func(fabs_id, builder.func);
            let call_sig = builder.import_signature(sig);

            // Scope so translation's borrow of builder ends before finalize
            {
                let mut codegen = CodegenCtx {
                    builder: &mut builder,
                    table,
                    input,
                    fabs_func,
                    call_sig,
                    ptr_type,
                    callee_memory: Vec::new(),
                };

                let result = codegen.translate(expr)?;
                codegen.builder.ins().return_(&[result]);
                callee_memory = codegen.callee_memory;
            }

            builder.finalize();
        }

        trace!(target: "funcalc::jit::compiler", ir = %ctx.func.display(), "generated IR");

        module
            .define_function(func_id, &mut ctx)
            .map_err(|e| CompileError::Backend(format!("failed to define function: {}", e)))?;

        module
            .finalize_definitions()
            .map_err(|e| CompileError::Backend(format!("failed to finalize definitions: {}", e)))?;

        Ok((func_id, callee_memory))
    }
}

/// Per-compilation translation state
struct CodegenCtx<'a, 'b> {
    builder: &'a mut FunctionBuilder<'b>,

    /// Read-only view of the session's compiled functions
    table: &'a FunctionTable,

    /// The function's single input argument
    input: Value,

    /// Imported host absolute-value primitive
    fabs_func: FuncRef,

    /// The (f32) -> f32 signature used for every application call site
    call_sig: cranelift::codegen::ir::SigRef,

    ptr_type: Type,

    /// Code memory of every function this one calls
    callee_memory: Vec<Arc<JitMemory>>,
}

impl CodegenCtx<'_, '_> {
    /// Post-order traversal; returns the current-value SSA value holding
    /// the subtree's result.
    fn translate(&mut self, expr: &Expr) -> CompileResult<Value> {
        match expr {
            Expr::Number(v) => Ok(self.builder.ins().f32const(*v as f32)),

            Expr::Variable => Ok(self.input),

            Expr::Unary { op, inner } => {
                let val = self.translate(inner)?;
                match op {
                    // Spill, zero, subtract: no reliance on a dedicated
                    // negate instruction.
                    UnaryOp::Negate => {
                        let slot = self.spill_slot();
                        self.builder.ins().stack_store(val, slot, 0);
                        let zero = self.builder.ins().f32const(0.0f32);
                        let spilled = self.builder.ins().stack_load(types::F32, slot, 0);
                        Ok(self.builder.ins().fsub(zero, spilled))
                    }
                    UnaryOp::Abs => {
                        let wide = self.builder.ins().fpromote(types::F64, val);
                        let call = self.builder.ins().call(self.fabs_func, &[wide]);
                        let result = self.builder.inst_results(call)[0];
                        Ok(self.builder.ins().fdemote(types::F32, result))
                    }
                }
            }

            Expr::Binary { op, lhs, rhs } => {
                // Right first, spilled to the temporary; left lands in the
                // current value.
                let rhs_val = self.translate(rhs)?;
                let slot = self.spill_slot();
                self.builder.ins().stack_store(rhs_val, slot, 0);

                let lhs_val = self.translate(lhs)?;
                let spilled = self.builder.ins().stack_load(types::F32, slot, 0);

                Ok(match op {
                    BinaryOp::Add => self.builder.ins().fadd(lhs_val, spilled),
                    BinaryOp::Sub => self.builder.ins().fsub(lhs_val, spilled),
                    BinaryOp::Mul => self.builder.ins().fmul(lhs_val, spilled),
                    BinaryOp::Div => self.builder.ins().fdiv(lhs_val, spilled),
                })
            }

            Expr::Apply { name, arg } => {
                // Resolve before evaluating the argument; this is what rules
                // out forward and recursive references.
                let table = self.table;
                let callee = table
                    .lookup(name)
                    .ok_or_else(|| CompileError::UnresolvedName(name.clone()))?;
                let entry = callee.entry();
                self.callee_memory
                    .extend(callee.memory().iter().cloned());

                let arg_val = self.translate(arg)?;
                let callee_ptr = self
                    .builder
                    .ins()
                    .iconst(self.ptr_type, entry as usize as i64);
                let call = self
                    .builder
                    .ins()
                    .call_indirect(self.call_sig, callee_ptr, &[arg_val]);
                Ok(self.builder.inst_results(call)[0])
            }
        }
    }

    /// One 4-byte temporary, freshly allocated per spill site.
    fn spill_slot(&mut self) -> cranelift::codegen::ir::StackSlot {
        self.builder
            .create_sized_stack_slot(StackSlotData::new(StackSlotKind::ExplicitSlot, 4, 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-3;

    fn compile_one(expr: &Expr) -> CompiledFunction {
        let mut compiler = ExprCompiler::new().expect("compiler creation failed");
        let table = FunctionTable::new();
        compiler.compile(expr, &table).expect("compilation failed")
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < TOLERANCE,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_constant() {
        let f = compile_one(&Expr::Number(42.0));
        assert_close(f.call(0.0), 42.0);
        assert_close(f.call(100.0), 42.0);
    }

    #[test]
    fn test_variable_identity() {
        let f = compile_one(&Expr::Variable);
        assert_close(f.call(3.5), 3.5);
        assert_close(f.call(-7.0), -7.0);
    }

    #[test]
    fn test_add_constant_and_variable() {
        // 2 + x at 3 = 5
        let f = compile_one(&Expr::binary(
            BinaryOp::Add,
            Expr::Number(2.0),
            Expr::Variable,
        ));
        assert_close(f.call(3.0), 5.0);
    }

    #[test]
    fn test_all_binary_operators() {
        let cases = [
            (BinaryOp::Add, 10.0, 4.0, 14.0),
            (BinaryOp::Sub, 10.0, 4.0, 6.0),
            (BinaryOp::Mul, 10.0, 4.0, 40.0),
            (BinaryOp::Div, 10.0, 4.0, 2.5),
        ];
        for (op, lhs, rhs, expected) in cases {
            let f = compile_one(&Expr::binary(op, Expr::Number(lhs), Expr::Number(rhs)));
            assert_close(f.call(0.0), expected);
        }
    }

    #[test]
    fn test_negate() {
        let f = compile_one(&Expr::unary(UnaryOp::Negate, Expr::Number(5.0)));
        assert_close(f.call(0.0), -5.0);
        assert_close(f.call(123.0), -5.0);

        let g = compile_one(&Expr::unary(UnaryOp::Negate, Expr::Variable));
        assert_close(g.call(-2.5), 2.5);
    }

    #[test]
    fn test_abs() {
        let f = compile_one(&Expr::unary(UnaryOp::Abs, Expr::Number(-5.0)));
        assert_close(f.call(0.0), 5.0);

        let g = compile_one(&Expr::unary(UnaryOp::Abs, Expr::Variable));
        assert_close(g.call(-3.0), 3.0);
        assert_close(g.call(3.0), 3.0);
    }

    #[test]
    fn test_nested_expression() {
        // |2*x - 10| / 4 at x = 1 -> 2
        let expr = Expr::binary(
            BinaryOp::Div,
            Expr::unary(
                UnaryOp::Abs,
                Expr::binary(
                    BinaryOp::Sub,
                    Expr::binary(BinaryOp::Mul, Expr::Number(2.0), Expr::Variable),
                    Expr::Number(10.0),
                ),
            ),
            Expr::Number(4.0),
        );
        let f = compile_one(&expr);
        assert_close(f.call(1.0), 2.0);
        assert_close(f.call(9.0), 2.0);
    }

    #[test]
    fn test_unresolved_name() {
        let mut compiler = ExprCompiler::new().unwrap();
        let table = FunctionTable::new();
        let expr = Expr::apply("F", Expr::Number(3.0));
        let err = compiler.compile(&expr, &table).unwrap_err();
        assert_eq!(err, CompileError::UnresolvedName("F".to_string()));
    }

    #[test]
    fn test_define_then_call() {
        let mut compiler = ExprCompiler::new().unwrap();
        let mut table = FunctionTable::new();

        // F(x) = 2x + 1
        let def = Expr::binary(
            BinaryOp::Add,
            Expr::binary(BinaryOp::Mul, Expr::Number(2.0), Expr::Variable),
            Expr::Number(1.0),
        );
        let f = compiler.compile(&def, &table).unwrap();
        table.insert("F".to_string(), f);

        // F(3) = 7
        let call = Expr::apply("F", Expr::Number(3.0));
        let g = compiler.compile(&call, &table).unwrap();
        assert_close(g.call(0.0), 7.0);
    }

    #[test]
    fn test_call_with_variable_argument() {
        let mut compiler = ExprCompiler::new().unwrap();
        let mut table = FunctionTable::new();

        let double = Expr::binary(BinaryOp::Mul, Expr::Number(2.0), Expr::Variable);
        let f = compiler.compile(&double, &table).unwrap();
        table.insert("Double".to_string(), f);

        // Double(x + 1) at 4 -> 10
        let expr = Expr::apply(
            "Double",
            Expr::binary(BinaryOp::Add, Expr::Variable, Expr::Number(1.0)),
        );
        let g = compiler.compile(&expr, &table).unwrap();
        assert_close(g.call(4.0), 10.0);
    }

    #[test]
    fn test_builtin_call() {
        let mut compiler = ExprCompiler::new().unwrap();
        let table = FunctionTable::with_builtins();

        let expr = Expr::apply("Sqrt", Expr::Number(16.0));
        let f = compiler.compile(&expr, &table).unwrap();
        assert_close(f.call(0.0), 4.0);
    }

    #[test]
    fn test_self_reference_fails() {
        let mut compiler = ExprCompiler::new().unwrap();
        let table = FunctionTable::new();

        // F = F(x) + 1 before F exists anywhere
        let expr = Expr::binary(
            BinaryOp::Add,
            Expr::apply("F", Expr::Variable),
            Expr::Number(1.0),
        );
        let err = compiler.compile(&expr, &table).unwrap_err();
        assert_eq!(err, CompileError::UnresolvedName("F".to_string()));
    }

    #[test]
    fn test_redefinition_is_not_retroactive() {
        let mut compiler = ExprCompiler::new().unwrap();
        let mut table = FunctionTable::new();

        // F(x) = x + 1
        let first = Expr::binary(BinaryOp::Add, Expr::Variable, Expr::Number(1.0));
        let f = compiler.compile(&first, &table).unwrap();
        table.insert("F".to_string(), f);

        // G(x) = F(x) * 10, compiled against the first F
        let g_def = Expr::binary(
            BinaryOp::Mul,
            Expr::apply("F", Expr::Variable),
            Expr::Number(10.0),
        );
        let g = compiler.compile(&g_def, &table).unwrap();
        table.insert("G".to_string(), g);

        // Redefine F(x) = x + 100
        let second = Expr::binary(BinaryOp::Add, Expr::Variable, Expr::Number(100.0));
        let f2 = compiler.compile(&second, &table).unwrap();
        table.insert("F".to_string(), f2);

        // G still uses the old F
        let call_g = Expr::apply("G", Expr::Number(1.0));
        let h = compiler.compile(&call_g, &table).unwrap();
        assert_close(h.call(0.0), 20.0);

        // A fresh call site resolves the new F
        let call_f = Expr::apply("F", Expr::Number(1.0));
        let k = compiler.compile(&call_f, &table).unwrap();
        assert_close(k.call(0.0), 101.0);
    }

    #[test]
    fn test_determinism() {
        let mut compiler = ExprCompiler::new().unwrap();
        let table = FunctionTable::new();

        let expr = Expr::binary(
            BinaryOp::Mul,
            Expr::binary(BinaryOp::Add, Expr::Variable, Expr::Number(1.5)),
            Expr::unary(UnaryOp::Negate, Expr::Variable),
        );
        let f = compiler.compile(&expr, &table).unwrap();
        let g = compiler.compile(&expr, &table).unwrap();

        for x in [-2.0f32, -0.5, 0.0, 1.0, 3.25] {
            assert_eq!(f.call(x), g.call(x));
        }
    }

    #[test]
    fn test_callable_outlives_table() {
        let mut compiler = ExprCompiler::new().unwrap();
        let f = {
            let mut table = FunctionTable::new();
            let inner = Expr::binary(BinaryOp::Mul, Expr::Variable, Expr::Number(3.0));
            let triple = compiler.compile(&inner, &table).unwrap();
            table.insert("Triple".to_string(), triple);

            let expr = Expr::apply("Triple", Expr::Variable);
            compiler.compile(&expr, &table).unwrap()
            // table dropped here; f holds Triple's code memory alive
        };
        assert_close(f.call(2.0), 6.0);
    }

    #[test]
    fn test_division_by_zero_is_infinite() {
        let f = compile_one(&Expr::binary(
            BinaryOp::Div,
            Expr::Number(1.0),
            Expr::Variable,
        ));
        assert!(f.call(0.0).is_infinite());
    }
}
