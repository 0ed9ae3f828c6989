/// Expression tree for single-variable formulas
///
/// An [`Expr`] is the immutable, fully-owned representation of one parsed
/// input line. Every parent owns its children exclusively, so dropping the
/// root releases the whole tree. The variant set is closed: the code
/// generator and the printer both match exhaustively, and adding a variant
/// forces every consumer to be updated at build time.
use std::fmt;

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation, `-inner`
    Negate,
    /// Absolute value, `|inner|`
    Abs,
}

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// The operator's source character, used by the printer.
    pub fn symbol(&self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }
}

/// A parsed expression over one free variable
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Leaf constant
    Number(f64),
    /// The function's single input
    Variable,
    /// Negate or absolute value applied to a subexpression
    Unary { op: UnaryOp, inner: Box<Expr> },
    /// One of the four arithmetic operators
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Call to a named, previously compiled function
    Apply { name: String, arg: Box<Expr> },
}

impl Expr {
    pub fn unary(op: UnaryOp, inner: Expr) -> Self {
        Expr::Unary {
            op,
            inner: Box::new(inner),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn apply(name: impl Into<String>, arg: Expr) -> Self {
        Expr::Apply {
            name: name.into(),
            arg: Box::new(arg),
        }
    }
}

/// Canonical printer: fully parenthesized binary nodes, `-`/`| |` for the
/// unary operators, `name(arg)` for application, `x` for the variable,
/// constants with two decimals. `2*x+1` renders as `((2.00 * x) + 1.00)`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(v) => write!(f, "{:.2}", v),
            Expr::Variable => write!(f, "x"),
            Expr::Unary {
                op: UnaryOp::Negate,
                inner,
            } => write!(f, "-{}", inner),
            Expr::Unary {
                op: UnaryOp::Abs,
                inner,
            } => write!(f, "|{}|", inner),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expr::Apply { name, arg } => write!(f, "{}({})", name, arg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_number_two_decimals() {
        assert_eq!(Expr::Number(2.0).to_string(), "2.00");
        assert_eq!(Expr::Number(3.1415).to_string(), "3.14");
    }

    #[test]
    fn test_print_variable() {
        assert_eq!(Expr::Variable.to_string(), "x");
    }

    #[test]
    fn test_print_binary_fully_parenthesized() {
        // 2*x+1 prints as ((2.00 * x) + 1.00)
        let expr = Expr::binary(
            BinaryOp::Add,
            Expr::binary(BinaryOp::Mul, Expr::Number(2.0), Expr::Variable),
            Expr::Number(1.0),
        );
        assert_eq!(expr.to_string(), "((2.00 * x) + 1.00)");
    }

    #[test]
    fn test_print_unary() {
        let neg = Expr::unary(UnaryOp::Negate, Expr::Number(5.0));
        assert_eq!(neg.to_string(), "-5.00");

        let abs = Expr::unary(UnaryOp::Abs, Expr::binary(BinaryOp::Sub, Expr::Variable, Expr::Number(1.0)));
        assert_eq!(abs.to_string(), "|(x - 1.00)|");
    }

    #[test]
    fn test_print_apply() {
        let expr = Expr::apply("F", Expr::Number(3.0));
        assert_eq!(expr.to_string(), "F(3.00)");
    }

    #[test]
    fn test_print_nested_apply() {
        let expr = Expr::apply(
            "F",
            Expr::apply("G", Expr::unary(UnaryOp::Negate, Expr::Variable)),
        );
        assert_eq!(expr.to_string(), "F(G(-x))");
    }
}
