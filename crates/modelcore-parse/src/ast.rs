//! The formula IR (`spec.md` §9 "prefer tagged variants for formula nodes").
//!
//! Parsed once per calculation and re-evaluated per period against the
//! current context — never reparsed from text inside the period loop.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
            BinOp::Mod => "%",
            BinOp::Gt => ">",
            BinOp::Lt => "<",
            BinOp::Ge => ">=",
            BinOp::Le => "<=",
            BinOp::Eq => "=",
            BinOp::Ne => "!=",
            BinOp::And => "&",
            BinOp::Or => "|",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Pos,
}

/// One node of the parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(ordered_f64::OrderedF64),
    /// A bare identifier: either a resolvable reference (`R12`, `V3.1`,
    /// `T.MiY`, ...) or, failing that, an unresolved token that zero-fills.
    Ref(String),
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

/// `Expr` does not derive `Hash`/`Eq` directly because `f64` doesn't; this
/// small wrapper keeps literals comparable for tests and IR caching without
/// pulling in a crate dependency for the one float field that needs it.
pub mod ordered_f64 {
    #[derive(Debug, Clone, Copy)]
    pub struct OrderedF64(pub f64);

    impl PartialEq for OrderedF64 {
        fn eq(&self, other: &Self) -> bool {
            self.0.to_bits() == other.0.to_bits()
        }
    }

    impl From<f64> for OrderedF64 {
        fn from(v: f64) -> Self {
            OrderedF64(v)
        }
    }
}

impl Expr {
    pub fn number(v: f64) -> Self {
        Expr::Number(v.into())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n.0),
            Expr::Ref(r) => write!(f, "{r}"),
            Expr::Unary { op, expr } => {
                let sign = match op {
                    UnOp::Neg => "-",
                    UnOp::Pos => "+",
                };
                write!(f, "{sign}({expr})")
            }
            Expr::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}
