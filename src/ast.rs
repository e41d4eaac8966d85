//! Expression tree for lazy tag formulas
//!
//! An [`Expr`] is built eagerly but evaluated lazily: leaves name remote tags,
//! and nothing is fetched or computed until the expression is handed to a
//! `TagResolver`. Construction performs no I/O and cannot fail except when an
//! expression is forced into a boolean context (see [`Expr::truthy`]).

use crate::error::{Error, Result};
use crate::functions::TagFunction;
use crate::value::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Binary operators applicable to expressions
///
/// The bitwise operators double as boolean logic: short-circuit `&&`/`||`
/// cannot be deferred, so `&`/`|`/`^` are the supported substitutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOperator {
    /// Symbol used when rendering formulas
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::FloorDiv => "//",
            BinaryOperator::Rem => "%",
            BinaryOperator::Pow => "**",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Arithmetic negation
    Neg,
    /// Complement: logical on booleans, bitwise on integers
    Not,
}

/// A function applied with [`Expr::apply`]: either a name resolved against the
/// resolver's registry at evaluation time, or a direct callable.
#[derive(Clone)]
pub enum FunctionRef {
    Named(String),
    Direct(TagFunction),
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            FunctionRef::Direct(_) => f.debug_tuple("Direct").field(&"<fn>").finish(),
        }
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionRef::Named(name) => write!(f, "{}", name),
            FunctionRef::Direct(_) => write!(f, "<fn>"),
        }
    }
}

/// A lazy tag expression
#[derive(Debug, Clone)]
pub enum Expr {
    /// Reference to a remote tag; `store: None` means the default store
    Leaf { tag: String, store: Option<String> },
    /// A constant
    Literal { value: Scalar },
    /// Binary operation over two subexpressions
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation over one subexpression
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    /// N-ary function application, arity >= 1
    Apply { function: FunctionRef, args: Vec<Expr> },
}

impl Expr {
    /// Leaf on the default store
    pub fn tag(name: impl Into<String>) -> Expr {
        Expr::Leaf {
            tag: name.into(),
            store: None,
        }
    }

    /// Leaf on a named store
    pub fn tag_in(store: impl Into<String>, name: impl Into<String>) -> Expr {
        Expr::Leaf {
            tag: name.into(),
            store: Some(store.into()),
        }
    }

    /// Literal expression; `From` impls make this rarely needed directly
    pub fn lit(value: impl Into<Scalar>) -> Expr {
        Expr::Literal {
            value: value.into(),
        }
    }

    /// Apply a named function (resolved against the registry at evaluation
    /// time) to one or more operands
    pub fn apply<I, T>(function: impl Into<String>, args: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        Expr::Apply {
            function: FunctionRef::Named(function.into()),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Apply a callable directly, bypassing the registry
    pub fn apply_fn<I, T, F>(function: F, args: I) -> Expr
    where
        F: Fn(&[Scalar]) -> Result<Scalar> + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
        T: Into<Expr>,
    {
        Expr::Apply {
            function: FunctionRef::Direct(Arc::new(function)),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Single-argument convenience: `expr.calc("sqrt")` is
    /// `Expr::apply("sqrt", [expr])`
    pub fn calc(self, function: impl Into<String>) -> Expr {
        Expr::apply(function, [self])
    }

    fn binary(self, op: BinaryOperator, rhs: impl Into<Expr>) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(rhs.into()),
        }
    }

    fn unary(self, op: UnaryOperator) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(self),
        }
    }

    pub fn add(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Add, rhs)
    }

    pub fn sub(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Sub, rhs)
    }

    pub fn mul(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Mul, rhs)
    }

    /// True division: integer operands still produce a float
    pub fn div(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Div, rhs)
    }

    /// Floor division
    pub fn floordiv(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::FloorDiv, rhs)
    }

    /// Modulo (sign follows the divisor)
    pub fn rem(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Rem, rhs)
    }

    pub fn pow(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Pow, rhs)
    }

    pub fn lt(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Lt, rhs)
    }

    pub fn le(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Le, rhs)
    }

    pub fn gt(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Gt, rhs)
    }

    pub fn ge(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Ge, rhs)
    }

    pub fn eq(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Eq, rhs)
    }

    pub fn ne(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::Ne, rhs)
    }

    /// Logical/bitwise AND (the deferred substitute for `&&`)
    pub fn and(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::BitAnd, rhs)
    }

    /// Logical/bitwise OR (the deferred substitute for `||`)
    pub fn or(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::BitOr, rhs)
    }

    /// Logical/bitwise XOR
    pub fn xor(self, rhs: impl Into<Expr>) -> Expr {
        self.binary(BinaryOperator::BitXor, rhs)
    }

    pub fn neg(self) -> Expr {
        self.unary(UnaryOperator::Neg)
    }

    /// Complement (the deferred substitute for `!`)
    pub fn not(self) -> Expr {
        self.unary(UnaryOperator::Not)
    }

    /// Coerce this expression to a native boolean. Always fails.
    ///
    /// Branching on an expression (`if`, `&&`, `||`) happens eagerly at
    /// construction time, before any data exists to decide the branch, so
    /// there is deliberately no way to get a `bool` out of an unevaluated
    /// expression. Use [`Expr::and`]/[`Expr::or`]/[`Expr::not`] instead.
    pub fn truthy(&self) -> Result<bool> {
        Err(Error::BooleanContext(self.to_string()))
    }
}

impl From<Scalar> for Expr {
    fn from(v: Scalar) -> Self {
        Expr::Literal { value: v }
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Expr::lit(v)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::lit(v)
    }
}

impl From<bool> for Expr {
    fn from(v: bool) -> Self {
        Expr::lit(v)
    }
}

impl From<&str> for Expr {
    fn from(v: &str) -> Self {
        Expr::lit(v)
    }
}

impl From<String> for Expr {
    fn from(v: String) -> Self {
        Expr::lit(v)
    }
}

// Infix sugar. Comparison operators cannot be overloaded to return `Expr`,
// so `lt`/`le`/`gt`/`ge`/`eq`/`ne` stay builder methods.
macro_rules! impl_infix {
    ($trait:ident, $method:ident, $builder:ident) => {
        impl<R: Into<Expr>> std::ops::$trait<R> for Expr {
            type Output = Expr;

            fn $method(self, rhs: R) -> Expr {
                Expr::$builder(self, rhs)
            }
        }
    };
}

impl_infix!(Add, add, add);
impl_infix!(Sub, sub, sub);
impl_infix!(Mul, mul, mul);
impl_infix!(Div, div, div);
impl_infix!(Rem, rem, rem);
impl_infix!(BitAnd, bitand, and);
impl_infix!(BitOr, bitor, or);
impl_infix!(BitXor, bitxor, xor);

// Reverse forms for numeric literals on the left, e.g. `2 * Expr::tag("A")`.
macro_rules! impl_infix_reverse {
    ($lhs:ty, $trait:ident, $method:ident, $builder:ident) => {
        impl std::ops::$trait<Expr> for $lhs {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::$builder(Expr::lit(self), rhs)
            }
        }
    };
}

impl_infix_reverse!(i64, Add, add, add);
impl_infix_reverse!(i64, Sub, sub, sub);
impl_infix_reverse!(i64, Mul, mul, mul);
impl_infix_reverse!(i64, Div, div, div);
impl_infix_reverse!(i64, Rem, rem, rem);
impl_infix_reverse!(f64, Add, add, add);
impl_infix_reverse!(f64, Sub, sub, sub);
impl_infix_reverse!(f64, Mul, mul, mul);
impl_infix_reverse!(f64, Div, div, div);
impl_infix_reverse!(f64, Rem, rem, rem);

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::neg(self)
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::not(self)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Leaf { tag, store: None } => write!(f, "{}", tag),
            Expr::Leaf {
                tag,
                store: Some(store),
            } => write!(f, "{}:{}", store, tag),
            Expr::Literal { value } => write!(f, "{}", value),
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Unary {
                op: UnaryOperator::Neg,
                operand,
            } => write!(f, "(-{})", operand),
            Expr::Unary {
                op: UnaryOperator::Not,
                operand,
            } => write!(f, "(~{})", operand),
            Expr::Apply { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
