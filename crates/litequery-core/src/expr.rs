//! Expression nodes for predicates, orderings and projections.
//!
//! Expressions are plain data. They are usually built with the helpers in
//! this module:
//!
//! ```
//! use litequery_core::expr::{captured, field, lambda};
//! use litequery_core::value::Value;
//!
//! let ids = Value::list([1, 2, 3]);
//! let predicate = lambda(
//!     field("Name")
//!         .starts_with("ab")
//!         .and(captured("ids", ids).contains(field("Id"))),
//! );
//! assert_eq!(
//!     predicate.to_string(),
//!     "x => ((x.Name.starts_with(\"ab\")) && (ids.contains(x.Id)))"
//! );
//! ```

use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};

use crate::types::ValueKind;
use crate::value::{ToValue, Value};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    /// Null coalescing.
    Coalesce,
}

impl BinaryOp {
    /// Returns the SQL token of the operator, if it has one.
    #[must_use]
    pub const fn sql_token(&self) -> Option<&'static str> {
        match self {
            Self::Gt => Some(">"),
            Self::Ge => Some(">="),
            Self::Lt => Some("<"),
            Self::Le => Some("<="),
            Self::BitAnd => Some("&"),
            Self::And => Some("and"),
            Self::BitOr => Some("|"),
            Self::Or => Some("or"),
            Self::Eq => Some("="),
            Self::Ne => Some("!="),
            Self::BitXor
            | Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Mod
            | Self::Coalesce => None,
        }
    }

    /// Returns the operator as written in diagnostics.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Coalesce => "??",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    /// Logical NOT
    Not,
    /// Conversion to another kind.
    Convert(ValueKind),
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Constant(Value),
    /// The row the query ranges over.
    Parameter,
    /// A value captured from the calling scope.
    Captured {
        /// Name of the captured variable.
        name: String,
        /// Its value at the time the expression was built.
        value: Value,
    },
    /// Member access.
    Member {
        /// The value the member is read from.
        target: Box<Expr>,
        /// Member name.
        member: String,
    },
    /// Binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
    },
    /// Method call, either on a receiver or free-standing.
    Call {
        /// Method name.
        method: String,
        /// The receiver, if any.
        receiver: Option<Box<Expr>>,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// A lambda over the row parameter.
    Lambda {
        /// Number of parameters.
        arity: usize,
        /// The body.
        body: Box<Expr>,
    },
}

/// Creates an access to a member of the row.
#[must_use]
pub fn field(name: impl Into<String>) -> Expr {
    Expr::Parameter.member(name)
}

/// Creates a literal.
#[must_use]
pub fn constant(value: impl ToValue) -> Expr {
    Expr::Constant(value.to_value())
}

/// Creates the `null` literal.
#[must_use]
pub const fn null() -> Expr {
    Expr::Constant(Value::Null)
}

/// Creates a captured variable.
#[must_use]
pub fn captured(name: impl Into<String>, value: impl ToValue) -> Expr {
    Expr::Captured {
        name: name.into(),
        value: value.to_value(),
    }
}

/// Wraps `body` in a single-parameter lambda.
#[must_use]
pub fn lambda(body: Expr) -> Expr {
    Expr::Lambda {
        arity: 1,
        body: Box::new(body),
    }
}

/// Creates a free-standing call such as `like(a, b)`.
#[must_use]
pub fn call(method: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call {
        method: method.into(),
        receiver: None,
        args,
    }
}

/// Creates the free-standing `like(value, pattern)` call.
#[must_use]
pub fn like(value: impl Into<Expr>, pattern: impl Into<Expr>) -> Expr {
    call("like", vec![value.into(), pattern.into()])
}

impl Expr {
    /// Creates a binary operation.
    #[must_use]
    pub fn binary(self, op: BinaryOp, rhs: impl Into<Self>) -> Self {
        Self::Binary {
            op,
            left: Box::new(self),
            right: Box::new(rhs.into()),
        }
    }

    /// Creates an equality comparison.
    #[must_use]
    pub fn eq(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Eq, rhs)
    }

    /// Creates an inequality comparison.
    #[must_use]
    pub fn ne(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Ne, rhs)
    }

    /// Creates a less-than comparison.
    #[must_use]
    pub fn lt(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    /// Creates a less-than-or-equal comparison.
    #[must_use]
    pub fn le(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Le, rhs)
    }

    /// Creates a greater-than comparison.
    #[must_use]
    pub fn gt(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    /// Creates a greater-than-or-equal comparison.
    #[must_use]
    pub fn ge(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Ge, rhs)
    }

    /// Creates a logical AND.
    #[must_use]
    pub fn and(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    /// Creates a logical OR.
    #[must_use]
    pub fn or(self, rhs: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Or, rhs)
    }

    /// Creates a logical NOT.
    #[must_use]
    pub fn not(self) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }

    /// Creates a conversion to `kind`.
    #[must_use]
    pub fn convert(self, kind: ValueKind) -> Self {
        Self::Unary {
            op: UnaryOp::Convert(kind),
            operand: Box::new(self),
        }
    }

    /// Creates an access to `member` of this value.
    #[must_use]
    pub fn member(self, member: impl Into<String>) -> Self {
        Self::Member {
            target: Box::new(self),
            member: member.into(),
        }
    }

    /// Creates a method call on this value.
    #[must_use]
    pub fn method(self, method: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Call {
            method: method.into(),
            receiver: Some(Box::new(self)),
            args,
        }
    }

    /// `self.starts_with(prefix)`
    #[must_use]
    pub fn starts_with(self, prefix: impl Into<Self>) -> Self {
        self.method("starts_with", vec![prefix.into()])
    }

    /// `self.ends_with(suffix)`
    #[must_use]
    pub fn ends_with(self, suffix: impl Into<Self>) -> Self {
        self.method("ends_with", vec![suffix.into()])
    }

    /// `self.contains(item)`: substring test on text, membership otherwise.
    #[must_use]
    pub fn contains(self, item: impl Into<Self>) -> Self {
        self.method("contains", vec![item.into()])
    }

    /// `self.equals(other)`
    #[must_use]
    pub fn equals(self, other: impl Into<Self>) -> Self {
        self.method("equals", vec![other.into()])
    }

    /// `self.to_lower()`
    #[must_use]
    pub fn to_lower(self) -> Self {
        self.method("to_lower", Vec::new())
    }

    /// Returns the node kind, for diagnostics.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Constant(_) => "constant",
            Self::Parameter => "parameter",
            Self::Captured { .. } => "captured",
            Self::Member { .. } => "member access",
            Self::Binary { .. } => "binary",
            Self::Unary {
                op: UnaryOp::Not, ..
            } => "not",
            Self::Unary {
                op: UnaryOp::Convert(_),
                ..
            } => "convert",
            Self::Call { .. } => "call",
            Self::Lambda { .. } => "lambda",
        }
    }

    /// Returns whether this is a member of the row parameter.
    #[must_use]
    pub fn is_row_member(&self) -> bool {
        matches!(self, Self::Member { target, .. } if **target == Self::Parameter)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "{value}"),
            Self::Parameter => write!(f, "x"),
            Self::Captured { name, .. } => write!(f, "{name}"),
            Self::Member { target, member } => write!(f, "{target}.{member}"),
            Self::Binary { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Self::Unary {
                op: UnaryOp::Not,
                operand,
            } => write!(f, "!{operand}"),
            Self::Unary {
                op: UnaryOp::Convert(kind),
                operand,
            } => write!(f, "({operand} as {kind})"),
            Self::Call {
                method,
                receiver,
                args,
            } => {
                if let Some(receiver) = receiver {
                    write!(f, "({receiver}.")?;
                } else {
                    write!(f, "(")?;
                }
                write!(f, "{method}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, "))")
            }
            Self::Lambda { arity, body } => {
                if *arity == 1 {
                    write!(f, "x => {body}")
                } else {
                    write!(f, "|{arity} params| {body}")
                }
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Constant(value)
    }
}

macro_rules! impl_expr_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(value: $t) -> Self {
                    Self::Constant(value.to_value())
                }
            }
        )*
    };
}

impl_expr_from!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    &str,
    String,
    Vec<u8>,
    NaiveDateTime,
    TimeDelta
);
