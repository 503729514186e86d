//! Filter expression tree.
//!
//! Nodes are plain owned values. The constructors on [`Expr`] apply the
//! construction-time normalization: nested logical nodes of the same kind are
//! spliced into their parent, and bare operands are coerced into
//! [`Expr::Property`] or [`Expr::Literal`] depending on the position they are
//! placed in. No schema checks happen here; an expression may reference
//! unknown fields until it is validated.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::query::value::Literal;

/// Binary comparison operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    /// `eq`
    Eq,
    /// `ne`
    Ne,
    /// `gt`
    Gt,
    /// `ge`
    Ge,
    /// `lt`
    Lt,
    /// `le`
    Le,
}

impl CompareOp {
    /// Wire keyword for the operator.
    pub fn keyword(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        }
    }
}

/// String predicate functions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextOp {
    /// `contains(subject, argument)`
    Contains,
    /// `startswith(subject, argument)`
    StartsWith,
    /// `endswith(subject, argument)`
    EndsWith,
}

impl TextOp {
    /// Wire function name.
    pub fn function(self) -> &'static str {
        match self {
            TextOp::Contains => "contains",
            TextOp::StartsWith => "startswith",
            TextOp::EndsWith => "endswith",
        }
    }
}

/// Filter expression node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// Reference to an attribute by name.
    Property {
        /// Attribute name as written by the caller (canonical after validation).
        name: String,
    },
    /// Scalar literal.
    Literal {
        /// Literal payload.
        value: Literal,
    },
    /// N-ary conjunction.
    And {
        /// Terms in caller order.
        terms: Vec<Expr>,
    },
    /// N-ary disjunction.
    Or {
        /// Terms in caller order.
        terms: Vec<Expr>,
    },
    /// Negation.
    Not {
        /// Negated operand.
        operand: Box<Expr>,
    },
    /// Binary comparison.
    Compare {
        /// Comparison operator.
        op: CompareOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// String predicate function call.
    Text {
        /// Function kind.
        op: TextOp,
        /// Haystack / text being tested.
        subject: Box<Expr>,
        /// Needle, prefix or suffix.
        argument: Box<Expr>,
    },
    /// Membership test against a list of options.
    In {
        /// Tested operand.
        subject: Box<Expr>,
        /// Candidate values in caller order.
        options: Vec<Expr>,
    },
}

impl Expr {
    /// Property reference leaf.
    pub fn property(name: impl Into<String>) -> Self {
        Expr::Property { name: name.into() }
    }

    /// Literal leaf.
    pub fn literal(value: impl Into<Literal>) -> Self {
        Expr::Literal {
            value: value.into(),
        }
    }

    /// Conjunction of `terms`; nested conjunctions are spliced in order.
    pub fn and<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = Expr>,
    {
        let mut flat = Vec::new();
        for term in terms {
            match term {
                Expr::And { terms } => flat.extend(terms),
                other => flat.push(other),
            }
        }
        Expr::And { terms: flat }
    }

    /// Disjunction of `terms`; nested disjunctions are spliced in order.
    pub fn or<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = Expr>,
    {
        let mut flat = Vec::new();
        for term in terms {
            match term {
                Expr::Or { terms } => flat.extend(terms),
                other => flat.push(other),
            }
        }
        Expr::Or { terms: flat }
    }

    /// Negation of `operand`.
    #[allow(clippy::should_implement_trait)]
    pub fn not(operand: Expr) -> Self {
        Expr::Not {
            operand: Box::new(operand),
        }
    }

    /// Comparison with position coercion applied to both sides.
    pub fn compare(op: CompareOp, left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Expr::Compare {
            op,
            left: Box::new(left.into().into_subject()),
            right: Box::new(right.into().into_argument()),
        }
    }

    /// `left eq right`
    #[allow(clippy::should_implement_trait)]
    pub fn eq(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    /// `left ne right`
    #[allow(clippy::should_implement_trait)]
    pub fn ne(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::compare(CompareOp::Ne, left, right)
    }

    /// `left gt right`
    pub fn gt(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::compare(CompareOp::Gt, left, right)
    }

    /// `left ge right`
    pub fn ge(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::compare(CompareOp::Ge, left, right)
    }

    /// `left lt right`
    pub fn lt(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::compare(CompareOp::Lt, left, right)
    }

    /// `left le right`
    pub fn le(left: impl Into<Operand>, right: impl Into<Operand>) -> Self {
        Self::compare(CompareOp::Le, left, right)
    }

    /// String predicate with position coercion applied.
    pub fn text(op: TextOp, subject: impl Into<Operand>, argument: impl Into<Operand>) -> Self {
        Expr::Text {
            op,
            subject: Box::new(subject.into().into_subject()),
            argument: Box::new(argument.into().into_argument()),
        }
    }

    /// `contains(haystack, needle)`
    pub fn contains(haystack: impl Into<Operand>, needle: impl Into<Operand>) -> Self {
        Self::text(TextOp::Contains, haystack, needle)
    }

    /// `startswith(text, prefix)`
    pub fn starts_with(text: impl Into<Operand>, prefix: impl Into<Operand>) -> Self {
        Self::text(TextOp::StartsWith, text, prefix)
    }

    /// `endswith(text, suffix)`
    pub fn ends_with(text: impl Into<Operand>, suffix: impl Into<Operand>) -> Self {
        Self::text(TextOp::EndsWith, text, suffix)
    }

    /// Membership of `subject` in `options`.
    pub fn is_in<S, I, O>(subject: S, options: I) -> Self
    where
        S: Into<Operand>,
        I: IntoIterator<Item = O>,
        O: Into<Operand>,
    {
        Expr::In {
            subject: Box::new(subject.into().into_subject()),
            options: options
                .into_iter()
                .map(|o| o.into().into_argument())
                .collect(),
        }
    }

    /// True for `Property` and `Literal` nodes.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Expr::Property { .. } | Expr::Literal { .. })
    }

    /// Short node name used in diagnostics.
    pub fn node_name(&self) -> &'static str {
        match self {
            Expr::Property { .. } => "property",
            Expr::Literal { .. } => "literal",
            Expr::And { .. } => "and",
            Expr::Or { .. } => "or",
            Expr::Not { .. } => "not",
            Expr::Compare { .. } => "comparison",
            Expr::Text { .. } => "string predicate",
            Expr::In { .. } => "membership",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::query::compile::compile_expr(
            self,
            &crate::query::compile::RenderOptions::default(),
        ))
    }
}

impl From<Literal> for Expr {
    fn from(value: Literal) -> Self {
        Expr::Literal { value }
    }
}

/// Caller-supplied operand before position coercion.
///
/// Text placed on the subject side (left of a comparison, haystack of a
/// string predicate, membership subject) becomes a property reference; text
/// on the argument side becomes a string literal. Every other scalar is a
/// literal, and an existing [`Expr`] is kept as is.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Bare text, coerced by position.
    Text(String),
    /// Non-text scalar, always a literal.
    Literal(Literal),
    /// Already-built expression node.
    Expr(Expr),
}

impl Operand {
    /// Coerces for a subject position.
    pub fn into_subject(self) -> Expr {
        match self {
            Operand::Text(name) => Expr::Property { name },
            Operand::Literal(value) => Expr::Literal { value },
            Operand::Expr(expr) => expr,
        }
    }

    /// Coerces for an argument position.
    pub fn into_argument(self) -> Expr {
        match self {
            Operand::Text(text) => Expr::Literal {
                value: Literal::String(text),
            },
            Operand::Literal(value) => Expr::Literal { value },
            Operand::Expr(expr) => expr,
        }
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Text(value.to_owned())
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Operand::Text(value)
    }
}

impl From<&String> for Operand {
    fn from(value: &String) -> Self {
        Operand::Text(value.clone())
    }
}

impl From<Expr> for Operand {
    fn from(value: Expr) -> Self {
        Operand::Expr(value)
    }
}

impl From<Literal> for Operand {
    fn from(value: Literal) -> Self {
        Operand::Literal(value)
    }
}

macro_rules! literal_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Operand::Literal(Literal::from(value))
                }
            }
        )*
    };
}

literal_operand!(
    bool,
    i32,
    i64,
    u32,
    f64,
    time::Date,
    time::OffsetDateTime,
    uuid::Uuid,
);

impl<T: Into<Literal>> From<Option<T>> for Operand {
    fn from(value: Option<T>) -> Self {
        Operand::Literal(Literal::from(value))
    }
}

/// Shorthand for [`Expr::property`].
#[allow(non_snake_case)]
pub fn P(name: impl Into<String>) -> Expr {
    Expr::property(name)
}

/// Shorthand for [`Expr::literal`].
#[allow(non_snake_case)]
pub fn L(value: impl Into<Literal>) -> Expr {
    Expr::literal(value)
}
