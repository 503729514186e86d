//! Scalar literal representation used at the leaves of filter expressions and
//! as function-call parameter values.
use serde::{Deserialize, Serialize};
use std::fmt;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{Date, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::query::errors::QueryError;

/// Typed literal tagged with explicit kind information so that serialized
/// queries stay unambiguous.
///
/// `Guid` and `EnumMember` are never produced by callers directly in the usual
/// flow; validation rewrites string literals into them once the schema says
/// the compared attribute is a GUID or an enum.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Literal {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// 64-bit floating point literal.
    Float(f64),
    /// UTF-8 string literal, rendered single-quoted.
    String(String),
    /// Calendar date.
    Date(Date),
    /// Instant with offset, rendered in UTC.
    DateTime(#[serde(with = "time::serde::rfc3339")] OffsetDateTime),
    /// GUID value, rendered without quotes.
    Guid(Uuid),
    /// Fully qualified enum member, rendered as `Namespace.Enum'Member'`.
    EnumMember {
        /// Qualified enum type name (`Namespace.EnumName`).
        enum_type: String,
        /// Canonical member name.
        member: String,
    },
}

impl Literal {
    /// Short kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Bool(_) => "boolean",
            Literal::Int(_) => "integer",
            Literal::Float(_) => "float",
            Literal::String(_) => "string",
            Literal::Date(_) => "date",
            Literal::DateTime(_) => "datetime",
            Literal::Guid(_) => "guid",
            Literal::EnumMember { .. } => "enum member",
        }
    }

    /// Renders the literal using OData v4 literal rules.
    pub fn to_odata(&self) -> String {
        self.to_string()
    }

    /// Fails when the literal has no OData wire form, such as a date outside
    /// years 0000 through 9999.
    pub fn check_wire_form(&self) -> Result<(), QueryError> {
        let formatted = match self {
            Literal::Date(d) => format_date(*d),
            Literal::DateTime(dt) => format_datetime(*dt),
            _ => return Ok(()),
        };
        formatted
            .map(drop)
            .map_err(|err| QueryError::InvalidLiteral {
                kind: self.kind(),
                reason: err.to_string(),
            })
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(true) => f.write_str("true"),
            Literal::Bool(false) => f.write_str("false"),
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write_float(f, *v),
            Literal::String(v) => write!(f, "'{}'", escape_quotes(v)),
            Literal::Date(d) => write_date(f, *d),
            Literal::DateTime(dt) => write_datetime(f, *dt),
            Literal::Guid(g) => write!(f, "{}", g.hyphenated()),
            Literal::EnumMember { enum_type, member } => {
                write!(f, "{enum_type}'{}'", escape_quotes(member))
            }
        }
    }
}

/// Doubles single quotes for use inside a quoted OData string.
pub fn escape_quotes(value: &str) -> String {
    value.replace('\'', "''")
}

fn write_float(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_infinite() {
        return f.write_str(if v > 0.0 { "INF" } else { "-INF" });
    }
    // Integral floats keep a fractional digit so they stay decimal literals.
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        write!(f, "{v:.1}")
    } else {
        write!(f, "{v}")
    }
}

fn format_date(d: Date) -> Result<String, time::error::Format> {
    d.format(&Iso8601::DATE)
}

fn format_datetime(dt: OffsetDateTime) -> Result<String, time::error::Format> {
    dt.to_offset(UtcOffset::UTC).format(&Rfc3339)
}

// Values without a wire form fall back to `time`'s display; compile rejects
// them before they reach a query string.
fn write_date(f: &mut fmt::Formatter<'_>, d: Date) -> fmt::Result {
    match format_date(d) {
        Ok(text) => f.write_str(&text),
        Err(_) => write!(f, "{d}"),
    }
}

fn write_datetime(f: &mut fmt::Formatter<'_>, dt: OffsetDateTime) -> fmt::Result {
    match format_datetime(dt) {
        Ok(text) => f.write_str(&text),
        Err(_) => write!(f, "{dt}"),
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_owned())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Int(i64::from(value))
    }
}

impl From<u32> for Literal {
    fn from(value: u32) -> Self {
        Literal::Int(i64::from(value))
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<Date> for Literal {
    fn from(value: Date) -> Self {
        Literal::Date(value)
    }
}

impl From<OffsetDateTime> for Literal {
    fn from(value: OffsetDateTime) -> Self {
        Literal::DateTime(value)
    }
}

impl From<Uuid> for Literal {
    fn from(value: Uuid) -> Self {
        Literal::Guid(value)
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Literal::Null, Into::into)
    }
}
