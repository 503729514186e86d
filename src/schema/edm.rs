//! EDM primitive families and type-string parsing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::query::Literal;

/// Prefix shared by every EDM primitive type name.
pub const EDM_PREFIX: &str = "Edm.";

/// What a declared type name refers to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeElement {
    /// EDM primitive (`Edm.String`, `Edm.Guid`, ...).
    Edm,
    /// Enum declared in the same schema.
    EnumType,
    /// Entity type declared in the same schema.
    EntityType,
    /// Entity set declared in the container.
    EntitySet,
    /// Complex type declared in the same schema.
    ComplexType,
}

/// Parsed type reference: `Collection(ns.Name)` becomes `Name` with `is_collection`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    /// Type name with the namespace or alias prefix removed.
    #[serde(rename = "type")]
    pub name: String,
    /// Type string exactly as declared.
    pub full_type: String,
    /// Declared as `Collection(...)`.
    #[serde(default)]
    pub is_collection: bool,
    /// Classification; `None` when the name matches nothing known.
    #[serde(default)]
    pub type_element: Option<TypeElement>,
}

/// Splits `Collection(X)` into `(X, true)`; anything else is `(raw, false)`.
pub fn unwrap_collection(raw: &str) -> (&str, bool) {
    let trimmed = raw.trim();
    match trimmed
        .strip_prefix("Collection(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(inner) => (inner.trim(), true),
        None => (trimmed, false),
    }
}

/// Removes a leading `namespace.` or `alias.` qualifier. EDM names are kept whole.
pub fn strip_qualifier<'a>(name: &'a str, namespace: &str, alias: Option<&str>) -> &'a str {
    if name.starts_with(EDM_PREFIX) {
        return name;
    }
    let prefixes = std::iter::once(namespace).chain(alias);
    for prefix in prefixes.filter(|p| !p.is_empty()) {
        if let Some(rest) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('.'))
        {
            return rest;
        }
    }
    name
}

/// Literal families an EDM primitive accepts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EdmFamily {
    /// `Edm.String`
    String,
    /// `Edm.Boolean`
    Boolean,
    /// `Edm.Byte`, `Edm.SByte`, `Edm.Int16`, `Edm.Int32`, `Edm.Int64`
    Integer,
    /// `Edm.Decimal`, `Edm.Double`, `Edm.Single`
    Decimal,
    /// `Edm.Guid`
    Guid,
    /// `Edm.Date`
    Date,
    /// `Edm.DateTimeOffset`
    DateTimeOffset,
    /// Any other primitive; compared as text.
    Other,
}

impl EdmFamily {
    /// Family for a full EDM name such as `Edm.Int32`.
    pub fn of(edm_name: &str) -> Self {
        match edm_name.strip_prefix(EDM_PREFIX).unwrap_or(edm_name) {
            "String" => EdmFamily::String,
            "Boolean" => EdmFamily::Boolean,
            "Byte" | "SByte" | "Int16" | "Int32" | "Int64" => EdmFamily::Integer,
            "Decimal" | "Double" | "Single" => EdmFamily::Decimal,
            "Guid" => EdmFamily::Guid,
            "Date" => EdmFamily::Date,
            "DateTimeOffset" => EdmFamily::DateTimeOffset,
            _ => EdmFamily::Other,
        }
    }

    /// Returns the literal in the form the wire expects, or `None` when the kind does not fit.
    ///
    /// Strings holding a GUID are turned into unquoted GUID literals.
    pub fn coerce(self, literal: &Literal) -> Option<Literal> {
        match (self, literal) {
            (_, Literal::Null) => Some(Literal::Null),
            (EdmFamily::String | EdmFamily::Other, Literal::String(_)) => Some(literal.clone()),
            (EdmFamily::Boolean, Literal::Bool(_)) => Some(literal.clone()),
            (EdmFamily::Integer, Literal::Int(_)) => Some(literal.clone()),
            (EdmFamily::Decimal, Literal::Int(_) | Literal::Float(_)) => Some(literal.clone()),
            (EdmFamily::Guid, Literal::Guid(_)) => Some(literal.clone()),
            (EdmFamily::Guid, Literal::String(text)) => {
                Uuid::parse_str(text.trim()).ok().map(Literal::Guid)
            }
            (EdmFamily::Date, Literal::Date(_)) => Some(literal.clone()),
            (EdmFamily::DateTimeOffset, Literal::DateTime(_) | Literal::Date(_)) => {
                Some(literal.clone())
            }
            _ => None,
        }
    }
}
