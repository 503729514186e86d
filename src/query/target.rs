//! Query targets and the facets each one permits.
//!
//! A target is the addressable endpoint shape a query runs against. Each
//! variant carries a [`Capability`] describing which `$` facets it accepts;
//! [`gate`] checks a [`QuerySpec`] tree against those capabilities before any
//! validation or compilation happens.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;
use uuid::Uuid;

use crate::query::{errors::QueryError, spec::QuerySpec, value::escape_quotes, Literal};

/// Optional query facet.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryPart {
    /// `$select`
    Select,
    /// `$filter`
    Filter,
    /// `$orderby`
    OrderBy,
    /// `$skip`
    Skip,
    /// `$top`
    Top,
    /// `$count`
    Count,
    /// `$expand`
    Expand,
}

impl QueryPart {
    /// Every facet, in wire order.
    pub const ALL: [QueryPart; 7] = [
        QueryPart::Select,
        QueryPart::Filter,
        QueryPart::Count,
        QueryPart::OrderBy,
        QueryPart::Skip,
        QueryPart::Top,
        QueryPart::Expand,
    ];

    /// Wire parameter name including the `$` prefix.
    pub fn param(self) -> &'static str {
        match self {
            QueryPart::Select => "$select",
            QueryPart::Filter => "$filter",
            QueryPart::OrderBy => "$orderby",
            QueryPart::Skip => "$skip",
            QueryPart::Top => "$top",
            QueryPart::Count => "$count",
            QueryPart::Expand => "$expand",
        }
    }
}

impl fmt::Display for QueryPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.param())
    }
}

/// Facets a target accepts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Capability {
    /// Every facet is allowed.
    Unrestricted,
    /// No facet is allowed.
    Nothing,
    /// Only the listed facets are allowed.
    Restricted(BTreeSet<QueryPart>),
}

impl Capability {
    fn only<I: IntoIterator<Item = QueryPart>>(parts: I) -> Self {
        Capability::Restricted(parts.into_iter().collect())
    }

    /// Returns the present facets this capability does not allow, in wire order.
    pub fn disallowed(&self, present: &BTreeSet<QueryPart>) -> Vec<QueryPart> {
        let mut out: Vec<QueryPart> = match self {
            Capability::Unrestricted => Vec::new(),
            Capability::Nothing => present.iter().copied().collect(),
            Capability::Restricted(allowed) => present.difference(allowed).copied().collect(),
        };
        out.sort_by_key(|part| QueryPart::ALL.iter().position(|p| p == part));
        out
    }
}

/// Addressable endpoint a query is compiled against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// Entity set, optionally narrowed to one record and a navigation from it.
    EntityCollection {
        /// Entity set (or entity) name as written by the caller.
        entity_set: String,
        /// Record key: a GUID or an alternate logical name.
        #[serde(default)]
        id: Option<String>,
        /// Navigation property followed from the addressed record.
        #[serde(default)]
        focus: Option<String>,
        /// Derived entity type the focused navigation is cast to.
        #[serde(default)]
        focus_type: Option<String>,
    },
    /// `EntityDefinitions` system endpoint.
    EntityDefinitions {
        /// Entity logical name key.
        #[serde(default)]
        logical_name: Option<String>,
        /// Entity metadata id key.
        #[serde(default)]
        id: Option<Uuid>,
    },
    /// `$metadata` document.
    SchemaDocument,
    /// `WhoAmI` endpoint.
    CurrentUser,
    /// Function invocation with literal parameters.
    FunctionCall {
        /// Function name as addressed on the wire.
        api_name: String,
        /// Parameter values by name.
        #[serde(default)]
        params: BTreeMap<String, Literal>,
    },
    /// Target of a nested `$expand` query.
    ExpandedNavigation {
        /// Navigation property on the parent entity.
        navigation_property: String,
        /// Entity set reached through the navigation; filled during validation.
        #[serde(default)]
        entity_set: Option<String>,
    },
}

impl Target {
    /// Collection target over `entity_set`.
    pub fn collection(entity_set: impl Into<String>) -> Self {
        Target::EntityCollection {
            entity_set: entity_set.into(),
            id: None,
            focus: None,
            focus_type: None,
        }
    }

    /// Single-record target.
    pub fn record(entity_set: impl Into<String>, id: impl Into<String>) -> Self {
        Target::EntityCollection {
            entity_set: entity_set.into(),
            id: Some(id.into()),
            focus: None,
            focus_type: None,
        }
    }

    /// Navigation from a single record. The id is mandatory for a focus.
    pub fn focused(
        entity_set: impl Into<String>,
        id: impl Into<String>,
        focus: impl Into<String>,
    ) -> Self {
        Target::EntityCollection {
            entity_set: entity_set.into(),
            id: Some(id.into()),
            focus: Some(focus.into()),
            focus_type: None,
        }
    }

    /// Casts the focused navigation to a derived entity type. Other targets
    /// are returned unchanged.
    pub fn with_focus_type(self, entity_type: impl Into<String>) -> Self {
        match self {
            Target::EntityCollection {
                entity_set,
                id,
                focus,
                ..
            } => Target::EntityCollection {
                entity_set,
                id,
                focus,
                focus_type: Some(entity_type.into()),
            },
            other => other,
        }
    }

    /// `EntityDefinitions` target; a GUID key is used as id, anything else as a logical name.
    pub fn entity_definitions(key: Option<&str>) -> Self {
        match key.filter(|k| !k.is_empty()) {
            Some(key) => match Uuid::parse_str(key) {
                Ok(id) => Target::EntityDefinitions {
                    logical_name: None,
                    id: Some(id),
                },
                Err(_) => Target::EntityDefinitions {
                    logical_name: Some(key.to_owned()),
                    id: None,
                },
            },
            None => Target::EntityDefinitions {
                logical_name: None,
                id: None,
            },
        }
    }

    /// Function call target.
    pub fn function<I, K, V>(api_name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Literal>,
    {
        Target::FunctionCall {
            api_name: api_name.into(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Nested expand target.
    pub fn expanded(navigation_property: impl Into<String>) -> Self {
        Target::ExpandedNavigation {
            navigation_property: navigation_property.into(),
            entity_set: None,
        }
    }

    /// Facets this target accepts.
    pub fn capability(&self) -> Capability {
        match self {
            Target::EntityCollection { id, focus, .. } => {
                if id.is_some() || focus.is_some() {
                    Capability::only([QueryPart::Select, QueryPart::Expand])
                } else {
                    Capability::Unrestricted
                }
            }
            Target::EntityDefinitions { .. } => Capability::only([QueryPart::Select]),
            Target::SchemaDocument | Target::CurrentUser => Capability::Nothing,
            Target::FunctionCall { .. } => Capability::Unrestricted,
            Target::ExpandedNavigation { .. } => {
                Capability::only([QueryPart::Select, QueryPart::Filter, QueryPart::Expand])
            }
        }
    }

    /// Whether validating this target needs service metadata.
    pub fn requires_metadata(&self) -> bool {
        match self {
            Target::EntityCollection { .. }
            | Target::FunctionCall { .. }
            | Target::ExpandedNavigation { .. } => true,
            Target::EntityDefinitions { .. } | Target::SchemaDocument | Target::CurrentUser => {
                false
            }
        }
    }

    /// Checks field combinations that no schema is needed to reject.
    pub fn check_shape(&self) -> Result<(), QueryError> {
        match self {
            Target::EntityCollection {
                entity_set,
                id,
                focus,
                focus_type,
            } => {
                if entity_set.trim().is_empty() {
                    return Err(QueryError::InvalidTarget {
                        reason: "entity set name is empty".into(),
                    });
                }
                if focus.is_some() && id.is_none() {
                    return Err(QueryError::InvalidTarget {
                        reason: format!("focus on '{entity_set}' requires a record id"),
                    });
                }
                match focus_type {
                    Some(_) if focus.is_none() => Err(QueryError::InvalidTarget {
                        reason: format!("type cast on '{entity_set}' requires a focus"),
                    }),
                    Some(ty) if ty.trim().is_empty() => Err(QueryError::InvalidTarget {
                        reason: "focus type name is empty".into(),
                    }),
                    _ => Ok(()),
                }
            }
            Target::FunctionCall { api_name, .. } if api_name.trim().is_empty() => {
                Err(QueryError::InvalidTarget {
                    reason: "function name is empty".into(),
                })
            }
            Target::ExpandedNavigation {
                navigation_property,
                ..
            } if navigation_property.trim().is_empty() => Err(QueryError::InvalidTarget {
                reason: "expanded navigation property is empty".into(),
            }),
            _ => Ok(()),
        }
    }

    /// Path rendered in front of the query string.
    pub fn path(&self) -> String {
        match self {
            Target::EntityCollection {
                entity_set,
                id,
                focus,
                focus_type,
            } => {
                let mut path = format!("/{entity_set}");
                if let Some(id) = id {
                    path.push_str(&key_segment(id));
                    if let Some(focus) = focus {
                        path.push('/');
                        path.push_str(focus);
                        if let Some(ty) = focus_type {
                            path.push('/');
                            path.push_str(ty);
                        }
                    }
                }
                path
            }
            Target::EntityDefinitions { logical_name, id } => match (id, logical_name) {
                (Some(id), _) => format!("/EntityDefinitions({})", id.hyphenated()),
                (None, Some(name)) => {
                    format!("/EntityDefinitions(LogicalName='{}')", escape_quotes(name))
                }
                (None, None) => "/EntityDefinitions".to_owned(),
            },
            Target::SchemaDocument => "/$metadata".to_owned(),
            Target::CurrentUser => "/WhoAmI".to_owned(),
            Target::FunctionCall { api_name, params } => {
                let args = params
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("/{api_name}({args})")
            }
            Target::ExpandedNavigation {
                navigation_property,
                ..
            } => navigation_property.clone(),
        }
    }

    /// Label used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Target::ExpandedNavigation {
                navigation_property,
                ..
            } => format!("$expand={navigation_property}"),
            other => other.path(),
        }
    }
}

/// Renders a record key: GUIDs bare and lowercase, anything else as a logical name.
fn key_segment(id: &str) -> String {
    match Uuid::parse_str(id.trim()) {
        Ok(guid) => format!("({})", guid.hyphenated()),
        Err(_) => format!("(LogicalName='{}')", escape_quotes(id)),
    }
}

/// Checks every node of the query tree against its target's capability.
///
/// Offending facets of one node are reported together in a single error.
pub fn gate(spec: &QuerySpec) -> Result<(), QueryError> {
    let target = spec.target.as_ref().ok_or(QueryError::MissingTarget)?;
    target.check_shape()?;
    let present = spec.present_parts();
    let disallowed = target.capability().disallowed(&present);
    if !disallowed.is_empty() {
        return Err(QueryError::CapabilityViolation {
            target: target.describe(),
            parts: disallowed,
        });
    }
    debug!(endpoint = %target.describe(), parts = present.len(), "capability gate passed");
    for child in &spec.expand {
        match &child.target {
            Some(Target::ExpandedNavigation { .. }) => gate(child)?,
            Some(other) => {
                return Err(QueryError::InvalidTarget {
                    reason: format!("expanded query must target a navigation, got {}", other.describe()),
                })
            }
            None => return Err(QueryError::MissingTarget),
        }
    }
    Ok(())
}
