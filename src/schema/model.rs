//! Service schema model.
//!
//! One [`ServiceMetadata`] per `<Schema>` element. Every map is keyed by the
//! declared (unqualified) name. The model is built once and shared read-only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::{
    edm::{TypeElement, TypeRef},
    errors::SchemaWarning,
    resolve::{find_entry, find_name, find_qualified},
};

/// Scalar or structured attribute of an entity or complex type.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Name used on the wire.
    pub api_name: String,
    /// Declared type.
    #[serde(flatten)]
    pub ty: TypeRef,
}

/// Typed relationship to another entity.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NavigationProperty {
    /// Partner navigation on the target entity.
    #[serde(default)]
    pub partner: Option<String>,
    /// Local property of the first referential constraint.
    #[serde(default)]
    pub from_property: Option<String>,
    /// Referenced property of the first referential constraint.
    #[serde(default)]
    pub to_property: Option<String>,
    /// Target entity type, unqualified.
    pub to_entity_type: String,
    /// Target type string as declared.
    pub to_entity_full_type: String,
    /// Whether the navigation yields a collection.
    #[serde(default)]
    pub to_entity_is_collection: bool,
}

/// Entity type.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// First declared key property.
    #[serde(default)]
    pub primary_key: Option<String>,
    /// Unqualified base type name.
    #[serde(default)]
    pub base_type: Option<String>,
    /// Declared `Abstract="true"`.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Entity set bound to this type in the container.
    #[serde(default)]
    pub entity_set_name: Option<String>,
    /// Attributes by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
    /// Navigation properties by name.
    #[serde(default)]
    pub navigation_properties: BTreeMap<String, NavigationProperty>,
    /// Container navigation bindings of this entity's set: path to target set.
    #[serde(default)]
    pub navigation_bindings: BTreeMap<String, String>,
}

/// Enum type. Member values are kept as the declared integer text.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    /// Declared `IsFlags="true"`.
    #[serde(default)]
    pub is_flags: bool,
    /// Member name to integer text.
    pub members: BTreeMap<String, String>,
}

impl EnumDef {
    /// Resolves a member by name (exact, then case-insensitive), then by value.
    pub fn member(&self, wanted: &str) -> Option<&str> {
        find_entry(&self.members, wanted)
            .map(|(name, _)| name)
            .or_else(|| {
                let wanted = wanted.trim();
                self.members
                    .iter()
                    .find(|(_, value)| value.as_str() == wanted)
                    .map(|(name, _)| name.as_str())
            })
    }
}

/// Complex type.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ComplexTypeDef {
    /// Unqualified base type name.
    #[serde(default)]
    pub base_type: Option<String>,
    /// Properties by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

/// Function parameter.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FunctionParam {
    /// Declared type string.
    pub edm_type: String,
    /// Parsed and classified type.
    pub ty: TypeRef,
    /// May be omitted (`Nullable` is not `false`).
    #[serde(default)]
    pub optional: bool,
}

/// Function, bound or unbound. Binding parameters are not listed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Declared name.
    pub name: String,
    /// Name used in the request path.
    pub api_name: String,
    /// Declared `IsBound="true"`.
    #[serde(default)]
    pub is_bound: bool,
    /// Parameters by name.
    #[serde(default)]
    pub params: BTreeMap<String, FunctionParam>,
    /// Whether a return type is declared.
    #[serde(default)]
    pub returns: bool,
    /// Declared return type.
    #[serde(default)]
    pub return_type: Option<TypeRef>,
}

/// Schema model for one namespace.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    /// Schema namespace.
    pub namespace: String,
    /// Optional namespace alias.
    #[serde(default)]
    pub alias: Option<String>,
    /// Entity types by name.
    pub entities: BTreeMap<String, Entity>,
    /// Enum types by name.
    pub enums: BTreeMap<String, EnumDef>,
    /// Complex types by name.
    pub complex_types: BTreeMap<String, ComplexTypeDef>,
    /// Functions by name.
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionDef>,
    /// Non-fatal issues found while compiling.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SchemaWarning>,
    #[serde(skip)]
    entity_sets: BTreeMap<String, String>,
}

/// Entity resolved through its set or its own name.
#[derive(Clone, Copy, Debug)]
pub struct ResolvedEntity<'m> {
    /// Declared entity name.
    pub name: &'m str,
    /// Entity definition.
    pub entity: &'m Entity,
}

impl<'m> ResolvedEntity<'m> {
    /// Bound entity set, if any.
    pub fn entity_set(&self) -> Option<&'m str> {
        self.entity.entity_set_name.as_deref()
    }
}

impl ServiceMetadata {
    /// Empty schema for `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Rebuilds the set-to-entity index from `Entity::entity_set_name`.
    pub fn reindex(&mut self) {
        self.entity_sets = self
            .entities
            .iter()
            .filter_map(|(name, entity)| {
                entity
                    .entity_set_name
                    .as_ref()
                    .map(|set| (set.clone(), name.clone()))
            })
            .collect();
    }

    /// Entity set names mapped to their entity type names.
    pub fn entity_sets(&self) -> &BTreeMap<String, String> {
        &self.entity_sets
    }

    /// Namespace alias as a borrowed string.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Looks up an entity type by name, accepting qualified names.
    pub fn entity(&self, name: &str) -> Option<ResolvedEntity<'_>> {
        find_qualified(&self.entities, name, &self.namespace, self.alias())
            .map(|(name, entity)| ResolvedEntity { name, entity })
    }

    /// Resolves an entity-set-or-entity name: set exact, set case-insensitive,
    /// then entity name.
    pub fn resolve_entity_set(&self, name: &str) -> Option<ResolvedEntity<'_>> {
        let by_set = find_entry(&self.entity_sets, name)
            .and_then(|(_, entity_name)| self.entity(entity_name));
        by_set.or_else(|| self.entity(name))
    }

    /// Looks up an enum by name, accepting qualified names.
    pub fn enum_def(&self, name: &str) -> Option<(&str, &EnumDef)> {
        find_qualified(&self.enums, name, &self.namespace, self.alias())
    }

    /// Looks up a complex type by name, accepting qualified names.
    pub fn complex_type(&self, name: &str) -> Option<(&str, &ComplexTypeDef)> {
        find_qualified(&self.complex_types, name, &self.namespace, self.alias())
    }

    /// Looks up a function by api name, then by declared name.
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        let api_names = self.functions.values().map(|f| f.api_name.as_str());
        find_name(api_names, name)
            .and_then(|api| self.functions.values().find(|f| f.api_name == api))
            .or_else(|| find_qualified(&self.functions, name, &self.namespace, self.alias()).map(|(_, f)| f))
    }

    /// Fully qualified name for a declared schema item.
    pub fn qualify(&self, name: &str) -> String {
        format!("{}.{name}", self.namespace)
    }

    /// The entity followed by its base types, nearest first.
    pub fn lineage<'a>(&'a self, entity: &'a Entity) -> impl Iterator<Item = &'a Entity> + 'a {
        let limit = self.entities.len() + 1;
        std::iter::successors(Some(entity), move |current| {
            current
                .base_type
                .as_deref()
                .and_then(|base| self.entity(base))
                .map(|resolved| resolved.entity)
        })
        .take(limit)
    }

    /// Attribute lookup through the inheritance chain.
    pub fn attribute<'a>(&'a self, entity: &'a Entity, name: &str) -> Option<&'a Attribute> {
        self.lineage(entity)
            .find_map(|e| find_entry(&e.attributes, name).map(|(_, attr)| attr))
    }

    /// Navigation property lookup through the inheritance chain.
    pub fn navigation<'a>(
        &'a self,
        entity: &'a Entity,
        name: &str,
    ) -> Option<(&'a str, &'a NavigationProperty)> {
        self.lineage(entity)
            .find_map(|e| find_entry(&e.navigation_properties, name))
    }

    /// Primary key through the inheritance chain.
    pub fn primary_key<'a>(&'a self, entity: &'a Entity) -> Option<&'a str> {
        self.lineage(entity).find_map(|e| e.primary_key.as_deref())
    }

    /// Whether a type reference names an entity type of this schema.
    pub fn is_entity_type(&self, ty: &TypeRef) -> bool {
        ty.type_element == Some(TypeElement::EntityType)
    }
}
