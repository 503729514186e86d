//! Schema compiler: EDMX or cached JSON into [`ServiceMetadata`].
//!
//! Each `<Schema>` is compiled in two phases. The first collects the names of
//! enums, complex types, entity types and entity sets; the second parses
//! every declaration and classifies attribute types against those name sets.

use std::collections::BTreeSet;

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::schema::{
    edm::{strip_qualifier, unwrap_collection, TypeElement, TypeRef, EDM_PREFIX},
    errors::{SchemaError, SchemaWarning},
    model::{
        Attribute, ComplexTypeDef, Entity, EnumDef, FunctionDef, FunctionParam,
        NavigationProperty, ServiceMetadata,
    },
    xml::XmlElement,
};

/// Compiles EDMX text. Returns one model per declared schema, in document order.
pub fn compile_edmx(text: &str) -> Result<Vec<ServiceMetadata>, SchemaError> {
    let root = XmlElement::parse(text)?;
    compile_tree(&root)
}

/// Compiles an already-parsed EDMX tree rooted at `<Edmx>` or `<Schema>`.
pub fn compile_tree(root: &XmlElement) -> Result<Vec<ServiceMetadata>, SchemaError> {
    let schemas: Vec<&XmlElement> = match root.name.as_str() {
        "Schema" => vec![root],
        "Edmx" => root
            .child("DataServices")
            .ok_or_else(|| SchemaError::MissingElement {
                parent: root.name.clone(),
                element: "DataServices",
            })?
            .children_named("Schema")
            .collect(),
        other => {
            return Err(SchemaError::shape(format!(
                "expected <Edmx> or <Schema> root, found <{other}>"
            )))
        }
    };
    if schemas.is_empty() {
        return Err(SchemaError::NoSchema);
    }
    schemas
        .into_iter()
        .map(|schema| SchemaCompiler::new(schema)?.run())
        .collect()
}

/// Compiles the cached JSON form: an array of serialized schema objects.
pub fn compile_cached_json(text: &str) -> Result<Vec<ServiceMetadata>, SchemaError> {
    let value: JsonValue = serde_json::from_str(text)?;
    let items = match value {
        JsonValue::Array(items) => items,
        other => {
            return Err(SchemaError::shape(format!(
                "cached schema must be a JSON array, found {}",
                json_kind(&other)
            )))
        }
    };
    if items.is_empty() {
        return Err(SchemaError::NoSchema);
    }
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            return Err(SchemaError::shape(format!(
                "cached schema entry {index} must be an object, found {}",
                json_kind(&item)
            )));
        }
        let mut meta: ServiceMetadata = serde_json::from_value(item)?;
        meta.reindex();
        debug!(namespace = %meta.namespace, entities = meta.entities.len(), "loaded cached schema");
        out.push(meta);
    }
    Ok(out)
}

/// Serializes schemas into the cached JSON form read by [`compile_cached_json`].
pub fn to_cached_json(schemas: &[ServiceMetadata]) -> Result<String, SchemaError> {
    Ok(serde_json::to_string_pretty(schemas)?)
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Names declared in one schema, collected before any classification.
#[derive(Default)]
struct NameSets {
    enums: BTreeSet<String>,
    complex_types: BTreeSet<String>,
    entities: BTreeSet<String>,
    entity_sets: BTreeSet<String>,
}

struct SchemaCompiler<'x> {
    schema: &'x XmlElement,
    meta: ServiceMetadata,
    names: NameSets,
}

impl<'x> SchemaCompiler<'x> {
    fn new(schema: &'x XmlElement) -> Result<Self, SchemaError> {
        let mut meta = ServiceMetadata::new(schema.required_attr("Namespace")?);
        meta.alias = schema.attr("Alias").map(str::to_owned);
        Ok(Self {
            schema,
            meta,
            names: NameSets::default(),
        })
    }

    fn run(mut self) -> Result<ServiceMetadata, SchemaError> {
        self.collect_names()?;
        let schema = self.schema;
        for complex in schema.children_named("ComplexType") {
            self.parse_complex_type(complex)?;
        }
        for enum_type in schema.children_named("EnumType") {
            self.parse_enum_type(enum_type)?;
        }
        for entity in schema.children_named("EntityType") {
            self.parse_entity_type(entity)?;
        }
        for function in schema.children_named("Function") {
            self.parse_function(function)?;
        }
        for container in schema.children_named("EntityContainer") {
            self.parse_container(container)?;
        }
        self.meta.reindex();
        info!(
            namespace = %self.meta.namespace,
            entities = self.meta.entities.len(),
            entity_sets = self.meta.entity_sets().len(),
            enums = self.meta.enums.len(),
            complex_types = self.meta.complex_types.len(),
            functions = self.meta.functions.len(),
            warnings = self.meta.warnings.len(),
            "compiled schema"
        );
        Ok(self.meta)
    }

    fn collect_names(&mut self) -> Result<(), SchemaError> {
        let schema = self.schema;
        for el in schema.children_named("EnumType") {
            self.names.enums.insert(el.required_attr("Name")?.to_owned());
        }
        for el in schema.children_named("ComplexType") {
            self.names
                .complex_types
                .insert(el.required_attr("Name")?.to_owned());
        }
        for el in schema.children_named("EntityType") {
            self.names.entities.insert(el.required_attr("Name")?.to_owned());
        }
        for container in schema.children_named("EntityContainer") {
            for set in container.children_named("EntitySet") {
                self.names
                    .entity_sets
                    .insert(set.required_attr("Name")?.to_owned());
            }
        }
        Ok(())
    }

    fn strip<'a>(&self, name: &'a str) -> &'a str {
        strip_qualifier(name, &self.meta.namespace, self.meta.alias.as_deref())
    }

    /// Parses and classifies a declared type string.
    fn classify(&self, raw: &str) -> TypeRef {
        let (inner, is_collection) = unwrap_collection(raw);
        let name = self.strip(inner);
        let type_element = if name.starts_with(EDM_PREFIX) {
            Some(TypeElement::Edm)
        } else if self.names.enums.contains(name) {
            Some(TypeElement::EnumType)
        } else if self.names.entities.contains(name) {
            Some(TypeElement::EntityType)
        } else if self.names.entity_sets.contains(name) {
            Some(TypeElement::EntitySet)
        } else if self.names.complex_types.contains(name) {
            Some(TypeElement::ComplexType)
        } else {
            None
        };
        TypeRef {
            name: name.to_owned(),
            full_type: raw.to_owned(),
            is_collection,
            type_element,
        }
    }

    fn parse_attribute(&self, property: &XmlElement) -> Result<(String, Attribute), SchemaError> {
        let name = property.required_attr("Name")?;
        let ty = self.classify(property.required_attr("Type")?);
        Ok((
            name.to_owned(),
            Attribute {
                api_name: name.to_owned(),
                ty,
            },
        ))
    }

    fn parse_complex_type(&mut self, el: &XmlElement) -> Result<(), SchemaError> {
        let name = el.required_attr("Name")?;
        let mut def = ComplexTypeDef {
            base_type: el.attr("BaseType").map(|b| self.strip(b).to_owned()),
            ..ComplexTypeDef::default()
        };
        for property in el.children_named("Property") {
            let (key, attr) = self.parse_attribute(property)?;
            def.attributes.insert(key, attr);
        }
        self.meta.complex_types.insert(name.to_owned(), def);
        Ok(())
    }

    fn parse_enum_type(&mut self, el: &XmlElement) -> Result<(), SchemaError> {
        let name = el.required_attr("Name")?;
        let mut def = EnumDef {
            is_flags: el.flag("IsFlags").unwrap_or(false),
            ..EnumDef::default()
        };
        for (index, member) in el.children_named("Member").enumerate() {
            let member_name = member.required_attr("Name")?;
            let value = member
                .attr("Value")
                .map(|v| v.trim().to_owned())
                .unwrap_or_else(|| index.to_string());
            def.members.insert(member_name.to_owned(), value);
        }
        self.meta.enums.insert(name.to_owned(), def);
        Ok(())
    }

    fn parse_entity_type(&mut self, el: &XmlElement) -> Result<(), SchemaError> {
        let name = el.required_attr("Name")?;
        let mut entity = Entity {
            base_type: el.attr("BaseType").map(|b| self.strip(b).to_owned()),
            is_abstract: el.flag("Abstract").unwrap_or(false),
            ..Entity::default()
        };

        if let Some(key) = el.child("Key") {
            let mut refs = key
                .children_named("PropertyRef")
                .map(|r| r.required_attr("Name").map(str::to_owned))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter();
            entity.primary_key = refs.next();
            let ignored: Vec<String> = refs.collect();
            if let (Some(kept), false) = (&entity.primary_key, ignored.is_empty()) {
                self.record(SchemaWarning::CompositeKey {
                    entity: name.to_owned(),
                    kept: kept.clone(),
                    ignored,
                });
            }
        }

        for property in el.children_named("Property") {
            let (key, attr) = self.parse_attribute(property)?;
            entity.attributes.insert(key, attr);
        }

        for nav in el.children_named("NavigationProperty") {
            let nav_name = nav.required_attr("Name")?;
            let ty = self.classify(nav.required_attr("Type")?);
            let mut constraints = nav.children_named("ReferentialConstraint");
            let first = constraints.next();
            if constraints.next().is_some() {
                self.record(SchemaWarning::MultipleConstraints {
                    entity: name.to_owned(),
                    navigation: nav_name.to_owned(),
                });
            }
            entity.navigation_properties.insert(
                nav_name.to_owned(),
                NavigationProperty {
                    partner: nav.attr("Partner").map(str::to_owned),
                    from_property: first.and_then(|c| c.attr("Property")).map(str::to_owned),
                    to_property: first
                        .and_then(|c| c.attr("ReferencedProperty"))
                        .map(str::to_owned),
                    to_entity_type: ty.name,
                    to_entity_full_type: ty.full_type,
                    to_entity_is_collection: ty.is_collection,
                },
            );
        }

        self.meta.entities.insert(name.to_owned(), entity);
        Ok(())
    }

    fn parse_function(&mut self, el: &XmlElement) -> Result<(), SchemaError> {
        let name = el.required_attr("Name")?;
        let is_bound = el.flag("IsBound").unwrap_or(false);
        if self.meta.functions.contains_key(name) {
            debug!(function = name, "skipping additional overload");
            return Ok(());
        }
        let mut def = FunctionDef {
            name: name.to_owned(),
            api_name: name.to_owned(),
            is_bound,
            params: Default::default(),
            returns: false,
            return_type: None,
        };
        let skip = usize::from(is_bound);
        for param in el.children_named("Parameter").skip(skip) {
            let param_name = param.required_attr("Name")?;
            let edm_type = param.required_attr("Type")?;
            def.params.insert(
                param_name.to_owned(),
                FunctionParam {
                    edm_type: edm_type.to_owned(),
                    ty: self.classify(edm_type),
                    optional: param.flag("Nullable").unwrap_or(true),
                },
            );
        }
        if let Some(ret) = el.child("ReturnType") {
            def.returns = true;
            def.return_type = ret.attr("Type").map(|t| self.classify(t));
        }
        self.meta.functions.insert(name.to_owned(), def);
        Ok(())
    }

    fn parse_container(&mut self, container: &XmlElement) -> Result<(), SchemaError> {
        for set in container.children_named("EntitySet") {
            let set_name = set.required_attr("Name")?;
            let raw_type = set.required_attr("EntityType")?;
            let type_name = self.strip(raw_type).to_owned();
            let Some(entity) = self.meta.entities.get_mut(&type_name) else {
                self.record(SchemaWarning::UnknownSetType {
                    entity_set: set_name.to_owned(),
                    entity_type: raw_type.to_owned(),
                });
                continue;
            };
            let previous = entity.entity_set_name.replace(set_name.to_owned());
            let bindings = set
                .children_named("NavigationPropertyBinding")
                .filter_map(|b| Some((b.attr("Path")?, b.attr("Target")?)))
                .map(|(path, target)| {
                    let target = target.rsplit('/').next().unwrap_or(target);
                    (path.to_owned(), target.to_owned())
                })
                .collect::<Vec<_>>();
            entity.navigation_bindings.extend(bindings);
            if let Some(previous) = previous.filter(|p| p != set_name) {
                self.record(SchemaWarning::EntitySetRebound {
                    entity: type_name,
                    previous,
                    current: set_name.to_owned(),
                });
            }
        }
        for import in container.children_named("FunctionImport") {
            let (Some(import_name), Some(function)) = (import.attr("Name"), import.attr("Function"))
            else {
                continue;
            };
            let function = self.strip(function).to_owned();
            if let Some(def) = self.meta.functions.get_mut(&function) {
                def.api_name = import_name.to_owned();
            }
        }
        Ok(())
    }

    fn record(&mut self, warning: SchemaWarning) {
        warn!(namespace = %self.meta.namespace, "{warning}");
        self.meta.warnings.push(warning);
    }
}
