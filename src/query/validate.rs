//! Schema validation.
//!
//! Validation walks the query tree parent before child and returns a new,
//! rewritten tree; the input is never modified. Rewrites applied on the way:
//! names are canonicalized to their declared spelling, the `"-"`/`"*"` select
//! sentinels are collapsed, GUID strings become unquoted GUID literals, and
//! enum values become qualified enum members.
//!
//! A node without an entity type (a function returning a primitive or
//! complex value, or a metadata-free endpoint) has nothing to resolve names
//! against. Its filter still gets the structural checks, but select and
//! orderby names pass through unchecked.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::query::{
    ast::Expr,
    errors::QueryError,
    spec::{OrderByItem, QuerySpec, SELECT_ALL, SELECT_KEY},
    target::{gate, QueryPart, Target},
    value::Literal,
};
use crate::schema::{
    edm::{EdmFamily, TypeElement, TypeRef},
    model::{Attribute, Entity, ServiceMetadata},
    resolve::find_entry,
};

/// Convenience alias for validation results.
pub type ValidateResult<T> = std::result::Result<T, QueryError>;

/// Limits applied during validation.
///
/// Bounds apply to every node, including those whose select and orderby
/// names cannot be checked for lack of an entity type.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateOptions {
    /// Largest accepted `$top`; unlimited when `None`.
    pub max_top: Option<u64>,
}

/// Validates `spec` against `metadata` with default options.
pub fn validate(spec: &QuerySpec, metadata: &ServiceMetadata) -> ValidateResult<QuerySpec> {
    validate_with(spec, metadata, &ValidateOptions::default())
}

/// Validates `spec` against `metadata`, returning the rewritten query.
pub fn validate_with(
    spec: &QuerySpec,
    metadata: &ServiceMetadata,
    options: &ValidateOptions,
) -> ValidateResult<QuerySpec> {
    gate(spec)?;
    Validator { metadata, options }.run(spec)
}

/// Entity whose attributes a query node's facets refer to.
#[derive(Clone, Copy)]
struct Scope<'m> {
    name: &'m str,
    entity: &'m Entity,
}

struct Validator<'m> {
    metadata: &'m ServiceMetadata,
    options: &'m ValidateOptions,
}

impl<'m> Validator<'m> {
    fn run(&self, spec: &QuerySpec) -> ValidateResult<QuerySpec> {
        let out = self.validate_node(spec, None)?;
        debug!(
            endpoint = %out.target.as_ref().map(Target::describe).unwrap_or_default(),
            expansions = out.expand.len(),
            "query validated"
        );
        Ok(out)
    }

    fn validate_node(
        &self,
        spec: &QuerySpec,
        parent: Option<Scope<'m>>,
    ) -> ValidateResult<QuerySpec> {
        let target = spec.target.as_ref().ok_or(QueryError::MissingTarget)?;
        let (target, scope) = self.resolve_target(target, parent)?;
        let mut out = QuerySpec {
            skip: spec.skip,
            top: spec.top,
            count: spec.count,
            ..QuerySpec::default()
        };
        match scope {
            Some(scope) => {
                out.select = self.validate_select(&spec.select, scope)?;
                out.filter = spec
                    .filter
                    .as_ref()
                    .map(|f| self.validate_filter(f, scope))
                    .transpose()?;
                out.orderby = self.validate_orderby(&spec.orderby, scope)?;
            }
            None => {
                debug!(endpoint = %target.describe(), "no entity type to check facets against");
                if let Some(filter) = &spec.filter {
                    check_filter_shape(filter)?;
                }
                out.select = spec.select.clone();
                out.filter = spec.filter.clone();
                out.orderby = spec.orderby.clone();
            }
        }
        self.validate_bounds(&out)?;
        out.expand = spec
            .expand
            .iter()
            .map(|child| self.validate_node(child, scope))
            .collect::<ValidateResult<Vec<_>>>()?;
        out.target = Some(target);
        Ok(out)
    }

    fn resolve_target(
        &self,
        target: &Target,
        parent: Option<Scope<'m>>,
    ) -> ValidateResult<(Target, Option<Scope<'m>>)> {
        match target {
            Target::EntityCollection {
                entity_set,
                id,
                focus,
                focus_type,
            } => {
                let resolved = self.metadata.resolve_entity_set(entity_set);
                let (resolved, set_name) = resolved
                    .and_then(|r| r.entity_set().map(|set| (r, set)))
                    .ok_or_else(|| QueryError::UnknownEntity {
                        name: entity_set.clone(),
                    })?;
                let mut scope = Scope {
                    name: resolved.name,
                    entity: resolved.entity,
                };
                let focus = match focus {
                    Some(focus) => {
                        let (nav_name, focused) = self.follow_navigation(scope, focus)?;
                        if focused.entity.entity_set_name.is_none() {
                            return Err(QueryError::UnknownNavigationProperty {
                                entity: scope.name.to_owned(),
                                navigation: nav_name.to_owned(),
                            });
                        }
                        scope = focused;
                        Some(nav_name.to_owned())
                    }
                    None => None,
                };
                let focus_type = match focus_type {
                    Some(cast) => {
                        scope = self.cast_scope(scope, cast)?;
                        Some(self.metadata.qualify(scope.name))
                    }
                    None => None,
                };
                let target = Target::EntityCollection {
                    entity_set: set_name.to_owned(),
                    id: id.clone(),
                    focus,
                    focus_type,
                };
                Ok((target, Some(scope)))
            }
            Target::EntityDefinitions { .. } | Target::SchemaDocument | Target::CurrentUser => {
                Ok((target.clone(), None))
            }
            Target::FunctionCall { api_name, params } => self.resolve_function(api_name, params),
            Target::ExpandedNavigation {
                navigation_property,
                ..
            } => {
                let parent = parent.ok_or_else(|| QueryError::InvalidTarget {
                    reason: format!(
                        "cannot expand '{navigation_property}': the parent target has no entity type"
                    ),
                })?;
                let (nav_name, scope) = self.follow_navigation(parent, navigation_property)?;
                let entity_set = scope.entity.entity_set_name.clone().or_else(|| {
                    find_entry(&parent.entity.navigation_bindings, nav_name)
                        .map(|(_, target)| target.clone())
                });
                let target = Target::ExpandedNavigation {
                    navigation_property: nav_name.to_owned(),
                    entity_set,
                };
                Ok((target, Some(scope)))
            }
        }
    }

    /// Resolves a navigation on `from` and returns its canonical name and target entity.
    fn follow_navigation(
        &self,
        from: Scope<'m>,
        navigation: &str,
    ) -> ValidateResult<(&'m str, Scope<'m>)> {
        let (nav_name, nav) = self
            .metadata
            .navigation(from.entity, navigation)
            .ok_or_else(|| QueryError::UnknownNavigationProperty {
                entity: from.name.to_owned(),
                navigation: navigation.to_owned(),
            })?;
        let target = self
            .metadata
            .entity(&nav.to_entity_type)
            .ok_or_else(|| QueryError::UnknownEntity {
                name: nav.to_entity_full_type.clone(),
            })?;
        Ok((
            nav_name,
            Scope {
                name: target.name,
                entity: target.entity,
            },
        ))
    }

    /// Resolves a type cast that must name `from` or one of its derived types.
    fn cast_scope(&self, from: Scope<'m>, cast: &str) -> ValidateResult<Scope<'m>> {
        let resolved = self
            .metadata
            .entity(cast)
            .ok_or_else(|| QueryError::UnknownEntity {
                name: cast.to_owned(),
            })?;
        let derives = self
            .metadata
            .lineage(resolved.entity)
            .any(|e| std::ptr::eq(e, from.entity));
        if !derives {
            return Err(QueryError::InvalidTarget {
                reason: format!("'{}' does not derive from '{}'", resolved.name, from.name),
            });
        }
        Ok(Scope {
            name: resolved.name,
            entity: resolved.entity,
        })
    }

    fn resolve_function(
        &self,
        api_name: &str,
        params: &BTreeMap<String, Literal>,
    ) -> ValidateResult<(Target, Option<Scope<'m>>)> {
        let def = self
            .metadata
            .function(api_name)
            .ok_or_else(|| QueryError::UnknownFunction {
                name: api_name.to_owned(),
            })?;
        let mut checked = BTreeMap::new();
        for (name, value) in params {
            let (param_name, param) =
                find_entry(&def.params, name).ok_or_else(|| QueryError::UnknownParameter {
                    function: def.name.clone(),
                    parameter: name.clone(),
                })?;
            let value = if param.ty.is_collection {
                debug!(function = %def.name, parameter = param_name, "collection parameter not type-checked");
                value.check_wire_form()?;
                value.clone()
            } else {
                self.check_literal(param_name, &param.ty, value)?
            };
            checked.insert(param_name.to_owned(), value);
        }
        if let Some((missing, _)) = def
            .params
            .iter()
            .find(|(name, p)| !p.optional && !checked.contains_key(*name))
        {
            return Err(QueryError::MissingParameter {
                function: def.name.clone(),
                parameter: missing.clone(),
            });
        }
        let scope = def
            .return_type
            .as_ref()
            .filter(|ty| self.metadata.is_entity_type(ty))
            .and_then(|ty| self.metadata.entity(&ty.name))
            .map(|r| Scope {
                name: r.name,
                entity: r.entity,
            });
        let target = Target::FunctionCall {
            api_name: def.api_name.clone(),
            params: checked,
        };
        Ok((target, scope))
    }

    fn attribute(
        &self,
        scope: Scope<'m>,
        name: &str,
        context: &'static str,
    ) -> ValidateResult<&'m Attribute> {
        self.metadata
            .attribute(scope.entity, name)
            .ok_or_else(|| QueryError::UnknownAttribute {
                entity: scope.name.to_owned(),
                attribute: name.to_owned(),
                context,
            })
    }

    fn validate_select(&self, fields: &[String], scope: Scope<'m>) -> ValidateResult<Vec<String>> {
        if fields.iter().any(|f| f == SELECT_KEY) {
            let key = self
                .metadata
                .primary_key(scope.entity)
                .ok_or_else(|| {
                    QueryError::malformed(format!(
                        "select \"{SELECT_KEY}\" needs a primary key but '{}' declares none",
                        scope.name
                    ))
                })?;
            return Ok(vec![key.to_owned()]);
        }
        if fields.iter().any(|f| f == SELECT_ALL) {
            return Ok(Vec::new());
        }
        let mut out: Vec<String> = Vec::with_capacity(fields.len());
        for field in fields {
            let attr = self.attribute(scope, field, "select")?;
            if !out.contains(&attr.api_name) {
                out.push(attr.api_name.clone());
            }
        }
        Ok(out)
    }

    fn validate_orderby(
        &self,
        items: &[OrderByItem],
        scope: Scope<'m>,
    ) -> ValidateResult<Vec<OrderByItem>> {
        let mut out: Vec<OrderByItem> = Vec::with_capacity(items.len());
        for item in items {
            let attr = self.attribute(scope, &item.field, "orderby")?;
            match out.iter_mut().find(|o| o.field == attr.api_name) {
                Some(existing) => existing.descending = item.descending,
                None => out.push(OrderByItem {
                    field: attr.api_name.clone(),
                    descending: item.descending,
                }),
            }
        }
        Ok(out)
    }

    fn validate_bounds(&self, spec: &QuerySpec) -> ValidateResult<()> {
        if let (Some(top), Some(max)) = (spec.top, self.options.max_top) {
            if top > max {
                return Err(QueryError::Bounds {
                    part: QueryPart::Top,
                    reason: format!("exceeds the configured maximum of {max} (got {top})"),
                });
            }
        }
        Ok(())
    }

    fn validate_filter(&self, root: &Expr, scope: Scope<'m>) -> ValidateResult<Expr> {
        check_root(root)?;
        self.validate_expr(root, scope)
    }

    fn validate_expr(&self, expr: &Expr, scope: Scope<'m>) -> ValidateResult<Expr> {
        match expr {
            Expr::Property { .. } | Expr::Literal { .. } => Err(QueryError::malformed(format!(
                "a bare {} cannot be used as a predicate",
                expr.node_name()
            ))),
            Expr::And { terms } => {
                check_terms(terms, "and")?;
                Ok(Expr::And {
                    terms: self.validate_terms(terms, scope)?,
                })
            }
            Expr::Or { terms } => {
                check_terms(terms, "or")?;
                Ok(Expr::Or {
                    terms: self.validate_terms(terms, scope)?,
                })
            }
            Expr::Not { operand } => Ok(Expr::Not {
                operand: Box::new(self.validate_expr(operand, scope)?),
            }),
            Expr::Compare { op, left, right } => {
                let (left, right) = self.validate_operands(left, right, scope, false)?;
                Ok(Expr::Compare {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expr::Text {
                op,
                subject,
                argument,
            } => {
                let (subject, argument) = self.validate_operands(subject, argument, scope, true)?;
                Ok(Expr::Text {
                    op: *op,
                    subject: Box::new(subject),
                    argument: Box::new(argument),
                })
            }
            Expr::In { subject, options } => {
                let (name, values) = membership_operands(subject, options)?;
                let attr = self.attribute(scope, name, "filter")?;
                let options = values
                    .into_iter()
                    .map(|value| {
                        self.check_literal(&attr.api_name, &attr.ty, value)
                            .map(Expr::from)
                    })
                    .collect::<ValidateResult<Vec<_>>>()?;
                Ok(Expr::In {
                    subject: Box::new(Expr::property(attr.api_name.clone())),
                    options,
                })
            }
        }
    }

    fn validate_terms(&self, terms: &[Expr], scope: Scope<'m>) -> ValidateResult<Vec<Expr>> {
        terms.iter().map(|t| self.validate_expr(t, scope)).collect()
    }

    /// Checks a binary node against the schema. Operand order is preserved.
    fn validate_operands(
        &self,
        left: &Expr,
        right: &Expr,
        scope: Scope<'m>,
        text: bool,
    ) -> ValidateResult<(Expr, Expr)> {
        let operands = binary_operands(left, right)?;
        let (property, literal) =
            self.check_operand(operands.property, operands.literal, scope, text)?;
        if operands.property_first {
            Ok((property, literal))
        } else {
            Ok((literal, property))
        }
    }

    fn check_operand(
        &self,
        name: &str,
        value: &Literal,
        scope: Scope<'m>,
        text: bool,
    ) -> ValidateResult<(Expr, Expr)> {
        let attr = self.attribute(scope, name, "filter")?;
        let literal = if text {
            self.check_text_operand(attr, value)?
        } else {
            self.check_literal(&attr.api_name, &attr.ty, value)?
        };
        Ok((Expr::property(attr.api_name.clone()), Expr::from(literal)))
    }

    fn check_text_operand(&self, attr: &Attribute, value: &Literal) -> ValidateResult<Literal> {
        let is_text = !attr.ty.is_collection
            && attr.ty.type_element == Some(TypeElement::Edm)
            && EdmFamily::of(&attr.ty.name) == EdmFamily::String;
        if !is_text {
            return Err(QueryError::mismatch(
                &attr.api_name,
                "a string attribute for a string function",
                &attr.ty.full_type,
            ));
        }
        match value {
            Literal::String(_) => Ok(value.clone()),
            other => Err(QueryError::mismatch(&attr.api_name, "Edm.String", other.kind())),
        }
    }

    /// Type-checks a literal against a declared type and returns its wire form.
    fn check_literal(&self, subject: &str, ty: &TypeRef, literal: &Literal) -> ValidateResult<Literal> {
        if matches!(literal, Literal::Null) {
            return Ok(Literal::Null);
        }
        literal.check_wire_form()?;
        if ty.is_collection {
            return Err(QueryError::mismatch(subject, "a single-valued type", &ty.full_type));
        }
        match ty.type_element {
            Some(TypeElement::Edm) => EdmFamily::of(&ty.name)
                .coerce(literal)
                .ok_or_else(|| QueryError::mismatch(subject, &ty.name, literal.kind())),
            Some(TypeElement::EnumType) => self.resolve_enum(subject, ty, literal),
            Some(TypeElement::EntityType | TypeElement::EntitySet) => Err(QueryError::mismatch(
                subject,
                "a primitive or enum type",
                format!("entity '{}'", ty.name),
            )),
            Some(TypeElement::ComplexType) => Err(QueryError::mismatch(
                subject,
                "a primitive or enum type",
                format!("complex type '{}'", ty.name),
            )),
            None => Err(QueryError::mismatch(
                subject,
                "a known type",
                format!("unresolved type '{}'", ty.full_type),
            )),
        }
    }

    fn resolve_enum(&self, subject: &str, ty: &TypeRef, literal: &Literal) -> ValidateResult<Literal> {
        let (enum_name, def) =
            self.metadata
                .enum_def(&ty.name)
                .ok_or_else(|| QueryError::UnknownEnumMember {
                    enum_type: ty.name.clone(),
                    value: literal.to_string(),
                })?;
        let enum_type = self.metadata.qualify(enum_name);
        let wanted = match literal {
            Literal::String(text) => text.clone(),
            Literal::Int(value) => value.to_string(),
            Literal::EnumMember { member, .. } => member.clone(),
            other => {
                return Err(QueryError::mismatch(
                    subject,
                    format!("a member of {enum_type}"),
                    other.kind(),
                ))
            }
        };
        let member = def
            .member(&wanted)
            .ok_or_else(|| QueryError::UnknownEnumMember {
                enum_type: enum_type.clone(),
                value: wanted.clone(),
            })?;
        Ok(Literal::EnumMember {
            enum_type,
            member: member.to_owned(),
        })
    }
}

/// Property and literal sides of a binary node.
struct BinaryOperands<'e> {
    property: &'e str,
    literal: &'e Literal,
    property_first: bool,
}

/// Exactly one side must be a property and the other a literal.
fn binary_operands<'e>(left: &'e Expr, right: &'e Expr) -> ValidateResult<BinaryOperands<'e>> {
    match (left, right) {
        (Expr::Property { name }, Expr::Literal { value }) => Ok(BinaryOperands {
            property: name,
            literal: value,
            property_first: true,
        }),
        (Expr::Literal { value }, Expr::Property { name }) => Ok(BinaryOperands {
            property: name,
            literal: value,
            property_first: false,
        }),
        (Expr::Property { .. }, Expr::Property { .. }) => Err(QueryError::malformed(
            "both operands are properties; one side must be a literal",
        )),
        (Expr::Literal { .. }, Expr::Literal { .. }) => Err(QueryError::malformed(
            "both operands are literals; one side must be a property",
        )),
        (l, r) => Err(QueryError::malformed(format!(
            "operands must be a property and a literal, found a {} and a {}",
            l.node_name(),
            r.node_name()
        ))),
    }
}

fn membership_operands<'e>(
    subject: &'e Expr,
    options: &'e [Expr],
) -> ValidateResult<(&'e str, Vec<&'e Literal>)> {
    let Expr::Property { name } = subject else {
        return Err(QueryError::malformed(format!(
            "membership subject must be a property, not a {}",
            subject.node_name()
        )));
    };
    let values = options
        .iter()
        .map(|option| match option {
            Expr::Literal { value } => Ok(value),
            other => Err(QueryError::malformed(format!(
                "membership options must be literals, found a {}",
                other.node_name()
            ))),
        })
        .collect::<ValidateResult<Vec<_>>>()?;
    Ok((name, values))
}

fn check_root(root: &Expr) -> ValidateResult<()> {
    if root.is_leaf() {
        return Err(QueryError::malformed(format!(
            "filter root must be a predicate, not a bare {}",
            root.node_name()
        )));
    }
    Ok(())
}

fn check_terms(terms: &[Expr], keyword: &str) -> ValidateResult<()> {
    if terms.is_empty() {
        return Err(QueryError::malformed(format!("'{keyword}' has no terms")));
    }
    Ok(())
}

/// Schema-free filter checks for nodes without an entity type.
fn check_filter_shape(root: &Expr) -> ValidateResult<()> {
    check_root(root)?;
    check_expr_shape(root)
}

fn check_expr_shape(expr: &Expr) -> ValidateResult<()> {
    match expr {
        Expr::Property { .. } | Expr::Literal { .. } => Err(QueryError::malformed(format!(
            "a bare {} cannot be used as a predicate",
            expr.node_name()
        ))),
        Expr::And { terms } => {
            check_terms(terms, "and")?;
            terms.iter().try_for_each(check_expr_shape)
        }
        Expr::Or { terms } => {
            check_terms(terms, "or")?;
            terms.iter().try_for_each(check_expr_shape)
        }
        Expr::Not { operand } => check_expr_shape(operand),
        Expr::Compare { left, right, .. } => {
            binary_operands(left, right)?.literal.check_wire_form()
        }
        Expr::Text {
            subject, argument, ..
        } => {
            let operands = binary_operands(subject, argument)?;
            match operands.literal {
                Literal::String(_) => Ok(()),
                other => Err(QueryError::mismatch(
                    operands.property,
                    "Edm.String",
                    other.kind(),
                )),
            }
        }
        Expr::In { subject, options } => membership_operands(subject, options)?
            .1
            .into_iter()
            .try_for_each(Literal::check_wire_form),
    }
}
