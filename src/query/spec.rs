//! Structured query representation and the fluent builder that fills it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::query::{
    ast::Expr,
    errors::QueryError,
    normalize::{flatten_exprs, flatten_fields, flatten_orderby, Input},
    target::{QueryPart, Target},
};

/// Sentinel select entry meaning "every field" (the wire default).
pub const SELECT_ALL: &str = "*";
/// Sentinel select entry meaning "the primary key only".
pub const SELECT_KEY: &str = "-";

/// Single `$orderby` entry.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OrderByItem {
    /// Field name.
    pub field: String,
    /// Descending when true, ascending otherwise.
    #[serde(default)]
    pub descending: bool,
}

impl OrderByItem {
    /// Ascending order on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending order on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Query tree: one target plus optional facets and nested expansions.
///
/// Each child in `expand` is a full `QuerySpec` whose target is a
/// [`Target::ExpandedNavigation`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Endpoint the query addresses.
    #[serde(default)]
    pub target: Option<Target>,
    /// Selected fields, ordered and deduplicated.
    #[serde(default)]
    pub select: Vec<String>,
    /// Root filter expression.
    #[serde(default)]
    pub filter: Option<Expr>,
    /// Ordering, at most one entry per field.
    #[serde(default)]
    pub orderby: Vec<OrderByItem>,
    /// Rows to skip.
    #[serde(default)]
    pub skip: Option<u64>,
    /// Maximum rows to return.
    #[serde(default)]
    pub top: Option<u64>,
    /// Whether to request a total count.
    #[serde(default)]
    pub count: Option<bool>,
    /// Nested `$expand` queries.
    #[serde(default)]
    pub expand: Vec<QuerySpec>,
}

impl QuerySpec {
    /// Empty query against `target`.
    pub fn new(target: Target) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    /// Facets carrying a value on this node (children are not inspected).
    pub fn present_parts(&self) -> BTreeSet<QueryPart> {
        let mut parts = BTreeSet::new();
        if !self.select.is_empty() {
            parts.insert(QueryPart::Select);
        }
        if self.filter.is_some() {
            parts.insert(QueryPart::Filter);
        }
        if !self.orderby.is_empty() {
            parts.insert(QueryPart::OrderBy);
        }
        if self.skip.is_some() {
            parts.insert(QueryPart::Skip);
        }
        if self.top.is_some() {
            parts.insert(QueryPart::Top);
        }
        if self.count.is_some() {
            parts.insert(QueryPart::Count);
        }
        if !self.expand.is_empty() {
            parts.insert(QueryPart::Expand);
        }
        parts
    }

    /// Merges orderby items: new fields are appended, known fields take the new direction.
    pub fn merge_orderby<I: IntoIterator<Item = OrderByItem>>(&mut self, items: I) {
        for item in items {
            match self.orderby.iter_mut().find(|o| o.field == item.field) {
                Some(existing) => existing.descending = item.descending,
                None => self.orderby.push(item),
            }
        }
    }
}

/// Fluent builder for [`QuerySpec`].
///
/// Builder methods never fail eagerly; the first error is kept and returned
/// from [`QueryBuilder::finish`], and later calls become no-ops.
#[derive(Clone, Debug, Default)]
pub struct QueryBuilder {
    spec: QuerySpec,
    error: Option<QueryError>,
}

impl QueryBuilder {
    /// Builder for a query against `target`.
    pub fn new(target: Target) -> Self {
        Self {
            spec: QuerySpec::new(target),
            error: None,
        }
    }

    /// Builder for a query against the entity set `entity_set`.
    pub fn collection(entity_set: impl Into<String>) -> Self {
        Self::new(Target::collection(entity_set))
    }

    /// Builder with no target; [`finish`](Self::finish) succeeds but compiling fails.
    pub fn untargeted() -> Self {
        Self::default()
    }

    /// Replaces the target.
    pub fn target(mut self, target: Target) -> Self {
        self.spec.target = Some(target);
        self
    }

    fn record(&mut self, result: Result<(), QueryError>) {
        if let Err(err) = result {
            if self.error.is_none() {
                self.error = Some(err);
            }
        }
    }

    /// Adds fields to `$select`, keeping first-seen order.
    pub fn select<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        if self.error.is_some() {
            return self;
        }
        match flatten_fields(fields) {
            Ok(fields) => {
                for field in fields {
                    if !self.spec.select.contains(&field) {
                        self.spec.select.push(field);
                    }
                }
            }
            Err(err) => self.record(Err(err)),
        }
        self
    }

    /// AND-merges expressions into the filter.
    pub fn filter<I>(mut self, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        if self.error.is_some() {
            return self;
        }
        match flatten_exprs(items) {
            Ok(exprs) => {
                if let Some(incoming) = combine(exprs, Expr::and) {
                    self.spec.filter = Some(match self.spec.filter.take() {
                        Some(existing) => Expr::and([existing, incoming]),
                        None => incoming,
                    });
                }
            }
            Err(err) => self.record(Err(err)),
        }
        self
    }

    /// Shorthand for a single-expression [`filter`](Self::filter).
    pub fn filter_expr(self, expr: Expr) -> Self {
        self.filter([expr])
    }

    /// OR-merges expressions into the filter.
    pub fn or_filter<I>(mut self, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        if self.error.is_some() {
            return self;
        }
        match flatten_exprs(items) {
            Ok(exprs) => {
                if let Some(incoming) = combine(exprs, Expr::or) {
                    self.spec.filter = Some(match self.spec.filter.take() {
                        Some(existing) => Expr::or([existing, incoming]),
                        None => incoming,
                    });
                }
            }
            Err(err) => self.record(Err(err)),
        }
        self
    }

    /// Adds orderby entries; see [`flatten_orderby`] for accepted shapes.
    pub fn orderby<I>(mut self, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Input>,
    {
        if self.error.is_some() {
            return self;
        }
        match flatten_orderby(items) {
            Ok(items) => self.spec.merge_orderby(items),
            Err(err) => self.record(Err(err)),
        }
        self
    }

    /// Sets `$skip`; negative values are rejected.
    pub fn skip(mut self, n: i64) -> Self {
        if self.error.is_some() {
            return self;
        }
        match non_negative(QueryPart::Skip, n) {
            Ok(n) => self.spec.skip = Some(n),
            Err(err) => self.record(Err(err)),
        }
        self
    }

    /// Sets `$top`; negative values are rejected.
    pub fn top(mut self, n: i64) -> Self {
        if self.error.is_some() {
            return self;
        }
        match non_negative(QueryPart::Top, n) {
            Ok(n) => self.spec.top = Some(n),
            Err(err) => self.record(Err(err)),
        }
        self
    }

    /// Sets `$count`.
    pub fn count(mut self, enabled: bool) -> Self {
        self.spec.count = Some(enabled);
        self
    }

    /// Expands a navigation property without nested options.
    pub fn expand(self, navigation: impl Into<String>) -> Self {
        self.expand_with(navigation, |child| child)
    }

    /// Expands a navigation property with a nested query built by `build`.
    pub fn expand_with<S, F>(mut self, navigation: S, build: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        if self.error.is_some() {
            return self;
        }
        let child = build(QueryBuilder::new(Target::expanded(navigation)));
        match child.finish() {
            Ok(spec) => self.spec.expand.push(spec),
            Err(err) => self.record(Err(err)),
        }
        self
    }

    /// Returns the built query or the first recorded error.
    pub fn finish(self) -> Result<QuerySpec, QueryError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.spec),
        }
    }
}

fn combine(mut exprs: Vec<Expr>, join: fn(Vec<Expr>) -> Expr) -> Option<Expr> {
    match exprs.len() {
        0 => None,
        1 => exprs.pop(),
        _ => Some(join(exprs)),
    }
}

fn non_negative(part: QueryPart, n: i64) -> Result<u64, QueryError> {
    u64::try_from(n).map_err(|_| QueryError::Bounds {
        part,
        reason: format!("must be a non-negative integer (got {n})"),
    })
}
