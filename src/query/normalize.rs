//! Input flattening for filters, field lists, and orderby clauses.
//!
//! Builder entry points accept loosely shaped caller input: single values,
//! nested lists, unordered sets, and pairs. [`Input`] captures that shape and
//! the three flatteners here turn it into canonical ordered lists. All three
//! walk depth-first, preserve caller order, and sort unordered sets by their
//! textual form first so output never depends on hash order.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::query::{ast::Expr, errors::QueryError, spec::OrderByItem};

/// Convenience alias for normalizer results.
pub type NormalizeResult<T> = std::result::Result<T, QueryError>;

/// Loosely shaped builder input.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    /// Absent value; skipped by every flattener.
    Nothing,
    /// Text: a field name, or an orderby token such as `"Name desc"`.
    Text(String),
    /// Boolean, only meaningful as the direction half of an orderby pair.
    Flag(bool),
    /// Prebuilt expression node.
    Expr(Expr),
    /// Two-element tuple.
    Pair(Box<Input>, Box<Input>),
    /// Ordered sequence.
    List(Vec<Input>),
    /// Unordered collection; sorted by textual form before walking.
    Set(Vec<Input>),
}

impl Input {
    fn sort_key(&self) -> String {
        match self {
            Input::Text(text) => text.clone(),
            other => format!("{other:?}"),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Input::Nothing => "nothing",
            Input::Text(_) => "text",
            Input::Flag(_) => "bool",
            Input::Expr(_) => "expression",
            Input::Pair(..) => "pair",
            Input::List(_) => "list",
            Input::Set(_) => "set",
        }
    }
}

fn sorted_set(items: &[Input]) -> Vec<&Input> {
    let mut sorted: Vec<&Input> = items.iter().collect();
    sorted.sort_by_cached_key(|item| item.sort_key());
    sorted
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::Text(value.to_owned())
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::Text(value)
    }
}

impl From<&String> for Input {
    fn from(value: &String) -> Self {
        Input::Text(value.clone())
    }
}

impl From<bool> for Input {
    fn from(value: bool) -> Self {
        Input::Flag(value)
    }
}

impl From<Expr> for Input {
    fn from(value: Expr) -> Self {
        Input::Expr(value)
    }
}

impl From<OrderByItem> for Input {
    fn from(value: OrderByItem) -> Self {
        Input::Pair(
            Box::new(Input::Text(value.field)),
            Box::new(Input::Flag(value.descending)),
        )
    }
}

impl<A: Into<Input>, B: Into<Input>> From<(A, B)> for Input {
    fn from((a, b): (A, B)) -> Self {
        Input::Pair(Box::new(a.into()), Box::new(b.into()))
    }
}

impl<T: Into<Input>> From<Option<T>> for Input {
    fn from(value: Option<T>) -> Self {
        value.map_or(Input::Nothing, Into::into)
    }
}

impl<T: Into<Input>> From<Vec<T>> for Input {
    fn from(value: Vec<T>) -> Self {
        Input::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Input>, const N: usize> From<[T; N]> for Input {
    fn from(value: [T; N]) -> Self {
        Input::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Input>> From<BTreeSet<T>> for Input {
    fn from(value: BTreeSet<T>) -> Self {
        Input::Set(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Input>, S> From<HashSet<T, S>> for Input {
    fn from(value: HashSet<T, S>) -> Self {
        Input::Set(value.into_iter().map(Into::into).collect())
    }
}

/// Flattens expressions and nested containers of expressions.
///
/// Text is rejected: a bare string is ambiguous here (property or literal?),
/// so callers must build an [`Expr`] first.
pub fn flatten_exprs<I>(items: I) -> NormalizeResult<Vec<Expr>>
where
    I: IntoIterator,
    I::Item: Into<Input>,
{
    fn walk(input: &Input, out: &mut Vec<Expr>) -> NormalizeResult<()> {
        match input {
            Input::Nothing => Ok(()),
            Input::Expr(expr) => {
                out.push(expr.clone());
                Ok(())
            }
            Input::Pair(a, b) => {
                walk(a, out)?;
                walk(b, out)
            }
            Input::List(items) => items.iter().try_for_each(|item| walk(item, out)),
            Input::Set(items) => sorted_set(items)
                .into_iter()
                .try_for_each(|item| walk(item, out)),
            other => Err(QueryError::InvalidInput {
                context: "filter",
                expected: "expression or iterable of expressions",
                found: other.describe(),
            }),
        }
    }

    let mut out = Vec::new();
    for item in items {
        walk(&item.into(), &mut out)?;
    }
    Ok(out)
}

/// Flattens field names, dropping blanks and later duplicates.
pub fn flatten_fields<I>(items: I) -> NormalizeResult<Vec<String>>
where
    I: IntoIterator,
    I::Item: Into<Input>,
{
    fn walk(
        input: &Input,
        out: &mut Vec<String>,
        seen: &mut HashSet<String>,
    ) -> NormalizeResult<()> {
        match input {
            Input::Nothing => Ok(()),
            Input::Text(text) => {
                let field = text.trim();
                if !field.is_empty() && seen.insert(field.to_owned()) {
                    out.push(field.to_owned());
                }
                Ok(())
            }
            Input::Pair(a, b) => {
                walk(a, out, seen)?;
                walk(b, out, seen)
            }
            Input::List(items) => items.iter().try_for_each(|item| walk(item, out, seen)),
            Input::Set(items) => sorted_set(items)
                .into_iter()
                .try_for_each(|item| walk(item, out, seen)),
            other => Err(QueryError::InvalidInput {
                context: "select",
                expected: "field name or iterable of field names",
                found: other.describe(),
            }),
        }
    }

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for item in items {
        walk(&item.into(), &mut out, &mut seen)?;
    }
    Ok(out)
}

/// Flattens orderby input into one item per field.
///
/// A field keeps the position of its first occurrence while the direction of
/// its last occurrence wins.
pub fn flatten_orderby<I>(items: I) -> NormalizeResult<Vec<OrderByItem>>
where
    I: IntoIterator,
    I::Item: Into<Input>,
{
    let mut collector = OrderCollector::default();
    for item in items {
        collector.walk(&item.into())?;
    }
    Ok(collector.finish())
}

#[derive(Default)]
struct OrderCollector {
    sequence: Vec<String>,
    directions: HashMap<String, bool>,
}

impl OrderCollector {
    fn add(&mut self, field: &str, descending: bool) {
        let field = field.trim();
        if field.is_empty() {
            return;
        }
        if !self.directions.contains_key(field) {
            self.sequence.push(field.to_owned());
        }
        self.directions.insert(field.to_owned(), descending);
    }

    fn walk(&mut self, input: &Input) -> NormalizeResult<()> {
        match input {
            Input::Nothing => Ok(()),
            Input::Text(text) => {
                let parts: Vec<&str> = text.split_whitespace().collect();
                match parts.as_slice() {
                    [] => Ok(()),
                    [field] => {
                        self.add(field, false);
                        Ok(())
                    }
                    [field, direction] => {
                        let descending = parse_direction(direction).ok_or_else(|| {
                            QueryError::InvalidOrderBy {
                                input: text.clone(),
                                reason: "use 'Field' or 'Field asc|desc'",
                            }
                        })?;
                        self.add(field, descending);
                        Ok(())
                    }
                    _ => Err(QueryError::InvalidOrderBy {
                        input: text.clone(),
                        reason: "use 'Field' or 'Field asc|desc'",
                    }),
                }
            }
            Input::Pair(field, direction) => {
                let Input::Text(field) = field.as_ref() else {
                    return Err(QueryError::InvalidOrderBy {
                        input: format!("{input:?}"),
                        reason: "first item of a pair must be a field name",
                    });
                };
                let descending = match direction.as_ref() {
                    Input::Flag(flag) => Some(*flag),
                    Input::Text(token) => parse_direction(token),
                    _ => None,
                }
                .ok_or_else(|| QueryError::InvalidOrderBy {
                    input: format!("{input:?}"),
                    reason: "second item must be bool or 'asc'/'desc'",
                })?;
                self.add(field, descending);
                Ok(())
            }
            Input::List(items) => items.iter().try_for_each(|item| self.walk(item)),
            Input::Set(items) => sorted_set(items)
                .into_iter()
                .try_for_each(|item| self.walk(item)),
            Input::Flag(_) | Input::Expr(_) => Err(QueryError::InvalidInput {
                context: "orderby",
                expected: "text, pair, or iterable",
                found: input.describe(),
            }),
        }
    }

    fn finish(mut self) -> Vec<OrderByItem> {
        self.sequence
            .into_iter()
            .map(|field| {
                let descending = self.directions.remove(&field).unwrap_or(false);
                OrderByItem { field, descending }
            })
            .collect()
    }
}

fn parse_direction(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "asc" => Some(false),
        "desc" => Some(true),
        _ => None,
    }
}
