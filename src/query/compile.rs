//! Wire compiler: renders a query tree into OData query-string text.
//!
//! Rendering performs no schema lookups. Composite nodes are always fully
//! parenthesized so precedence never depends on nesting depth.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::query::{
    ast::Expr,
    errors::QueryError,
    spec::{OrderByItem, QuerySpec},
    target::{gate, QueryPart, Target},
    value::Literal,
};

/// How membership nodes are rendered.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MembershipStyle {
    /// `((x eq 1) or (x eq 2))`
    #[default]
    OrExpansion,
    /// `(x in (1,2))`
    NativeIn,
}

/// Rendering switches shared by every query compiled with them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Membership rendering mode.
    pub membership: MembershipStyle,
}

impl RenderOptions {
    /// Options rendering membership with the native `in` operator.
    pub fn native_in() -> Self {
        Self {
            membership: MembershipStyle::NativeIn,
        }
    }
}

/// Renders a filter expression.
pub fn compile_expr(expr: &Expr, options: &RenderOptions) -> String {
    match expr {
        Expr::Property { name } => name.clone(),
        Expr::Literal { value } => value.to_odata(),
        Expr::And { terms } => join_terms(terms, " and ", options),
        Expr::Or { terms } => join_terms(terms, " or ", options),
        Expr::Not { operand } => format!("(not {})", compile_expr(operand, options)),
        Expr::Compare { op, left, right } => format!(
            "({} {} {})",
            compile_expr(left, options),
            op.keyword(),
            compile_expr(right, options)
        ),
        Expr::Text {
            op,
            subject,
            argument,
        } => format!(
            "{}({},{})",
            op.function(),
            compile_expr(subject, options),
            compile_expr(argument, options)
        ),
        Expr::In { subject, options: values } => compile_membership(subject, values, options),
    }
}

fn join_terms(terms: &[Expr], keyword: &str, options: &RenderOptions) -> String {
    let inner = terms
        .iter()
        .map(|t| compile_expr(t, options))
        .collect::<Vec<_>>()
        .join(keyword);
    format!("({inner})")
}

fn compile_membership(subject: &Expr, values: &[Expr], options: &RenderOptions) -> String {
    if values.is_empty() {
        return "(false)".to_owned();
    }
    let left = compile_expr(subject, options);
    match options.membership {
        MembershipStyle::NativeIn => {
            let inner = values
                .iter()
                .map(|v| compile_expr(v, options))
                .collect::<Vec<_>>()
                .join(",");
            format!("({left} in ({inner}))")
        }
        MembershipStyle::OrExpansion => {
            let parts = values
                .iter()
                .map(|v| format!("({left} eq {})", compile_expr(v, options)))
                .collect::<Vec<_>>()
                .join(" or ");
            format!("({parts})")
        }
    }
}

/// Renders `$orderby` items: `name asc,createdon desc`.
pub fn compile_orderby(items: &[OrderByItem]) -> String {
    items
        .iter()
        .map(|item| {
            let dir = if item.descending { "desc" } else { "asc" };
            format!("{} {dir}", item.field)
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders the facets of one query node as `(part, value)` pairs in wire order.
fn compile_parts(spec: &QuerySpec, options: &RenderOptions) -> Vec<(QueryPart, String)> {
    let mut parts = Vec::new();
    for part in QueryPart::ALL {
        let rendered = match part {
            QueryPart::Select if !spec.select.is_empty() => Some(spec.select.join(",")),
            QueryPart::Filter => spec.filter.as_ref().map(|f| compile_expr(f, options)),
            QueryPart::Count => spec.count.map(|c| c.to_string()),
            QueryPart::OrderBy if !spec.orderby.is_empty() => Some(compile_orderby(&spec.orderby)),
            QueryPart::Skip => spec.skip.map(|n| n.to_string()),
            QueryPart::Top => spec.top.map(|n| n.to_string()),
            QueryPart::Expand if !spec.expand.is_empty() => Some(
                spec.expand
                    .iter()
                    .map(|child| compile_expand_item(child, options))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        };
        if let Some(value) = rendered {
            parts.push((part, value));
        }
    }
    parts
}

/// Renders one `$expand` entry: `nav` or `nav($select=..;$filter=..)`.
fn compile_expand_item(child: &QuerySpec, options: &RenderOptions) -> String {
    let nav = child
        .target
        .as_ref()
        .map(|t| t.path())
        .unwrap_or_default();
    let nested = compile_parts(child, options)
        .into_iter()
        .map(|(part, value)| format!("{part}={value}"))
        .collect::<Vec<_>>();
    if nested.is_empty() {
        nav
    } else {
        format!("{nav}({})", nested.join(";"))
    }
}

/// Rejects literals without a wire form anywhere in the tree.
fn check_literals(spec: &QuerySpec) -> Result<(), QueryError> {
    if let Some(Target::FunctionCall { params, .. }) = &spec.target {
        params.values().try_for_each(Literal::check_wire_form)?;
    }
    if let Some(filter) = &spec.filter {
        check_expr_literals(filter)?;
    }
    spec.expand.iter().try_for_each(check_literals)
}

fn check_expr_literals(expr: &Expr) -> Result<(), QueryError> {
    match expr {
        Expr::Property { .. } => Ok(()),
        Expr::Literal { value } => value.check_wire_form(),
        Expr::And { terms } | Expr::Or { terms } => terms.iter().try_for_each(check_expr_literals),
        Expr::Not { operand } => check_expr_literals(operand),
        Expr::Compare { left, right, .. } => {
            check_expr_literals(left)?;
            check_expr_literals(right)
        }
        Expr::Text {
            subject, argument, ..
        } => {
            check_expr_literals(subject)?;
            check_expr_literals(argument)
        }
        Expr::In { subject, options } => {
            check_expr_literals(subject)?;
            options.iter().try_for_each(check_expr_literals)
        }
    }
}

/// Gates and renders a full query: `path[?part&part...]`.
///
/// The query is expected to be validated already when names must be
/// canonical; no lookups happen here.
pub fn compile(spec: &QuerySpec, options: &RenderOptions) -> Result<String, QueryError> {
    gate(spec)?;
    check_literals(spec)?;
    let target = spec.target.as_ref().ok_or(QueryError::MissingTarget)?;
    let mut out = target.path();
    let params = compile_parts(spec, options)
        .into_iter()
        .map(|(part, value)| format!("{part}={value}"))
        .collect::<Vec<_>>();
    if !params.is_empty() {
        out.push('?');
        out.push_str(&params.join("&"));
    }
    debug!(endpoint = %target.describe(), len = out.len(), "compiled query");
    Ok(out)
}
