#![allow(missing_docs)]

use odata_query::query::{
    normalize::{flatten_exprs, flatten_fields, flatten_orderby, Input},
    Expr, OrderByItem,
};
use proptest::prelude::*;

fn arb_field() -> impl Strategy<Value = String> {
    "[a-d]{1,3}"
}

/// Nested field-name input: text, lists, sets and pairs of them.
fn arb_field_input() -> impl Strategy<Value = Input> {
    let leaf = prop_oneof![
        Just(Input::Nothing),
        arb_field().prop_map(Input::Text),
        " {0,2}".prop_map(Input::Text),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Input::List),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Input::Set),
            (inner.clone(), inner).prop_map(|(a, b)| Input::Pair(Box::new(a), Box::new(b))),
        ]
    })
}

fn arb_order_token() -> impl Strategy<Value = Input> {
    prop_oneof![
        arb_field().prop_map(Input::Text),
        (arb_field(), prop_oneof![Just("asc"), Just("desc"), Just("DESC")])
            .prop_map(|(field, dir)| Input::Text(format!("{field} {dir}"))),
        (arb_field(), any::<bool>()).prop_map(|(field, desc)| Input::from((field, desc))),
    ]
}

fn arb_order_input() -> impl Strategy<Value = Input> {
    arb_order_token().prop_recursive(2, 16, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Input::List)
    })
}

fn arb_comparison() -> impl Strategy<Value = Expr> {
    (arb_field(), any::<i32>()).prop_map(|(field, value)| Expr::eq(field, value))
}

fn arb_expr_input() -> impl Strategy<Value = Input> {
    let leaf = prop_oneof![
        Just(Input::Nothing),
        arb_comparison().prop_map(Input::Expr),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Input::List),
            (inner.clone(), inner).prop_map(|(a, b)| Input::Pair(Box::new(a), Box::new(b))),
        ]
    })
}

proptest! {
    #[test]
    fn field_flattening_is_idempotent(input in arb_field_input()) {
        let once = flatten_fields([input]).unwrap();
        let twice = flatten_fields(once.clone()).unwrap();
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn flattened_fields_are_unique_and_trimmed(input in arb_field_input()) {
        let fields = flatten_fields([input]).unwrap();
        for (i, field) in fields.iter().enumerate() {
            prop_assert!(!field.is_empty());
            prop_assert_eq!(field.trim(), field.as_str());
            prop_assert!(!fields[..i].contains(field));
        }
    }

    #[test]
    fn orderby_flattening_is_idempotent(input in arb_order_input()) {
        let once = flatten_orderby([input]).unwrap();
        let twice = flatten_orderby(once.clone()).unwrap();
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn orderby_keeps_first_position_and_last_direction(
        tokens in prop::collection::vec((arb_field(), any::<bool>()), 0..12)
    ) {
        let items = flatten_orderby(tokens.iter().cloned()).unwrap();
        for item in &items {
            let first = tokens.iter().position(|(f, _)| *f == item.field).unwrap();
            let last = tokens.iter().rposition(|(f, _)| *f == item.field).unwrap();
            prop_assert_eq!(item.descending, tokens[last].1);
            let earlier_fields = items
                .iter()
                .take_while(|other| other.field != item.field)
                .count();
            let distinct_before = {
                let mut seen: Vec<&String> = Vec::new();
                for (f, _) in &tokens[..first] {
                    if !seen.contains(&f) {
                        seen.push(f);
                    }
                }
                seen.len()
            };
            prop_assert_eq!(earlier_fields, distinct_before);
        }
    }

    #[test]
    fn expression_flattening_is_idempotent(input in arb_expr_input()) {
        let once = flatten_exprs([input]).unwrap();
        let twice = flatten_exprs(once.clone()).unwrap();
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn conjunctions_splice_one_level(
        head in arb_comparison(),
        nested in prop::collection::vec(arb_comparison(), 1..4),
        tail in arb_comparison(),
    ) {
        let expr = Expr::and([head.clone(), Expr::and(nested.clone()), tail.clone()]);
        let mut expected = vec![head];
        expected.extend(nested);
        expected.push(tail);
        prop_assert_eq!(expr, Expr::And { terms: expected });
    }
}

#[test]
fn orderby_examples() {
    assert_eq!(
        flatten_orderby(["Name asc", "Name desc"]).unwrap(),
        vec![OrderByItem::desc("Name")]
    );
    assert_eq!(
        flatten_orderby(["B", "A", "B desc"]).unwrap(),
        vec![OrderByItem::desc("B"), OrderByItem::asc("A")]
    );
}

#[test]
fn malformed_orderby_tokens_are_rejected() {
    let err = flatten_orderby(["name sideways"]).unwrap_err();
    assert_eq!(err.code(), "InvalidOrderBy");
    let err = flatten_orderby(["a b c"]).unwrap_err();
    assert_eq!(err.code(), "InvalidOrderBy");
}
