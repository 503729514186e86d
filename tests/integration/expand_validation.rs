#![allow(missing_docs)]

use odata_query::{
    query::{Expr, QueryError, QueryPart, Target},
    ODataClient, SchemaSource,
};

const CRM: &str = include_str!("../fixtures/crm.xml");
const ACCOUNT_ID: &str = "b1a9a9d2-53c8-4f0e-9a3c-44a0a3f1c001";

fn client() -> ODataClient {
    ODataClient::from_source(SchemaSource::Xml(CRM.to_owned())).expect("crm schema")
}

#[test]
fn nested_expansions_render_with_semicolons() {
    let client = client();
    let rendered = client
        .collection("contacts")
        .select(["fullname"])
        .expand_with("ParentCustomerId_Account", |account| {
            account
                .select(["Name"])
                .expand_with("primarycontactid", |contact| contact.select(["emailaddress1"]))
        })
        .generate()
        .unwrap();
    assert_eq!(
        rendered,
        "/contacts?$select=fullname&$expand=parentcustomerid_account\
         ($select=name;$expand=primarycontactid($select=emailaddress1))"
    );
}

#[test]
fn sibling_expansions_are_comma_separated() {
    let client = client();
    let rendered = client
        .collection("accounts")
        .expand("primarycontactid")
        .expand_with("contact_customer_accounts", |q| {
            q.filter([Expr::ends_with("emailaddress1", "@contoso.com")])
        })
        .generate()
        .unwrap();
    assert_eq!(
        rendered,
        "/accounts?$expand=primarycontactid,\
         contact_customer_accounts($filter=endswith(emailaddress1,'@contoso.com'))"
    );
}

#[test]
fn unbound_navigation_targets_fall_back_to_parent_bindings() {
    let client = client();
    let spec = client
        .collection("accounts")
        .expand_with("account_annotation", |q| {
            q.select(["Subject"])
                .filter([Expr::contains("notetext", "renewal")])
        })
        .finish()
        .unwrap();
    let prepared = client.prepare(&spec).unwrap();
    let child = &prepared.expand[0];
    assert_eq!(
        child.target,
        Some(Target::ExpandedNavigation {
            navigation_property: "Account_Annotation".into(),
            entity_set: Some("annotations".into()),
        })
    );
    assert_eq!(child.select, vec!["subject"]);
    assert_eq!(
        client.generate(&spec, true).unwrap(),
        "/accounts?$expand=Account_Annotation($select=subject;$filter=contains(notetext,'renewal'))"
    );
}

#[test]
fn bound_navigation_targets_use_their_own_set() {
    let client = client();
    let spec = client
        .collection("contacts")
        .expand("owninguser")
        .finish()
        .unwrap();
    let prepared = client.prepare(&spec).unwrap();
    assert_eq!(
        prepared.expand[0].target,
        Some(Target::ExpandedNavigation {
            navigation_property: "owninguser".into(),
            entity_set: Some("systemusers".into()),
        })
    );
}

#[test]
fn expanded_queries_only_accept_select_filter_and_expand() {
    let client = client();
    let err = client
        .collection("accounts")
        .expand_with("primarycontactid", |q| q.top(1).orderby(["fullname"]))
        .generate()
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::CapabilityViolation {
            target: "$expand=primarycontactid".into(),
            parts: vec![QueryPart::OrderBy, QueryPart::Top],
        }
    );
}

#[test]
fn unknown_navigation_is_rejected() {
    let client = client();
    let err = client
        .collection("accounts")
        .expand("nothing_here")
        .generate()
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::UnknownNavigationProperty {
            entity: "account".into(),
            navigation: "nothing_here".into(),
        }
    );
}

#[test]
fn expanded_filters_are_checked_against_the_navigation_target() {
    let client = client();
    let err = client
        .collection("contacts")
        .expand_with("parentcustomerid_account", |q| {
            q.filter([Expr::eq("fullname", "x")])
        })
        .generate()
        .unwrap_err();
    assert_eq!(
        err,
        QueryError::UnknownAttribute {
            entity: "account".into(),
            attribute: "fullname".into(),
            context: "filter",
        }
    );
}

#[test]
fn function_results_can_be_expanded() {
    let client = client();
    let rendered = client
        .query(Target::function("SearchContacts", [("Term", "Jane")]))
        .expand_with("parentcustomerid_account", |q| q.select(["name"]))
        .generate()
        .unwrap();
    assert_eq!(
        rendered,
        "/SearchContacts(Term='Jane')?$expand=parentcustomerid_account($select=name)"
    );
}

#[test]
fn expansion_needs_an_entity_typed_parent() {
    let client = client();
    let err = client
        .query(Target::function(
            "RetrieveTotalRecordCount",
            [("EntityNames", "accounts")],
        ))
        .expand("anything")
        .generate()
        .unwrap_err();
    assert_eq!(err.code(), "InvalidTarget");
}

#[test]
fn focus_requires_a_navigation_with_an_entity_set() {
    let client = client();
    let focused = client
        .query(Target::focused("accounts", ACCOUNT_ID, "PrimaryContactId"))
        .expand("owninguser")
        .generate()
        .unwrap();
    assert_eq!(
        focused,
        "/accounts(b1a9a9d2-53c8-4f0e-9a3c-44a0a3f1c001)/primarycontactid?$expand=owninguser"
    );

    let err = client
        .query(Target::focused("accounts", ACCOUNT_ID, "Account_Annotation"))
        .generate()
        .unwrap_err();
    assert_eq!(err.code(), "UnknownNavigationProperty");
}
