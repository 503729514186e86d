#![allow(missing_docs)]

use std::sync::Once;

use odata_query::{
    query::{Expr, OrderByItem, QueryBuilder, QueryError, QueryPart, QuerySpec, Target},
    Config, ODataClient, SchemaSource,
};
use time::macros::{date, datetime};
use tracing_subscriber::EnvFilter;

const CRM: &str = include_str!("../fixtures/crm.xml");
const CONTACT_ID: &str = "3FA85F64-5717-4562-B3FC-2C963F66AFA6";

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("odata_query=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn client() -> ODataClient {
    init_tracing();
    ODataClient::from_source(SchemaSource::Xml(CRM.to_owned())).expect("crm schema")
}

#[test]
fn collection_query_renders_every_facet_in_wire_order() {
    let rendered = client()
        .collection("Accounts")
        .select(["Name", "revenue", "name"])
        .filter([
            Expr::eq("statecode", "active"),
            Expr::contains("name", "Con'so"),
        ])
        .orderby(["revenue desc", "name"])
        .skip(100)
        .top(50)
        .count(true)
        .generate()
        .unwrap();
    assert_eq!(
        rendered,
        "/accounts?$select=name,revenue\
         &$filter=((statecode eq Microsoft.Dynamics.CRM.AccountState'Active') and contains(name,'Con''so'))\
         &$count=true&$orderby=revenue desc,name asc&$skip=100&$top=50"
    );
}

#[test]
fn guid_strings_render_unquoted() {
    let rendered = client()
        .collection("accounts")
        .filter([Expr::eq("_primarycontactid_value", CONTACT_ID)])
        .generate()
        .unwrap();
    assert_eq!(
        rendered,
        "/accounts?$filter=(_primarycontactid_value eq 3fa85f64-5717-4562-b3fc-2c963f66afa6)"
    );
}

#[test]
fn enum_members_resolve_by_value() {
    let rendered = client()
        .collection("contacts")
        .filter([Expr::ne("preferredcontactmethodcode", 2)])
        .generate()
        .unwrap();
    assert_eq!(
        rendered,
        "/contacts?$filter=(preferredcontactmethodcode ne Microsoft.Dynamics.CRM.ContactMethod'Phone')"
    );
}

#[test]
fn temporal_literals_render_iso() {
    let rendered = client()
        .collection("contacts")
        .filter([Expr::ge("birthdate", date!(1990-01-31))])
        .expand_with("parentcustomerid_account", |q| {
            q.filter([Expr::lt("createdon", datetime!(2024-03-01 12:30 +2))])
        })
        .generate()
        .unwrap();
    assert_eq!(
        rendered,
        "/contacts?$filter=(birthdate ge 1990-01-31)\
         &$expand=parentcustomerid_account($filter=(createdon lt 2024-03-01T10:30:00Z))"
    );
}

#[test]
fn membership_style_follows_config() {
    let base = client();
    let spec = base
        .collection("accounts")
        .filter([Expr::is_in("numberofemployees", [10, 20])])
        .finish()
        .unwrap();
    assert_eq!(
        base.generate(&spec, true).unwrap(),
        "/accounts?$filter=((numberofemployees eq 10) or (numberofemployees eq 20))"
    );

    let config = Config::from_toml("[render]\nmembership = \"native-in\"\n").unwrap();
    let native = base.configured(&config);
    assert_eq!(
        native.generate(&spec, true).unwrap(),
        "/accounts?$filter=(numberofemployees in (10,20))"
    );
}

#[test]
fn empty_membership_is_constant_false() {
    let rendered = client()
        .collection("accounts")
        .filter([Expr::is_in("name", Vec::<&str>::new())])
        .generate()
        .unwrap();
    assert_eq!(rendered, "/accounts?$filter=(false)");
}

#[test]
fn key_sentinel_selects_primary_key() {
    let rendered = client()
        .collection("contacts")
        .select(["fullname", "-"])
        .generate()
        .unwrap();
    assert_eq!(rendered, "/contacts?$select=contactid");
}

#[test]
fn focused_record_renders_navigation_suffix() {
    let client = client();
    let rendered = client
        .query(Target::focused("contacts", CONTACT_ID, "ParentCustomerId_Account"))
        .select(["Name"])
        .generate()
        .unwrap();
    assert_eq!(
        rendered,
        "/contacts(3fa85f64-5717-4562-b3fc-2c963f66afa6)/parentcustomerid_account?$select=name"
    );
}

#[test]
fn alternate_keys_render_as_logical_names() {
    let client = client();
    let rendered = client
        .query(Target::record("accounts", "o'brien"))
        .select(["name"])
        .generate()
        .unwrap();
    assert_eq!(rendered, "/accounts(LogicalName='o''brien')?$select=name");
}

#[test]
fn function_calls_canonicalize_parameters_and_scope_to_return_type() {
    let client = client();
    let rendered = client
        .query(Target::function("searchcontacts", [("term", "Jane")]))
        .select(["FullName"])
        .top(5)
        .generate()
        .unwrap();
    assert_eq!(
        rendered,
        "/SearchContacts(Term='Jane')?$select=fullname&$top=5"
    );
}

#[test]
fn collection_parameters_pass_through() {
    let client = client();
    let rendered = client
        .query(Target::function(
            "RetrieveTotalRecordCount",
            [("EntityNames", "accounts")],
        ))
        .generate()
        .unwrap();
    assert_eq!(rendered, "/RetrieveTotalRecordCount(EntityNames='accounts')");
}

#[test]
fn function_parameter_errors() {
    let client = client();
    let missing = client
        .query(Target::function("SearchContacts", [("Limit", 5)]))
        .generate()
        .unwrap_err();
    assert_eq!(
        missing,
        QueryError::MissingParameter {
            function: "SearchContacts".into(),
            parameter: "Term".into(),
        }
    );

    let unknown = client
        .query(Target::function("SearchContacts", [("Term", "a"), ("Page", "2")]))
        .generate()
        .unwrap_err();
    assert_eq!(unknown.code(), "UnknownParameter");

    let mistyped = client
        .query(Target::function("SearchContacts", [("Term", "a"), ("Limit", "ten")]))
        .generate()
        .unwrap_err();
    assert_eq!(mistyped.code(), "TypeMismatch");

    let absent = client
        .query(Target::function("NoSuchFunction", Vec::<(&str, &str)>::new()))
        .generate()
        .unwrap_err();
    assert_eq!(
        absent,
        QueryError::UnknownFunction {
            name: "NoSuchFunction".into()
        }
    );
}

#[test]
fn capability_violations_name_every_part() {
    let spec = QueryBuilder::new(Target::CurrentUser)
        .select(["UserId"])
        .top(1)
        .finish()
        .unwrap();
    let err = client().generate(&spec, true).unwrap_err();
    assert_eq!(
        err,
        QueryError::CapabilityViolation {
            target: "/WhoAmI".into(),
            parts: vec![QueryPart::Select, QueryPart::Top],
        }
    );
    assert_eq!(err.to_string(), "/WhoAmI does not allow $select, $top");
}

#[test]
fn schema_errors_surface_with_codes() {
    let client = client();
    let unknown_attr = client
        .collection("accounts")
        .select(["nope"])
        .generate()
        .unwrap_err();
    assert_eq!(
        unknown_attr,
        QueryError::UnknownAttribute {
            entity: "account".into(),
            attribute: "nope".into(),
            context: "select",
        }
    );

    let unknown_set = client.collection("widgets").generate().unwrap_err();
    assert_eq!(unknown_set.code(), "UnknownEntity");

    let mismatch = client
        .collection("accounts")
        .filter([Expr::eq("numberofemployees", "many")])
        .generate()
        .unwrap_err();
    assert_eq!(mismatch.code(), "TypeMismatch");

    let enum_miss = client
        .collection("accounts")
        .filter([Expr::eq("statecode", "Archived")])
        .generate()
        .unwrap_err();
    assert_eq!(enum_miss.code(), "UnknownEnumMember");

    let text_on_number = client
        .collection("accounts")
        .filter([Expr::contains("numberofemployees", "1")])
        .generate()
        .unwrap_err();
    assert_eq!(text_on_number.code(), "TypeMismatch");
}

#[test]
fn serialized_queries_render_like_built_ones() {
    let client = client();
    let built = client
        .collection("contacts")
        .select(["fullname"])
        .filter([Expr::or([
            Expr::starts_with("fullname", "J"),
            Expr::not(Expr::eq("donotemail", true)),
        ])])
        .orderby([OrderByItem::desc("fullname")])
        .finish()
        .unwrap();
    let json = serde_json::to_string(&built).unwrap();
    let decoded: QuerySpec = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, built);
    assert_eq!(
        client.generate(&decoded, true).unwrap(),
        "/contacts?$select=fullname\
         &$filter=(startswith(fullname,'J') or (not (donotemail eq true)))\
         &$orderby=fullname desc"
    );
}

#[test]
fn validation_does_not_touch_the_input() {
    let client = client();
    let spec = client
        .collection("Accounts")
        .select(["Name"])
        .finish()
        .unwrap();
    let before = spec.clone();
    let prepared = client.prepare(&spec).unwrap();
    assert_eq!(spec, before);
    assert_eq!(prepared.select, vec!["name"]);
    assert_eq!(prepared.target, Some(Target::collection("accounts")));
}

#[test]
fn metadata_free_endpoints() {
    let client = ODataClient::new();
    let definitions = QueryBuilder::new(Target::entity_definitions(Some("account")))
        .select(["LogicalName"])
        .finish()
        .unwrap();
    assert_eq!(
        client.generate(&definitions, true).unwrap(),
        "/EntityDefinitions(LogicalName='account')?$select=LogicalName"
    );
    assert_eq!(
        client
            .generate(&QuerySpec::new(Target::SchemaDocument), true)
            .unwrap(),
        "/$metadata"
    );
}
