#![allow(missing_docs)]

use std::fs;

use odata_query::schema::{
    compile_cached_json, compile_edmx, to_cached_json, SchemaError, SchemaSource, SchemaWarning,
    TypeElement, XmlElement,
};
use tempfile::TempDir;

const CRM: &str = include_str!("../fixtures/crm.xml");

#[test]
fn fixture_compiles_into_one_schema() {
    let schemas = compile_edmx(CRM).expect("compile");
    assert_eq!(schemas.len(), 1);
    let meta = &schemas[0];
    assert_eq!(meta.namespace, "Microsoft.Dynamics.CRM");
    assert_eq!(meta.alias.as_deref(), Some("mscrm"));
    assert!(meta.warnings.is_empty(), "{:?}", meta.warnings);

    let account = &meta.entities["account"];
    assert_eq!(account.primary_key.as_deref(), Some("accountid"));
    assert_eq!(account.entity_set_name.as_deref(), Some("accounts"));
    assert_eq!(account.base_type.as_deref(), Some("crmbaseentity"));
    assert_eq!(
        account.navigation_bindings.get("Account_Annotation").map(String::as_str),
        Some("annotations")
    );
    assert_eq!(
        account.attributes["statecode"].ty.type_element,
        Some(TypeElement::EnumType)
    );

    let nav = &account.navigation_properties["primarycontactid"];
    assert_eq!(nav.to_entity_type, "contact");
    assert_eq!(nav.from_property.as_deref(), Some("_primarycontactid_value"));
    assert_eq!(nav.to_property.as_deref(), Some("contactid"));
    assert!(!nav.to_entity_is_collection);
    assert!(account.navigation_properties["contact_customer_accounts"].to_entity_is_collection);

    assert!(meta.entities["crmbaseentity"].is_abstract);
    assert!(meta.entities["annotation"].entity_set_name.is_none());
    assert_eq!(meta.enums["ContactMethod"].members["Phone"], "2");
    assert!(meta.complex_types.contains_key("WhoAmIResponse"));
}

#[test]
fn functions_keep_import_names_and_drop_binding_parameters() {
    let meta = compile_edmx(CRM).unwrap().remove(0);
    let search = meta.function("searchcontacts").expect("search function");
    assert_eq!(search.api_name, "SearchContacts");
    assert!(search.returns);
    assert!(!search.params["Term"].optional);
    assert!(search.params["Limit"].optional);

    let rollup = meta.function("CalculateRollupField").expect("bound function");
    assert!(rollup.is_bound);
    assert_eq!(rollup.params.keys().collect::<Vec<_>>(), vec!["FieldName"]);

    let count = meta.function("RetrieveTotalRecordCount").unwrap();
    assert!(count.params["EntityNames"].ty.is_collection);
    assert_eq!(count.return_type.as_ref().map(|t| t.name.as_str()), Some("Edm.Int64"));
}

#[test]
fn cached_json_round_trips_through_disk() {
    let dir = TempDir::new().expect("tempdir");
    let xml_path = dir.path().join("metadata.xml");
    fs::write(&xml_path, CRM).unwrap();
    let from_xml = SchemaSource::path(&xml_path).load().unwrap();

    let json_path = dir.path().join("metadata.json");
    fs::write(&json_path, to_cached_json(&from_xml).unwrap()).unwrap();
    let from_json = SchemaSource::path(&json_path).load().unwrap();

    assert_eq!(from_json, from_xml);
    assert_eq!(
        from_json[0]
            .resolve_entity_set("Contacts")
            .map(|r| r.name),
        Some("contact")
    );
}

#[test]
fn cached_json_must_be_an_array_of_schemas() {
    let err = compile_cached_json(r#"{"namespace": "Ns"}"#).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidShape { .. }));
    assert_eq!(compile_cached_json("[]").unwrap_err().code(), "SchemaNoSchema");
    assert_eq!(compile_cached_json("not json").unwrap_err().code(), "SchemaJson");
}

#[test]
fn structural_problems_are_load_errors() {
    let no_services = compile_edmx(r#"<Edmx Version="4.0"/>"#).unwrap_err();
    assert!(matches!(
        no_services,
        SchemaError::MissingElement {
            element: "DataServices",
            ..
        }
    ));

    let unnamed = compile_edmx(r#"<Schema Namespace="Ns"><EntityType/></Schema>"#).unwrap_err();
    assert!(matches!(
        unnamed,
        SchemaError::MissingAttribute {
            attribute: "Name",
            ..
        }
    ));

    let truncated = compile_edmx(r#"<Schema Namespace="Ns"><EntityType Name="a">"#).unwrap_err();
    assert!(matches!(truncated.code(), "SchemaInvalidShape" | "SchemaXml"));
}

#[test]
fn irregular_schemas_compile_with_warnings() {
    let doc = r#"<Schema Namespace="Ns">
        <EntityType Name="line">
          <Key><PropertyRef Name="orderid"/><PropertyRef Name="lineno"/></Key>
          <Property Name="orderid" Type="Edm.Guid"/>
          <Property Name="lineno" Type="Edm.Int32"/>
        </EntityType>
        <EntityContainer Name="C">
          <EntitySet Name="lines" EntityType="Ns.line"/>
          <EntitySet Name="orderlines" EntityType="Ns.line"/>
          <EntitySet Name="ghosts" EntityType="Ns.ghost"/>
        </EntityContainer>
      </Schema>"#;
    let meta = SchemaSource::Xml(doc.to_owned()).load_first().unwrap();
    assert_eq!(meta.entities["line"].primary_key.as_deref(), Some("orderid"));
    assert_eq!(meta.entities["line"].entity_set_name.as_deref(), Some("orderlines"));
    assert_eq!(
        meta.warnings,
        vec![
            SchemaWarning::CompositeKey {
                entity: "line".into(),
                kept: "orderid".into(),
                ignored: vec!["lineno".into()],
            },
            SchemaWarning::EntitySetRebound {
                entity: "line".into(),
                previous: "lines".into(),
                current: "orderlines".into(),
            },
            SchemaWarning::UnknownSetType {
                entity_set: "ghosts".into(),
                entity_type: "Ns.ghost".into(),
            },
        ]
    );
}

#[test]
fn parsed_trees_are_accepted() {
    let tree = XmlElement::parse(CRM).unwrap();
    assert_eq!(tree.name, "Edmx");
    let meta = SchemaSource::from(tree).load_first().unwrap();
    assert_eq!(meta.entity_sets().len(), 3);
}
