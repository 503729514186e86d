#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

const CRM: &str = include_str!("../fixtures/crm.xml");

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("crm.xml"), CRM).expect("write schema");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn schema(&self) -> PathBuf {
        self.path("crm.xml")
    }

    fn config(&self) -> PathBuf {
        self.path("config.toml")
    }

    fn write_query(&self, name: &str, query: &Value) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, serde_json::to_vec_pretty(query).unwrap()).expect("write query");
        path
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("odataq");
        cmd.env("ODATAQ_CONFIG", self.config()).env_remove("RUST_LOG");
        cmd
    }
}

fn stdout_of(cmd: &mut assert_cmd::Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("utf-8 stdout")
}

fn accounts_query() -> Value {
    json!({
        "target": { "kind": "entity_collection", "entity_set": "Accounts" },
        "select": ["Name"],
        "filter": {
            "kind": "compare",
            "op": "gt",
            "left": { "kind": "property", "name": "numberofemployees" },
            "right": { "kind": "literal", "value": { "t": "Int", "v": 50 } }
        },
        "top": 3
    })
}

#[test]
fn inspect_lists_entity_sets() {
    let ws = Workspace::new();
    let stdout = stdout_of(ws.cmd().arg("inspect").arg(ws.schema()));
    assert!(stdout.contains("Schema Microsoft.Dynamics.CRM (alias mscrm)"));
    assert!(stdout.contains("accounts -> account (key=accountid)"));
    assert!(stdout.contains("SearchContacts"));
}

#[test]
fn inspect_reports_json() {
    let ws = Workspace::new();
    let stdout = stdout_of(
        ws.cmd()
            .args(["--format", "json", "inspect"])
            .arg(ws.schema()),
    );
    let report: Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(report["namespace"], "Microsoft.Dynamics.CRM");
    assert_eq!(report["entities"], 5);
    assert_eq!(report["entity_sets"].as_array().map(Vec::len), Some(3));
}

#[test]
fn render_validates_and_prints_the_query_string() {
    let ws = Workspace::new();
    let query = ws.write_query("query.json", &accounts_query());
    let stdout = stdout_of(
        ws.cmd()
            .arg("render")
            .arg("--schema")
            .arg(ws.schema())
            .arg("--query")
            .arg(&query),
    );
    assert_eq!(
        stdout.trim_end(),
        "/accounts?$select=name&$filter=(numberofemployees gt 50)&$top=3"
    );
}

#[test]
fn render_without_validation_keeps_caller_names() {
    let ws = Workspace::new();
    let query = ws.write_query("query.json", &accounts_query());
    let stdout = stdout_of(
        ws.cmd()
            .args(["render", "--no-validate", "--query"])
            .arg(&query),
    );
    assert_eq!(
        stdout.trim_end(),
        "/Accounts?$select=Name&$filter=(numberofemployees gt 50)&$top=3"
    );
}

#[test]
fn render_failures_report_error_codes() {
    let ws = Workspace::new();
    let mut query = accounts_query();
    query["select"] = json!(["missing_field"]);
    let query = ws.write_query("bad.json", &query);
    let output = ws
        .cmd()
        .arg("render")
        .arg("--schema")
        .arg(ws.schema())
        .arg("--query")
        .arg(&query)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("[UnknownAttribute]"), "{stderr}");
}

#[test]
fn cached_schema_renders_like_edmx() {
    let ws = Workspace::new();
    let cached = ws.path("crm.json");
    ws.cmd()
        .arg("cache")
        .arg(ws.schema())
        .arg("--out")
        .arg(&cached)
        .assert()
        .success();
    let written: Value = serde_json::from_str(&fs::read_to_string(&cached).unwrap()).unwrap();
    assert_eq!(written.as_array().map(Vec::len), Some(1));

    let query = ws.write_query("query.json", &accounts_query());
    let stdout = stdout_of(
        ws.cmd()
            .arg("render")
            .arg("--schema")
            .arg(&cached)
            .arg("--query")
            .arg(&query),
    );
    assert_eq!(
        stdout.trim_end(),
        "/accounts?$select=name&$filter=(numberofemployees gt 50)&$top=3"
    );
}

#[test]
fn config_supplies_default_schema_and_render_mode() {
    let ws = Workspace::new();
    write_config(
        &ws.config(),
        &ws.schema(),
        "[render]\nmembership = \"native-in\"\n",
    );
    let query = ws.write_query(
        "in.json",
        &json!({
            "target": { "kind": "entity_collection", "entity_set": "accounts" },
            "filter": {
                "kind": "in",
                "subject": { "kind": "property", "name": "statecode" },
                "options": [
                    { "kind": "literal", "value": { "t": "String", "v": "Active" } },
                    { "kind": "literal", "value": { "t": "Int", "v": 1 } }
                ]
            }
        }),
    );
    let stdout = stdout_of(ws.cmd().args(["render", "--query"]).arg(&query));
    assert_eq!(
        stdout.trim_end(),
        "/accounts?$filter=(statecode in (Microsoft.Dynamics.CRM.AccountState'Active',\
         Microsoft.Dynamics.CRM.AccountState'Inactive'))"
    );

    let inspected = stdout_of(ws.cmd().arg("inspect"));
    assert!(inspected.contains("contacts -> contact (key=contactid)"));
}

#[test]
fn config_limits_top() {
    let ws = Workspace::new();
    write_config(&ws.config(), &ws.schema(), "[validation]\nmax_top = 2\n");
    let query = ws.write_query("query.json", &accounts_query());
    let output = ws
        .cmd()
        .args(["render", "--query"])
        .arg(&query)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("[Bounds]"));
}

#[test]
fn config_init_writes_the_effective_settings() {
    let ws = Workspace::new();
    let stdout = stdout_of(ws.cmd().args(["--format", "json", "config", "--init"]));
    let report: Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(report["membership"], "or-expansion");
    assert!(report["max_top"].is_null());
    let written = fs::read_to_string(ws.config()).expect("config written");
    assert!(written.contains("[render]"));
    assert!(written.contains("membership = \"or-expansion\""));
}

#[test]
fn missing_schema_argument_is_an_error() {
    let ws = Workspace::new();
    ws.cmd().arg("inspect").assert().failure();
}

fn write_config(path: &Path, schema: &Path, extra: &str) {
    let text = format!("{extra}\n[schema]\ndefault = '{}'\n", schema.display());
    fs::write(path, text).expect("write config");
}
