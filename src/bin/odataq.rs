//! Binary entry point for the odataq administrative CLI.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use odata_query::{
    query::QuerySpec,
    schema::{to_cached_json, SchemaSource, SchemaWarning, ServiceMetadata},
    Config, ODataClient,
};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "odataq",
    version,
    about = "Compile and validate OData v4 queries against a service schema",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "ODATAQ_CONFIG",
        value_name = "FILE",
        help = "Path to the TOML config file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Summarize a schema: entity sets, enums and functions")]
    Inspect {
        #[arg(value_name = "SCHEMA", help = "EDMX or cached JSON schema file")]
        schema: Option<PathBuf>,
    },

    #[command(about = "Compile a schema and write its cached JSON form")]
    Cache {
        #[arg(value_name = "SCHEMA", help = "EDMX or cached JSON schema file")]
        schema: Option<PathBuf>,

        #[arg(long, value_name = "FILE", help = "Output file (stdout when omitted)")]
        out: Option<PathBuf>,
    },

    #[command(about = "Validate a JSON-encoded query and print its query string")]
    Render {
        #[arg(long, value_name = "FILE", help = "EDMX or cached JSON schema file")]
        schema: Option<PathBuf>,

        #[arg(
            long,
            value_name = "FILE",
            help = "JSON-encoded query tree ('-' reads stdin)"
        )]
        query: PathBuf,

        #[arg(long, help = "Render without validating against the schema")]
        no_validate: bool,
    },

    #[command(about = "Show the effective configuration")]
    Config {
        #[arg(long, help = "Write the effective configuration to the config path")]
        init: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    if let Err(err) = run() {
        match err.downcast_ref::<odata_query::Error>() {
            Some(known) => eprintln!("error: [{}] {known}", known.code()),
            None => eprintln!("error: {err}"),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.clone()).map_err(odata_query::Error::from)?;
    install_tracing_subscriber(config.log_filter());
    debug!(config = ?config.path(), "configuration loaded");

    match cli.command {
        Command::Inspect { schema } => {
            let meta = load_schema(&config, schema.as_deref())?;
            let report = InspectReport::from(&meta);
            emit(cli.format, &report, || print_inspect_text(&report))?;
        }
        Command::Cache { schema, out } => {
            let meta = load_schema(&config, schema.as_deref())?;
            let json =
                to_cached_json(std::slice::from_ref(&meta)).map_err(odata_query::Error::from)?;
            match out {
                Some(path) => {
                    fs::write(&path, json)?;
                    eprintln!("wrote cached schema to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::Render {
            schema,
            query,
            no_validate,
        } => {
            let spec = read_query(&query)?;
            let schema = schema.or_else(|| config.default_schema().map(Path::to_path_buf));
            let client = match schema {
                Some(path) => ODataClient::from_source(SchemaSource::path(path))
                    .map_err(odata_query::Error::from)?,
                None => ODataClient::new(),
            }
            .configured(&config);
            let rendered = client
                .generate(&spec, !no_validate)
                .map_err(odata_query::Error::from)?;
            println!("{rendered}");
        }
        Command::Config { init } => {
            if init {
                let path = config.persist().map_err(odata_query::Error::from)?;
                eprintln!("wrote config to {}", path.display());
            }
            let report = ConfigReport::from(&config);
            emit(cli.format, &report, || print_config_text(&report))?;
        }
    }

    Ok(())
}

fn install_tracing_subscriber(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init();
}

fn load_schema(config: &Config, explicit: Option<&Path>) -> Result<ServiceMetadata, Box<dyn Error>> {
    let path = explicit
        .or_else(|| config.default_schema())
        .ok_or("no schema given and no [schema] default configured")?;
    let meta = SchemaSource::path(path)
        .load_first()
        .map_err(odata_query::Error::from)?;
    Ok(meta)
}

fn read_query(path: &Path) -> Result<QuerySpec, Box<dyn Error>> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(path)
            .map_err(|err| format!("failed to read query {}: {err}", path.display()))?
    };
    let spec = serde_json::from_str(&text)
        .map_err(|err| format!("failed to parse query {}: {err}", path.display()))?;
    Ok(spec)
}

#[derive(Serialize)]
struct InspectReport {
    namespace: String,
    alias: Option<String>,
    entities: usize,
    enums: usize,
    complex_types: usize,
    functions: Vec<String>,
    entity_sets: Vec<EntitySetRow>,
    warnings: Vec<SchemaWarning>,
}

#[derive(Serialize)]
struct EntitySetRow {
    entity_set: String,
    entity: String,
    primary_key: Option<String>,
}

impl From<&ServiceMetadata> for InspectReport {
    fn from(meta: &ServiceMetadata) -> Self {
        let entity_sets = meta
            .entities
            .iter()
            .filter_map(|(name, entity)| {
                entity.entity_set_name.as_ref().map(|set| EntitySetRow {
                    entity_set: set.clone(),
                    entity: name.clone(),
                    primary_key: meta.primary_key(entity).map(str::to_owned),
                })
            })
            .collect();
        Self {
            namespace: meta.namespace.clone(),
            alias: meta.alias.clone(),
            entities: meta.entities.len(),
            enums: meta.enums.len(),
            complex_types: meta.complex_types.len(),
            functions: meta.functions.values().map(|f| f.api_name.clone()).collect(),
            entity_sets,
            warnings: meta.warnings.clone(),
        }
    }
}

fn print_inspect_text(report: &InspectReport) {
    match &report.alias {
        Some(alias) => println!("Schema {} (alias {alias})", report.namespace),
        None => println!("Schema {}", report.namespace),
    }
    println!(
        "  entities={} enums={} complex_types={} functions={}",
        report.entities,
        report.enums,
        report.complex_types,
        report.functions.len()
    );
    println!();
    println!("Entity sets:");
    for row in &report.entity_sets {
        println!(
            "  {} -> {} (key={})",
            row.entity_set,
            row.entity,
            row.primary_key.as_deref().unwrap_or("-")
        );
    }
    if !report.functions.is_empty() {
        println!();
        println!("Functions:");
        for name in &report.functions {
            println!("  {name}");
        }
    }
    if !report.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &report.warnings {
            println!("  {warning}");
        }
    }
}

#[derive(Serialize)]
struct ConfigReport {
    path: Option<PathBuf>,
    log_filter: String,
    membership: odata_query::query::MembershipStyle,
    max_top: Option<u64>,
    default_schema: Option<PathBuf>,
}

impl From<&Config> for ConfigReport {
    fn from(config: &Config) -> Self {
        Self {
            path: config.path().map(Path::to_path_buf),
            log_filter: config.log_filter().to_owned(),
            membership: config.render().membership,
            max_top: config.validation().max_top,
            default_schema: config.default_schema().map(Path::to_path_buf),
        }
    }
}

fn print_config_text(report: &ConfigReport) {
    match &report.path {
        Some(path) => println!("config: {}", path.display()),
        None => println!("config: <none>"),
    }
    println!("log_filter={}", report.log_filter);
    println!("render.membership={:?}", report.membership);
    match report.max_top {
        Some(max) => println!("validation.max_top={max}"),
        None => println!("validation.max_top=<unlimited>"),
    }
    if let Some(schema) = &report.default_schema {
        println!("schema.default={}", schema.display());
    }
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}
