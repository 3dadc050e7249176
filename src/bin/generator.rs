//! Schema Generator CLI
//!
//! Generates JSON Schema, Avro schema or OpenAPI documents from xRegistry
//! model definitions.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use xregistry_schemas::config::{DefinitionLayout, GeneratorConfig, OutputFormat};
use xregistry_schemas::{generate, write_output, TargetFormat};

#[derive(Parser)]
#[command(name = "schema-generator")]
#[command(about = "Generate JSON Schema, Avro or OpenAPI documents from xRegistry model definitions")]
struct Cli {
    /// Type of document to generate
    #[arg(long = "type", value_enum, default_value_t = TypeArg::JsonSchema)]
    kind: TypeArg,

    /// Output file (standard output when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the `$id` of the generated JSON Schema
    #[arg(long)]
    schema_id: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OpenAPI path template
    #[arg(long)]
    template: Option<PathBuf>,

    /// JSON Schema definition layout
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,

    /// Write compact JSON
    #[arg(long)]
    compact: bool,

    /// Model files or directories containing model.json files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum TypeArg {
    JsonSchema,
    AvroSchema,
    Openapi,
}

impl From<TypeArg> for TargetFormat {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::JsonSchema => TargetFormat::JsonSchema,
            TypeArg::AvroSchema => TargetFormat::AvroSchema,
            TypeArg::Openapi => TargetFormat::OpenApi,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    Flat,
    Nested,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = cli.config.as_ref().map(|p| p.to_string_lossy().to_string());
    let mut config = GeneratorConfig::load_from(config_path.as_deref())?;

    // Command line flags override configuration
    if let Some(id) = cli.schema_id {
        config.json_schema.schema_id = Some(id);
    }
    if let Some(template) = cli.template {
        config.openapi.template = Some(template);
    }
    if let Some(layout) = cli.layout {
        config.json_schema.layout = match layout {
            LayoutArg::Flat => DefinitionLayout::Flat,
            LayoutArg::Nested => DefinitionLayout::Nested,
        };
    }
    if cli.compact {
        config.output.format = OutputFormat::Compact;
    }

    let format = TargetFormat::from(cli.kind);
    for input in &cli.inputs {
        eprintln!("> {} as '{}'", input.display(), format);
    }

    let document = generate(format, &cli.inputs, &config)?;
    write_output(&document, cli.output.as_deref(), config.output.format)?;
    Ok(())
}
