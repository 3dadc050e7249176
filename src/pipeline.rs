//! Generation pipeline
//!
//! Inputs are expanded (directories become their `model.json` files),
//! resolved, merged in argument order, and compiled by one emitter.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use walkdir::WalkDir;

use crate::config::{GeneratorConfig, OutputFormat};
use crate::emit::{emit_avro, emit_json_schema, emit_openapi};
use crate::error::{Result, SchemaError};
use crate::model::ModelDefinition;
use crate::resolver::ReferenceResolver;

/// File name picked up when an input is a directory
pub const MODEL_FILE_NAME: &str = "model.json";

/// Output document kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetFormat {
    #[default]
    JsonSchema,
    AvroSchema,
    OpenApi,
}

impl TargetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::JsonSchema => "json-schema",
            TargetFormat::AvroSchema => "avro-schema",
            TargetFormat::OpenApi => "openapi",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "json-schema" => Ok(TargetFormat::JsonSchema),
            "avro-schema" => Ok(TargetFormat::AvroSchema),
            "openapi" => Ok(TargetFormat::OpenApi),
            other => Err(format!("unknown output type '{}'", other)),
        }
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Replace directory inputs by the model files below them, in path order
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::with_capacity(inputs.len());
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(input)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name() == MODEL_FILE_NAME)
            .map(|e| e.into_path())
            .collect();
        found.sort();
        if found.is_empty() {
            tracing::warn!("No {} found under {}", MODEL_FILE_NAME, input.display());
        }
        files.extend(found);
    }
    Ok(files)
}

/// Resolve and merge every input into one model
pub fn load_model(inputs: &[PathBuf], config: &GeneratorConfig) -> Result<ModelDefinition> {
    let files = expand_inputs(inputs)?;
    if files.is_empty() {
        return Err(SchemaError::InvalidModel {
            source_name: "<inputs>".to_string(),
            reason: "no model files to compile".to_string(),
        });
    }

    let mut resolver = ReferenceResolver::new(&config.resolver);
    let mut model = ModelDefinition::default();
    for file in &files {
        tracing::debug!("Loading {}", file.display());
        let document = resolver.load_model(file)?;
        let definition = ModelDefinition::from_value(document, &file.display().to_string())?;
        model.merge(definition);
    }
    tracing::info!(
        "Loaded {} model file(s) with {} group type(s)",
        files.len(),
        model.groups.len()
    );
    Ok(model)
}

// =============================================================================
// Compilation
// =============================================================================

/// Compile a resolved model into the requested document
pub fn compile_model(format: TargetFormat, model: &ModelDefinition, config: &GeneratorConfig) -> Result<Value> {
    tracing::info!("Generating {}", format);
    match format {
        TargetFormat::JsonSchema => emit_json_schema(model, config),
        TargetFormat::AvroSchema => emit_avro(model, config),
        TargetFormat::OpenApi => emit_openapi(model, config),
    }
}

/// Load, resolve, merge and compile the given inputs
pub fn generate(format: TargetFormat, inputs: &[PathBuf], config: &GeneratorConfig) -> Result<Value> {
    let model = load_model(inputs, config)?;
    compile_model(format, &model, config)
}

// =============================================================================
// Output
// =============================================================================

/// Serialize a document
pub fn render(document: &Value, format: OutputFormat) -> Result<String> {
    let text = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(document)?,
        OutputFormat::Compact => serde_json::to_string(document)?,
    };
    Ok(text)
}

/// Write a document to a file, or to standard output when no path is given
pub fn write_output(document: &Value, output: Option<&Path>, format: OutputFormat) -> Result<()> {
    let text = render(document, format)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, text + "\n")?;
            tracing::info!("Wrote {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", text)?;
        }
    }
    Ok(())
}
