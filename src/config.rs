//! Configuration management for the schema generator
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-generator.toml)
//! - Environment variables (SCHEMAGEN__*)
//!
//! ## Example config file (schema-generator.toml):
//! ```toml
//! [output]
//! format = "pretty"
//!
//! [json_schema]
//! id_base = "http://xregistry.io/schema/"
//! layout = "flat"
//!
//! [avro]
//! namespace = "io.xregistry"
//! document_record = "DocumentType"
//! generic_record = "GenericRecord"
//!
//! [openapi]
//! template = "templates/openapi.json"
//!
//! [resolver]
//! allow_remote = true
//! timeout_secs = 30
//!
//! [model]
//! import_resources = true
//!
//! [validation]
//! strict_json_schema = true
//! validate_avro = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the generator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// JSON Schema emitter settings
    #[serde(default)]
    pub json_schema: JsonSchemaConfig,

    /// Avro emitter settings
    #[serde(default)]
    pub avro: AvroConfig,

    /// OpenAPI emitter settings
    #[serde(default)]
    pub openapi: OpenApiConfig,

    /// Reference resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Model interpretation policy
    #[serde(default)]
    pub model: ModelConfig,

    /// Output self-validation settings
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format (pretty or compact)
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

/// Where JSON Schema definitions are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionLayout {
    /// Every definition directly under `definitions`
    #[default]
    Flat,
    /// One `<group>-schema` bucket per group under `definitions`
    Nested,
}

/// JSON Schema configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchemaConfig {
    /// Prefix of the derived `$id`
    #[serde(default = "default_id_base")]
    pub id_base: String,

    /// Explicit `$id`, overriding the derived one
    #[serde(default)]
    pub schema_id: Option<String>,

    /// Definition layout
    #[serde(default)]
    pub layout: DefinitionLayout,
}

/// Avro configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvroConfig {
    /// Namespace of the document record (and every nested named type)
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Name of the document record
    #[serde(default = "default_document_record")]
    pub document_record: String,

    /// Name of the open/variant record
    #[serde(default = "default_generic_record")]
    pub generic_record: String,
}

/// OpenAPI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenApiConfig {
    /// Path template document; the embedded one is used when unset
    #[serde(default)]
    pub template: Option<PathBuf>,
}

/// Reference resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Allow http(s) includes and resource URIs
    #[serde(default = "default_true")]
    pub allow_remote: bool,

    /// Timeout for remote fetches
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Model interpretation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Honor `ximportresources` cross-group imports
    #[serde(default = "default_true")]
    pub import_resources: bool,
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Compile generated JSON Schema documents before writing them
    #[serde(default = "default_true")]
    pub strict_json_schema: bool,

    /// Parse generated Avro schemas before writing them
    #[serde(default = "default_true")]
    pub validate_avro: bool,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_id_base() -> String {
    "http://xregistry.io/schema/".to_string()
}

fn default_namespace() -> String {
    "io.xregistry".to_string()
}

fn default_document_record() -> String {
    "DocumentType".to_string()
}

fn default_generic_record() -> String {
    "GenericRecord".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for JsonSchemaConfig {
    fn default() -> Self {
        Self {
            id_base: default_id_base(),
            schema_id: None,
            layout: DefinitionLayout::Flat,
        }
    }
}

impl Default for AvroConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            document_record: default_document_record(),
            generic_record: default_generic_record(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            allow_remote: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            import_resources: true,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_json_schema: true,
            validate_avro: true,
        }
    }
}

impl AvroConfig {
    /// Fully qualified name of the generic record
    pub fn generic_record_fullname(&self) -> String {
        if self.namespace.is_empty() {
            self.generic_record.clone()
        } else {
            format!("{}.{}", self.namespace, self.generic_record)
        }
    }
}

impl GeneratorConfig {
    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = [
            "schema-generator.toml",
            ".schema-generator.toml",
            "config/schema-generator.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("io", "xregistry", "schema-generator") {
            let xdg_config = config_dir.config_dir().join("schema-generator.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (SCHEMAGEN__*)
        builder = builder.add_source(
            Environment::with_prefix("SCHEMAGEN")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
