//! Error types for the schema generator

use thiserror::Error;

/// Result type for generator operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema generator errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid model definition in {source_name}: {reason}")]
    InvalidModel { source_name: String, reason: String },

    #[error("Attribute '{attribute}' has no type")]
    MissingType { attribute: String },

    #[error("Can't use wild card attribute name with ifvalues (in {context})")]
    WildcardIfValues { context: String },

    #[error("{kind} attribute '{attribute}' must have an item specified")]
    MissingItem { attribute: String, kind: String },

    #[error("{kind} item of attribute '{attribute}' must have a type specified")]
    MissingItemType { attribute: String, kind: String },

    #[error("Avro type name '{name}' of {owner} is already used by another record")]
    DuplicateTypeName { name: String, owner: String },

    #[error("Group '{group}' imports unknown resource collection '{reference}'")]
    UnknownImport { group: String, reference: String },

    #[error("Reference target not found: {path}")]
    ReferenceNotFound { path: String },

    #[error("Failed to read {path}: {reason}")]
    ReferenceUnreadable { path: String, reason: String },

    #[error("Failed to fetch remote reference {uri}: {reason}")]
    RemoteFetch { uri: String, reason: String },

    #[error("Remote references are disabled, cannot fetch {uri}")]
    RemoteDisabled { uri: String },

    #[error("Invalid JSON pointer '{pointer}' in reference {reference}")]
    InvalidPointer { reference: String, pointer: String },

    #[error("Include {reference} must resolve to an object")]
    IncludeNotObject { reference: String },

    #[error("Invalid OpenAPI template: {0}")]
    Template(String),

    #[error("Generated JSON Schema is invalid: {0}")]
    InvalidJsonSchema(String),

    #[error("Generated Avro schema is invalid: {0}")]
    InvalidAvro(String),

    #[error("Internal compiler error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// True for errors raised while materializing includes and resource URIs
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            SchemaError::ReferenceNotFound { .. }
                | SchemaError::ReferenceUnreadable { .. }
                | SchemaError::RemoteFetch { .. }
                | SchemaError::RemoteDisabled { .. }
                | SchemaError::InvalidPointer { .. }
                | SchemaError::IncludeNotObject { .. }
        )
    }
}
