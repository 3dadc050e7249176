//! xRegistry Schema Generator
//!
//! Compiles format-neutral xRegistry model definitions (groups of typed
//! resources with attributes) into JSON Schema, Avro schema and OpenAPI
//! documents.
//!
//! ## Pipeline
//!
//! ```text
//! model.json ──► resolver ──► ModelDefinition ──► emitter ──► document
//!   ($include,     (merge,       (typed tree)      json_schema
//!    resource uri)  defaults)                      avro
//!                                                  openapi (+ template)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use xregistry_schemas::{generate, GeneratorConfig, TargetFormat};
//!
//! let config = GeneratorConfig::default();
//! let schema = generate(TargetFormat::AvroSchema, &[PathBuf::from("model.json")], &config)?;
//! println!("{}", schema);
//! # Ok::<(), xregistry_schemas::SchemaError>(())
//! ```

pub mod compiler;
pub mod config;
pub mod emit;
pub mod error;
pub mod mapping;
pub mod model;
pub mod names;
pub mod pipeline;
pub mod resolver;

pub use config::{DefinitionLayout, GeneratorConfig, OutputFormat};
pub use error::{Result, SchemaError};
pub use model::{Attribute, AttributeType, Group, ModelDefinition, Resource};
pub use pipeline::{compile_model, generate, load_model, write_output, TargetFormat};
pub use resolver::ReferenceResolver;
