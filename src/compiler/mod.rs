//! Attribute Compilers
//!
//! Turn attribute declarations into schema fragments. The JSON compiler
//! serves both JSON Schema and OpenAPI (which differ only in how
//! `ifvalues` variants are published); the Avro compiler additionally
//! tracks named types and the shared generic record.

pub mod avro;
pub mod generic;
pub mod json;

pub use avro::AvroCompiler;
pub use generic::{generic_record_definition, requires_generic_record};
pub use json::{JsonCompiler, JsonFlavor};
