//! Format Emitters
//!
//! Each emitter walks the model (groups, their resource collections, and
//! imported collections) and assembles one complete output document.

pub mod avro;
pub mod json_schema;
pub mod openapi;
pub mod template;

pub use avro::emit_avro;
pub use json_schema::{emit_json_schema, validate_json_schema};
pub use openapi::emit_openapi;
pub use template::{OpenApiTemplate, PathTemplate};
