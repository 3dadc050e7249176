//! Type Mapping Tables
//!
//! Base schema fragment for every attribute type tag, per target format.
//! Containers (`object`, `map`, `array`) get their base shape here and are
//! completed by the attribute compilers.

use serde_json::{json, Map, Value};

use crate::model::AttributeType;

/// Base JSON Schema (and OpenAPI schema object) fragment for a type tag
pub fn json_schema_type(kind: AttributeType) -> Map<String, Value> {
    let fragment = match kind {
        AttributeType::String => json!({"type": "string"}),
        AttributeType::Object | AttributeType::Map => json!({"type": "object"}),
        AttributeType::Array => json!({"type": "array"}),
        AttributeType::Uri | AttributeType::Url | AttributeType::Xid => {
            json!({"type": "string", "format": "uri"})
        }
        AttributeType::Datetime | AttributeType::Timestamp => {
            json!({"type": "string", "format": "date-time"})
        }
        AttributeType::Integer => json!({"type": "integer"}),
        AttributeType::Uinteger => json!({"type": "integer", "minimum": 0}),
        AttributeType::Boolean => json!({"type": "boolean"}),
        AttributeType::Uritemplate => json!({"type": "string", "format": "uri-template"}),
        AttributeType::Binary => json!({"type": "string", "format": "base64"}),
        AttributeType::Any | AttributeType::Var => json!({"type": "object"}),
    };
    match fragment {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Base Avro type for a type tag.
///
/// Containers and open types are placeholders that the Avro compiler always
/// replaces: records need a name, maps and arrays their contained type, and
/// open types a reference to the generic record.
pub fn avro_type(kind: AttributeType) -> Value {
    match kind {
        AttributeType::Object | AttributeType::Any | AttributeType::Var => json!({"type": "record"}),
        AttributeType::Map => json!({"type": "map"}),
        AttributeType::Array => json!({"type": "array"}),
        AttributeType::Datetime => json!({"type": "int", "logicalType": "time-millis"}),
        AttributeType::Timestamp => json!({"type": "long", "logicalType": "timestamp-millis"}),
        other => avro_primitive(other).map(Value::from).unwrap_or(Value::Null),
    }
}

/// The Avro primitive a type tag maps to, if it is one
pub fn avro_primitive(kind: AttributeType) -> Option<&'static str> {
    match kind {
        AttributeType::String
        | AttributeType::Uri
        | AttributeType::Url
        | AttributeType::Xid
        | AttributeType::Uritemplate => Some("string"),
        AttributeType::Integer | AttributeType::Uinteger => Some("int"),
        AttributeType::Boolean => Some("boolean"),
        AttributeType::Binary => Some("bytes"),
        _ => None,
    }
}
