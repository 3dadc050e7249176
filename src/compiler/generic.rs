//! Generic Record (Avro)
//!
//! Avro has no "any" type. Open shapes are mapped to one self-referential
//! record holding a map of primitives, arrays and nested generic records.
//! The model is scanned up front so the definition can be placed before
//! its first use.

use serde_json::{json, Value};

use crate::model::{Attribute, AttributeType, ModelDefinition, WILDCARD};

const PRIMITIVES: [&str; 8] = ["null", "boolean", "int", "long", "float", "double", "bytes", "string"];

/// The generic record definition.
///
/// `fullname` is used for every self-reference so that the definition
/// stays valid wherever it is placed.
pub fn generic_record_definition(namespace: &str, name: &str, fullname: &str) -> Value {
    let mut item_union: Vec<Value> = PRIMITIVES.iter().map(|p| json!(p)).collect();
    item_union.push(json!(fullname));

    let mut value_union: Vec<Value> = PRIMITIVES.iter().map(|p| json!(p)).collect();
    value_union.push(json!({"type": "array", "items": item_union}));
    value_union.push(json!(fullname));

    let mut record = json!({
        "type": "record",
        "name": name,
        "fields": [
            {
                "name": "object",
                "type": {"type": "map", "values": value_union}
            }
        ]
    });
    if !namespace.is_empty() {
        record["namespace"] = json!(namespace);
    }
    record
}

/// Whether any attribute in the model compiles to the generic record
pub fn requires_generic_record(model: &ModelDefinition) -> bool {
    model.groups.values().any(|group| {
        group.attributes.iter().any(|(name, attr)| attribute_is_open(name, attr))
            || group
                .resources
                .values()
                .any(|resource| resource.attributes.iter().any(|(name, attr)| attribute_is_open(name, attr)))
    })
}

/// Open shape anywhere in an attribute: itself, its fields, items or variants.
///
/// Follows the same shape rules as the Avro compiler: object fields come
/// from `attributes` or from the item's `attributes`, and containers only
/// look at typed items.
fn attribute_is_open(name: &str, attr: &Attribute) -> bool {
    let kind = match attr.kind {
        Some(kind) => Some(kind),
        None if name == WILDCARD => Some(AttributeType::Any),
        None => None,
    };
    let open_here = match kind {
        Some(kind) if kind.is_open() => true,
        Some(AttributeType::Object) => match attr.object_fields() {
            Some(fields) => fields.iter().any(|(n, a)| attribute_is_open(n, a)),
            None => true,
        },
        Some(AttributeType::Map | AttributeType::Array) => attr
            .item
            .as_deref()
            .filter(|item| item.kind.is_some())
            .map_or(false, |item| attribute_is_open(name, item)),
        _ => false,
    };
    if open_here {
        return true;
    }

    attr.conditions().into_iter().flat_map(|variants| variants.values()).any(|variant| {
        variant
            .siblingattributes
            .iter()
            .any(|(n, a)| attribute_is_open(n, a))
    })
}
