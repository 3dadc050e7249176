//! JSON Schema / OpenAPI attribute compiler
//!
//! Compiles attribute declarations into JSON Schema fragments and attaches
//! them to an enclosing object schema (`properties`, `required`,
//! `additionalProperties`). `ifvalues` become `oneOf` variants; in the
//! OpenAPI flavour the variants are published as named components with a
//! discriminator.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::error::{Result, SchemaError};
use crate::mapping;
use crate::model::{Attribute, AttributeType, IfValue, WILDCARD};
use crate::names::sanitize_identifier;

/// Which dialect the fragments are produced for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonFlavor {
    JsonSchema,
    OpenApi,
}

/// Attribute compiler state for one document
pub struct JsonCompiler {
    flavor: JsonFlavor,
    /// `#/components/schemas/` style prefix for variant references
    reference_prefix: String,
    /// Variant schemas registered as components (OpenAPI flavour)
    components: Map<String, Value>,
}

impl JsonCompiler {
    pub fn new(flavor: JsonFlavor) -> Self {
        Self {
            flavor,
            reference_prefix: "#/components/schemas/".to_string(),
            components: Map::new(),
        }
    }

    /// Variant components collected so far, leaving the registry empty
    pub fn take_components(&mut self) -> Map<String, Value> {
        std::mem::take(&mut self.components)
    }

    // =========================================================================
    // Attribute sets
    // =========================================================================

    /// Compile every attribute into `schema`.
    ///
    /// `context` names the owner (group, resource, nested attribute path) in
    /// diagnostics and disambiguates variant component names.
    pub fn compile_attributes(
        &mut self,
        schema: &mut Map<String, Value>,
        attributes: &IndexMap<String, Attribute>,
        context: &str,
    ) -> Result<()> {
        for (name, attr) in attributes {
            if name == WILDCARD && attr.ifvalues.is_some() {
                return Err(SchemaError::WildcardIfValues {
                    context: context.to_string(),
                });
            }

            let plain = self.compile_attribute(name, attr, context)?;

            if attr.is_enforced_required() {
                push_required(schema, name);
            }

            if let Some(conditions) = attr.conditions() {
                remove_key(properties_mut(schema)?, name);
                let kind = attr.resolved_kind(name)?;
                self.compile_conditions(schema, name, kind, &plain, conditions, context)?;
            } else if name == WILDCARD {
                if attr.resolved_kind(name)? == AttributeType::Any {
                    continue;
                }
                merge_additional_properties(schema, plain);
            } else {
                properties_mut(schema)?.insert(name.clone(), Value::Object(plain));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Single attributes
    // =========================================================================

    /// Compile one attribute into its plain (unconditional) fragment
    pub fn compile_attribute(&mut self, name: &str, attr: &Attribute, context: &str) -> Result<Map<String, Value>> {
        let kind = attr.resolved_kind(name)?;
        let mut fragment = mapping::json_schema_type(kind);
        let path = format!("{}.{}", context, name);

        match kind {
            AttributeType::Object => {
                if let Some(fields) = attr.object_fields() {
                    fragment.insert("properties".to_string(), json!({}));
                    self.compile_attributes(&mut fragment, fields, &path)?;
                }
            }
            AttributeType::Map => {
                if let Some(item) = self.compile_item(name, attr.item.as_deref(), &path)? {
                    fragment.insert("additionalProperties".to_string(), Value::Object(item));
                }
            }
            AttributeType::Array => {
                if let Some(item) = self.compile_item(name, attr.item.as_deref(), &path)? {
                    fragment.insert("items".to_string(), Value::Object(item));
                }
            }
            _ => {}
        }

        if let Some(doc) = attr.doc() {
            fragment.insert("description".to_string(), json!(doc));
        }
        if attr.strict {
            if let Some(values) = &attr.enum_values {
                fragment.insert("enum".to_string(), Value::Array(values.clone()));
            }
        }
        if let Some(default) = &attr.default {
            fragment.insert("default".to_string(), default.clone());
        }
        Ok(fragment)
    }

    /// Compile the contained shape of a map or array.
    ///
    /// Without an item (or an item type) the container is left open.
    pub fn compile_item(
        &mut self,
        owner: &str,
        item: Option<&Attribute>,
        context: &str,
    ) -> Result<Option<Map<String, Value>>> {
        match item {
            Some(item) if item.kind.is_some() => self.compile_attribute(owner, item, context).map(Some),
            _ => Ok(None),
        }
    }

    // =========================================================================
    // Conditional variants
    // =========================================================================

    fn compile_conditions(
        &mut self,
        schema: &mut Map<String, Value>,
        name: &str,
        kind: AttributeType,
        plain: &Map<String, Value>,
        conditions: &IndexMap<String, IfValue>,
        context: &str,
    ) -> Result<()> {
        let mut variants = Vec::with_capacity(conditions.len() + 1);
        let mut mapping = Map::new();

        for (value, condition) in conditions {
            let literal = condition_literal(kind, value);
            let mut constrained = plain.clone();
            remove_key(&mut constrained, "default");
            constrained.insert("enum".to_string(), json!([literal]));

            let mut variant = Map::new();
            variant.insert("properties".to_string(), json!({ name: constrained }));
            variant.insert("required".to_string(), json!([name]));
            let variant_context = format!("{}.{}={}", context, name, value);
            self.compile_attributes(&mut variant, &condition.siblingattributes, &variant_context)?;

            match self.flavor {
                JsonFlavor::JsonSchema => variants.push(Value::Object(variant)),
                JsonFlavor::OpenApi => {
                    let identifier = self.register_component(name, value, context, variant);
                    let reference = format!("{}{}", self.reference_prefix, identifier);
                    variants.push(json!({ "$ref": reference.clone() }));
                    mapping.insert(value.clone(), Value::String(reference));
                }
            }
        }

        let mut branch = Map::new();
        match self.flavor {
            JsonFlavor::JsonSchema => {
                let literals: Vec<Value> = conditions.keys().map(|v| condition_literal(kind, v)).collect();
                variants.push(json!({
                    "properties": { name: Value::Object(plain.clone()) },
                    "not": {
                        "properties": { name: { "enum": literals } },
                        "required": [name]
                    }
                }));
                branch.insert("oneOf".to_string(), Value::Array(variants));
            }
            JsonFlavor::OpenApi => {
                branch.insert("oneOf".to_string(), Value::Array(variants));
                branch.insert(
                    "discriminator".to_string(),
                    json!({ "propertyName": name, "mapping": mapping }),
                );
            }
        }

        attach_one_of(schema, branch);
        Ok(())
    }

    /// Register a variant under `<attr>_<value>`, falling back to a
    /// context-qualified name when a different variant already uses it.
    fn register_component(&mut self, name: &str, value: &str, context: &str, variant: Map<String, Value>) -> String {
        let identifier = format!("{}_{}", name, sanitize_identifier(value));
        let variant = Value::Object(variant);
        let identifier = match self.components.get(&identifier) {
            Some(existing) if *existing != variant => {
                let qualified = format!("{}_{}", sanitize_identifier(context), identifier);
                tracing::warn!("Variant component '{}' already defined, using '{}'", identifier, qualified);
                qualified
            }
            _ => identifier,
        };
        self.components.insert(identifier.clone(), variant);
        identifier
    }
}

/// The literal a condition key stands for, typed after the attribute
fn condition_literal(kind: AttributeType, value: &str) -> Value {
    match kind {
        AttributeType::Integer | AttributeType::Uinteger => {
            value.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(value))
        }
        AttributeType::Boolean => value.parse::<bool>().map(Value::from).unwrap_or_else(|_| json!(value)),
        _ => json!(value),
    }
}

// =============================================================================
// Schema object helpers
// =============================================================================

/// The `properties` object of a schema, created when missing
pub(crate) fn properties_mut(schema: &mut Map<String, Value>) -> Result<&mut Map<String, Value>> {
    schema
        .entry("properties")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| SchemaError::Internal("'properties' is not an object".to_string()))
}

/// Add a name to the schema's `required` list, once
pub(crate) fn push_required(schema: &mut Map<String, Value>, name: &str) {
    if let Value::Array(required) = schema.entry("required").or_insert_with(|| json!([])) {
        if !required.iter().any(|r| r == name) {
            required.push(json!(name));
        }
    }
}

/// Remove a key while keeping the order of the remaining ones
pub(crate) fn remove_key(map: &mut Map<String, Value>, key: &str) -> Option<Value> {
    let value = map.get(key).cloned()?;
    map.retain(|k, _| k != key);
    Some(value)
}

fn merge_additional_properties(schema: &mut Map<String, Value>, fragment: Map<String, Value>) {
    match schema.get_mut("additionalProperties") {
        Some(Value::Object(existing)) => existing.extend(fragment),
        _ => {
            schema.insert("additionalProperties".to_string(), Value::Object(fragment));
        }
    }
}

/// Attach a `oneOf` branch (with its discriminator, if any): under an
/// existing `allOf`, next to an existing `oneOf` (both moved into `allOf`),
/// or directly on the schema.
fn attach_one_of(schema: &mut Map<String, Value>, branch: Map<String, Value>) {
    if let Some(Value::Array(all_of)) = schema.get_mut("allOf") {
        all_of.push(Value::Object(branch));
        return;
    }
    match remove_key(schema, "oneOf") {
        Some(existing) => {
            let mut first = Map::new();
            first.insert("oneOf".to_string(), existing);
            if let Some(discriminator) = remove_key(schema, "discriminator") {
                first.insert("discriminator".to_string(), discriminator);
            }
            schema.insert(
                "allOf".to_string(),
                json!([Value::Object(first), Value::Object(branch)]),
            );
        }
        None => schema.extend(branch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonschema::{Draft, JSONSchema};

    fn attributes(value: Value) -> IndexMap<String, Attribute> {
        serde_json::from_value(value).unwrap()
    }

    fn compile(flavor: JsonFlavor, attrs: Value) -> (Map<String, Value>, JsonCompiler) {
        let mut compiler = JsonCompiler::new(flavor);
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), json!({}));
        compiler
            .compile_attributes(&mut schema, &attributes(attrs), "test")
            .unwrap();
        (schema, compiler)
    }

    fn validator(schema: &Map<String, Value>) -> JSONSchema {
        JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&Value::Object(schema.clone()))
            .unwrap()
    }

    #[test]
    fn test_plain_attributes() {
        let (schema, _) = compile(
            JsonFlavor::JsonSchema,
            json!({
                "name": {"type": "string", "description": "The name", "required": true},
                "count": {"type": "uinteger", "required": true, "default": 0},
                "tags": {"type": "array", "item": {"type": "string"}},
                "meta": {"type": "map", "item": {"type": "object", "attributes": {
                    "x": {"type": "integer"}
                }}}
            }),
        );
        assert_eq!(schema["properties"]["name"], json!({"type": "string", "description": "The name"}));
        assert_eq!(schema["properties"]["count"]["minimum"], 0);
        assert_eq!(schema["required"], json!(["name"]));
        assert_eq!(schema["properties"]["tags"]["items"], json!({"type": "string"}));
        assert_eq!(
            schema["properties"]["meta"]["additionalProperties"]["properties"]["x"],
            json!({"type": "integer"})
        );
    }

    #[test]
    fn test_open_containers() {
        let (schema, _) = compile(
            JsonFlavor::JsonSchema,
            json!({
                "bag": {"type": "map"},
                "list": {"type": "array"},
                "anything": {"type": "object"}
            }),
        );
        assert_eq!(schema["properties"]["bag"], json!({"type": "object"}));
        assert_eq!(schema["properties"]["list"], json!({"type": "array"}));
        assert_eq!(schema["properties"]["anything"], json!({"type": "object"}));
    }

    #[test]
    fn test_strict_enum() {
        let (schema, _) = compile(
            JsonFlavor::JsonSchema,
            json!({
                "mode": {"type": "string", "enum": ["a", "b"]},
                "loose": {"type": "string", "enum": ["a"], "strict": false}
            }),
        );
        assert_eq!(schema["properties"]["mode"]["enum"], json!(["a", "b"]));
        assert!(schema["properties"]["loose"].get("enum").is_none());
    }

    #[test]
    fn test_wildcard_merges_into_additional_properties() {
        let (schema, _) = compile(
            JsonFlavor::JsonSchema,
            json!({ "*": {"type": "string"} }),
        );
        assert_eq!(schema["additionalProperties"], json!({"type": "string"}));

        let (schema, _) = compile(JsonFlavor::JsonSchema, json!({ "*": {"type": "any"} }));
        assert!(schema.get("additionalProperties").is_none());
    }

    #[test]
    fn test_wildcard_with_ifvalues_is_rejected() {
        let mut compiler = JsonCompiler::new(JsonFlavor::JsonSchema);
        let mut schema = Map::new();
        let attrs = attributes(json!({
            "*": {"type": "string", "ifvalues": {"x": {"siblingattributes": {}}}}
        }));
        let err = compiler.compile_attributes(&mut schema, &attrs, "message").unwrap_err();
        assert!(matches!(err, SchemaError::WildcardIfValues { .. }));
        assert!(err.to_string().contains("wild card"));
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let mut compiler = JsonCompiler::new(JsonFlavor::JsonSchema);
        let mut schema = Map::new();
        let attrs = attributes(json!({ "name": {"description": "untyped"} }));
        assert!(matches!(
            compiler.compile_attributes(&mut schema, &attrs, "x"),
            Err(SchemaError::MissingType { .. })
        ));
    }

    fn conditional_attributes() -> Value {
        json!({
            "format": {
                "type": "string",
                "required": true,
                "ifvalues": {
                    "CloudEvents/1.0": {
                        "siblingattributes": {
                            "metadata": {"type": "string", "required": true}
                        }
                    },
                    "AMQP/1.0": {
                        "siblingattributes": {
                            "properties": {"type": "string", "required": true}
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_ifvalues_variants_validate() {
        let (schema, _) = compile(JsonFlavor::JsonSchema, conditional_attributes());
        assert!(schema["properties"].get("format").is_none());
        let one_of = schema["oneOf"].as_array().unwrap();
        assert_eq!(one_of.len(), 3);

        let validator = validator(&schema);
        assert!(validator.is_valid(&json!({"format": "CloudEvents/1.0", "metadata": "m"})));
        assert!(validator.is_valid(&json!({"format": "AMQP/1.0", "properties": "p"})));
        assert!(!validator.is_valid(&json!({"format": "CloudEvents/1.0"})));
        assert!(!validator.is_valid(&json!({"format": "AMQP/1.0", "metadata": "m"})));
        assert!(validator.is_valid(&json!({"format": "MQTT/5.0"})));
    }

    #[test]
    fn test_ifvalues_next_to_existing_one_of() {
        let mut compiler = JsonCompiler::new(JsonFlavor::JsonSchema);
        let mut schema = Map::new();
        schema.insert("oneOf".to_string(), json!([{"required": ["a"]}, {"required": ["b"]}]));
        compiler
            .compile_attributes(&mut schema, &attributes(conditional_attributes()), "test")
            .unwrap();
        assert!(schema.get("oneOf").is_none());
        let all_of = schema["allOf"].as_array().unwrap();
        assert_eq!(all_of.len(), 2);
        assert_eq!(all_of[0]["oneOf"].as_array().unwrap().len(), 2);
        assert_eq!(all_of[1]["oneOf"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_integer_condition_values_are_typed() {
        let (schema, _) = compile(
            JsonFlavor::JsonSchema,
            json!({"level": {"type": "integer", "ifvalues": {"1": {"siblingattributes": {
                "detail": {"type": "string", "required": true}
            }}}}}),
        );
        let validator = validator(&schema);
        assert!(validator.is_valid(&json!({"level": 1, "detail": "d"})));
        assert!(!validator.is_valid(&json!({"level": 1})));
        assert!(validator.is_valid(&json!({"level": 2})));
    }

    #[test]
    fn test_openapi_variants_are_components() {
        let (schema, mut compiler) = compile(JsonFlavor::OpenApi, conditional_attributes());
        let components = compiler.take_components();
        assert!(components.contains_key("format_CloudEvents_1_0"));
        assert!(components.contains_key("format_AMQP_1_0"));
        assert_eq!(
            schema["oneOf"][0],
            json!({"$ref": "#/components/schemas/format_CloudEvents_1_0"})
        );
        assert_eq!(schema["discriminator"]["propertyName"], "format");
        assert_eq!(
            schema["discriminator"]["mapping"]["AMQP/1.0"],
            "#/components/schemas/format_AMQP_1_0"
        );
        assert!(compiler.take_components().is_empty());
    }

    #[test]
    fn test_openapi_discriminator_follows_its_variants() {
        let (schema, _) = compile(
            JsonFlavor::OpenApi,
            json!({
                "format": {"type": "string", "ifvalues": {"a": {"siblingattributes": {}}}},
                "protocol": {"type": "string", "ifvalues": {"b": {"siblingattributes": {}}}}
            }),
        );
        assert!(schema.get("discriminator").is_none());
        let all_of = schema["allOf"].as_array().unwrap();
        assert_eq!(all_of.len(), 2);
        assert_eq!(all_of[0]["discriminator"]["propertyName"], "format");
        assert_eq!(all_of[0]["oneOf"][0]["$ref"], "#/components/schemas/format_a");
        assert_eq!(all_of[1]["discriminator"]["propertyName"], "protocol");
        assert_eq!(all_of[1]["oneOf"][0]["$ref"], "#/components/schemas/protocol_b");
    }

    #[test]
    fn test_openapi_variants_next_to_document_one_of() {
        let mut compiler = JsonCompiler::new(JsonFlavor::OpenApi);
        let mut schema = Map::new();
        schema.insert("oneOf".to_string(), json!([{"required": ["doc"]}, {"required": ["docurl"]}]));
        compiler
            .compile_attributes(&mut schema, &attributes(conditional_attributes()), "test")
            .unwrap();
        assert!(schema.get("oneOf").is_none());
        assert!(schema.get("discriminator").is_none());
        let all_of = schema["allOf"].as_array().unwrap();
        assert!(all_of[0].get("discriminator").is_none());
        assert_eq!(all_of[0]["oneOf"].as_array().unwrap().len(), 2);
        assert_eq!(all_of[1]["oneOf"].as_array().unwrap().len(), 2);
        assert_eq!(all_of[1]["discriminator"]["propertyName"], "format");
        assert_eq!(
            all_of[1]["discriminator"]["mapping"]["CloudEvents/1.0"],
            "#/components/schemas/format_CloudEvents_1_0"
        );
    }
}
