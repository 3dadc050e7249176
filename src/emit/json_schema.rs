//! JSON Schema emitter
//!
//! Produces a draft-07 document: one map property per group type at the
//! root, and a definition per group, resource and resource version. The
//! same builder supplies the component schemas of the OpenAPI emitter.

use std::collections::HashMap;

use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Map, Value};

use crate::compiler::json::{properties_mut, remove_key};
use crate::compiler::{JsonCompiler, JsonFlavor};
use crate::config::{DefinitionLayout, GeneratorConfig};
use crate::error::{Result, SchemaError};
use crate::model::{Group, ModelDefinition, ResourceRef};

/// Meta-schema of every generated document
pub const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// Registry attributes carried by every group and resource
fn common_properties() -> Map<String, Value> {
    let common = json!({
        "name": {"type": "string", "description": "Name of the object"},
        "epoch": {"type": "integer", "description": "Epoch time of the object creation"},
        "self": {"type": "string", "format": "uri", "description": "URL of the object"},
        "xid": {"type": "string", "format": "xid", "description": "Relative URL of the object"},
        "description": {"type": "string", "description": "Description of the object"},
        "documentation": {"type": "string", "format": "uri", "description": "URI of the documentation of the object"},
        "labels": {"type": "object", "description": "Labels for the object"},
        "createdat": {"type": "string", "format": "date-time", "description": "Time of the object creation"},
        "modifiedat": {"type": "string", "format": "date-time", "description": "Time of the object modification"}
    });
    match common {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn id_property(entity: &str) -> Value {
    json!({"type": "string", "description": format!("ID of the {} object", entity)})
}

fn collection_property(reference: &str) -> Value {
    json!({"type": "object", "additionalProperties": {"$ref": reference}})
}

// =============================================================================
// Definition table
// =============================================================================

/// Named definitions and how references to them are spelled
pub(crate) struct DefinitionTable {
    reference_prefix: String,
    layout: DefinitionLayout,
    definitions: Map<String, Value>,
}

impl DefinitionTable {
    pub(crate) fn new(reference_prefix: &str, layout: DefinitionLayout) -> Self {
        Self {
            reference_prefix: reference_prefix.to_string(),
            layout,
            definitions: Map::new(),
        }
    }

    fn bucket_key(bucket: &str) -> String {
        format!("{}-schema", bucket)
    }

    /// Reference to definition `name` owned by group `bucket`
    pub(crate) fn reference(&self, bucket: &str, name: &str) -> String {
        match self.layout {
            DefinitionLayout::Flat => format!("{}{}", self.reference_prefix, name),
            DefinitionLayout::Nested => format!(
                "{}{}/definitions/{}",
                self.reference_prefix,
                Self::bucket_key(bucket),
                name
            ),
        }
    }

    pub(crate) fn insert(&mut self, bucket: &str, name: &str, schema: Map<String, Value>) {
        match self.layout {
            DefinitionLayout::Flat => {
                self.definitions.insert(name.to_string(), Value::Object(schema));
            }
            DefinitionLayout::Nested => {
                let entry = self
                    .definitions
                    .entry(Self::bucket_key(bucket))
                    .or_insert_with(|| json!({"definitions": {}}));
                if let Some(definitions) = entry.get_mut("definitions").and_then(Value::as_object_mut) {
                    definitions.insert(name.to_string(), Value::Object(schema));
                }
            }
        }
    }

    pub(crate) fn into_map(self) -> Map<String, Value> {
        self.definitions
    }
}

// =============================================================================
// Schema builder
// =============================================================================

/// Compiles the model's groups and resources into definitions
pub(crate) struct SchemaBuilder<'a> {
    model: &'a ModelDefinition,
    import_resources: bool,
    compiler: JsonCompiler,
    table: DefinitionTable,
    /// Resource singular -> reference of its (first) definition
    resources: HashMap<String, String>,
}

impl<'a> SchemaBuilder<'a> {
    pub(crate) fn new(
        model: &'a ModelDefinition,
        import_resources: bool,
        flavor: JsonFlavor,
        table: DefinitionTable,
    ) -> Self {
        Self {
            model,
            import_resources,
            compiler: JsonCompiler::new(flavor),
            table,
            resources: HashMap::new(),
        }
    }

    /// Define every group; returns the document-level group collections
    pub(crate) fn build(&mut self) -> Result<Map<String, Value>> {
        let model = self.model;
        let mut document_properties = Map::new();
        for group in model.groups.values() {
            tracing::debug!("Compiling group '{}'", group.plural);
            let reference = self.define_group(group)?;
            document_properties.insert(group.plural.clone(), collection_property(&reference));
        }
        Ok(document_properties)
    }

    /// Definitions, followed by any variant components
    pub(crate) fn into_definitions(mut self) -> Map<String, Value> {
        let components = self.compiler.take_components();
        let mut definitions = self.table.into_map();
        definitions.extend(components);
        definitions
    }

    fn define_group(&mut self, group: &'a Group) -> Result<String> {
        let model = self.model;
        let mut collections = Map::new();
        for resource_ref in model.group_resources(group, self.import_resources)? {
            let reference = self.define_resource(resource_ref)?;
            collections.insert(resource_ref.resource.plural.clone(), collection_property(&reference));
        }

        let mut properties = Map::new();
        properties.insert(format!("{}id", group.singular), id_property(&group.singular));
        properties.extend(common_properties());
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));

        self.compiler
            .compile_attributes(&mut schema, &group.attributes, &group.singular)?;
        properties_mut(&mut schema)?.extend(collections);

        let reference = self.table.reference(&group.singular, &group.singular);
        self.table.insert(&group.singular, &group.singular, schema);
        Ok(reference)
    }

    fn define_resource(&mut self, resource_ref: ResourceRef<'a>) -> Result<String> {
        let resource = resource_ref.resource;
        let name = resource.singular.as_str();
        if let Some(reference) = self.resources.get(name) {
            tracing::debug!("Resource '{}' already defined, reusing {}", name, reference);
            return Ok(reference.clone());
        }
        tracing::debug!(
            "Compiling resource '{}'{}",
            name,
            if resource_ref.imported { " (imported)" } else { "" }
        );
        let bucket = resource_ref.owner.singular.as_str();

        let mut properties = Map::new();
        properties.insert(format!("{}id", name), id_property(name));
        properties.extend(common_properties());
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if resource.hasdocument {
            schema.insert("oneOf".to_string(), document_variants(name));
        }

        if resource.is_versioned() {
            let version_name = format!("{}Version", name);
            let mut version = schema.clone();
            let mut version_properties = Map::new();
            version_properties.insert(
                "versionid".to_string(),
                json!({"type": "string", "description": format!("ID of the {} version", name)}),
            );
            if let Some(Value::Object(inherited)) = version.get("properties") {
                version_properties.extend(inherited.clone());
            }
            version.insert("properties".to_string(), Value::Object(version_properties));
            self.compiler
                .compile_attributes(&mut version, &resource.attributes, &version_name)?;

            let version_reference = self.table.reference(bucket, &version_name);
            self.table.insert(bucket, &version_name, version);
            schema.insert("oneOf".to_string(), version_variants(&version_reference));
        } else {
            self.compiler
                .compile_attributes(&mut schema, &resource.attributes, name)?;
        }

        let reference = self.table.reference(bucket, name);
        self.table.insert(bucket, name, schema);
        self.resources.insert(name.to_string(), reference.clone());
        Ok(reference)
    }
}

/// Embedded document, base64 body or link: exactly one
fn document_variants(name: &str) -> Value {
    json!([
        {
            "properties": {
                name: {
                    "description": format!("Embedded {} object", name),
                    "oneOf": [{"type": "object"}, {"type": "string"}]
                }
            },
            "required": [name]
        },
        {
            "properties": {
                format!("{}base64", name): {
                    "description": format!("Embedded {} object as binary data", name),
                    "type": "string",
                    "format": "base64"
                }
            },
            "required": [format!("{}base64", name)]
        },
        {
            "properties": {
                format!("{}url", name): {
                    "description": format!("Linked {} object", name),
                    "type": "string",
                    "format": "uri"
                }
            },
            "required": [format!("{}url", name)]
        }
    ])
}

/// Inline version map, or a link with a count: exactly one
fn version_variants(version_reference: &str) -> Value {
    json!([
        {
            "properties": {
                "versionsurl": {"type": "string", "format": "uri"},
                "versionscount": {"type": "integer", "minimum": 0}
            },
            "required": ["versionsurl", "versionscount"]
        },
        {
            "properties": {
                "versions": {
                    "type": "object",
                    "additionalProperties": {"$ref": version_reference}
                }
            },
            "required": ["versions"]
        }
    ])
}

// =============================================================================
// Document
// =============================================================================

/// `$id` of the document: explicit, or derived from the group type names
pub fn schema_id(model: &ModelDefinition, config: &GeneratorConfig) -> String {
    match &config.json_schema.schema_id {
        Some(id) => id.clone(),
        None => format!(
            "{}{}",
            config.json_schema.id_base,
            model.sorted_group_names().join("-")
        ),
    }
}

/// Emit the JSON Schema document for a model
pub fn emit_json_schema(model: &ModelDefinition, config: &GeneratorConfig) -> Result<Value> {
    let table = DefinitionTable::new("#/definitions/", config.json_schema.layout);
    let mut builder = SchemaBuilder::new(
        model,
        config.model.import_resources,
        JsonFlavor::JsonSchema,
        table,
    );
    let properties = builder.build()?;
    let definitions = builder.into_definitions();

    let document = json!({
        "$schema": DRAFT_07,
        "$id": schema_id(model, config),
        "type": "object",
        "properties": properties,
        "definitions": definitions
    });

    if config.validation.strict_json_schema {
        validate_json_schema(&document)?;
    }
    tracing::info!(
        "Emitted JSON Schema with {} group type(s)",
        model.groups.len()
    );
    Ok(document)
}

/// Compile a generated document into a validator.
///
/// `$id` is dropped first: every reference in the document is local.
pub fn compile_validator(document: &Value) -> Result<JSONSchema> {
    let mut local = document.clone();
    if let Value::Object(map) = &mut local {
        remove_key(map, "$id");
    }
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&local)
        .map_err(|e| SchemaError::InvalidJsonSchema(e.to_string()))
}

/// Check that a generated document is a valid draft-07 schema
pub fn validate_json_schema(document: &Value) -> Result<()> {
    compile_validator(document).map(|_| ())
}
