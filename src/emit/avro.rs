//! Avro emitter
//!
//! Produces a single `DocumentType` record whose fields are maps of group
//! records, which in turn hold maps of resource records. Resource records
//! are emitted once (keyed by singular name) and referenced by name after.

use std::collections::HashSet;

use serde_json::{json, Value};

use crate::compiler::{generic_record_definition, requires_generic_record, AvroCompiler};
use crate::config::GeneratorConfig;
use crate::error::{Result, SchemaError};
use crate::model::{Group, ModelDefinition, ResourceRef};
use crate::names::{camel, pascal};

/// Field of the document record that carries the generic record definition
pub const GENERIC_DEFINITION_FIELD: &str = "genericRecordDefinition";

/// Registry attributes carried by every group and resource record
fn common_fields() -> Vec<Value> {
    vec![
        json!({"name": "name", "type": ["string", "null"], "doc": "Name of the object"}),
        json!({"name": "epoch", "type": ["int", "null"], "doc": "Epoch time of the object creation"}),
        json!({"name": "self", "type": "string", "doc": "URL of the object"}),
        json!({"name": "xid", "type": "string", "doc": "XID of the object"}),
        json!({"name": "description", "type": ["string", "null"], "doc": "Description of the object"}),
        json!({"name": "documentation", "type": ["string", "null"], "doc": "URI of the documentation of the object"}),
        json!({"name": "labels", "type": {"type": "map", "values": ["string", "null"]}, "doc": "Labels for the object"}),
        json!({"name": "createdat", "type": [{"type": "int", "logicalType": "time-millis"}, "null"], "doc": "Time of the object creation"}),
        json!({"name": "modifiedat", "type": [{"type": "int", "logicalType": "time-millis"}, "null"], "doc": "Time of the object modification"}),
    ]
}

fn entity_fields(entity: &str) -> Vec<Value> {
    let mut fields = vec![json!({
        "name": format!("{}id", entity),
        "type": "string",
        "doc": format!("ID of the {} object", entity)
    })];
    fields.extend(common_fields());
    fields
}

/// Emit the Avro schema for a model
pub fn emit_avro(model: &ModelDefinition, config: &GeneratorConfig) -> Result<Value> {
    let avro = &config.avro;
    let generic_needed = requires_generic_record(model);
    let mut compiler = AvroCompiler::new(avro, generic_needed);
    reserve_record_names(model, &mut compiler, config, generic_needed)?;

    let mut fields = Vec::new();
    if generic_needed {
        tracing::debug!("Model has open shapes, defining {}", avro.generic_record_fullname());
        let definition = generic_record_definition(
            &avro.namespace,
            &avro.generic_record,
            &avro.generic_record_fullname(),
        );
        fields.push(json!({
            "name": GENERIC_DEFINITION_FIELD,
            "type": {"type": "array", "items": definition}
        }));
    }

    for group in model.groups.values() {
        tracing::debug!("Compiling group '{}'", group.plural);
        let record = group_record(model, group, &mut compiler, config)?;
        fields.push(json!({
            "name": camel(&group.plural),
            "type": {"type": "map", "values": record}
        }));
    }
    compiler.finish()?;

    let mut document = json!({
        "type": "record",
        "name": avro.document_record,
        "fields": fields
    });
    if !avro.namespace.is_empty() {
        document["namespace"] = json!(avro.namespace);
    }

    if config.validation.validate_avro {
        validate_avro(&document)?;
    }
    tracing::info!("Emitted Avro schema with {} group type(s)", model.groups.len());
    Ok(document)
}

/// Take the fixed record names before any attribute record is named
fn reserve_record_names(
    model: &ModelDefinition,
    compiler: &mut AvroCompiler,
    config: &GeneratorConfig,
    generic_needed: bool,
) -> Result<()> {
    let avro = &config.avro;
    compiler.reserve_name(&avro.document_record, "the document")?;
    if generic_needed {
        compiler.reserve_name(&avro.generic_record, "the generic record")?;
    }

    let mut resources = HashSet::new();
    for group in model.groups.values() {
        let owner = format!("group '{}'", group.plural);
        compiler.reserve_name(&format!("{}Type", pascal(&group.singular)), &owner)?;
        for resource in group.resources.values() {
            if !resources.insert(resource.singular.as_str()) {
                continue;
            }
            let owner = format!("resource '{}'", resource.plural);
            let prefix = pascal(&resource.singular);
            compiler.reserve_name(&format!("{}Type", prefix), &owner)?;
            if resource.is_versioned() {
                compiler.reserve_name(&format!("{}VersionType", prefix), &owner)?;
                compiler.reserve_name(&format!("{}VersionInfo", prefix), &owner)?;
            }
        }
    }
    Ok(())
}

fn group_record(
    model: &ModelDefinition,
    group: &Group,
    compiler: &mut AvroCompiler,
    config: &GeneratorConfig,
) -> Result<Value> {
    let prefix = pascal(&group.singular);
    let mut fields = entity_fields(&group.singular);
    compiler.compile_fields(&mut fields, &group.attributes, &prefix)?;

    for resource_ref in model.group_resources(group, config.model.import_resources)? {
        let values = resource_record(resource_ref, compiler)?;
        fields.push(json!({
            "name": camel(&resource_ref.resource.plural),
            "type": {"type": "map", "values": values}
        }));
    }

    Ok(json!({
        "type": "record",
        "name": format!("{}Type", prefix),
        "fields": fields
    }))
}

/// The resource record, or a reference to it by name if already emitted
fn resource_record(resource_ref: ResourceRef<'_>, compiler: &mut AvroCompiler) -> Result<Value> {
    let resource = resource_ref.resource;
    let singular = resource.singular.as_str();
    let prefix = pascal(singular);
    let type_name = format!("{}Type", prefix);

    if !compiler.claim_resource(singular) {
        tracing::debug!("Resource '{}' already emitted, referencing {}", singular, type_name);
        return Ok(json!(type_name));
    }
    tracing::debug!(
        "Compiling resource '{}'{}",
        singular,
        if resource_ref.imported { " (imported)" } else { "" }
    );

    let mut fields = entity_fields(singular);
    if resource.is_versioned() {
        let mut version_fields = vec![json!({
            "name": "versionid",
            "type": "string",
            "doc": format!("ID of the {} version", singular)
        })];
        version_fields.extend(fields.iter().cloned());
        compiler.compile_fields(&mut version_fields, &resource.attributes, &prefix)?;

        fields.push(json!({
            "name": "versions",
            "type": [
                {
                    "type": "map",
                    "values": {
                        "type": "record",
                        "name": format!("{}VersionType", prefix),
                        "fields": version_fields
                    }
                },
                {
                    "type": "record",
                    "name": format!("{}VersionInfo", prefix),
                    "fields": [
                        {"name": "versionsUrl", "type": "string"},
                        {"name": "versionCount", "type": "int"}
                    ]
                }
            ]
        }));
    } else {
        compiler.compile_fields(&mut fields, &resource.attributes, &prefix)?;
    }

    Ok(json!({
        "type": "record",
        "name": type_name,
        "fields": fields
    }))
}

/// Check that a generated document parses as an Avro schema
pub fn validate_avro(document: &Value) -> Result<()> {
    apache_avro::Schema::parse(document)
        .map(|_| ())
        .map_err(|e| SchemaError::InvalidAvro(e.to_string()))
}
