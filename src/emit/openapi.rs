//! OpenAPI emitter
//!
//! Instantiates the path template for every group type and every resource
//! collection (own and imported), and merges the component schemas produced
//! by the JSON compiler in OpenAPI flavour.

use serde_json::{json, Map, Value};

use crate::compiler::JsonFlavor;
use crate::config::{DefinitionLayout, GeneratorConfig};
use crate::emit::json_schema::{DefinitionTable, SchemaBuilder};
use crate::emit::template::{
    specialize, OpenApiTemplate, PathScope, PathTemplate, DOCUMENT_TYPE_REFERENCE, GROUP_NAME_PLURAL,
    GROUP_NAME_SINGULAR, GROUP_TYPE_REFERENCE, RESOURCE_NAME_PLURAL, RESOURCE_NAME_SINGULAR,
    RESOURCE_TYPE_REFERENCE,
};
use crate::error::{Result, SchemaError};
use crate::model::{Group, ModelDefinition, Resource};
use crate::names::pascal;

const COMPONENTS_PREFIX: &str = "#/components/schemas/";

/// Name of the component describing the whole registry document
pub const DOCUMENT_SCHEMA: &str = "document";

fn component_ref(name: &str) -> String {
    format!("{}{}", COMPONENTS_PREFIX, name)
}

/// Emit the OpenAPI document, using the configured (or embedded) template
pub fn emit_openapi(model: &ModelDefinition, config: &GeneratorConfig) -> Result<Value> {
    let template = match &config.openapi.template {
        Some(path) => OpenApiTemplate::load(path)?,
        None => OpenApiTemplate::embedded()?,
    };
    emit_openapi_with(model, config, &template)
}

/// Emit the OpenAPI document from an already parsed template
pub fn emit_openapi_with(
    model: &ModelDefinition,
    config: &GeneratorConfig,
    template: &OpenApiTemplate,
) -> Result<Value> {
    let mut document = template.skeleton().clone();

    let mut builder = SchemaBuilder::new(
        model,
        config.model.import_resources,
        JsonFlavor::OpenApi,
        DefinitionTable::new(COMPONENTS_PREFIX, DefinitionLayout::Flat),
    );
    let document_properties = builder.build()?;
    let definitions = builder.into_definitions();

    let schemas = component_schemas(&mut document)?;
    schemas.insert(
        DOCUMENT_SCHEMA.to_string(),
        json!({"type": "object", "properties": document_properties}),
    );
    schemas.extend(definitions);
    augment_registry_entity(schemas, model)?;

    let paths = PathBuilder::new(template).build(model, config.model.import_resources)?;
    document.insert("paths".to_string(), Value::Object(paths));

    tracing::info!(
        "Emitted OpenAPI document with {} group type(s)",
        model.groups.len()
    );
    Ok(Value::Object(document))
}

fn component_schemas(document: &mut Map<String, Value>) -> Result<&mut Map<String, Value>> {
    document
        .get_mut("components")
        .and_then(|c| c.get_mut("schemas"))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| SchemaError::Template("missing 'components.schemas'".to_string()))
}

/// Add per-group link, count and inline map properties to `RegistryEntity`
fn augment_registry_entity(schemas: &mut Map<String, Value>, model: &ModelDefinition) -> Result<()> {
    let properties = schemas
        .get_mut("RegistryEntity")
        .and_then(|r| r.get_mut("properties"))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| SchemaError::Template("missing 'RegistryEntity.properties'".to_string()))?;

    for group in model.groups.values() {
        let plural = &group.plural;
        properties.insert(
            format!("{}url", plural),
            json!({
                "type": "string",
                "format": "uri",
                "description": format!("The URL for retrieving the {} (e.g. {}url).", plural, plural)
            }),
        );
        properties.insert(
            format!("{}count", plural),
            json!({
                "type": "integer",
                "minimum": 0,
                "description": format!("The count of {} in the registry.", plural)
            }),
        );
        properties.insert(
            plural.clone(),
            json!({
                "type": "object",
                "description": format!(
                    "A map of {} in the registry, keyed by {} identifier. Present only if inlined.",
                    plural, group.singular
                ),
                "additionalProperties": {"$ref": component_ref(&group.singular)},
                "nullable": true
            }),
        );
    }
    Ok(())
}

// =============================================================================
// Paths
// =============================================================================

/// Builds concrete paths from the template's path items
struct PathBuilder<'t> {
    template: &'t OpenApiTemplate,
    paths: Map<String, Value>,
}

impl<'t> PathBuilder<'t> {
    fn new(template: &'t OpenApiTemplate) -> Self {
        Self {
            template,
            paths: Map::new(),
        }
    }

    fn build(mut self, model: &ModelDefinition, import_resources: bool) -> Result<Map<String, Value>> {
        let document_ref = [(DOCUMENT_TYPE_REFERENCE, component_ref(DOCUMENT_SCHEMA))];
        self.instantiate(PathTemplate::Root, "/".to_string(), &document_ref, &[]);

        if let Some(Value::Object(kept)) = self.template.skeleton().get("paths") {
            for (path, item) in kept {
                self.paths.insert(path.clone(), item.clone());
            }
        }

        for group in model.groups.values() {
            let (references, operations) = group_substitutions(group);
            for kind in PathTemplate::ALL.into_iter().filter(|k| k.scope() == PathScope::Group) {
                self.instantiate(kind, kind.concrete_path(&group.plural, ""), &references, &operations);
            }

            for resource_ref in model.group_resources(group, import_resources)? {
                let resource = resource_ref.resource;
                let (references, operations) = resource_substitutions(group, resource);
                for kind in PathTemplate::ALL.into_iter().filter(|k| k.scope() == PathScope::Resource) {
                    let path = kind.concrete_path(&group.plural, &resource.plural);
                    self.instantiate(kind, path, &references, &operations);
                }
            }
        }
        Ok(self.paths)
    }

    fn instantiate(
        &mut self,
        kind: PathTemplate,
        path: String,
        references: &[(&str, String)],
        operations: &[(&str, String)],
    ) {
        let Some(item) = self.template.path_item(kind) else {
            return;
        };
        let mut item = item.clone();
        specialize(&mut item, references, operations);
        tracing::debug!("Path {}", path);
        self.paths.insert(path, item);
    }
}

type Substitutions = (Vec<(&'static str, String)>, Vec<(&'static str, String)>);

fn group_substitutions(group: &Group) -> Substitutions {
    let references = vec![
        (DOCUMENT_TYPE_REFERENCE, component_ref(DOCUMENT_SCHEMA)),
        (GROUP_TYPE_REFERENCE, component_ref(&group.singular)),
    ];
    let operations = vec![
        (GROUP_NAME_PLURAL, pascal(&group.plural)),
        (GROUP_NAME_SINGULAR, pascal(&group.singular)),
    ];
    (references, operations)
}

fn resource_substitutions(group: &Group, resource: &Resource) -> Substitutions {
    let (mut references, mut operations) = group_substitutions(group);
    references.push((RESOURCE_TYPE_REFERENCE, component_ref(&resource.singular)));
    let group_name = pascal(&group.singular);
    operations.push((
        RESOURCE_NAME_PLURAL,
        format!("{}{}", group_name, pascal(&resource.plural)),
    ));
    operations.push((
        RESOURCE_NAME_SINGULAR,
        format!("{}{}", group_name, pascal(&resource.singular)),
    ));
    (references, operations)
}
