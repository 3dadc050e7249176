//! OpenAPI path template
//!
//! The template is an OpenAPI document whose `paths` use placeholder
//! segments (`/{%-groupNamePlural-%}/{groupid}/...`). Each placeholder path
//! is recognised as one [`PathTemplate`] kind; the emitter instantiates it
//! once per group or per group resource collection.

use std::path::Path;

use include_dir::{include_dir, Dir};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};

static TEMPLATES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates");

const DEFAULT_TEMPLATE: &str = "openapi.json";

// Placeholders
pub const DOCUMENT_TYPE_REFERENCE: &str = "{%-documentTypeReference-%}";
pub const GROUP_TYPE_REFERENCE: &str = "{%-groupTypeReference-%}";
pub const RESOURCE_TYPE_REFERENCE: &str = "{%-resourceTypeReference-%}";
pub const GROUP_NAME_PLURAL: &str = "{%-groupNamePlural-%}";
pub const GROUP_NAME_SINGULAR: &str = "{%-groupNameSingular-%}";
pub const RESOURCE_NAME_PLURAL: &str = "{%-resourceNamePlural-%}";
pub const RESOURCE_NAME_SINGULAR: &str = "{%-resourceNameSingular-%}";

const GROUP_SEGMENT: &str = "/{%-groupNamePlural-%}/{groupid}";
const RESOURCE_SEGMENT: &str = "/{%-groupNamePlural-%}/{groupid}/{%-resourceNamePlural-%}/{resourceid}";

/// What a template path item is instantiated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathScope {
    /// Once for the whole document
    Document,
    /// Once per group type
    Group,
    /// Once per resource collection of each group type
    Resource,
}

/// The kinds of template paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathTemplate {
    Root,
    Groups,
    Group,
    Resources,
    Resource,
    Meta,
    Details,
    Versions,
    Version,
}

impl PathTemplate {
    /// All kinds, in output order
    pub const ALL: [PathTemplate; 9] = [
        PathTemplate::Root,
        PathTemplate::Groups,
        PathTemplate::Group,
        PathTemplate::Resources,
        PathTemplate::Resource,
        PathTemplate::Meta,
        PathTemplate::Details,
        PathTemplate::Versions,
        PathTemplate::Version,
    ];

    /// The path key as written in the template
    pub fn pattern(&self) -> String {
        match self {
            PathTemplate::Root => "/".to_string(),
            PathTemplate::Groups => format!("/{}", GROUP_NAME_PLURAL),
            PathTemplate::Group => GROUP_SEGMENT.to_string(),
            PathTemplate::Resources => format!("{}/{}", GROUP_SEGMENT, RESOURCE_NAME_PLURAL),
            PathTemplate::Resource => RESOURCE_SEGMENT.to_string(),
            PathTemplate::Meta => format!("{}/meta", RESOURCE_SEGMENT),
            PathTemplate::Details => format!("{}$details", RESOURCE_SEGMENT),
            PathTemplate::Versions => format!("{}/versions", RESOURCE_SEGMENT),
            PathTemplate::Version => format!("{}/versions/{{versionid}}", RESOURCE_SEGMENT),
        }
    }

    /// Recognise a template path key
    pub fn from_pattern(path: &str) -> Option<PathTemplate> {
        Self::ALL.into_iter().find(|kind| kind.pattern() == path)
    }

    pub fn scope(&self) -> PathScope {
        match self {
            PathTemplate::Root => PathScope::Document,
            PathTemplate::Groups | PathTemplate::Group => PathScope::Group,
            _ => PathScope::Resource,
        }
    }

    /// The concrete path for a group (and resource collection)
    pub fn concrete_path(&self, group_plural: &str, resource_plural: &str) -> String {
        let group = format!("/{}/{{groupid}}", group_plural);
        let resource = format!("{}/{}/{{resourceid}}", group, resource_plural);
        match self {
            PathTemplate::Root => "/".to_string(),
            PathTemplate::Groups => format!("/{}", group_plural),
            PathTemplate::Group => group,
            PathTemplate::Resources => format!("{}/{}", group, resource_plural),
            PathTemplate::Resource => resource,
            PathTemplate::Meta => format!("{}/meta", resource),
            PathTemplate::Details => format!("{}$details", resource),
            PathTemplate::Versions => format!("{}/versions", resource),
            PathTemplate::Version => format!("{}/versions/{{versionid}}", resource),
        }
    }
}

/// A parsed path template document
#[derive(Debug, Clone)]
pub struct OpenApiTemplate {
    /// The template with every placeholder path removed
    skeleton: Map<String, Value>,
    /// Placeholder path items by kind
    paths: IndexMap<PathTemplate, Value>,
}

impl OpenApiTemplate {
    /// The template compiled into the crate
    pub fn embedded() -> Result<Self> {
        let content = TEMPLATES
            .get_file(DEFAULT_TEMPLATE)
            .and_then(|file| file.contents_utf8())
            .ok_or_else(|| SchemaError::Template(format!("embedded {} is missing", DEFAULT_TEMPLATE)))?;
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(value)
    }

    /// Load a template from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SchemaError::Template(format!("cannot read {}: {}", path.display(), e))
        })?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| SchemaError::Template(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded OpenAPI template {}", path.display());
        Self::from_value(value)
    }

    /// Split a template document into its skeleton and placeholder paths
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut skeleton) = value else {
            return Err(SchemaError::Template("template must be a JSON object".to_string()));
        };
        if !skeleton.get("openapi").map_or(false, Value::is_string) {
            return Err(SchemaError::Template("missing 'openapi' version".to_string()));
        }
        let registry_properties = skeleton
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.get("RegistryEntity"))
            .and_then(|r| r.get("properties"))
            .map_or(false, Value::is_object);
        if !registry_properties {
            return Err(SchemaError::Template(
                "missing 'components.schemas.RegistryEntity.properties'".to_string(),
            ));
        }

        let template_paths = match skeleton.get("paths") {
            Some(Value::Object(paths)) => paths.clone(),
            _ => return Err(SchemaError::Template("missing 'paths'".to_string())),
        };

        let mut paths = IndexMap::new();
        let mut kept = Map::new();
        for (path, item) in template_paths {
            match PathTemplate::from_pattern(&path) {
                Some(kind) => {
                    paths.insert(kind, item);
                }
                None => {
                    kept.insert(path, item);
                }
            }
        }
        if !paths.contains_key(&PathTemplate::Root) {
            return Err(SchemaError::Template("missing root path '/'".to_string()));
        }
        skeleton.insert("paths".to_string(), Value::Object(kept));

        Ok(Self { skeleton, paths })
    }

    /// The template path item for a kind, if the template has one
    pub fn path_item(&self, kind: PathTemplate) -> Option<&Value> {
        self.paths.get(&kind)
    }

    /// The template document without its placeholder paths
    pub fn skeleton(&self) -> &Map<String, Value> {
        &self.skeleton
    }
}

/// Replace placeholders in `$ref` values and `operationId` strings only
pub fn specialize(node: &mut Value, references: &[(&str, String)], operations: &[(&str, String)]) {
    match node {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                match value {
                    Value::String(text) if key == "$ref" => replace_all(text, references),
                    Value::String(text) if key == "operationId" => replace_all(text, operations),
                    _ => specialize(value, references, operations),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                specialize(item, references, operations);
            }
        }
        _ => {}
    }
}

fn replace_all(text: &mut String, substitutions: &[(&str, String)]) {
    for (placeholder, replacement) in substitutions {
        if text.contains(placeholder) {
            *text = text.replace(placeholder, replacement);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedded_template_has_every_kind() {
        let template = OpenApiTemplate::embedded().unwrap();
        for kind in PathTemplate::ALL {
            assert!(template.path_item(kind).is_some(), "missing {:?}", kind);
        }
        let kept = template.skeleton()["paths"].as_object().unwrap();
        assert!(kept.keys().all(|p| !p.contains("{%-")));
    }

    #[test]
    fn test_pattern_round_trip() {
        assert_eq!(
            PathTemplate::from_pattern("/{%-groupNamePlural-%}/{groupid}/{%-resourceNamePlural-%}/{resourceid}$details"),
            Some(PathTemplate::Details)
        );
        assert_eq!(PathTemplate::from_pattern("/model"), None);
    }

    #[test]
    fn test_concrete_paths() {
        assert_eq!(PathTemplate::Groups.concrete_path("endpoints", "messages"), "/endpoints");
        assert_eq!(
            PathTemplate::Version.concrete_path("endpoints", "messages"),
            "/endpoints/{groupid}/messages/{resourceid}/versions/{versionid}"
        );
        assert_eq!(
            PathTemplate::Meta.concrete_path("endpoints", "messages"),
            "/endpoints/{groupid}/messages/{resourceid}/meta"
        );
    }

    #[test]
    fn test_template_errors() {
        assert!(matches!(
            OpenApiTemplate::from_value(json!({"paths": {"/": {}}})),
            Err(SchemaError::Template(_))
        ));
        let no_root = json!({
            "openapi": "3.0.3",
            "paths": {},
            "components": {"schemas": {"RegistryEntity": {"properties": {}}}}
        });
        let err = OpenApiTemplate::from_value(no_root).unwrap_err();
        assert!(err.to_string().contains("root path"));
    }

    #[test]
    fn test_specialize_only_refs_and_operation_ids() {
        let mut item = json!({
            "get": {
                "operationId": "get{%-groupNamePlural-%}",
                "summary": "List {%-groupNamePlural-%}",
                "responses": {"200": {"content": {"application/json": {"schema": {
                    "$ref": "{%-groupTypeReference-%}"
                }}}}}
            }
        });
        specialize(
            &mut item,
            &[(GROUP_TYPE_REFERENCE, "#/components/schemas/endpoint".to_string())],
            &[(GROUP_NAME_PLURAL, "Endpoints".to_string())],
        );
        assert_eq!(item["get"]["operationId"], "getEndpoints");
        assert_eq!(item["get"]["summary"], "List {%-groupNamePlural-%}");
        assert_eq!(
            item["get"]["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/endpoint"
        );
    }
}
