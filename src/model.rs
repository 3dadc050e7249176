//! Model Definition types
//!
//! The typed, format-neutral input tree: groups of resources, each carrying
//! attribute declarations. Built from a fully resolved document (see
//! [`crate::resolver`]) and read-only from then on.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SchemaError};

/// Attribute name reserved for "any additional key"
pub const WILDCARD: &str = "*";

// =============================================================================
// Attribute Types
// =============================================================================

/// The fixed set of attribute type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Object,
    Map,
    Array,
    Uri,
    Url,
    Xid,
    Datetime,
    Integer,
    Uinteger,
    Boolean,
    Uritemplate,
    Binary,
    Timestamp,
    Any,
    Var,
}

impl AttributeType {
    /// All type tags, in declaration order
    pub const ALL: [AttributeType; 16] = [
        AttributeType::String,
        AttributeType::Object,
        AttributeType::Map,
        AttributeType::Array,
        AttributeType::Uri,
        AttributeType::Url,
        AttributeType::Xid,
        AttributeType::Datetime,
        AttributeType::Integer,
        AttributeType::Uinteger,
        AttributeType::Boolean,
        AttributeType::Uritemplate,
        AttributeType::Binary,
        AttributeType::Timestamp,
        AttributeType::Any,
        AttributeType::Var,
    ];

    /// The tag as written in model files
    pub fn tag(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Object => "object",
            AttributeType::Map => "map",
            AttributeType::Array => "array",
            AttributeType::Uri => "uri",
            AttributeType::Url => "url",
            AttributeType::Xid => "xid",
            AttributeType::Datetime => "datetime",
            AttributeType::Integer => "integer",
            AttributeType::Uinteger => "uinteger",
            AttributeType::Boolean => "boolean",
            AttributeType::Uritemplate => "uritemplate",
            AttributeType::Binary => "binary",
            AttributeType::Timestamp => "timestamp",
            AttributeType::Any => "any",
            AttributeType::Var => "var",
        }
    }

    /// Types with no shape constraint at all
    pub fn is_open(&self) -> bool {
        matches!(self, AttributeType::Any | AttributeType::Var)
    }
}

// =============================================================================
// Attributes
// =============================================================================

/// A single attribute declaration.
///
/// Also used for `item` declarations, which share the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AttributeType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Contained shape of an object, map or array
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Box<Attribute>>,

    /// Named nested fields of an object
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, Attribute>,

    /// Conditional sibling attributes keyed by the literal value of this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifvalues: Option<IndexMap<String, IfValue>>,

    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(default = "default_true")]
    pub strict: bool,
}

/// Sibling attributes that apply when an attribute has a given value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IfValue {
    #[serde(default)]
    pub siblingattributes: IndexMap<String, Attribute>,
}

impl Default for Attribute {
    fn default() -> Self {
        Self {
            kind: None,
            description: None,
            required: false,
            default: None,
            item: None,
            attributes: IndexMap::new(),
            ifvalues: None,
            enum_values: None,
            strict: default_true(),
        }
    }
}

impl Attribute {
    /// Resolve the type tag, treating an untyped wildcard as `any`
    pub fn resolved_kind(&self, name: &str) -> Result<AttributeType> {
        match self.kind {
            Some(kind) => Ok(kind),
            None if name == WILDCARD => Ok(AttributeType::Any),
            None => Err(SchemaError::MissingType {
                attribute: name.to_string(),
            }),
        }
    }

    /// The description, if present and non-empty
    pub fn doc(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }

    /// Required attributes with a default are not enforced
    pub fn is_enforced_required(&self) -> bool {
        self.required && self.default.is_none()
    }

    /// Conditional variants, ignoring an empty `ifvalues` map
    pub fn conditions(&self) -> Option<&IndexMap<String, IfValue>> {
        self.ifvalues.as_ref().filter(|variants| !variants.is_empty())
    }

    /// Nested field declarations of an object, either direct or via `item`
    pub fn object_fields(&self) -> Option<&IndexMap<String, Attribute>> {
        if !self.attributes.is_empty() {
            return Some(&self.attributes);
        }
        self.item
            .as_deref()
            .map(|item| &item.attributes)
            .filter(|attrs| !attrs.is_empty())
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Resources and Groups
// =============================================================================

/// A resource type declared inside a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub singular: String,

    #[serde(default)]
    pub plural: String,

    #[serde(default)]
    pub attributes: IndexMap<String, Attribute>,

    #[serde(default = "default_true")]
    pub hasdocument: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxversions: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<i64>,
}

impl Default for Resource {
    fn default() -> Self {
        Self {
            singular: String::new(),
            plural: String::new(),
            attributes: IndexMap::new(),
            hasdocument: default_true(),
            maxversions: None,
            versions: None,
        }
    }
}

impl Resource {
    /// Whether the resource keeps a version history (`1` means unversioned)
    pub fn is_versioned(&self) -> bool {
        self.maxversions.or(self.versions).unwrap_or(1) != 1
    }
}

/// A group type and the resource types it contains
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub singular: String,

    #[serde(default)]
    pub plural: String,

    #[serde(default)]
    pub attributes: IndexMap<String, Attribute>,

    #[serde(default)]
    pub resources: IndexMap<String, Resource>,

    /// Cross-group imports as `/<groupplural>/<resourceplural>`
    #[serde(default)]
    pub ximportresources: Vec<String>,
}

/// Root of the input tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(default)]
    pub groups: IndexMap<String, Group>,
}

/// A resource reached through a group, either declared there or imported
#[derive(Debug, Clone, Copy)]
pub struct ResourceRef<'a> {
    /// Group that declares the resource
    pub owner: &'a Group,
    pub resource: &'a Resource,
    pub imported: bool,
}

impl ModelDefinition {
    /// Build a model from a resolved document, filling in names.
    pub fn from_value(value: Value, source_name: &str) -> Result<Self> {
        let mut model: ModelDefinition =
            serde_json::from_value(value).map_err(|e| SchemaError::InvalidModel {
                source_name: source_name.to_string(),
                reason: e.to_string(),
            })?;
        model.normalize();
        Ok(model)
    }

    /// Default missing `singular`/`plural` names from the map keys
    pub fn normalize(&mut self) {
        for (key, group) in self.groups.iter_mut() {
            fill_names(key, &mut group.singular, &mut group.plural);
            for (resource_key, resource) in group.resources.iter_mut() {
                fill_names(resource_key, &mut resource.singular, &mut resource.plural);
            }
        }
    }

    /// Merge another model in; group types already present are kept.
    pub fn merge(&mut self, other: ModelDefinition) {
        for (key, group) in other.groups {
            if self.groups.contains_key(&key) {
                tracing::debug!("Group type '{}' already defined, keeping first definition", key);
                continue;
            }
            self.groups.insert(key, group);
        }
    }

    /// Group type names, lower-cased and sorted
    pub fn sorted_group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.keys().map(|k| k.to_lowercase()).collect();
        names.sort();
        names
    }

    /// Find a group by its plural name or map key
    pub fn find_group(&self, name: &str) -> Option<&Group> {
        self.groups
            .iter()
            .find(|(key, group)| group.plural == name || key.as_str() == name)
            .map(|(_, group)| group)
    }

    /// Resolve an import reference of the form `/<groupplural>/<resourceplural>`
    pub fn resolve_import(&self, group: &Group, reference: &str) -> Result<ResourceRef<'_>> {
        let unknown = || SchemaError::UnknownImport {
            group: group.plural.clone(),
            reference: reference.to_string(),
        };
        let mut parts = reference.trim_start_matches('/').splitn(2, '/');
        let (group_name, resource_name) = match (parts.next(), parts.next()) {
            (Some(g), Some(r)) if !g.is_empty() && !r.is_empty() => (g, r.trim_end_matches('/')),
            _ => return Err(unknown()),
        };
        let owner = self.find_group(group_name).ok_or_else(unknown)?;
        let resource = owner
            .resources
            .iter()
            .find(|(key, res)| res.plural == resource_name || key.as_str() == resource_name)
            .map(|(_, res)| res)
            .ok_or_else(unknown)?;
        Ok(ResourceRef {
            owner,
            resource,
            imported: true,
        })
    }

    /// Resources reachable from a group: its own, then (optionally) imports
    pub fn group_resources<'a>(
        &'a self,
        group: &'a Group,
        include_imports: bool,
    ) -> Result<Vec<ResourceRef<'a>>> {
        let mut refs: Vec<ResourceRef<'a>> = group
            .resources
            .values()
            .map(|resource| ResourceRef {
                owner: group,
                resource,
                imported: false,
            })
            .collect();
        if include_imports {
            for reference in &group.ximportresources {
                let imported = self.resolve_import(group, reference)?;
                if refs.iter().any(|r| r.resource.plural == imported.resource.plural) {
                    tracing::warn!(
                        "Group '{}' already has a '{}' collection, ignoring import {}",
                        group.plural,
                        imported.resource.plural,
                        reference
                    );
                    continue;
                }
                refs.push(imported);
            }
        }
        Ok(refs)
    }
}

fn fill_names(key: &str, singular: &mut String, plural: &mut String) {
    if plural.is_empty() {
        *plural = key.to_string();
    }
    if singular.is_empty() {
        *singular = key.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ModelDefinition {
        ModelDefinition::from_value(
            json!({
                "groups": {
                    "endpoints": {
                        "singular": "endpoint",
                        "ximportresources": ["/messagegroups/messages"],
                        "resources": {}
                    },
                    "messagegroups": {
                        "singular": "messagegroup",
                        "resources": {
                            "messages": {
                                "singular": "message",
                                "attributes": {
                                    "format": { "type": "string", "required": true }
                                }
                            }
                        }
                    }
                }
            }),
            "sample",
        )
        .unwrap()
    }

    #[test]
    fn test_names_default_from_keys() {
        let model = sample();
        let group = &model.groups["messagegroups"];
        assert_eq!(group.plural, "messagegroups");
        assert_eq!(group.singular, "messagegroup");
        assert_eq!(group.resources["messages"].plural, "messages");
    }

    #[test]
    fn test_unknown_type_tag_is_rejected() {
        let err = ModelDefinition::from_value(
            json!({"groups": {"g": {"attributes": {"a": {"type": "decimal"}}}}}),
            "bad.json",
        )
        .unwrap_err();
        match err {
            SchemaError::InvalidModel { source_name, reason } => {
                assert_eq!(source_name, "bad.json");
                assert!(reason.contains("decimal"), "{}", reason);
            }
            other => panic!("Expected InvalidModel, got {:?}", other),
        }
    }

    #[test]
    fn test_versioning_defaults() {
        let mut resource = Resource::default();
        assert!(!resource.is_versioned());
        resource.maxversions = Some(0);
        assert!(resource.is_versioned());
        resource.maxversions = None;
        resource.versions = Some(1);
        assert!(!resource.is_versioned());
        resource.versions = Some(5);
        assert!(resource.is_versioned());
    }

    #[test]
    fn test_defaults_match_deserialized_defaults() {
        let parsed: Attribute = serde_json::from_value(json!({})).unwrap();
        let built = Attribute::default();
        assert!(parsed.strict);
        assert_eq!(built.strict, parsed.strict);
        assert_eq!(built.required, parsed.required);

        let parsed: Resource = serde_json::from_value(json!({})).unwrap();
        let built = Resource::default();
        assert!(parsed.hasdocument);
        assert_eq!(built.hasdocument, parsed.hasdocument);
        assert_eq!(built.is_versioned(), parsed.is_versioned());
    }

    #[test]
    fn test_merge_keeps_first_group() {
        let mut model = sample();
        let other = ModelDefinition::from_value(
            json!({"groups": {
                "messagegroups": {"singular": "other"},
                "schemagroups": {"singular": "schemagroup"}
            }}),
            "other",
        )
        .unwrap();
        model.merge(other);
        assert_eq!(model.groups["messagegroups"].singular, "messagegroup");
        assert!(model.groups.contains_key("schemagroups"));
        assert_eq!(
            model.sorted_group_names(),
            vec!["endpoints", "messagegroups", "schemagroups"]
        );
    }

    #[test]
    fn test_group_resources_with_imports() {
        let model = sample();
        let endpoints = &model.groups["endpoints"];
        let refs = model.group_resources(endpoints, true).unwrap();
        assert_eq!(refs.len(), 1);
        assert!(refs[0].imported);
        assert_eq!(refs[0].owner.singular, "messagegroup");
        assert_eq!(refs[0].resource.singular, "message");

        assert!(model.group_resources(endpoints, false).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_import_is_an_error() {
        let model = sample();
        let group = &model.groups["endpoints"];
        assert!(matches!(
            model.resolve_import(group, "/messagegroups/nope"),
            Err(SchemaError::UnknownImport { .. })
        ));
        assert!(model.resolve_import(group, "garbage").is_err());
    }

    #[test]
    fn test_missing_type_only_allowed_for_wildcard() {
        let attr = Attribute::default();
        assert_eq!(attr.resolved_kind(WILDCARD).unwrap(), AttributeType::Any);
        assert!(matches!(
            attr.resolved_kind("name"),
            Err(SchemaError::MissingType { .. })
        ));
    }
}
