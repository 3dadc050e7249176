//! Avro attribute compiler
//!
//! Compiles attribute declarations into Avro record fields. Avro names are
//! global within a schema, so every named type derived from an attribute is
//! prefixed with the Pascal name of the record that owns it. Open shapes
//! reference the generic record by its full name.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::config::AvroConfig;
use crate::error::{Result, SchemaError};
use crate::mapping;
use crate::model::{Attribute, AttributeType, IfValue, WILDCARD};
use crate::names::{camel, pascal, sanitize_identifier};

/// Name of the field collecting wildcard (extension) attributes
pub const EXTENSIONS_FIELD: &str = "Extensions";

/// Avro compiler state for one document
pub struct AvroCompiler {
    /// Full name of the generic record
    generic_fullname: String,
    /// The document carries a generic record definition
    generic_defined: bool,
    /// Some attribute referenced the generic record
    generic_used: bool,
    /// Resource singulars whose records have been emitted
    compiled_resources: HashSet<String>,
    /// Every record name taken in the document namespace
    type_names: HashSet<String>,
}

impl AvroCompiler {
    pub fn new(config: &AvroConfig, generic_defined: bool) -> Self {
        Self {
            generic_fullname: config.generic_record_fullname(),
            generic_defined,
            generic_used: false,
            compiled_resources: HashSet::new(),
            type_names: HashSet::new(),
        }
    }

    /// Record that a resource is being emitted; false if it already was
    pub fn claim_resource(&mut self, singular: &str) -> bool {
        self.compiled_resources.insert(singular.to_string())
    }

    /// Take a fixed record name; the model owner is named on a clash
    pub fn reserve_name(&mut self, name: &str, owner: &str) -> Result<()> {
        if self.type_names.insert(name.to_string()) {
            Ok(())
        } else {
            Err(SchemaError::DuplicateTypeName {
                name: name.to_string(),
                owner: owner.to_string(),
            })
        }
    }

    /// Take `<base>Type` for a derived record, numbering the base
    /// (`<base>2Type`, `<base>3Type`, ...) until the name is free.
    /// Returns the base actually used.
    fn unique_base(&mut self, base: String) -> String {
        let mut candidate = base.clone();
        let mut counter = 2;
        while !self.type_names.insert(format!("{}Type", candidate)) {
            candidate = format!("{}{}", base, counter);
            counter += 1;
        }
        if candidate != base {
            tracing::debug!("Record name {}Type is taken, using {}Type", base, candidate);
        }
        candidate
    }

    /// Check that every use of the generic record is covered by a definition
    pub fn finish(&self) -> Result<()> {
        if self.generic_used && !self.generic_defined {
            return Err(SchemaError::Internal(format!(
                "{} is referenced but was not defined",
                self.generic_fullname
            )));
        }
        Ok(())
    }

    fn generic_reference(&mut self) -> Value {
        self.generic_used = true;
        json!(self.generic_fullname)
    }

    // =========================================================================
    // Fields
    // =========================================================================

    /// Compile attributes into `fields`, naming nested types after `prefix`
    pub fn compile_fields(
        &mut self,
        fields: &mut Vec<Value>,
        attributes: &IndexMap<String, Attribute>,
        prefix: &str,
    ) -> Result<()> {
        for (name, attr) in attributes {
            if name == WILDCARD && attr.ifvalues.is_some() {
                return Err(SchemaError::WildcardIfValues {
                    context: prefix.to_string(),
                });
            }

            let field = if let Some(conditions) = attr.conditions() {
                let field_name = camel(name);
                fields.retain(|f| f["name"] != field_name.as_str());
                let variants = self.compile_conditions(name, conditions, prefix)?;
                json!({ "name": field_name, "type": variants })
            } else if name == WILDCARD {
                let kind = attr.resolved_kind(name)?;
                let values = self.compile_shape(name, "ExtensionItem", kind, attr, prefix)?;
                json!({
                    "name": EXTENSIONS_FIELD,
                    "type": {"type": "map", "values": values},
                    "default": {}
                })
            } else {
                let kind = attr.resolved_kind(name)?;
                let field_type = self.compile_shape(name, &pascal(name), kind, attr, prefix)?;
                let mut field = json!({ "name": camel(name), "type": field_type });
                if let Some(default) = attr.default.as_ref().and_then(|d| field_default(kind, d)) {
                    field["default"] = default;
                }
                field
            };

            let field = match (field, attr.doc()) {
                (Value::Object(mut map), Some(doc)) => {
                    map.insert("doc".to_string(), json!(doc));
                    Value::Object(map)
                }
                (field, _) => field,
            };
            fields.push(field);
        }
        Ok(())
    }

    /// One record per condition value; the attribute becomes their union
    fn compile_conditions(
        &mut self,
        name: &str,
        conditions: &IndexMap<String, IfValue>,
        prefix: &str,
    ) -> Result<Vec<Value>> {
        let attr_name = pascal(name);
        let mut union = Vec::with_capacity(conditions.len());
        for (value, condition) in conditions {
            let identifier = format!("{}{}", attr_name, pascal(&sanitize_identifier(value)));
            let record_prefix = self.unique_base(format!("{}{}", prefix, identifier));
            let mut variant_fields = Vec::new();
            self.compile_fields(&mut variant_fields, &condition.siblingattributes, &record_prefix)?;
            union.push(json!({
                "type": "record",
                "name": format!("{}Type", record_prefix),
                "fields": variant_fields
            }));
        }
        Ok(union)
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Avro type of an attribute (or item) shape.
    ///
    /// `stem` is the Pascal name used for any named type derived here; items
    /// extend their owner's stem with `Item`.
    fn compile_shape(
        &mut self,
        name: &str,
        stem: &str,
        kind: AttributeType,
        attr: &Attribute,
        prefix: &str,
    ) -> Result<Value> {
        match kind {
            AttributeType::Object => match attr.object_fields() {
                Some(fields) => {
                    let record_prefix = self.unique_base(format!("{}{}", prefix, stem));
                    let mut record_fields = Vec::new();
                    self.compile_fields(&mut record_fields, fields, &record_prefix)?;
                    Ok(json!({
                        "type": "record",
                        "name": format!("{}Type", record_prefix),
                        "fields": record_fields
                    }))
                }
                None => Ok(self.generic_reference()),
            },
            AttributeType::Any | AttributeType::Var => Ok(self.generic_reference()),
            AttributeType::Map | AttributeType::Array => {
                let item = attr.item.as_deref().ok_or_else(|| SchemaError::MissingItem {
                    attribute: name.to_string(),
                    kind: kind.tag().to_string(),
                })?;
                let item_kind = item.kind.ok_or_else(|| SchemaError::MissingItemType {
                    attribute: name.to_string(),
                    kind: kind.tag().to_string(),
                })?;
                let contained = self.compile_shape(name, &format!("{}Item", stem), item_kind, item, prefix)?;
                Ok(if kind == AttributeType::Map {
                    json!({"type": "map", "values": contained})
                } else {
                    json!({"type": "array", "items": contained})
                })
            }
            other => Ok(mapping::avro_type(other)),
        }
    }
}

/// Field default, kept only when it matches the primitive Avro type
fn field_default(kind: AttributeType, default: &Value) -> Option<Value> {
    let matches = match (mapping::avro_primitive(kind), default) {
        (Some("string"), Value::String(_)) => true,
        (Some("boolean"), Value::Bool(_)) => true,
        (Some("int"), Value::Number(n)) => n.as_i64().map_or(false, |v| i32::try_from(v).is_ok()),
        _ => false,
    };
    if matches {
        Some(default.clone())
    } else {
        tracing::debug!("Dropping Avro default {} for '{}' attribute", default, kind.tag());
        None
    }
}
