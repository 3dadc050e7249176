//! End-to-end generator tests
//!
//! Runs the full pipeline (resolve, merge, compile) over the model fixtures
//! and checks the generated JSON Schema, Avro and OpenAPI documents.

use std::path::PathBuf;

use rstest::rstest;
use serde_json::{json, Value};
use xregistry_schemas::config::OutputFormat;
use xregistry_schemas::emit::json_schema::compile_validator;
use xregistry_schemas::pipeline::render;
use xregistry_schemas::{
    compile_model, generate, load_model, GeneratorConfig, ModelDefinition, SchemaError, TargetFormat,
};

fn fixture(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

fn message_model() -> PathBuf {
    fixture("message/model.json")
}

/// Messages, then endpoints importing them
fn registry_inputs() -> Vec<PathBuf> {
    vec![message_model(), fixture("endpoint/model.json")]
}

fn field<'a>(record: &'a Value, name: &str) -> &'a Value {
    record["fields"]
        .as_array()
        .and_then(|fields| fields.iter().find(|f| f["name"] == name))
        .unwrap_or_else(|| panic!("no field '{}' in {}", name, record["name"]))
}

// =============================================================================
// Avro
// =============================================================================

#[test]
fn test_avro_end_to_end() {
    let doc = generate(TargetFormat::AvroSchema, &[message_model()], &GeneratorConfig::default()).unwrap();

    assert_eq!(doc["name"], "DocumentType");
    assert_eq!(doc["namespace"], "io.xregistry");
    assert_eq!(doc["fields"][0]["name"], "genericRecordDefinition");
    assert_eq!(doc["fields"][0]["type"]["items"]["name"], "GenericRecord");

    let text = serde_json::to_string(&doc).unwrap();
    assert_eq!(text.matches("\"name\":\"GenericRecord\"").count(), 1);

    let group = &field(&doc, "messagegroups")["type"]["values"];
    assert_eq!(group["name"], "MessagegroupType");
    assert_eq!(field(group, "envelope")["type"], "string");

    let message = &field(group, "messages")["type"]["values"];
    assert_eq!(message["name"], "MessageType");
    let versions = field(message, "versions")["type"].as_array().unwrap();
    let version = &versions[0]["values"];
    assert_eq!(version["name"], "MessageVersionType");
    assert_eq!(field(version, "dataschema")["type"], "io.xregistry.GenericRecord");
    assert_eq!(field(version, "dataschema")["doc"], "Schema of the message payload");

    let format = field(version, "format")["type"].as_array().unwrap();
    assert_eq!(format[0]["name"], "MessageFormatCloudevents10Type");
    let metadata = &field(&format[0], "metadata")["type"];
    assert_eq!(metadata["name"], "MessageFormatCloudevents10MetadataType");
    assert_eq!(field(metadata, "Extensions")["type"]["values"], "io.xregistry.GenericRecord");

    apache_avro::Schema::parse(&doc).unwrap();
}

#[rstest]
#[case::maxversions(json!({"singular": "message", "maxversions": 1, "attributes": {
    "dataschema": {"type": "any"}
}}))]
#[case::default_versions(json!({"singular": "message", "attributes": {
    "dataschema": {"type": "any"}
}}))]
fn test_avro_unversioned_resource(#[case] messages: Value) {
    let model = ModelDefinition::from_value(
        json!({"groups": {"messagegroups": {
            "singular": "messagegroup",
            "resources": {"messages": messages}
        }}}),
        "unversioned",
    )
    .unwrap();
    let doc = compile_model(TargetFormat::AvroSchema, &model, &GeneratorConfig::default()).unwrap();

    assert_eq!(doc["fields"][0]["name"], "genericRecordDefinition");
    let group = &field(&doc, "messagegroups")["type"]["values"];
    let message = &field(group, "messages")["type"]["values"];
    assert_eq!(message["name"], "MessageType");
    assert_eq!(field(message, "dataschema")["type"], "io.xregistry.GenericRecord");
    assert!(message["fields"]
        .as_array()
        .unwrap()
        .iter()
        .all(|f| f["name"] != "versions"));

    apache_avro::Schema::parse(&doc).unwrap();
}

#[test]
fn test_avro_with_imported_collection() {
    let doc = generate(TargetFormat::AvroSchema, &registry_inputs(), &GeneratorConfig::default()).unwrap();
    let endpoint = &field(&doc, "endpoints")["type"]["values"];
    assert_eq!(field(endpoint, "messages")["type"]["values"], "MessageType");
    assert_eq!(
        field(endpoint, "config")["type"]["name"],
        "EndpointConfigType"
    );
    apache_avro::Schema::parse(&doc).unwrap();
}

// =============================================================================
// JSON Schema
// =============================================================================

#[test]
fn test_json_schema_end_to_end() {
    let doc = generate(TargetFormat::JsonSchema, &[message_model()], &GeneratorConfig::default()).unwrap();

    assert_eq!(doc["$id"], "http://xregistry.io/schema/messagegroups");
    let message = &doc["definitions"]["message"];
    let branches = message["oneOf"].as_array().unwrap();
    assert_eq!(branches[0]["required"], json!(["versionsurl", "versionscount"]));
    assert_eq!(
        branches[1]["properties"]["versions"]["additionalProperties"]["$ref"],
        "#/definitions/messageVersion"
    );

    let version = &doc["definitions"]["messageVersion"];
    let first = version["properties"].as_object().unwrap().keys().next().cloned();
    assert_eq!(first.as_deref(), Some("versionid"));
    assert_eq!(version["properties"]["dataschema"]["type"], "object");
    assert_eq!(version["required"], json!(["format"]));
}

fn message_instance(version: Value) -> Value {
    json!({"messagegroups": {"g1": {
        "messagegroupid": "g1",
        "messages": {"m1": {"messageid": "m1", "versions": {"1": version}}}
    }}})
}

#[rstest]
#[case::cloudevents_with_metadata(json!({"format": "CloudEvents/1.0", "metadata": {"type": "com.example"}}), true)]
#[case::cloudevents_without_metadata(json!({"format": "CloudEvents/1.0"}), false)]
#[case::amqp(json!({"format": "AMQP/1.0", "amqp": {"properties": {"to": "queue"}}}), true)]
#[case::unconditioned_value(json!({"format": "MQTT/5.0"}), true)]
#[case::missing_format(json!({"basemessageurl": "http://example.com/m"}), false)]
fn test_ifvalues_instances(#[case] version: Value, #[case] valid: bool) {
    let doc = generate(TargetFormat::JsonSchema, &[message_model()], &GeneratorConfig::default()).unwrap();
    let validator = compile_validator(&doc).unwrap();
    assert_eq!(validator.is_valid(&message_instance(version)), valid);
}

#[rstest]
#[case::inline_versions(json!({"versions": {}}), true)]
#[case::linked_versions(json!({"versionsurl": "http://example.com/v", "versionscount": 2}), true)]
#[case::url_without_count(json!({"versionsurl": "http://example.com/v"}), false)]
#[case::both(json!({"versions": {}, "versionsurl": "http://example.com/v", "versionscount": 2}), false)]
#[case::neither(json!({}), false)]
fn test_versions_are_exclusive(#[case] message: Value, #[case] valid: bool) {
    let doc = generate(TargetFormat::JsonSchema, &[message_model()], &GeneratorConfig::default()).unwrap();
    let validator = compile_validator(&doc).unwrap();
    let instance = json!({"messagegroups": {"g1": {"messages": {"m1": message}}}});
    assert_eq!(validator.is_valid(&instance), valid);
}

#[test]
fn test_includes_and_resource_uris_are_resolved() {
    let inputs = vec![fixture("schema/model.json"), fixture("message/model.json"), fixture("endpoint/model.json")];
    let doc = generate(TargetFormat::JsonSchema, &inputs, &GeneratorConfig::default()).unwrap();

    assert_eq!(
        doc["$id"],
        "http://xregistry.io/schema/endpoints-messagegroups-schemagroups"
    );
    let endpoint = &doc["definitions"]["endpoint"];
    assert_eq!(
        endpoint["properties"]["usage"]["enum"],
        json!(["subscriber", "producer", "consumer"])
    );
    assert_eq!(endpoint["required"], json!(["usage"]));
    assert_eq!(
        endpoint["properties"]["messages"]["additionalProperties"]["$ref"],
        "#/definitions/message"
    );

    let schema_version = &doc["definitions"]["schemaVersion"];
    assert_eq!(schema_version["properties"]["validation"]["default"], false);
}

#[test]
fn test_directory_input() {
    let model = load_model(&[fixture("")], &GeneratorConfig::default()).unwrap();
    let names: Vec<_> = model.groups.keys().cloned().collect();
    assert_eq!(names, vec!["endpoints", "messagegroups", "schemagroups"]);
}

// =============================================================================
// OpenAPI
// =============================================================================

#[test]
fn test_openapi_end_to_end() {
    let doc = generate(TargetFormat::OpenApi, &registry_inputs(), &GeneratorConfig::default()).unwrap();
    assert_eq!(doc["openapi"], "3.0.3");

    let paths = doc["paths"].as_object().unwrap();
    for path in [
        "/",
        "/messagegroups",
        "/messagegroups/{groupid}/messages",
        "/messagegroups/{groupid}/messages/{resourceid}/versions",
        "/endpoints/{groupid}/messages/{resourceid}",
    ] {
        assert!(paths.contains_key(path), "missing path {}", path);
    }
    assert!(paths.keys().all(|p| !p.contains("{%-")));
    assert_eq!(
        doc["paths"]["/endpoints/{groupid}/messages/{resourceid}/versions/{versionid}"]["get"]["operationId"],
        "getEndpointMessageVersion"
    );

    let schemas = &doc["components"]["schemas"];
    assert_eq!(schemas["messageVersion"]["discriminator"]["propertyName"], "format");
    assert_eq!(
        schemas["messageVersion"]["discriminator"]["mapping"]["AMQP/1.0"],
        "#/components/schemas/format_AMQP_1_0"
    );
    assert!(schemas.get("format_CloudEvents_1_0").is_some());
    assert_eq!(schemas["RegistryEntity"]["properties"]["messagegroupscount"]["type"], "integer");
}

// =============================================================================
// Errors and determinism
// =============================================================================

#[rstest]
#[case(TargetFormat::JsonSchema)]
#[case(TargetFormat::AvroSchema)]
#[case(TargetFormat::OpenApi)]
fn test_wildcard_ifvalues_is_rejected(#[case] format: TargetFormat) {
    let err = generate(format, &[fixture("invalid/wildcard-ifvalues.json")], &GeneratorConfig::default())
        .unwrap_err();
    assert!(matches!(err, SchemaError::WildcardIfValues { .. }), "{}", err);
}

#[rstest]
#[case(TargetFormat::JsonSchema)]
#[case(TargetFormat::AvroSchema)]
#[case(TargetFormat::OpenApi)]
fn test_output_is_deterministic(#[case] format: TargetFormat) {
    let config = GeneratorConfig::default();
    let first = generate(format, &registry_inputs(), &config).unwrap();
    let second = generate(format, &registry_inputs(), &config).unwrap();
    assert_eq!(
        render(&first, OutputFormat::Pretty).unwrap(),
        render(&second, OutputFormat::Pretty).unwrap()
    );
}

#[test]
fn test_unknown_import_is_rejected() {
    let err = generate(
        TargetFormat::JsonSchema,
        &[fixture("endpoint/model.json")],
        &GeneratorConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::UnknownImport { .. }), "{}", err);
}

#[test]
fn test_missing_input_is_a_resolution_error() {
    let err = generate(
        TargetFormat::JsonSchema,
        &[fixture("nope/model.json")],
        &GeneratorConfig::default(),
    )
    .unwrap_err();
    assert!(err.is_resolution_error(), "{}", err);
}

// =============================================================================
// Type mapping
// =============================================================================

fn single_attribute_model(tag: &str) -> ModelDefinition {
    ModelDefinition::from_value(
        json!({"groups": {"gs": {"singular": "g", "attributes": {"a": {"type": tag}}}}}),
        "mapping",
    )
    .unwrap()
}

#[rstest]
#[case("string", json!({"type": "string"}), json!("string"))]
#[case("uri", json!({"type": "string", "format": "uri"}), json!("string"))]
#[case("url", json!({"type": "string", "format": "uri"}), json!("string"))]
#[case("xid", json!({"type": "string", "format": "uri"}), json!("string"))]
#[case("datetime", json!({"type": "string", "format": "date-time"}), json!({"type": "int", "logicalType": "time-millis"}))]
#[case("timestamp", json!({"type": "string", "format": "date-time"}), json!({"type": "long", "logicalType": "timestamp-millis"}))]
#[case("integer", json!({"type": "integer"}), json!("int"))]
#[case("uinteger", json!({"type": "integer", "minimum": 0}), json!("int"))]
#[case("boolean", json!({"type": "boolean"}), json!("boolean"))]
#[case("uritemplate", json!({"type": "string", "format": "uri-template"}), json!("string"))]
#[case("binary", json!({"type": "string", "format": "base64"}), json!("bytes"))]
#[case("any", json!({"type": "object"}), json!("io.xregistry.GenericRecord"))]
#[case("var", json!({"type": "object"}), json!("io.xregistry.GenericRecord"))]
#[case("object", json!({"type": "object"}), json!("io.xregistry.GenericRecord"))]
fn test_type_mapping(#[case] tag: &str, #[case] json_type: Value, #[case] avro_type: Value) {
    let model = single_attribute_model(tag);
    let config = GeneratorConfig::default();

    let schema = compile_model(TargetFormat::JsonSchema, &model, &config).unwrap();
    assert_eq!(schema["definitions"]["g"]["properties"]["a"], json_type);

    let avro = compile_model(TargetFormat::AvroSchema, &model, &config).unwrap();
    let group = &field(&avro, "gs")["type"]["values"];
    assert_eq!(field(group, "a")["type"], avro_type);
}
