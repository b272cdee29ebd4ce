//! Library-level validation tests against a Catena-style schema document.

use std::fs;
use std::path::PathBuf;

use catena_schema::{
    load, parse_document, sha256_hex, validate, Format, LineRange, LoadError, LoaderOptions,
    Locator, Outcome, SchemaError, SchemaRegistry, ValidateError,
};
use serde_json::json;
use tempfile::TempDir;

const SCHEMA: &str = r##"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "title": "Catena device",
  "type": "object",
  "properties": {
    "slot": { "type": "integer", "minimum": 0 },
    "params": {
      "type": "object",
      "additionalProperties": { "$ref": "#/$defs/param" }
    }
  },
  "required": ["slot"],
  "$defs": {
    "$comment": "Catena interface schemata",
    "param": {
      "type": "object",
      "properties": {
        "type": { "enum": ["INT32", "FLOAT32", "STRING", "STRUCT"] },
        "value": true,
        "oid_aliases": { "type": "array", "items": { "type": "string" } },
        "params": {
          "type": "object",
          "additionalProperties": { "$ref": "#/$defs/param" }
        },
        "constraint": { "$ref": "#/$defs/constraint" }
      },
      "required": ["type"]
    },
    "constraint": {
      "type": "object",
      "properties": {
        "min_value": { "type": "number" },
        "max_value": { "type": "number" }
      }
    },
    "on_off": { "type": "string", "enum": ["on", "off"] },
    "level": { "type": "integer", "minimum": 0, "maximum": 10 }
  }
}
"##;

const PARAM_YAML: &str = "\
type: STRUCT
params:
  gain:
    type: FLOAT64
    value: 0.5
  name:
    type: STRING
";

const PARAM_JSON: &str = r#"{
  "type": "STRUCT",
  "params": {
    "gain": { "type": "FLOAT64", "value": 0.5 },
    "name": { "type": "STRING" }
  }
}
"#;

fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn registry(dir: &TempDir) -> SchemaRegistry {
    let path = write_temp_file(dir, "schema.json", SCHEMA);
    SchemaRegistry::load(path.to_str().unwrap(), &LoaderOptions::default()).unwrap()
}

fn load_path(path: &std::path::Path, digest: Option<&str>) -> Result<catena_schema::ParsedDocument, LoadError> {
    load(path.to_str().unwrap(), digest)
}

mod registration {
    use super::*;

    #[test]
    fn registers_definitions_in_order_without_comments() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, ["param", "constraint", "on_off", "level"]);
        assert!(!registry.contains("$comment"));
    }

    #[test]
    fn first_broken_definition_fails_registration() {
        let dir = TempDir::new().unwrap();
        let path = write_temp_file(
            &dir,
            "schema.json",
            r#"{
  "$defs": {
    "good": { "type": "string" },
    "bad": { "type": "nonsense" },
    "worse": { "minimum": "zero" }
  }
}"#,
        );

        let err = SchemaRegistry::load(path.to_str().unwrap(), &LoaderOptions::default())
            .unwrap_err();
        assert_eq!(err.fragment_name(), Some("bad"));
        assert_eq!(err.lines(), Some(LineRange::new(4, 4)));
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("at #/$defs/bad on lines 4-4"));
    }

    #[test]
    fn missing_schema_document_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        let err = SchemaRegistry::load(path.to_str().unwrap(), &LoaderOptions::default())
            .unwrap_err();
        assert!(matches!(err, SchemaError::Load(LoadError::FileNotFound { .. })));
        assert_eq!(err.exit_code(), 3);
    }
}

mod validation {
    use super::*;

    #[test]
    fn valid_document_returned_unchanged() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let path = write_temp_file(
            &dir,
            "param.volume.yaml",
            "type: INT32\nvalue: 7\noid_aliases: [vol, volume]\n",
        );
        let document = load_path(&path, None).unwrap();

        let outcome = validate(&registry, "param", &document).unwrap();
        assert_eq!(
            outcome,
            Outcome::Valid {
                data: json!({ "type": "INT32", "value": 7, "oid_aliases": ["vol", "volume"] })
            }
        );
    }

    #[test]
    fn accepted_data_validates_again_unchanged() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let path = write_temp_file(
            &dir,
            "param.volume.yaml",
            "type: STRUCT\nparams:\n  gain:\n    type: FLOAT32\n    value: 0.5\n",
        );
        let document = load_path(&path, None).unwrap();

        let first = validate(&registry, "param", &document).unwrap();
        let data = first.data().unwrap().clone();

        let text = serde_json::to_string_pretty(&data).unwrap();
        let again = parse_document(&text, Format::Json, "accepted.json").unwrap();
        let second = validate(&registry, "param", &again).unwrap();

        assert_eq!(second, Outcome::Valid { data: data.clone() });
        assert_eq!(data, document.value);
        assert_eq!(validate(&registry, "param", &document).unwrap(), first);
    }

    #[test]
    fn json_and_yaml_accept_the_same_data() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let yaml = write_temp_file(
            &dir,
            "param.mixer.yaml",
            "type: STRUCT\nparams:\n  gain:\n    type: FLOAT32\n    value: 0.5\n  name:\n    type: STRING\n",
        );
        let json = write_temp_file(
            &dir,
            "param.mixer.json",
            r#"{
  "type": "STRUCT",
  "params": {
    "gain": { "type": "FLOAT32", "value": 0.5 },
    "name": { "type": "STRING" }
  }
}"#,
        );

        let from_yaml = validate(&registry, "param", &load_path(&yaml, None).unwrap()).unwrap();
        let from_json = validate(&registry, "param", &load_path(&json, None).unwrap()).unwrap();

        assert!(from_yaml.is_valid());
        assert_eq!(from_yaml, from_json);
    }

    #[test]
    fn diagnostics_point_at_source_lines() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let path = write_temp_file(&dir, "param.mixer.yaml", PARAM_YAML);
        let document = load_path(&path, None).unwrap();

        let outcome = validate(&registry, "param", &document).unwrap();
        let diagnostics = outcome.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].path, "/params/gain/type");
        assert_eq!(diagnostics[0].keyword, "enum");
        assert_eq!(diagnostics[0].lines, Some(LineRange::new(4, 4)));
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn json_and_yaml_report_the_same_violations() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let yaml = load_path(&write_temp_file(&dir, "param.a.yaml", PARAM_YAML), None).unwrap();
        let json = load_path(&write_temp_file(&dir, "param.a.json", PARAM_JSON), None).unwrap();
        assert_eq!(yaml.format, Format::Yaml);
        assert_eq!(json.format, Format::Json);
        assert_eq!(yaml.value, json.value);

        let from_yaml = validate(&registry, "param", &yaml).unwrap();
        let from_json = validate(&registry, "param", &json).unwrap();
        let summary = |o: &Outcome| {
            o.diagnostics()
                .iter()
                .map(|d| (d.path.clone(), d.message.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(summary(&from_yaml), summary(&from_json));
        assert_eq!(from_json.diagnostics()[0].lines, Some(LineRange::new(4, 4)));
    }

    #[test]
    fn on_off_example() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        let bad = load_path(&write_temp_file(&dir, "on_off.state.json", "\"maybe\""), None).unwrap();
        let outcome = validate(&registry, "on_off", &bad).unwrap();
        let diagnostic = &outcome.diagnostics()[0];
        assert_eq!(diagnostic.path, "");
        assert_eq!(diagnostic.lines, Some(LineRange::new(1, 1)));

        let good = load_path(&write_temp_file(&dir, "on_off.state2.json", "\"on\""), None).unwrap();
        let outcome = validate(&registry, "on_off", &good).unwrap();
        assert_eq!(outcome.data(), Some(&json!("on")));
    }

    #[test]
    fn numeric_bound_violation_carries_limit() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let document = load_path(&write_temp_file(&dir, "level.x.json", "11"), None).unwrap();

        let outcome = validate(&registry, "level", &document).unwrap();
        let diagnostic = &outcome.diagnostics()[0];
        assert_eq!(diagnostic.keyword, "maximum");
        assert_eq!(diagnostic.limit, Some(json!(10)));
    }

    #[test]
    fn device_references_validate_whole_document() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let path = write_temp_file(
            &dir,
            "device.my-device.yaml",
            "slot: -1\nparams:\n  volume:\n    type: INT32\n",
        );
        let document = load_path(&path, None).unwrap();

        for reference in ["device", "device.my-device"] {
            let outcome = validate(&registry, reference, &document).unwrap();
            let diagnostics = outcome.diagnostics();
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].path, "/slot");
            assert_eq!(diagnostics[0].lines, Some(LineRange::new(1, 1)));
            assert_eq!(diagnostics[0].limit, Some(json!(0)));
        }
    }

    #[test]
    fn unknown_reference_is_lookup_error() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let document = load_path(&write_temp_file(&dir, "x.json", "{}"), None).unwrap();

        let err = validate(&registry, "nope", &document).unwrap_err();
        assert!(matches!(err, ValidateError::Lookup(_)));
        assert_eq!(err.to_string(), "could not find nope in schema definition file");
        assert_eq!(err.exit_code(), 2);
    }
}

mod integrity {
    use super::*;

    #[test]
    fn matching_digest_accepted_in_any_case() {
        let dir = TempDir::new().unwrap();
        let path = write_temp_file(&dir, "on_off.x.json", "\"off\"");
        let digest = sha256_hex(b"\"off\"").to_uppercase();
        assert!(load_path(&path, Some(&digest)).is_ok());
    }

    #[test]
    fn digest_checked_before_parsing() {
        let dir = TempDir::new().unwrap();
        let path = write_temp_file(&dir, "broken.json", "{ not json");
        let err = load_path(&path, Some(&"0".repeat(64))).unwrap_err();
        assert!(err.is_integrity_failure());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn malformed_input_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write_temp_file(&dir, "broken.json", "{ not json");
        let err = load_path(&path, None).unwrap_err();
        assert!(err.is_parse_failure());
        assert_eq!(err.format(), Some(Format::Json));
    }
}

#[cfg(feature = "remote")]
mod remote {
    use super::*;

    #[test]
    fn fetches_yaml_by_extension() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/param.on_off.yaml")
            .with_status(200)
            .with_body(PARAM_YAML)
            .create();

        let url = format!("{}/param.on_off.yaml", server.url());
        let locator = Locator::parse(&url).unwrap();
        assert!(locator.is_remote());
        assert_eq!(locator.file_name().as_deref(), Some("param.on_off.yaml"));

        let document = load(&url, None).unwrap();
        assert_eq!(document.format, Format::Yaml);
        assert_eq!(document.lines("/params/gain/type"), Some(LineRange::new(4, 4)));
    }

    #[test]
    fn not_found_is_network_error() {
        let mut server = mockito::Server::new();
        let _m = server.mock("GET", "/missing.json").with_status(404).create();

        let err = load(&format!("{}/missing.json", server.url()), None).unwrap_err();
        assert!(matches!(err, LoadError::NetworkError { .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn remote_schema_document() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/schema.json")
            .with_status(200)
            .with_body(SCHEMA)
            .create();

        let registry = SchemaRegistry::load(
            &format!("{}/schema.json", server.url()),
            &LoaderOptions::default(),
        )
        .unwrap();
        assert!(registry.contains("on_off"));
    }
}
