use std::path::Path;

use serde_json::Value;

use crate::config::schema::Settings;
use crate::error::ConfigError;
use crate::operation::Operation;

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = serde_json::from_str(content)?;
    validate_settings(&settings)?;
    Ok(settings)
}

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.max_upload_mb == 0 {
        return Err(ConfigError::Validation {
            message: "max_upload_mb must be greater than 0".to_string(),
        });
    }
    if settings.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be greater than 0".to_string(),
        });
    }
    if settings.job_timeout_secs == Some(0) {
        return Err(ConfigError::Validation {
            message: "job_timeout_secs must be greater than 0 when set".to_string(),
        });
    }
    Ok(())
}

/// Reads an operation list from a JSON or YAML file.
///
/// YAML is chosen by a `.yaml`/`.yml` extension, anything else is JSON.
pub fn load_operations<P: AsRef<Path>>(path: P) -> Result<Vec<Operation>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    let value: Value = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };

    parse_operations(value)
}

pub fn load_operations_from_str(content: &str) -> Result<Vec<Operation>, ConfigError> {
    let value: Value = serde_json::from_str(content)?;
    parse_operations(value)
}

/// Accepts a bare sequence of operations or an object holding one under
/// `operations`. Every element needs a string `type`.
pub fn parse_operations(value: Value) -> Result<Vec<Operation>, ConfigError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("operations") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ConfigError::Format {
                    message: "'operations' must be a list".to_string(),
                })
            }
            None => {
                return Err(ConfigError::Format {
                    message: "expected a list or an object with an 'operations' key".to_string(),
                })
            }
        },
        other => {
            return Err(ConfigError::Format {
                message: format!("expected a list of operations, found {}", value_kind(&other)),
            })
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let has_type = item
                .as_object()
                .and_then(|obj| obj.get("type"))
                .map(Value::is_string)
                .unwrap_or(false);
            if !has_type {
                return Err(ConfigError::Format {
                    message: format!("operation #{} has no string 'type'", index + 1),
                });
            }
            serde_json::from_value(item).map_err(ConfigError::from)
        })
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_bare_list() {
        let ops = parse_operations(json!([
            {"type": "set_page_size", "size_identifier": "A4"},
            {"type": "add_page_numbers"}
        ]))
        .unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].kind, "set_page_size");
        assert_eq!(ops[1].kind, "add_page_numbers");
    }

    #[test]
    fn test_parse_wrapped_list() {
        let ops = parse_operations(json!({"operations": [{"type": "rotate_pages"}]})).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, "rotate_pages");
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_operations(json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        for value in [
            json!({"steps": []}),
            json!({"operations": {"type": "x"}}),
            json!("rotate_pages"),
            json!(42),
            json!(null),
        ] {
            assert!(
                matches!(parse_operations(value.clone()), Err(ConfigError::Format { .. })),
                "accepted {value}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_missing_type() {
        let err = parse_operations(json!([{"type": "ok"}, {"size_identifier": "A4"}])).unwrap_err();
        match err {
            ConfigError::Format { message } => assert!(message.contains("#2")),
            other => panic!("Expected Format error, got {other:?}"),
        }
        assert!(parse_operations(json!([{"type": 3}])).is_err());
        assert!(parse_operations(json!(["rotate_pages"])).is_err());
    }

    #[test]
    fn test_load_operations_from_yaml_file() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(
            file,
            "operations:\n  - type: rotate_pages\n    rotation_degrees: 180\n"
        )
        .unwrap();

        let ops = load_operations(file.path()).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].params.get("rotation_degrees"), Some(&json!(180)));
    }

    #[test]
    fn test_load_operations_invalid_json() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        writeln!(file, "[{{\"type\": ").unwrap();
        assert!(matches!(
            load_operations(file.path()),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn test_load_operations_missing_file() {
        assert!(matches!(
            load_operations("/nonexistent/ops.json"),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    fn test_settings_defaults_and_overrides() {
        let settings = load_settings_from_str(r#"{"max_upload_mb": 5, "worker_count": 3}"#).unwrap();
        assert_eq!(settings.max_upload_mb, 5);
        assert_eq!(settings.max_upload_bytes(), 5 * 1024 * 1024);
        assert_eq!(settings.worker_count, 3);
        assert!(settings.database_path.is_none());

        let defaults = load_settings_from_str("{}").unwrap();
        assert_eq!(defaults.max_upload_mb, 50);
        assert!(defaults.worker_count >= 1);
    }

    #[test]
    fn test_settings_validation() {
        assert!(matches!(
            load_settings_from_str(r#"{"worker_count": 0}"#),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            load_settings_from_str(r#"{"job_timeout_secs": 0}"#),
            Err(ConfigError::Validation { .. })
        ));
    }
}
