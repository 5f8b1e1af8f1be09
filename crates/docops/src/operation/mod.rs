//! Operation model: what a caller asks the pipeline to do.

pub mod color;
pub mod page;
pub mod params;

use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TransformError;

pub use color::HexColor;
pub use page::{PageSize, SizeIdentifier};

/// One requested edit: a `type` tag plus its flattened parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl Operation {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: serde_json::Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Decodes the parameters into a typed struct.
    pub fn parse_params<T: DeserializeOwned>(&self) -> Result<T, TransformError> {
        serde_json::from_value(serde_json::Value::Object(self.params.clone()))
            .map_err(|e| TransformError::invalid_params(&self.kind, e.to_string()))
    }
}

/// Format category selecting the transform set for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFamily {
    WordProcessing,
    Pdf,
}

impl DocumentFamily {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "docx" => Some(Self::WordProcessing),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::WordProcessing => "docx",
            Self::Pdf => "pdf",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WordProcessing => "word_processing",
            Self::Pdf => "pdf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "word_processing" => Some(Self::WordProcessing),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_deserializes_flattened_params() {
        let op: Operation =
            serde_json::from_value(json!({"type": "set_page_size", "size_identifier": "A4"}))
                .unwrap();
        assert_eq!(op.kind, "set_page_size");
        assert_eq!(op.params.get("size_identifier"), Some(&json!("A4")));
        assert!(!op.params.contains_key("type"));
    }

    #[test]
    fn test_operation_round_trips_through_json() {
        let op = Operation::new("rotate_pages").with_param("rotation_degrees", 180);
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value, json!({"type": "rotate_pages", "rotation_degrees": 180}));
    }

    #[test]
    fn test_parse_params_reports_operation_name() {
        #[derive(Debug, Deserialize)]
        struct Needs {
            #[allow(dead_code)]
            value: u32,
        }

        let op = Operation::new("needs_value").with_param("value", "not a number");
        let err = op.parse_params::<Needs>().unwrap_err();
        assert!(err.to_string().contains("needs_value"));
    }

    #[test]
    fn test_family_from_path() {
        assert_eq!(
            DocumentFamily::from_path(Path::new("/tmp/a.DOCX")),
            Some(DocumentFamily::WordProcessing)
        );
        assert_eq!(
            DocumentFamily::from_path(Path::new("b.pdf")),
            Some(DocumentFamily::Pdf)
        );
        assert_eq!(DocumentFamily::from_path(Path::new("c.txt")), None);
        assert_eq!(DocumentFamily::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_family_string_round_trip() {
        for family in [DocumentFamily::WordProcessing, DocumentFamily::Pdf] {
            assert_eq!(DocumentFamily::parse(family.as_str()), Some(family));
        }
    }
}
