//! Maps `(document family, operation type)` to a concrete transform.

use std::path::Path;
use std::sync::Arc;

use crate::analysis::{FrequencyKeywordExtractor, KeywordExtractor};
use crate::error::TransformError;
use crate::operation::{DocumentFamily, Operation};
use crate::pipeline::RunState;
use crate::processor::{DocxBackend, PdfBackend, TransformBackend};

pub struct TransformRegistry {
    backends: Vec<Box<dyn TransformBackend>>,
}

/// A transform found in the registry, ready to apply.
#[derive(Clone, Copy)]
pub struct ResolvedTransform<'a> {
    backend: &'a dyn TransformBackend,
}

impl ResolvedTransform<'_> {
    pub fn family(&self) -> DocumentFamily {
        self.backend.family()
    }

    pub fn apply(
        &self,
        operation: &Operation,
        input: &Path,
        output: &Path,
        state: &mut RunState,
    ) -> Result<(), TransformError> {
        self.backend.apply(operation, input, output, state)
    }
}

impl TransformRegistry {
    /// Registry with both built-in backends and the default keyword extractor.
    pub fn new() -> Self {
        Self::with_keyword_extractor(Arc::new(FrequencyKeywordExtractor::new()))
    }

    pub fn with_keyword_extractor(keywords: Arc<dyn KeywordExtractor>) -> Self {
        Self::from_backends(vec![
            Box::new(DocxBackend::new(keywords)),
            Box::new(PdfBackend::new()),
        ])
    }

    pub fn from_backends(backends: Vec<Box<dyn TransformBackend>>) -> Self {
        Self { backends }
    }

    /// `None` when no backend of `family` knows `operation_type`.
    pub fn resolve(&self, family: DocumentFamily, operation_type: &str) -> Option<ResolvedTransform<'_>> {
        self.backends
            .iter()
            .find(|b| b.family() == family && b.supports(operation_type))
            .map(|b| ResolvedTransform {
                backend: b.as_ref(),
            })
    }

    pub fn supported_operations(&self, family: DocumentFamily) -> Vec<&'static str> {
        self.backends
            .iter()
            .filter(|b| b.family() == family)
            .flat_map(|b| b.operations())
            .collect()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}
