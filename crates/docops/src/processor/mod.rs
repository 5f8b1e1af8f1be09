pub mod docx;
pub mod pdf;

use std::path::Path;

use crate::error::TransformError;
use crate::operation::{DocumentFamily, Operation};
use crate::pipeline::RunState;

/// A format backend: the set of transforms available for one document family.
///
/// `apply` must either write a complete file at `output` and return `Ok`, or
/// return an error and leave `output` untouched.
pub trait TransformBackend: Send + Sync {
    fn family(&self) -> DocumentFamily;

    /// Operation tags this backend understands, in a stable order.
    fn operations(&self) -> Vec<&'static str>;

    fn supports(&self, operation_type: &str) -> bool;

    fn apply(
        &self,
        operation: &Operation,
        input: &Path,
        output: &Path,
        state: &mut RunState,
    ) -> Result<(), TransformError>;
}

pub use docx::{DocxBackend, WordTransform};
pub use pdf::{PdfBackend, PdfTransform};
