pub mod python;
pub mod types;

use anyhow::Result;
use std::path::Path;

pub use types::{AnnotateIn, AnnotateOut, Annotation, EngineDiag, ExtractIn, ExtractOut};

/// File-format work delegated outside the pipeline: text extraction from
/// PDF and DOCX, and writing annotated DOCX copies.
pub trait DocumentEngine {
    fn doctor(&self) -> Result<EngineDiag>;
    fn extract_pdf_text(&self, input: &Path) -> Result<ExtractOut>;
    fn extract_docx_text(&self, input: &Path) -> Result<ExtractOut>;
    fn annotate_docx(&self, input: &Path, output: &Path, annotations: &[Annotation])
        -> Result<AnnotateOut>;
}
