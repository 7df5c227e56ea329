use crate::{classifier::ClassificationResult, detector::DetectionOutcome, report::Issue};
use serde::Serialize;

/// An uploaded candidate document. Classified once, read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub filename: String,
    #[serde(skip)]
    pub raw_text: String,
    pub classification: Option<ClassificationResult>,
}

impl DocumentRecord {
    pub fn new(filename: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            raw_text: raw_text.into(),
            classification: None,
        }
    }

    pub fn classified(mut self, result: ClassificationResult) -> Self {
        self.classification = Some(result);
        self
    }

    pub fn document_type(&self) -> Option<&str> {
        self.classification.as_ref().and_then(|c| c.document_type())
    }
}

/// What happened to one document during a review run.
#[derive(Debug, Clone)]
pub enum DocumentOutcome {
    Reviewed(DetectionOutcome),
    /// `rule_issues` are the deterministic findings for a document whose
    /// review failed; they go to the diagnostics, never the report.
    Failed {
        error: String,
        rule_issues: Vec<Issue>,
    },
}

/// A candidate document as handed to a review: either loaded text or the
/// reason it could not be read.
#[derive(Debug, Clone)]
pub enum DocumentInput {
    Loaded(DocumentRecord),
    Unreadable { filename: String, error: String },
}

impl DocumentInput {
    pub fn filename(&self) -> &str {
        match self {
            Self::Loaded(r) => &r.filename,
            Self::Unreadable { filename, .. } => filename,
        }
    }
}
