use crate::config::{Config, ProcessChecklist};
use serde::Serialize;

/// Required-document checklists per process, in configured order.
#[derive(Debug, Clone, Serialize)]
pub struct RequirementCatalog {
    entries: Vec<ProcessChecklist>,
}

impl RequirementCatalog {
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.catalog.processes.clone())
    }

    pub fn new(entries: Vec<ProcessChecklist>) -> Self {
        Self { entries }
    }

    /// Ordered checklist for `process`; empty when the process is unknown.
    pub fn required_documents_for(&self, process: &str) -> &[String] {
        self.entries
            .iter()
            .find(|e| e.name == process)
            .map(|e| e.documents.as_slice())
            .unwrap_or(&[])
    }

    /// First process whose checklist names `document_type`.
    pub fn process_for(&self, document_type: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.documents.iter().any(|d| d == document_type))
            .map(|e| e.name.as_str())
    }

    pub fn processes(&self) -> impl Iterator<Item = &ProcessChecklist> {
        self.entries.iter()
    }
}
