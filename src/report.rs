use crate::classifier::ClassificationResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(s)
    }
}

/// One compliance finding, keyed to the uploaded file it was found in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub document: String,
    pub section: String,
    pub issue: String,
    pub severity: Severity,
    pub suggestion: String,
}

/// The externally consumed report. Field names and order are the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub process: String,
    pub documents_uploaded: usize,
    pub required_documents: usize,
    pub missing_document: Option<String>,
    pub issues_found: Vec<Issue>,
}

impl ComplianceReport {
    /// Pretty JSON with the fields in wire order; `missing_document` is
    /// written as `null` when nothing is missing.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Side-channel detail about a run; written next to the report, never inside it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunDiagnostics {
    pub missing_documents: Vec<String>,
    pub knowledge_base_chunks: usize,
    pub documents: Vec<DocumentDiagnostics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDiagnostics {
    pub filename: String,
    pub classification: ClassificationResult,
    pub issues: usize,
    pub dropped_entries: usize,
    pub grounded: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_issues: Vec<Issue>,
}
