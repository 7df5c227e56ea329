use crate::report::Issue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDiag {
    pub python_exe: String,
    pub python_version: String,
    #[serde(default)]
    pub pypdf_version: Option<String>,
    #[serde(default)]
    pub python_docx_version: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractIn {
    pub input_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractOut {
    pub ok: bool,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateIn {
    pub input_path: String,
    pub output_path: String,
    pub annotations: Vec<Annotation>,
}

/// Where to put a marker and what it says. `anchor` is lower-cased.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub anchor: String,
    pub comment: String,
}

impl Annotation {
    pub fn for_issue(issue: &Issue) -> Self {
        Self {
            anchor: crate::annotate::anchor_for(issue),
            comment: crate::annotate::suggestion_marker(issue),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateOut {
    pub ok: bool,
    #[serde(default)]
    pub placed_inline: u32,
    #[serde(default)]
    pub appended: u32,
    #[serde(default)]
    pub error: Option<String>,
}
