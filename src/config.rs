use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub hashing: Hashing,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub chunking: Chunking,
    #[serde(default)]
    pub retrieval: Retrieval,
    #[serde(default)]
    pub classifier: Classifier,
    #[serde(default)]
    pub catalog: Catalog,
    #[serde(default)]
    pub review: Review,
    #[serde(default)]
    pub detector: Detector,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub normalize: Normalize,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global: Default::default(),
            paths: Default::default(),
            hashing: Default::default(),
            limits: Default::default(),
            chunking: Default::default(),
            retrieval: Default::default(),
            classifier: Default::default(),
            catalog: Default::default(),
            review: Default::default(),
            detector: Default::default(),
            provider: Default::default(),
            engine: Default::default(),
            normalize: Default::default(),
            output: Default::default(),
            logging: Default::default(),
            debug: Default::default(),
            security: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Global {
    pub job_name: String,
    pub resume: bool,
    pub max_parallel_documents: usize,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            job_name: "default".into(),
            resume: true,
            max_parallel_documents: 1,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub out_dir: String,
    pub scripts_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            scripts_dir: "scripts".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Hashing {
    pub mode: String,
    pub fast_window_bytes: u64,
}
impl Default for Hashing {
    fn default() -> Self {
        Self {
            mode: "fast_2x16mb".into(),
            fast_window_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_input_file_bytes: u64,
    pub max_reference_files: usize,
    pub max_documents: usize,
    pub job_timeout_seconds: u64,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_file_bytes: 200 * 1024 * 1024,
            max_reference_files: 64,
            max_documents: 32,
            job_timeout_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Chunking {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}
impl Default for Chunking {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
            separators: vec!["\n\n".into(), "\n".into(), ". ".into(), " ".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Retrieval {
    pub top_k: usize,
    /// Characters of the document appended to the retrieval question.
    pub question_excerpt_chars: usize,
}
impl Default for Retrieval {
    fn default() -> Self {
        Self {
            top_k: 4,
            question_excerpt_chars: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Classifier {
    pub min_confidence: f32,
    pub document_types: Vec<DocumentTypeKeywords>,
}
impl Default for Classifier {
    fn default() -> Self {
        let entry = |name: &str, keywords: &[&str]| DocumentTypeKeywords {
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };
        Self {
            min_confidence: 0.5,
            document_types: vec![
                entry(
                    "Articles of Association",
                    &["articles of association", "aoa", "articles"],
                ),
                entry(
                    "Memorandum of Association",
                    &["memorandum of association", "moa", "memorandum"],
                ),
                entry("Incorporation Application Form", &["incorporation application"]),
                entry("UBO Declaration Form", &["ubo declaration"]),
                entry(
                    "Register of Members and Directors",
                    &["register of members", "register of directors"],
                ),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTypeKeywords {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub processes: Vec<ProcessChecklist>,
}
impl Default for Catalog {
    fn default() -> Self {
        Self {
            processes: vec![ProcessChecklist {
                name: "Company Incorporation".into(),
                documents: vec![
                    "Articles of Association".into(),
                    "Memorandum of Association".into(),
                    "Incorporation Application Form".into(),
                    "UBO Declaration Form".into(),
                    "Register of Members and Directors".into(),
                ],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessChecklist {
    pub name: String,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Review {
    /// Process reported when no uploaded document could be classified.
    pub default_process: String,
}
impl Default for Review {
    fn default() -> Self {
        Self {
            default_process: "Company Incorporation".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Detector {
    pub max_document_chars: usize,
    pub max_context_chunks: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub rule_checks: bool,
}
impl Default for Detector {
    fn default() -> Self {
        Self {
            max_document_chars: 24_000,
            max_context_chunks: 4,
            temperature: 0.0,
            max_tokens: 2048,
            rule_checks: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Provider {
    /// `azure_openai` or `offline`.
    pub kind: String,
    pub api_key_env: String,
    pub api_base_env: String,
    pub api_version_env: String,
    pub chat_deployment_env: String,
    pub embedding_deployment_env: String,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub offline_dimension: usize,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}
impl Default for Provider {
    fn default() -> Self {
        Self {
            kind: "azure_openai".into(),
            api_key_env: "AZURE_OPENAI_API_KEY".into(),
            api_base_env: "AZURE_OPENAI_API_BASE".into(),
            api_version_env: "AZURE_OPENAI_API_VERSION".into(),
            chat_deployment_env: "AZURE_OPENAI_CHAT_DEPLOYMENT".into(),
            embedding_deployment_env: "AZURE_OPENAI_EMBEDDING_DEPLOYMENT".into(),
            embedding_model: "text-embedding-3-small".into(),
            embedding_batch_size: 16,
            offline_dimension: 256,
            timeout_seconds: 60,
            max_retries: 1,
            backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Engine {
    pub python_exe: String,
    pub script_timeout_seconds: u64,
    pub env: BTreeMap<String, String>,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            python_exe: "python3".into(),
            script_timeout_seconds: 120,
            env: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalize {
    pub normalize_unicode: bool,
    pub normalize_newlines: bool,
    pub trim_trailing_whitespace: bool,
    pub collapse_blank_lines: bool,
    pub control_chars_to_sanitize: Vec<u8>,
    pub remove_by_regex: bool,
    pub regex: NormalizeRegex,
}
impl Default for Normalize {
    fn default() -> Self {
        Self {
            normalize_unicode: true,
            normalize_newlines: true,
            trim_trailing_whitespace: true,
            collapse_blank_lines: true,
            control_chars_to_sanitize: (0u8..32).filter(|c| !matches!(c, 9 | 10 | 13)).chain([127]).collect(),
            remove_by_regex: true,
            regex: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeRegex {
    pub patterns: Vec<String>,
}
impl Default for NormalizeRegex {
    fn default() -> Self {
        Self {
            patterns: vec![
                "^(?i)(page\\s+\\d+(\\s+of\\s+\\d+)?|\\d+\\s*/\\s*\\d+)$".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub write_report_json: bool,
    pub write_diagnostics_json: bool,
    pub write_reviewed_documents: bool,
    pub write_index_json: bool,
    pub report_filename: String,
    pub diagnostics_filename: String,
    pub reviewed_prefix: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_report_json: true,
            write_diagnostics_json: true,
            write_reviewed_documents: true,
            write_index_json: true,
            report_filename: "report.json".into(),
            diagnostics_filename: "diagnostics.json".into(),
            reviewed_prefix: "reviewed_".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub keep_python_stderr: bool,
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_python_stderr: true,
            dump_effective_config: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub reject_url_inputs: bool,
    pub pin_scripts_dir: bool,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            reject_url_inputs: true,
            pin_scripts_dir: true,
        }
    }
}
