use crate::config::Config;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_LABEL: &str = "Unknown Document Type";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassificationResult {
    Known {
        document_type: String,
        confidence: f32,
    },
    Unknown,
}

impl ClassificationResult {
    pub fn document_type(&self) -> Option<&str> {
        match self {
            Self::Known { document_type, .. } => Some(document_type),
            Self::Unknown => None,
        }
    }

    pub fn label(&self) -> &str {
        self.document_type().unwrap_or(UNKNOWN_LABEL)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known { .. })
    }
}

struct TypeMatcher {
    name: String,
    keywords: Vec<(Regex, u32)>,
}

/// Keyword-scoring document type classifier.
pub struct DocumentClassifier {
    types: Vec<TypeMatcher>,
    min_confidence: f32,
}

impl DocumentClassifier {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let mut types = Vec::with_capacity(cfg.classifier.document_types.len());
        for t in &cfg.classifier.document_types {
            let mut keywords = Vec::with_capacity(t.keywords.len());
            for k in &t.keywords {
                let words: Vec<String> = k
                    .split_whitespace()
                    .map(|w| regex::escape(&w.to_lowercase()))
                    .collect();
                if words.is_empty() {
                    continue;
                }
                let pattern = format!(r"\b{}\b", words.join(r"\s+"));
                let re = Regex::new(&pattern)
                    .with_context(|| format!("keyword {k:?} for {}", t.name))?;
                keywords.push((re, words.len() as u32));
            }
            types.push(TypeMatcher {
                name: t.name.clone(),
                keywords,
            });
        }
        Ok(Self {
            types,
            min_confidence: cfg.classifier.min_confidence,
        })
    }

    /// Every keyword occurrence adds its word count to its type's score. The
    /// best score wins, earlier configured types win ties.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let lower = text.to_lowercase();

        let scores: Vec<u32> = self
            .types
            .iter()
            .map(|t| {
                t.keywords
                    .iter()
                    .map(|(re, weight)| re.find_iter(&lower).count() as u32 * weight)
                    .sum()
            })
            .collect();

        let mut best: Option<usize> = None;
        for (i, &s) in scores.iter().enumerate() {
            if s > 0 && best.is_none_or(|b| s > scores[b]) {
                best = Some(i);
            }
        }
        let Some(best) = best else {
            return ClassificationResult::Unknown;
        };

        let runner_up = scores
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != best)
            .map(|(_, &s)| s)
            .max()
            .unwrap_or(0);
        let top = scores[best] as f32;
        let confidence = top / (top + runner_up as f32);

        // A tie scores exactly 0.5, so the default threshold rejects it.
        if confidence <= self.min_confidence {
            return ClassificationResult::Unknown;
        }

        ClassificationResult::Known {
            document_type: self.types[best].name.clone(),
            confidence,
        }
    }
}
