//! Retrieval-grounded issue detection.
//!
//! A document and its retrieved reference passages are turned into a chat
//! prompt; the reply is expected to hold a JSON object with an `issues`
//! array. Nothing in the reply is trusted: entries are validated one by one
//! and invalid ones are dropped and counted instead of failing the document.

use crate::{
    config::Detector,
    knowledge::RetrievedChunk,
    provider::{ChatMessage, Completer, CompletionRequest},
    report::{Issue, Severity},
    rules,
    util::truncate_chars,
};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

const SYSTEM_PROMPT: &str = "You review legal documents for compliance with the regulations of \
the Abu Dhabi Global Market (ADGM). Use the reference passages when they are relevant. \
Respond with JSON only, no prose, in the form \
{\"document\": string, \"issues\": [{\"section\": string, \"issue\": string, \
\"severity\": \"Low\" | \"Medium\" | \"High\", \"suggestion\": string}]}. \
`section` must quote the heading or clause label from the document where the issue occurs. \
Return an empty issues array when the document is compliant.";

#[derive(Debug, Clone, Default)]
pub struct DetectionOutcome {
    pub issues: Vec<Issue>,
    /// Model entries rejected by schema validation.
    pub dropped: usize,
    /// False when no reference passages backed the review.
    pub grounded: bool,
}

pub struct IssueDetector<'a> {
    cfg: &'a Detector,
    completer: Option<&'a dyn Completer>,
}

impl<'a> IssueDetector<'a> {
    pub fn new(cfg: &'a Detector, completer: Option<&'a dyn Completer>) -> Self {
        Self { cfg, completer }
    }

    pub fn detect_issues(
        &self,
        document: &str,
        text: &str,
        context: &[RetrievedChunk<'_>],
    ) -> Result<DetectionOutcome> {
        let mut outcome = DetectionOutcome {
            grounded: !context.is_empty(),
            ..Default::default()
        };

        if self.cfg.rule_checks {
            outcome.issues.extend(rules::check_document(document, text));
        }

        if let Some(completer) = self.completer {
            let req = self.build_request(document, text, context);
            trace!(document, prompt = %req.messages[1].content, "review prompt");

            let reply = completer
                .complete(&req)
                .with_context(|| format!("completion failed for {document}"))?;

            match extract_json(&reply) {
                Some(value) => {
                    let (issues, dropped) = validate_entries(document, &value);
                    outcome.dropped = dropped;
                    outcome.issues.extend(issues);
                }
                None => warn!(document, "model reply contained no JSON; no model issues recorded"),
            }
        }

        dedupe(&mut outcome.issues);

        let lowered = text.to_lowercase();
        for issue in &outcome.issues {
            if !lowered.contains(&issue.section.to_lowercase()) {
                debug!(document, section = %issue.section, "section label not found verbatim in document");
            }
        }

        Ok(outcome)
    }

    pub fn build_request(
        &self,
        document: &str,
        text: &str,
        context: &[RetrievedChunk<'_>],
    ) -> CompletionRequest {
        let mut user = format!("Document name: {document}\n\n");

        if context.is_empty() {
            user.push_str("Reference passages: none available. Rely on general ADGM requirements.\n\n");
        } else {
            user.push_str("Reference passages:\n");
            for (i, r) in context.iter().take(self.cfg.max_context_chunks).enumerate() {
                user.push_str(&format!(
                    "[{}] ({})\n{}\n\n",
                    i + 1,
                    r.chunk.source_name,
                    r.chunk.text
                ));
            }
        }

        let body = truncate_chars(text, self.cfg.max_document_chars);
        user.push_str("Content:\n");
        user.push_str(body);
        if body.len() < text.len() {
            user.push_str("\n[... document truncated ...]");
        }

        CompletionRequest {
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)],
            temperature: self.cfg.temperature,
            max_tokens: self.cfg.max_tokens,
        }
    }
}

/// First balanced JSON object or array in `text` that parses.
pub fn extract_json(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(off) = text[from..].find(['{', '[']) {
        let start = from + off;
        if let Some(end) = balanced_end(bytes, start) {
            if let Ok(v) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Some(v);
            }
        }
        from = start + 1;
    }
    None
}

/// Index of the bracket closing the one at `start`, skipping string contents.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Accepts `{"issues": [...]}` or a bare array. Returns valid issues and the
/// count of rejected entries.
pub fn validate_entries(document: &str, value: &Value) -> (Vec<Issue>, usize) {
    let entries = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("issues") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                warn!(document, "`issues` is not an array");
                return (Vec::new(), 1);
            }
            None => return (Vec::new(), 0),
        },
        _ => return (Vec::new(), 1),
    };

    let mut issues = Vec::with_capacity(entries.len());
    let mut dropped = 0;
    for entry in entries {
        match validate_entry(document, entry) {
            Some(issue) => issues.push(issue),
            None => {
                dropped += 1;
                debug!(document, entry = %entry, "dropping malformed issue entry");
            }
        }
    }
    if dropped > 0 {
        warn!(document, dropped, "model issue entries failed validation");
    }
    (issues, dropped)
}

fn validate_entry(document: &str, entry: &Value) -> Option<Issue> {
    let obj = entry.as_object()?;
    let text_field = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let section = text_field("section")?;
    let issue = text_field("issue").or_else(|| text_field("description"))?;
    let severity: Severity = obj.get("severity")?.as_str()?.parse().ok()?;
    let suggestion = obj.get("suggestion")?.as_str()?.trim();

    Some(Issue {
        document: document.to_string(),
        section: section.to_string(),
        issue: issue.to_string(),
        severity,
        suggestion: suggestion.to_string(),
    })
}

fn dedupe(issues: &mut Vec<Issue>) {
    let mut seen = HashSet::new();
    issues.retain(|i| seen.insert((i.section.to_lowercase(), i.issue.to_lowercase())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_wrapped_in_prose() {
        let v = extract_json("Sure! Here you go:\n```json\n{\"issues\": []}\n```").unwrap();
        assert!(v.get("issues").is_some());
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scanner() {
        let v = extract_json(r#"{"issues":[{"section":"Clause {3}","issue":"x \"}\"","severity":"Low","suggestion":""}]}"#)
            .unwrap();
        let (issues, dropped) = validate_entries("a.docx", &v);
        assert_eq!(dropped, 0);
        assert_eq!(issues[0].section, "Clause {3}");
    }

    #[test]
    fn skips_unparseable_candidates() {
        let v = extract_json("{not json} then [1, 2]").unwrap();
        assert_eq!(v, serde_json::json!([1, 2]));
    }

    #[test]
    fn no_json_at_all() {
        assert!(extract_json("I could not review this document.").is_none());
    }
}
