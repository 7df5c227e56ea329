use adgm_check::{
    config::Detector,
    detector::{IssueDetector, validate_entries},
    knowledge::{ReferenceChunk, RetrievedChunk},
    provider::{CapabilityError, Completer, CompletionRequest},
    report::Severity,
};
use pretty_assertions::assert_eq;
use std::sync::Mutex;

/// Returns a fixed reply and remembers the last prompt.
struct CannedCompleter {
    reply: String,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl CannedCompleter {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn last_user_prompt(&self) -> String {
        let seen = self.seen.lock().unwrap();
        seen.last().unwrap().messages[1].content.clone()
    }
}

impl Completer for CannedCompleter {
    fn complete(&self, req: &CompletionRequest) -> Result<String, CapabilityError> {
        self.seen.lock().unwrap().push(req.clone());
        Ok(self.reply.clone())
    }
}

struct DownCompleter;

impl Completer for DownCompleter {
    fn complete(&self, _req: &CompletionRequest) -> Result<String, CapabilityError> {
        Err(CapabilityError::Timeout(60))
    }
}

fn model_only() -> Detector {
    Detector {
        rule_checks: false,
        ..Detector::default()
    }
}

const AOA: &str = "ARTICLES OF ASSOCIATION\n\
Clause 4 Share capital\n\
The share capital is AED 100,000.\n\
Clause 12 Governing law\n\
This document is governed by the laws of the UAE.\n\
Signed by the director.";

fn reference_chunk() -> ReferenceChunk {
    ReferenceChunk {
        id: "companies-regs.pdf#0".into(),
        source_name: "companies-regs.pdf".into(),
        text: "Articles must state that the ADGM Courts have jurisdiction.".into(),
        start: 0,
        end: 58,
        embedding: vec![1.0],
    }
}

#[test]
fn valid_entries_are_kept_and_invalid_ones_counted() {
    let reply = r#"Here is the review:
{"document": "Articles of Association", "issues": [
  {"section": "Clause 12 Governing law", "issue": "Jurisdiction is not ADGM", "severity": "High", "suggestion": "Refer to ADGM Courts."},
  {"section": "Clause 4 Share capital", "issue": "Currency unclear", "severity": "low", "suggestion": "State USD or AED explicitly."},
  {"section": "", "issue": "No section", "severity": "High", "suggestion": "x"},
  {"section": "Clause 9", "issue": "Bad severity", "severity": "Critical", "suggestion": "x"},
  "not an object"
]}"#;
    let completer = CannedCompleter::new(reply);
    let cfg = model_only();
    let detector = IssueDetector::new(&cfg, Some(&completer));

    let chunk = reference_chunk();
    let context = [RetrievedChunk { chunk: &chunk, score: 0.9 }];
    let outcome = detector.detect_issues("aoa.docx", AOA, &context).unwrap();

    assert_eq!(outcome.dropped, 3);
    assert!(outcome.grounded);
    assert_eq!(outcome.issues.len(), 2);
    assert_eq!(outcome.issues[0].document, "aoa.docx");
    assert_eq!(outcome.issues[0].severity, Severity::High);
    assert_eq!(outcome.issues[1].severity, Severity::Low);

    let prompt = completer.last_user_prompt();
    assert!(prompt.contains("(companies-regs.pdf)"));
    assert!(prompt.contains("Clause 12 Governing law"));
}

#[test]
fn reply_without_json_yields_no_model_issues() {
    let completer = CannedCompleter::new("I am unable to review this document.");
    let cfg = model_only();
    let detector = IssueDetector::new(&cfg, Some(&completer));
    let outcome = detector.detect_issues("aoa.docx", AOA, &[]).unwrap();
    assert!(outcome.issues.is_empty());
    assert_eq!(outcome.dropped, 0);
    assert!(!outcome.grounded);
    assert!(completer.last_user_prompt().contains("none available"));
}

#[test]
fn completer_failure_is_an_error_for_the_document() {
    let cfg = model_only();
    let detector = IssueDetector::new(&cfg, Some(&DownCompleter));
    let err = detector.detect_issues("aoa.docx", AOA, &[]).unwrap_err();
    assert!(format!("{err:#}").contains("aoa.docx"));
}

#[test]
fn rule_and_model_findings_are_deduplicated() {
    let reply = r#"{"issues": [
      {"section": "Clause 12 Governing law", "issue": "Jurisdiction clause does not specify ADGM Courts", "severity": "High", "suggestion": "Use ADGM Courts."}
    ]}"#;
    let completer = CannedCompleter::new(reply);
    let cfg = Detector::default();
    let detector = IssueDetector::new(&cfg, Some(&completer));
    let outcome = detector.detect_issues("aoa.docx", AOA, &[]).unwrap();

    let jurisdiction: Vec<_> = outcome
        .issues
        .iter()
        .filter(|i| i.section == "Clause 12 Governing law")
        .collect();
    assert_eq!(jurisdiction.len(), 1);
    assert_eq!(jurisdiction[0].severity, Severity::High);
}

#[test]
fn without_a_completer_only_rules_run() {
    let cfg = Detector::default();
    let detector = IssueDetector::new(&cfg, None);
    let outcome = detector.detect_issues("aoa.docx", AOA, &[]).unwrap();
    assert!(outcome.issues.iter().any(|i| i.section == "Clause 12 Governing law"));
    assert!(outcome.issues.iter().all(|i| i.document == "aoa.docx"));
}

#[test]
fn long_documents_are_truncated_in_the_prompt() {
    let completer = CannedCompleter::new("{\"issues\": []}");
    let cfg = Detector {
        max_document_chars: 20,
        rule_checks: false,
        ..Detector::default()
    };
    let detector = IssueDetector::new(&cfg, Some(&completer));
    detector.detect_issues("aoa.docx", AOA, &[]).unwrap();
    let prompt = completer.last_user_prompt();
    assert!(prompt.contains("document truncated"));
    assert!(!prompt.contains("Signed by the director."));
}

#[test]
fn bare_array_and_odd_shapes() {
    let (issues, dropped) = validate_entries(
        "moa.docx",
        &serde_json::json!([{"section": "Objects", "description": "Objects too broad", "severity": "Medium", "suggestion": ""}]),
    );
    assert_eq!((issues.len(), dropped), (1, 0));
    assert_eq!(issues[0].issue, "Objects too broad");

    let (issues, dropped) = validate_entries("moa.docx", &serde_json::json!({"issues": "none"}));
    assert_eq!((issues.len(), dropped), (0, 1));

    let (issues, dropped) = validate_entries("moa.docx", &serde_json::json!({"document": "x"}));
    assert_eq!((issues.len(), dropped), (0, 0));
}
