use adgm_check::{
    classifier::ClassificationResult,
    config::Config,
    document::{DocumentInput, DocumentRecord},
    provider::{CapabilityError, Completer, CompletionRequest, HashingEmbedder},
    report::Severity,
    session::ReviewSession,
};
use std::collections::HashSet;
use std::sync::Arc;

const AOA_WITHOUT_ADGM: &str = "ARTICLES OF ASSOCIATION OF FALCON HOLDINGS LTD\n\
1. Share capital\n\
The authorised share capital is USD 50,000.\n\
2. Jurisdiction\n\
These Articles are subject to the jurisdiction of the courts of Dubai.\n\
Signed by the founding shareholder.";

const MOA: &str = "MEMORANDUM OF ASSOCIATION\n\
The subscribers wish to form a company under ADGM Companies Regulations.\n\
Governing law: the laws of the Abu Dhabi Global Market.\n\
Signature of subscriber.";

const UBO: &str = "UBO DECLARATION form\nBeneficial owner: Jane Doe\nSigned.";

fn offline_session(cfg: &Config) -> ReviewSession {
    ReviewSession::new(cfg, Arc::new(HashingEmbedder::new(64)), None).unwrap()
}

/// Reports one model issue per document, and fails for any prompt naming
/// `broken.docx`.
struct ScriptedCompleter;

impl Completer for ScriptedCompleter {
    fn complete(&self, req: &CompletionRequest) -> Result<String, CapabilityError> {
        let prompt = &req.messages[1].content;
        if prompt.contains("Document name: broken.docx") {
            return Err(CapabilityError::Status {
                code: 500,
                body: "internal error".into(),
            });
        }
        Ok(r#"{"issues": [{"section": "General", "issue": "Review by counsel recommended", "severity": "Low", "suggestion": "Have ADGM counsel review."}]}"#.into())
    }
}

#[test]
fn aoa_without_adgm_jurisdiction_is_flagged_on_an_empty_knowledge_base() {
    let cfg = Config::default();
    let session = offline_session(&cfg);
    assert!(session.knowledge_base().is_empty());

    let out = session
        .review(vec![DocumentRecord::new("aoa.docx", AOA_WITHOUT_ADGM)])
        .unwrap();

    let flagged: Vec<_> = out
        .report
        .issues_found
        .iter()
        .filter(|i| i.section.to_lowercase().contains("jurisdiction"))
        .collect();
    assert!(!flagged.is_empty(), "{:?}", out.report.issues_found);
    assert!(
        flagged
            .iter()
            .all(|i| matches!(i.severity, Severity::Medium | Severity::High))
    );
    assert!(!out.diagnostics.documents[0].grounded);
    assert_eq!(
        out.records[0].classification.as_ref().and_then(|c| c.document_type()),
        Some("Articles of Association")
    );
}

#[test]
fn every_issue_belongs_to_an_uploaded_document() {
    let mut cfg = Config::default();
    cfg.chunking.chunk_size = 80;
    cfg.chunking.chunk_overlap = 20;
    let mut session = ReviewSession::new(
        &cfg,
        Arc::new(HashingEmbedder::new(64)),
        Some(Arc::new(ScriptedCompleter)),
    )
    .unwrap();
    session
        .ingest_reference(
            "companies-regs.pdf",
            "Articles must confer jurisdiction on the ADGM Courts.\n\n\
             A register of members and directors must be kept at the registered office.",
        )
        .unwrap();

    let out = session
        .review(vec![
            DocumentRecord::new("aoa.docx", AOA_WITHOUT_ADGM),
            DocumentRecord::new("moa.docx", MOA),
            DocumentRecord::new("ubo.docx", UBO),
        ])
        .unwrap();

    let names: HashSet<&str> = out.records.iter().map(|r| r.filename.as_str()).collect();
    assert!(out.report.issues_found.iter().all(|i| names.contains(i.document.as_str())));
    assert_eq!(out.report.documents_uploaded, 3);
    assert_eq!(out.report.required_documents, 5);
    assert_eq!(
        out.report.missing_document.as_deref(),
        Some("Incorporation Application Form")
    );
    assert_eq!(
        out.diagnostics.missing_documents,
        vec![
            "Incorporation Application Form".to_string(),
            "Register of Members and Directors".to_string()
        ]
    );
    assert_eq!(out.diagnostics.knowledge_base_chunks, 2);
    assert!(out.diagnostics.documents.iter().all(|d| d.grounded));
}

#[test]
fn a_failing_document_does_not_abort_the_run() {
    let cfg = Config::default();
    let session = ReviewSession::new(
        &cfg,
        Arc::new(HashingEmbedder::new(64)),
        Some(Arc::new(ScriptedCompleter)),
    )
    .unwrap();

    let out = session
        .review_inputs(vec![
            DocumentInput::Loaded(DocumentRecord::new("moa.docx", MOA)),
            DocumentInput::Loaded(DocumentRecord::new("broken.docx", AOA_WITHOUT_ADGM)),
            DocumentInput::Unreadable {
                filename: "scan.pdf".into(),
                error: "no text layer".into(),
            },
        ])
        .unwrap();

    assert_eq!(out.report.documents_uploaded, 3);
    assert!(out.report.issues_found.iter().all(|i| i.document == "moa.docx"));
    assert!(!out.report.issues_found.is_empty());

    let docs = &out.diagnostics.documents;
    assert!(docs[0].error.is_none());
    assert!(docs[1].error.as_deref().is_some_and(|e| e.contains("500")));
    assert!(
        docs[1]
            .rule_issues
            .iter()
            .any(|i| i.document == "broken.docx" && i.severity == Severity::High)
    );
    assert!(docs[2].rule_issues.is_empty());
    assert_eq!(docs[2].error.as_deref(), Some("no text layer"));
    assert_eq!(docs[2].classification, ClassificationResult::Unknown);
}

#[test]
fn duplicate_upload_names_are_made_unique() {
    let cfg = Config::default();
    let session = offline_session(&cfg);
    let out = session
        .review(vec![
            DocumentRecord::new("draft.docx", AOA_WITHOUT_ADGM),
            DocumentRecord::new("draft.docx", MOA),
        ])
        .unwrap();
    assert_eq!(out.records[0].filename, "draft.docx");
    assert_eq!(out.records[1].filename, "draft.docx (2)");
    assert!(
        out.report
            .issues_found
            .iter()
            .any(|i| i.document == "draft.docx")
    );
}

#[test]
fn parallel_review_keeps_upload_order() {
    let docs = || {
        (0..8)
            .map(|n| {
                let text = if n % 2 == 0 { AOA_WITHOUT_ADGM } else { MOA };
                DocumentRecord::new(format!("doc-{n}.docx"), text)
            })
            .collect::<Vec<_>>()
    };

    let sequential = offline_session(&Config::default()).review(docs()).unwrap();

    let mut cfg = Config::default();
    cfg.global.max_parallel_documents = 4;
    let parallel = offline_session(&cfg).review(docs()).unwrap();

    assert_eq!(parallel.report, sequential.report);
    let order: Vec<_> = parallel
        .diagnostics
        .documents
        .iter()
        .map(|d| d.filename.clone())
        .collect();
    let expected: Vec<_> = (0..8).map(|n| format!("doc-{n}.docx")).collect();
    assert_eq!(order, expected);
}

#[test]
fn unclassifiable_documents_are_reported_unknown() {
    let session = offline_session(&Config::default());
    let record = session.classify(DocumentRecord::new("memo.txt", "Lunch menu for Friday."));
    assert_eq!(record.classification, Some(ClassificationResult::Unknown));
}
