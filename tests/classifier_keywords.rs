use adgm_check::{
    classifier::{ClassificationResult, DocumentClassifier},
    config::Config,
};
use proptest::prelude::*;

fn classifier() -> DocumentClassifier {
    DocumentClassifier::from_config(&Config::default()).unwrap()
}

#[test]
fn recognises_each_checklist_document() {
    let c = classifier();
    let cases = [
        ("ARTICLES OF ASSOCIATION of Example Ltd", "Articles of Association"),
        ("Memorandum of Association\nThe subscribers...", "Memorandum of Association"),
        ("Incorporation Application for a private company", "Incorporation Application Form"),
        ("UBO Declaration submitted by the applicant", "UBO Declaration Form"),
        ("Register of Members\nName | Shares", "Register of Members and Directors"),
    ];
    for (text, expected) in cases {
        assert_eq!(c.classify(text).document_type(), Some(expected), "{text}");
    }
}

#[test]
fn unrelated_text_is_unknown() {
    let c = classifier();
    let result = c.classify("Lease agreement for warehouse premises in Mussafah.");
    assert_eq!(result, ClassificationResult::Unknown);
    assert_eq!(result.label(), "Unknown Document Type");
}

#[test]
fn keywords_match_whole_words_only() {
    let c = classifier();
    // "moa" must not fire inside "moat", nor "aoa" inside "kaoaa".
    assert_eq!(c.classify("The castle moat and kaoaa.").document_type(), None);
}

#[test]
fn stronger_evidence_beats_configuration_order() {
    let c = classifier();
    let text = "MEMORANDUM OF ASSOCIATION. This memorandum of association is read \
                together with the articles.";
    assert_eq!(
        c.classify(text).document_type(),
        Some("Memorandum of Association")
    );
}

#[test]
fn ambiguous_text_falls_below_threshold() {
    let mut cfg = Config::default();
    cfg.classifier.min_confidence = 0.75;
    let c = DocumentClassifier::from_config(&cfg).unwrap();
    // One articles hit against one memorandum hit: confidence 0.5.
    assert!(!c.classify("articles and memorandum").is_known());
}

#[test]
fn tie_between_types_is_unknown_at_default_threshold() {
    let c = classifier();
    assert_eq!(c.classify("see the articles and the memorandum"), ClassificationResult::Unknown);
    assert_eq!(c.classify("articles articles memorandum").document_type(), Some("Articles of Association"));
}

#[test]
fn single_type_match_is_fully_confident() {
    match classifier().classify("UBO Declaration") {
        ClassificationResult::Known { document_type, confidence } => {
            assert_eq!(document_type, "UBO Declaration Form");
            assert_eq!(confidence, 1.0);
        }
        ClassificationResult::Unknown => panic!("expected a known type"),
    }
}

proptest! {
    #[test]
    fn classification_is_idempotent(text in "[a-zA-Z ]{0,200}") {
        let c = classifier();
        prop_assert_eq!(c.classify(&text), c.classify(&text));
    }
}
