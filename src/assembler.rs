use crate::{
    catalog::RequirementCatalog,
    classifier::ClassificationResult,
    document::{DocumentOutcome, DocumentRecord},
    report::{ComplianceReport, DocumentDiagnostics, RunDiagnostics},
};
use anyhow::{Result, bail};
use std::collections::HashSet;
use tracing::{info, warn};

pub const UNKNOWN_PROCESS: &str = "Unknown";

pub struct Assembly {
    pub report: ComplianceReport,
    pub diagnostics: RunDiagnostics,
}

/// Reconciles per-document results with the requirement catalog.
///
/// `outcomes[i]` belongs to `records[i]`; the report keeps that order.
pub fn assemble(
    records: &[DocumentRecord],
    outcomes: &[DocumentOutcome],
    catalog: &RequirementCatalog,
    default_process: &str,
) -> Result<Assembly> {
    if records.len() != outcomes.len() {
        bail!(
            "{} documents but {} review outcomes",
            records.len(),
            outcomes.len()
        );
    }

    let process = dominant_process(records, catalog).unwrap_or_else(|| {
        if default_process.trim().is_empty() {
            UNKNOWN_PROCESS.to_string()
        } else {
            default_process.to_string()
        }
    });

    let required = catalog.required_documents_for(&process);
    let present: HashSet<&str> = records.iter().filter_map(|r| r.document_type()).collect();
    let missing: Vec<String> = required
        .iter()
        .filter(|d| !present.contains(d.as_str()))
        .cloned()
        .collect();

    let mut issues_found = Vec::new();
    let mut docs = Vec::with_capacity(records.len());
    for (record, outcome) in records.iter().zip(outcomes) {
        let classification = record
            .classification
            .clone()
            .unwrap_or(ClassificationResult::Unknown);
        match outcome {
            DocumentOutcome::Reviewed(found) => {
                let mut kept = 0;
                for issue in &found.issues {
                    if issue.document != record.filename {
                        warn!(
                            expected = %record.filename,
                            got = %issue.document,
                            "discarding issue attributed to another document"
                        );
                        continue;
                    }
                    issues_found.push(issue.clone());
                    kept += 1;
                }
                docs.push(DocumentDiagnostics {
                    filename: record.filename.clone(),
                    classification,
                    issues: kept,
                    dropped_entries: found.dropped,
                    grounded: found.grounded,
                    error: None,
                    rule_issues: Vec::new(),
                });
            }
            DocumentOutcome::Failed { error, rule_issues } => {
                docs.push(DocumentDiagnostics {
                    filename: record.filename.clone(),
                    classification,
                    issues: 0,
                    dropped_entries: 0,
                    grounded: false,
                    error: Some(error.clone()),
                    rule_issues: rule_issues.clone(),
                });
            }
        }
    }

    info!(
        process = %process,
        documents = records.len(),
        required = required.len(),
        missing = missing.len(),
        issues = issues_found.len(),
        "report assembled"
    );

    Ok(Assembly {
        report: ComplianceReport {
            process,
            documents_uploaded: records.len(),
            required_documents: required.len(),
            missing_document: missing.first().cloned(),
            issues_found,
        },
        diagnostics: RunDiagnostics {
            missing_documents: missing,
            knowledge_base_chunks: 0,
            documents: docs,
        },
    })
}

/// Majority vote over the processes owning each classified document type.
/// Ties go to the process seen first.
fn dominant_process(records: &[DocumentRecord], catalog: &RequirementCatalog) -> Option<String> {
    let mut votes: Vec<(&str, usize)> = Vec::new();
    for record in records {
        let Some(process) = record.document_type().and_then(|t| catalog.process_for(t)) else {
            continue;
        };
        match votes.iter_mut().find(|(p, _)| *p == process) {
            Some((_, n)) => *n += 1,
            None => votes.push((process, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (p, n) in votes {
        if best.is_none_or(|(_, b)| n > b) {
            best = Some((p, n));
        }
    }
    best.map(|(p, _)| p.to_string())
}
