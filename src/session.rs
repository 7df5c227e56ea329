use crate::{
    assembler::{self, Assembly},
    catalog::RequirementCatalog,
    classifier::DocumentClassifier,
    config::Config,
    detector::{DetectionOutcome, IssueDetector},
    document::{DocumentInput, DocumentOutcome, DocumentRecord},
    knowledge::KnowledgeBase,
    provider::{Capabilities, Completer, Embedder},
    report::{ComplianceReport, RunDiagnostics},
    rules,
    util::truncate_chars,
};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

/// Everything one review run needs, built explicitly and dropped at the end.
pub struct ReviewSession {
    cfg: Config,
    catalog: RequirementCatalog,
    classifier: DocumentClassifier,
    knowledge: KnowledgeBase,
    completer: Option<Arc<dyn Completer>>,
}

pub struct ReviewOutcome {
    pub records: Vec<DocumentRecord>,
    pub report: ComplianceReport,
    pub diagnostics: RunDiagnostics,
}

impl ReviewSession {
    pub fn new(
        cfg: &Config,
        embedder: Arc<dyn Embedder>,
        completer: Option<Arc<dyn Completer>>,
    ) -> Result<Self> {
        Ok(Self {
            cfg: cfg.clone(),
            catalog: RequirementCatalog::from_config(cfg),
            classifier: DocumentClassifier::from_config(cfg).context("building classifier")?,
            knowledge: KnowledgeBase::new(cfg, embedder),
            completer,
        })
    }

    pub fn from_capabilities(cfg: &Config, caps: Capabilities) -> Result<Self> {
        Self::new(cfg, caps.embedder, caps.completer)
    }

    pub fn ingest_reference(&mut self, source_name: &str, text: &str) -> Result<usize> {
        self.knowledge.ingest(text, source_name)
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn catalog(&self) -> &RequirementCatalog {
        &self.catalog
    }

    pub fn classify(&self, record: DocumentRecord) -> DocumentRecord {
        let result = self.classifier.classify(&record.raw_text);
        info!(document = %record.filename, label = result.label(), "classified");
        record.classified(result)
    }

    /// Retrieval plus detection for one classified document.
    pub fn review_document(&self, record: &DocumentRecord) -> Result<DetectionOutcome> {
        let label = record
            .classification
            .as_ref()
            .map(|c| c.label())
            .unwrap_or(crate::classifier::UNKNOWN_LABEL);
        let question = format!(
            "ADGM requirements for {label}: {}",
            truncate_chars(&record.raw_text, self.cfg.retrieval.question_excerpt_chars)
        );

        let context = self
            .knowledge
            .query(&question, self.cfg.retrieval.top_k)
            .with_context(|| format!("retrieval for {}", record.filename))?;
        if context.is_empty() {
            info!(document = %record.filename, "no reference context; reviewing ungrounded");
        }

        let detector = IssueDetector::new(&self.cfg.detector, self.completer.as_deref());
        detector.detect_issues(&record.filename, &record.raw_text, &context)
    }

    /// Classifies and reviews every document. A failing document is recorded
    /// in the diagnostics and never aborts the run.
    pub fn review(&self, documents: Vec<DocumentRecord>) -> Result<ReviewOutcome> {
        self.review_inputs(documents.into_iter().map(DocumentInput::Loaded).collect())
    }

    /// Like [`review`](Self::review), but unreadable uploads still count as
    /// uploaded and are reported as failed.
    pub fn review_inputs(&self, inputs: Vec<DocumentInput>) -> Result<ReviewOutcome> {
        let started = Instant::now();
        let names = unique_filenames(&inputs);

        let mut records = Vec::with_capacity(inputs.len());
        let mut unreadable = Vec::with_capacity(inputs.len());
        for (input, name) in inputs.into_iter().zip(names) {
            match input {
                DocumentInput::Loaded(mut record) => {
                    record.filename = name;
                    records.push(self.classify(record));
                    unreadable.push(None);
                }
                DocumentInput::Unreadable { error, .. } => {
                    warn!(document = %name, "document could not be read: {error}");
                    records.push(DocumentRecord::new(name, String::new()));
                    unreadable.push(Some(error));
                }
            }
        }

        let outcomes = self.review_all(&records, &unreadable);

        let Assembly {
            report,
            mut diagnostics,
        } = assembler::assemble(
            &records,
            &outcomes,
            &self.catalog,
            &self.cfg.review.default_process,
        )?;
        diagnostics.knowledge_base_chunks = self.knowledge.len();

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            documents = records.len(),
            "review finished"
        );
        Ok(ReviewOutcome {
            records,
            report,
            diagnostics,
        })
    }

    fn review_one(&self, record: &DocumentRecord) -> DocumentOutcome {
        match self.review_document(record) {
            Ok(found) => DocumentOutcome::Reviewed(found),
            Err(err) => {
                warn!(document = %record.filename, "review failed: {err:#}");
                let rule_issues = if self.cfg.detector.rule_checks {
                    rules::check_document(&record.filename, &record.raw_text)
                } else {
                    Vec::new()
                };
                DocumentOutcome::Failed {
                    error: format!("{err:#}"),
                    rule_issues,
                }
            }
        }
    }

    /// Results come back in upload order whatever the worker count.
    fn review_all(
        &self,
        records: &[DocumentRecord],
        unreadable: &[Option<String>],
    ) -> Vec<DocumentOutcome> {
        let run = |i: usize| match &unreadable[i] {
            Some(error) => DocumentOutcome::Failed {
                error: error.clone(),
                rule_issues: Vec::new(),
            },
            None => self.review_one(&records[i]),
        };

        let workers = self.cfg.global.max_parallel_documents.max(1).min(records.len());
        if workers <= 1 {
            return (0..records.len()).map(run).collect();
        }

        let next = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<DocumentOutcome>>> = Mutex::new(vec![None; records.len()]);
        std::thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|| {
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        if i >= records.len() {
                            break;
                        }
                        let outcome = run(i);
                        if let Ok(mut guard) = slots.lock() {
                            guard[i] = Some(outcome);
                        }
                    }
                });
            }
        });

        slots
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| DocumentOutcome::Failed {
                    error: "review worker did not report a result".to_string(),
                    rule_issues: Vec::new(),
                })
            })
            .collect()
    }
}

/// Upload names made unique so every issue maps to exactly one document:
/// repeats get a ` (2)`, ` (3)`, ... suffix.
fn unique_filenames(inputs: &[DocumentInput]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let base = input.filename();
            let mut name = base.to_string();
            let mut n = 2;
            while !seen.insert(name.clone()) {
                name = format!("{base} ({n})");
                n += 1;
            }
            name
        })
        .collect()
}
