use crate::{
    annotate::annotate_text,
    config::Config,
    document::{DocumentInput, DocumentRecord},
    engine::{Annotation, DocumentEngine},
    normalize::normalize_text,
    provider::Capabilities,
    report::{ComplianceReport, Issue, RunDiagnostics},
    session::ReviewSession,
    util::{ensure_dir, file_name_of},
};
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct Pipeline<E: DocumentEngine> {
    cfg: Config,
    engine: E,
}

pub struct JobOutput {
    pub report: ComplianceReport,
    pub diagnostics: RunDiagnostics,
    pub reviewed: Vec<ReviewedCopy>,
}

/// An annotated copy written next to the report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReviewedCopy {
    pub document: String,
    pub source: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Pdf,
    Docx,
    PlainText,
}

impl InputFormat {
    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }
}

impl<E: DocumentEngine> Pipeline<E> {
    pub fn new(cfg: &Config, engine: E) -> Self {
        Self {
            cfg: cfg.clone(),
            engine,
        }
    }

    /// Normalized text of a PDF, DOCX or plain-text file.
    pub fn load_text(&self, path: &Path) -> Result<String> {
        let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
        if meta.len() > self.cfg.limits.max_input_file_bytes {
            return Err(anyhow!(
                "{} exceeds max_input_file_bytes ({} > {})",
                path.display(),
                meta.len(),
                self.cfg.limits.max_input_file_bytes
            ));
        }

        let raw = match InputFormat::of(path) {
            Some(InputFormat::Pdf) => self.engine.extract_pdf_text(path)?.text,
            Some(InputFormat::Docx) => self.engine.extract_docx_text(path)?.text,
            Some(InputFormat::PlainText) => std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => return Err(anyhow!("unsupported input format: {}", path.display())),
        };
        normalize_text(&self.cfg, &raw)
    }

    pub fn run_job(
        &self,
        caps: Capabilities,
        references: &[PathBuf],
        documents: &[PathBuf],
        job_dir: &Path,
    ) -> Result<JobOutput> {
        let started = Instant::now();

        if references.len() > self.cfg.limits.max_reference_files {
            return Err(anyhow!(
                "too many reference files: {} > {}",
                references.len(),
                self.cfg.limits.max_reference_files
            ));
        }
        if documents.len() > self.cfg.limits.max_documents {
            return Err(anyhow!(
                "too many documents: {} > {}",
                documents.len(),
                self.cfg.limits.max_documents
            ));
        }

        let mut session = ReviewSession::from_capabilities(&self.cfg, caps)?;

        for path in references {
            self.check_timeout(started)?;
            let name = file_name_of(path);
            let text = self
                .load_text(path)
                .with_context(|| format!("loading reference {}", path.display()))?;
            let added = session
                .ingest_reference(&name, &text)
                .with_context(|| format!("indexing reference {name}"))?;
            debug!(reference = %name, chunks = added, "reference indexed");
        }
        if session.knowledge_base().is_empty() {
            warn!("knowledge base is empty; documents will be reviewed without reference context");
        }

        self.check_timeout(started)?;
        let inputs: Vec<DocumentInput> = documents
            .iter()
            .map(|path| {
                let filename = file_name_of(path);
                match self.load_text(path) {
                    Ok(text) => DocumentInput::Loaded(DocumentRecord::new(filename, text)),
                    Err(err) => DocumentInput::Unreadable {
                        filename,
                        error: format!("{err:#}"),
                    },
                }
            })
            .collect();

        let outcome = session.review_inputs(inputs)?;
        self.check_timeout(started)?;

        let reviewed = if self.cfg.output.write_reviewed_documents {
            self.write_reviewed_copies(documents, &outcome.records, &outcome.report.issues_found, job_dir)?
        } else {
            Vec::new()
        };

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            issues = outcome.report.issues_found.len(),
            reviewed = reviewed.len(),
            "job finished"
        );

        Ok(JobOutput {
            report: outcome.report,
            diagnostics: outcome.diagnostics,
            reviewed,
        })
    }

    fn check_timeout(&self, started: Instant) -> Result<()> {
        let limit = self.cfg.limits.job_timeout_seconds;
        if limit > 0 && started.elapsed().as_secs() > limit {
            return Err(anyhow!("job timeout exceeded: {limit}s"));
        }
        Ok(())
    }

    /// `records[i]` came from `sources[i]`. Copies are written for every
    /// readable DOCX or text document; the originals are never touched.
    fn write_reviewed_copies(
        &self,
        sources: &[PathBuf],
        records: &[DocumentRecord],
        issues: &[Issue],
        job_dir: &Path,
    ) -> Result<Vec<ReviewedCopy>> {
        let out_dir = job_dir.join("reviewed");
        ensure_dir(&out_dir)?;

        let mut copies = Vec::new();
        for (source, record) in sources.iter().zip(records) {
            if record.classification.is_none() {
                continue;
            }
            let own: Vec<Issue> = issues
                .iter()
                .filter(|i| i.document == record.filename)
                .cloned()
                .collect();
            let output = out_dir.join(reviewed_file_name(
                &self.cfg.output.reviewed_prefix,
                source,
                &record.filename,
            ));

            let written = match InputFormat::of(source) {
                Some(InputFormat::Docx) => {
                    let annotations: Vec<Annotation> = own.iter().map(Annotation::for_issue).collect();
                    self.engine
                        .annotate_docx(source, &output, &annotations)
                        .map(|o| debug!(inline = o.placed_inline, appended = o.appended, "docx annotated"))
                }
                Some(InputFormat::PlainText) => std::fs::read_to_string(source)
                    .map_err(anyhow::Error::from)
                    .and_then(|raw| {
                        std::fs::write(&output, annotate_text(&raw, &own)).map_err(anyhow::Error::from)
                    }),
                _ => {
                    debug!(document = %record.filename, "no annotated copy for this format");
                    continue;
                }
            };

            match written {
                Ok(()) => copies.push(ReviewedCopy {
                    document: record.filename.clone(),
                    source: source.clone(),
                    output,
                }),
                Err(err) => warn!(document = %record.filename, "annotated copy failed: {err:#}"),
            }
        }
        Ok(copies)
    }
}

/// `document` is the upload name as reported, possibly carrying a ` (n)`
/// suffix for duplicates. The suffix goes before the extension so the copy
/// still opens as the original format.
fn reviewed_file_name(prefix: &str, source: &Path, document: &str) -> String {
    let base = file_name_of(source);
    let suffix = document.strip_prefix(base.as_str()).unwrap_or_default();
    match (source.file_stem(), source.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{prefix}{}{suffix}.{}",
            stem.to_string_lossy(),
            ext.to_string_lossy()
        ),
        _ => format!("{prefix}{document}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_suffix_lands_before_the_extension() {
        let src = Path::new("b/draft.docx");
        assert_eq!(reviewed_file_name("reviewed_", src, "draft.docx"), "reviewed_draft.docx");
        assert_eq!(
            reviewed_file_name("reviewed_", src, "draft.docx (2)"),
            "reviewed_draft (2).docx"
        );
    }
}
