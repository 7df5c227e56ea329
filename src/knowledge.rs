//! Reference knowledge base: chunked regulatory text with embeddings and
//! brute-force cosine retrieval.
//!
//! The index is append-only during ingestion and read-only afterwards, so a
//! built `KnowledgeBase` can be shared across document workers by reference.

use crate::{
    chunking::split_text,
    config::{Chunking, Config},
    provider::Embedder,
};
use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// One embedded span of reference text.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceChunk {
    pub id: String,
    pub source_name: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// A chunk returned from [`KnowledgeBase::query`] with its similarity score.
#[derive(Debug, Clone)]
pub struct RetrievedChunk<'a> {
    pub chunk: &'a ReferenceChunk,
    pub score: f32,
}

pub struct KnowledgeBase {
    chunking: Chunking,
    batch_size: usize,
    embedder: Arc<dyn Embedder>,
    chunks: Vec<ReferenceChunk>,
    sources: Vec<String>,
}

impl KnowledgeBase {
    pub fn new(cfg: &Config, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            chunking: cfg.chunking.clone(),
            batch_size: cfg.provider.embedding_batch_size.max(1),
            embedder,
            chunks: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Chunks and embeds `raw_text`, appending the chunks in source order.
    /// Returns how many chunks were added.
    pub fn ingest(&mut self, raw_text: &str, source_name: &str) -> Result<usize> {
        let spans = split_text(raw_text, &self.chunking);
        if spans.is_empty() {
            info!(source = source_name, "reference has no text; nothing indexed");
            return Ok(0);
        }

        let mut embeddings = Vec::with_capacity(spans.len());
        for batch in spans.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|s| s.text.clone()).collect();
            let vectors = self
                .embedder
                .embed(&texts)
                .with_context(|| format!("embedding reference chunks from {source_name}"))?;
            if vectors.len() != texts.len() {
                return Err(anyhow!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    texts.len()
                ));
            }
            embeddings.extend(vectors);
        }

        let base = self
            .chunks
            .iter()
            .filter(|c| c.source_name == source_name)
            .count();
        let added = spans.len();
        for (n, (span, embedding)) in spans.into_iter().zip(embeddings).enumerate() {
            self.chunks.push(ReferenceChunk {
                id: format!("{source_name}#{}", base + n),
                source_name: source_name.to_string(),
                text: span.text,
                start: span.start,
                end: span.end,
                embedding,
            });
        }
        if !self.sources.iter().any(|s| s == source_name) {
            self.sources.push(source_name.to_string());
        }

        info!(source = source_name, chunks = added, total = self.chunks.len(), "reference ingested");
        Ok(added)
    }

    /// Most relevant chunks first. Equal scores keep ingestion order.
    pub fn query(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedChunk<'_>>> {
        if top_k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let q = self
            .embedder
            .embed(&[question.to_string()])
            .context("embedding retrieval question")?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embedder returned no vector for the question"))?;

        let mut scored = Vec::with_capacity(self.chunks.len());
        for chunk in &self.chunks {
            let score = cosine(&q, &chunk.embedding).with_context(|| {
                format!("scoring chunk {}", chunk.id)
            })?;
            scored.push(RetrievedChunk { chunk, score });
        }

        // sort_by is stable, so ties stay in ingestion order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);

        debug!(
            top_k,
            best = scored.first().map(|r| r.score).unwrap_or_default(),
            "retrieval done"
        );
        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn chunks(&self) -> &[ReferenceChunk] {
        &self.chunks
    }
}

/// Cosine similarity; zero-norm vectors score 0.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(anyhow!(
            "embedding dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        ));
    }
    let mut dot = 0f32;
    let mut na = 0f32;
    let mut nb = 0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (na.sqrt() * nb.sqrt()))
}
