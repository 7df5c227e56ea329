pub mod azure;
pub mod error;
pub mod hashing;
pub mod retry;

use crate::config::Config;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use azure::{AzureOpenAi, AzureSettings};
pub use error::CapabilityError;
pub use hashing::HashingEmbedder;
pub use retry::{RetryPolicy, call_with_retry};

/// Turns text into vectors. One output vector per input, in input order.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError>;
}

/// A chat-style generative model returning the assistant message text.
pub trait Completer: Send + Sync {
    fn complete(&self, req: &CompletionRequest) -> Result<String, CapabilityError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Capabilities selected by `provider.kind`.
pub struct Capabilities {
    pub embedder: Arc<dyn Embedder>,
    pub completer: Option<Arc<dyn Completer>>,
}

pub fn from_config(cfg: &Config) -> Result<Capabilities> {
    match cfg.provider.kind.as_str() {
        "azure_openai" => {
            let settings = AzureSettings::from_env(&cfg.provider)?;
            let client = Arc::new(AzureOpenAi::new(settings, &cfg.provider)?);
            Ok(Capabilities {
                embedder: client.clone(),
                completer: Some(client),
            })
        }
        "offline" => Ok(Capabilities {
            embedder: Arc::new(HashingEmbedder::new(cfg.provider.offline_dimension)),
            completer: None,
        }),
        other => Err(anyhow!("unknown provider.kind: {other}")),
    }
}
