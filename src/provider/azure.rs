use super::{
    CapabilityError, Completer, CompletionRequest, Embedder,
    retry::{RetryPolicy, call_with_retry},
};
use crate::config::Provider;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Endpoint settings for an Azure OpenAI resource. Values come from the
/// environment (or `.env`), never from the TOML config.
#[derive(Debug, Clone)]
pub struct AzureSettings {
    pub api_key: String,
    pub api_base: String,
    pub api_version: String,
    pub chat_deployment: String,
    pub embedding_deployment: String,
}

impl AzureSettings {
    pub fn from_env(p: &Provider) -> Result<Self> {
        let dotenv = dotenv_values(Path::new(".env"));
        Self::from_lookup(p, |key| {
            std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
        })
    }

    pub fn from_lookup(p: &Provider, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| -> Result<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("missing environment variable {name}"))
        };
        Ok(Self {
            api_key: get(&p.api_key_env)?,
            api_base: get(&p.api_base_env)?,
            api_version: get(&p.api_version_env)?,
            chat_deployment: get(&p.chat_deployment_env)?,
            embedding_deployment: get(&p.embedding_deployment_env)?,
        })
    }

    fn deployment_url(&self, deployment: &str, op: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.api_base.trim_end_matches('/'),
            deployment,
            op,
            self.api_version
        )
    }
}

/// Entries of a dotenv file; a missing file yields none. The process
/// environment still takes precedence over anything read here.
fn dotenv_values(path: &Path) -> HashMap<String, String> {
    let Ok(iter) = dotenvy::from_path_iter(path) else {
        return HashMap::new();
    };
    iter.filter_map(|item| match item {
        Ok(pair) => Some(pair),
        Err(err) => {
            warn!(path = %path.display(), "skipping unparsable dotenv entry: {err}");
            None
        }
    })
    .collect()
}

pub struct AzureOpenAi {
    settings: AzureSettings,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [super::ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl AzureOpenAi {
    pub fn new(settings: AzureSettings, p: &Provider) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(p.timeout_seconds.max(1)))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            settings,
            model: p.embedding_model.clone(),
            client,
            timeout_secs: p.timeout_seconds.max(1),
            retry: RetryPolicy::from_config(p),
        })
    }

    fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, CapabilityError> {
        let response = self
            .client
            .post(url)
            .header("api-key", &self.settings.api_key)
            .json(body)
            .send()
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CapabilityError::Status {
                code: status.as_u16(),
                body,
            });
        }

        response
            .json::<R>()
            .map_err(|e| CapabilityError::Decode(e.to_string()))
    }

    fn map_transport(&self, e: reqwest::Error) -> CapabilityError {
        if e.is_timeout() {
            CapabilityError::Timeout(self.timeout_secs)
        } else {
            CapabilityError::Transport(e.to_string())
        }
    }
}

impl Embedder for AzureOpenAi {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CapabilityError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = self
            .settings
            .deployment_url(&self.settings.embedding_deployment, "embeddings");
        let body = EmbeddingRequest {
            input: texts,
            model: &self.model,
        };
        debug!(inputs = texts.len(), "azure embeddings request");

        let mut resp: EmbeddingResponse =
            call_with_retry(self.retry, "embeddings", || self.post_json(&url, &body))?;

        if resp.data.len() != texts.len() {
            return Err(CapabilityError::Decode(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                resp.data.len()
            )));
        }
        resp.data.sort_by_key(|item| item.index);
        Ok(resp.data.into_iter().map(|item| item.embedding).collect())
    }
}

impl Completer for AzureOpenAi {
    fn complete(&self, req: &CompletionRequest) -> Result<String, CapabilityError> {
        let url = self
            .settings
            .deployment_url(&self.settings.chat_deployment, "chat/completions");
        let body = ChatRequest {
            messages: &req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };
        debug!(messages = req.messages.len(), "azure chat request");

        let resp: ChatResponse =
            call_with_retry(self.retry, "chat", || self.post_json(&url, &body))?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CapabilityError::Decode("response had no message content".into()))
    }
}
