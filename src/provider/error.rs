use thiserror::Error;

/// Failure of an embedding or completion call.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("could not decode provider response: {0}")]
    Decode(String),
}

impl CapabilityError {
    /// Worth another attempt: timeouts, connection failures, throttling and
    /// server-side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Status { code, .. } => *code == 429 || *code >= 500,
            Self::Decode(_) => false,
        }
    }
}
