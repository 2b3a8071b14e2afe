//! Error types for locheal-llm

use thiserror::Error;

use crate::settings::Provider;

/// Errors that can occur while invoking a model backend
#[derive(Error, Debug)]
pub enum ModelError {
    /// No API key was configured or found in the environment
    #[error("no credentials configured for {provider} (set {env_var})")]
    MissingCredentials {
        provider: Provider,
        env_var: &'static str,
    },

    /// Settings cannot be turned into a request
    #[error("invalid model configuration: {0}")]
    Config(String),

    /// Transport-level failure (DNS, TLS, timeout, connection reset)
    #[error("network error: {0}")]
    Network(String),

    /// The provider rejected the credentials
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Any other non-success status
    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Response parsed but carried no text
    #[error("provider returned an empty response")]
    EmptyResponse,
}

impl ModelError {
    /// Map a non-success HTTP status and body onto an error variant.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_error_message(body);
        match status {
            401 | 403 => ModelError::Authentication(message),
            _ => ModelError::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        ModelError::Network(err.to_string())
    }
}

/// Pull a human-readable message out of a provider error body.
///
/// Cohere answers `{"message": ...}`, Bedrock answers `{"message": ...}` or
/// `{"Message": ...}`; anything else is returned truncated.
fn extract_error_message(body: &str) -> String {
    const MAX_LEN: usize = 200;

    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    if let Some(value) = parsed {
        for key in ["message", "Message"] {
            if let Some(msg) = value.get(key).and_then(|m| m.as_str()) {
                return msg.to_string();
            }
        }
    }

    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_LEN) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
