//! locheal-llm: model backends for locator healing
//!
//! Defines the [`ModelClient`] contract used by the healing pipeline and
//! ships two interchangeable implementations:
//!
//! - [`CohereClient`]: Cohere chat API
//! - [`BedrockClient`]: Amazon Bedrock Converse API
//!
//! Every call is a single-turn chat request carrying the prompt text, the
//! model id, temperature, optional nucleus-sampling value and (Bedrock only)
//! an optional guardrail. Failures are returned as [`ModelError`], never
//! raised as panics, so callers can record "no response" and move on.

pub mod bedrock;
pub mod cohere;
pub mod error;
pub mod fakes;
pub mod settings;

use std::sync::Arc;

use async_trait::async_trait;

pub use bedrock::BedrockClient;
pub use cohere::CohereClient;
pub use error::ModelError;
pub use settings::{GuardrailConfig, ModelSettings, Provider};

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// A language-model backend able to answer one prompt with raw text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Backend identity, for logs and reports.
    fn provider(&self) -> Provider;

    /// Send `prompt` as a single user message and return the reply text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Build the backend selected by `settings.provider`.
pub fn build_client(settings: &ModelSettings) -> Result<Arc<dyn ModelClient>> {
    let client: Arc<dyn ModelClient> = match settings.provider {
        Provider::Cohere => Arc::new(CohereClient::new(settings.clone())?),
        Provider::Bedrock => Arc::new(BedrockClient::new(settings.clone())?),
    };
    tracing::debug!(provider = %settings.provider, model = %settings.model, "Model client ready");
    Ok(client)
}

/// locheal-llm version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
