//! Cohere chat backend.
//!
//! Issues a single non-streamed `POST /v1/chat` request and returns the
//! `text` field of the response.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ModelError;
use crate::settings::{ModelSettings, Provider};
use crate::ModelClient;

const DEFAULT_ENDPOINT: &str = "https://api.cohere.com";
const CLIENT_NAME: &str = "locheal";

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub message: &'a str,
    pub model: &'a str,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub text: Option<String>,
}

/// Cohere chat client.
pub struct CohereClient {
    settings: ModelSettings,
    api_key: String,
    http_client: reqwest::Client,
}

impl CohereClient {
    /// Create a client; fails when no credential can be resolved.
    pub fn new(settings: ModelSettings) -> Result<Self, ModelError> {
        settings.validate()?;
        let api_key = settings.resolve_api_key()?;
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("locheal/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            settings,
            api_key,
            http_client,
        })
    }

    fn chat_url(&self) -> String {
        let base = self
            .settings
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/');
        format!("{}/v1/chat", base)
    }

    pub(crate) fn build_request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            message: prompt,
            model: &self.settings.model,
            temperature: self.settings.temperature,
            p: self.settings.top_p,
        }
    }
}

#[async_trait]
impl ModelClient for CohereClient {
    fn provider(&self) -> Provider {
        Provider::Cohere
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let url = self.chat_url();
        debug!(url = %url, model = %self.settings.model, "Sending Cohere chat request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Client-Name", CLIENT_NAME)
            .json(&self.build_request(prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ModelError::from_status(status.as_u16(), &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        let text = parsed
            .text
            .filter(|t| !t.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)?;

        info!(chars = text.len(), "Cohere chat request succeeded");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(settings: ModelSettings) -> CohereClient {
        CohereClient::new(settings.with_api_key("test-key")).expect("client")
    }

    #[test]
    fn request_carries_sampling_parameters() {
        let mut settings = ModelSettings::for_provider(Provider::Cohere);
        settings.temperature = 0.2;
        settings.top_p = Some(0.75);
        let client = client(settings);

        let request = serde_json::to_value(client.build_request("find the button"))
            .expect("serialize");
        assert_eq!(request["message"], "find the button");
        assert_eq!(request["model"], "command-r-plus");
        assert!((request["temperature"].as_f64().expect("temp") - 0.2).abs() < 1e-6);
        assert!((request["p"].as_f64().expect("p") - 0.75).abs() < 1e-6);
    }

    #[test]
    fn top_p_is_omitted_when_unset() {
        let client = client(ModelSettings::for_provider(Provider::Cohere));
        let request = serde_json::to_value(client.build_request("x")).expect("serialize");
        assert!(request.get("p").is_none());
    }

    #[test]
    fn endpoint_override_is_used() {
        let client = client(
            ModelSettings::for_provider(Provider::Cohere).with_endpoint("http://localhost:9999/"),
        );
        assert_eq!(client.chat_url(), "http://localhost:9999/v1/chat");
    }
}
