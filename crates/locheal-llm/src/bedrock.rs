//! Amazon Bedrock backend using the Converse API.
//!
//! Authenticates with a Bedrock API key (bearer token) rather than SigV4, so
//! no AWS SDK is required. The request carries one user message, the
//! inference parameters, and the optional guardrail.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ModelError;
use crate::settings::{ModelSettings, Provider};
use crate::ModelClient;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConverseRequest<'a> {
    pub messages: Vec<Message<'a>>,
    pub inference_config: InferenceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardrail_config: Option<GuardrailRequest<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Message<'a> {
    pub role: &'static str,
    pub content: Vec<TextBlock<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TextBlock<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InferenceConfig {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GuardrailRequest<'a> {
    pub guardrail_identifier: &'a str,
    pub guardrail_version: &'a str,
}

#[derive(Debug, Deserialize)]
struct ConverseResponse {
    output: Option<ConverseOutput>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: Option<OutputMessage>,
}

#[derive(Debug, Deserialize)]
struct OutputMessage {
    #[serde(default)]
    content: Vec<OutputBlock>,
}

#[derive(Debug, Deserialize)]
struct OutputBlock {
    text: Option<String>,
}

/// Bedrock Converse client.
pub struct BedrockClient {
    settings: ModelSettings,
    api_key: String,
    http_client: reqwest::Client,
}

impl BedrockClient {
    /// Create a client; fails when no credential can be resolved.
    pub fn new(settings: ModelSettings) -> Result<Self, ModelError> {
        settings.validate()?;
        if settings.region.trim().is_empty() && settings.endpoint.is_none() {
            return Err(ModelError::Config(
                "bedrock needs either a region or an endpoint".to_string(),
            ));
        }
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

    /// `{endpoint}/model/{modelId}/converse`, the model id pushed as one path
    /// segment so `/` inside an ARN is escaped.
    pub(crate) fn converse_url(&self) -> Result<reqwest::Url, ModelError> {
        let base = match &self.settings.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "https://bedrock-runtime.{}.amazonaws.com",
                self.settings.region
            ),
        };

        let mut url = reqwest::Url::parse(&base)
            .map_err(|e| ModelError::Config(format!("invalid endpoint {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| ModelError::Config(format!("endpoint cannot be a base: {}", base)))?
            .pop_if_empty()
            .extend(["model", self.settings.model.as_str(), "converse"]);
        Ok(url)
    }

    pub(crate) fn build_request<'a>(&'a self, prompt: &'a str) -> ConverseRequest<'a> {
        ConverseRequest {
            messages: vec![Message {
                role: "user",
                content: vec![TextBlock { text: prompt }],
            }],
            inference_config: InferenceConfig {
                temperature: self.settings.temperature,
                top_p: self.settings.top_p,
            },
            guardrail_config: self.settings.guardrail.as_ref().map(|g| GuardrailRequest {
                guardrail_identifier: &g.id,
                guardrail_version: &g.version,
            }),
        }
    }
}

#[async_trait]
impl ModelClient for BedrockClient {
    fn provider(&self) -> Provider {
        Provider::Bedrock
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let url = self.converse_url()?;
        debug!(url = %url, model = %self.settings.model, "Sending Bedrock converse request");

        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ModelError::from_status(status.as_u16(), &body));
        }

        let parsed: ConverseResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        let text = parsed
            .output
            .and_then(|o| o.message)
            .and_then(|m| m.content.into_iter().find_map(|block| block.text))
            .filter(|t| !t.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)?;

        info!(chars = text.len(), "Bedrock converse request succeeded");
        Ok(text)
    }
}
