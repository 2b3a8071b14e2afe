//! Model provider selection and request parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Supported model backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Cohere,
    Bedrock,
}

impl Provider {
    /// Environment variable holding the provider credential.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Cohere => "COHERE_API_KEY",
            Provider::Bedrock => "AWS_BEARER_TOKEN_BEDROCK",
        }
    }

    /// Model used when the configuration does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Cohere => "command-r-plus",
            Provider::Bedrock => "anthropic.claude-3-haiku-20240307-v1:0",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Cohere => "cohere",
            Provider::Bedrock => "bedrock",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bedrock guardrail applied to the converse call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    pub id: String,
    pub version: String,
}

/// Everything a backend needs to issue a single-turn chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Which backend to call.
    pub provider: Provider,

    /// Provider-specific model identifier.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Nucleus-sampling value; omitted from the request when unset.
    pub top_p: Option<f32>,

    /// Optional Bedrock guardrail.
    pub guardrail: Option<GuardrailConfig>,

    /// AWS region for Bedrock.
    pub region: String,

    /// Base URL override (proxies, tests).
    pub endpoint: Option<String>,

    /// Explicit credential; the provider env var is used when unset.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Transport timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::for_provider(Provider::default())
    }
}

impl ModelSettings {
    /// Defaults for a given provider.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            temperature: 0.3,
            top_p: None,
            guardrail: None,
            region: "us-east-1".to_string(),
            endpoint: None,
            api_key: None,
            timeout_secs: 120,
        }
    }

    /// Set the credential explicitly.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Point the backend at a different base URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Resolve the credential from the settings or the provider env var.
    pub fn resolve_api_key(&self) -> Result<String, ModelError> {
        let from_settings = self.api_key.clone().filter(|k| !k.trim().is_empty());
        let from_env = || {
            std::env::var(self.provider.api_key_env())
                .ok()
                .filter(|k| !k.trim().is_empty())
        };

        from_settings
            .or_else(from_env)
            .ok_or(ModelError::MissingCredentials {
                provider: self.provider,
                env_var: self.provider.api_key_env(),
            })
    }

    /// Check parameter ranges before any request is built.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.model.trim().is_empty() {
            return Err(ModelError::Config("model id must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ModelError::Config(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(ModelError::Config(format!(
                    "top_p must be within 0.0..=1.0, got {}",
                    p
                )));
            }
        }
        if self.timeout_secs == 0 {
            return Err(ModelError::Config("timeout_secs must be positive".to_string()));
        }
        if let Some(g) = &self.guardrail {
            if g.id.trim().is_empty() || g.version.trim().is_empty() {
                return Err(ModelError::Config(
                    "guardrail id and version must both be set".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_provider() {
        let cohere = ModelSettings::for_provider(Provider::Cohere);
        assert_eq!(cohere.model, "command-r-plus");

        let bedrock = ModelSettings::for_provider(Provider::Bedrock);
        assert!(bedrock.model.starts_with("anthropic."));
        assert_eq!(bedrock.region, "us-east-1");
    }

    #[test]
    fn explicit_key_wins() {
        let settings = ModelSettings::default().with_api_key("k-123");
        assert_eq!(settings.resolve_api_key().expect("key"), "k-123");
    }

    #[test]
    fn blank_key_falls_through_to_env() {
        let settings = ModelSettings::for_provider(Provider::Bedrock).with_api_key("   ");
        let env_key = std::env::var(Provider::Bedrock.api_key_env())
            .ok()
            .filter(|k| !k.trim().is_empty());
        match env_key {
            Some(key) => assert_eq!(settings.resolve_api_key().expect("env key"), key),
            None => {
                let err = settings.resolve_api_key().expect_err("missing");
                assert!(matches!(err, ModelError::MissingCredentials { .. }));
            }
        }
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut settings = ModelSettings::default();
        settings.temperature = 3.5;
        assert!(settings.validate().is_err());

        let mut settings = ModelSettings::default();
        settings.top_p = Some(1.5);
        assert!(settings.validate().is_err());

        let mut settings = ModelSettings::default();
        settings.model = " ".to_string();
        assert!(settings.validate().is_err());

        let mut settings = ModelSettings::default();
        settings.guardrail = Some(GuardrailConfig {
            id: "gr-1".to_string(),
            version: String::new(),
        });
        assert!(settings.validate().is_err());

        assert!(ModelSettings::default().validate().is_ok());
    }

    #[test]
    fn provider_serde_is_snake_case() {
        let json = serde_json::to_string(&Provider::Bedrock).expect("serialize");
        assert_eq!(json, "\"bedrock\"");
        let parsed: Provider = serde_json::from_str("\"cohere\"").expect("deserialize");
        assert_eq!(parsed, Provider::Cohere);
    }
}
