//! In-memory model clients (testing only)
//!
//! Provides `ScriptedModel` and `UnreachableModel`, which satisfy the
//! [`ModelClient`] contract without any network access.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ModelError;
use crate::settings::Provider;
use crate::ModelClient;

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

/// Replays a queue of canned replies and records every prompt it receives.
///
/// When the queue is exhausted every further call fails with
/// [`ModelError::EmptyResponse`].
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn fail(self, err: ModelError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn provider(&self) -> Provider {
        Provider::Cohere
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ModelError::EmptyResponse))
    }
}

// ---------------------------------------------------------------------------
// UnreachableModel
// ---------------------------------------------------------------------------

/// Always fails with a network error.
#[derive(Debug, Default)]
pub struct UnreachableModel;

#[async_trait]
impl ModelClient for UnreachableModel {
    fn provider(&self) -> Provider {
        Provider::Cohere
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
        Err(ModelError::Network("connection refused".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_model_replays_in_order() {
        let model = ScriptedModel::new()
            .reply("first")
            .fail(ModelError::EmptyResponse)
            .reply("third");

        assert_eq!(model.complete("a").await.expect("first"), "first");
        assert!(model.complete("b").await.is_err());
        assert_eq!(model.complete("c").await.expect("third"), "third");
        assert!(matches!(
            model.complete("d").await,
            Err(ModelError::EmptyResponse)
        ));
        assert_eq!(model.prompts(), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn unreachable_model_reports_network_error() {
        let err = UnreachableModel.complete("x").await.expect_err("fails");
        assert!(matches!(err, ModelError::Network(_)));
    }
}
