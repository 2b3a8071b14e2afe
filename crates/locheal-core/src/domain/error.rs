//! Error taxonomy for the healing pipeline.

use locheal_llm::ModelError;

/// Errors produced by pipeline stages.
///
/// The orchestrator never lets one of these escape `on_test_failure`; each is
/// logged and folded into an aborted run.
#[derive(Debug, thiserror::Error)]
pub enum HealError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("context capture failed: {0}")]
    Capture(String),

    #[error("prompt template error: {0}")]
    Template(String),

    #[error("model call failed: {0}")]
    Model(#[from] ModelError),

    #[error("patch error: {0}")]
    Patch(String),

    #[error("built-in pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, HealError>;
