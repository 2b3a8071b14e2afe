//! Healing configuration.
//!
//! A single [`HealingConfig`] value is built at start-up (from TOML, with
//! environment overrides) and handed to the [`Healer`](crate::pipeline::Healer).
//! Every section is optional; missing keys take the documented defaults.

use std::path::{Path, PathBuf};

use locheal_llm::ModelSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::artifacts::{ArtifactLayout, DEFAULT_ARTIFACT_DIR};
use crate::domain::{HealError, Result};
use crate::patch::{PatchScope, DEFAULT_EXTENSIONS};

/// Overrides `healing.enabled` when set to a boolean-like value.
pub const ENABLED_ENV: &str = "LOCHEAL_HEALING_ENABLED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HealingConfig {
    pub healing: HealingSection,
    pub model: ModelSettings,
    pub patch: PatchSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealingSection {
    /// Master switch; when false every failure is skipped.
    pub enabled: bool,
    pub artifacts_dir: PathBuf,
    /// Custom prompt template; the built-in one is used when unset.
    pub prompt_template: Option<PathBuf>,
}

impl Default for HealingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            prompt_template: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMode {
    #[default]
    SourceFiles,
    AllFiles,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchSection {
    /// Project root to rewrite; the working directory when unset.
    pub root: Option<PathBuf>,
    pub scope: ScopeMode,
    pub extensions: Vec<String>,
}

impl Default for PatchSection {
    fn default() -> Self {
        Self {
            root: None,
            scope: ScopeMode::SourceFiles,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl HealingConfig {
    /// Read a TOML file, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HealError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Parse TOML without touching the environment.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(ENABLED_ENV) {
            match parse_flag(&raw) {
                Some(enabled) => self.healing.enabled = enabled,
                None => warn!(var = ENABLED_ENV, value = %raw, "Ignoring unrecognised flag value"),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.model
            .validate()
            .map_err(|e| HealError::Config(e.to_string()))?;
        if self.healing.artifacts_dir.as_os_str().is_empty() {
            return Err(HealError::Config(
                "healing.artifacts_dir must not be empty".to_string(),
            ));
        }
        if self.patch.scope == ScopeMode::SourceFiles
            && self.patch.extensions.iter().all(|e| e.trim().is_empty())
        {
            return Err(HealError::Config(
                "patch.extensions must list at least one extension for source_files scope"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn patch_scope(&self) -> PatchScope {
        match self.patch.scope {
            ScopeMode::AllFiles => PatchScope::AllFiles,
            ScopeMode::SourceFiles => PatchScope::SourceFiles {
                extensions: self
                    .patch
                    .extensions
                    .iter()
                    .map(|e| e.trim().to_string())
                    .filter(|e| !e.is_empty())
                    .collect(),
            },
        }
    }

    pub fn artifact_layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.healing.artifacts_dir)
    }

    /// Root handed to the patcher.
    pub fn patch_root(&self) -> PathBuf {
        self.patch
            .root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
