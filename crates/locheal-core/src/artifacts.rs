//! Run artifact layout and persistence.
//!
//! Every run writes its intermediate products under one artifact root, one
//! sub-directory per kind, file names suffixed with the run id:
//!
//! ```text
//! <root>/html/page_source_<run>.html
//! <root>/locator/failed_locator_<run>.txt
//! <root>/processed_html/processed_page_source_<run>.html
//! <root>/llm_output/llm_output_<run>.txt
//! <root>/validated_locators/validated_locators_<run>.txt
//! <root>/healing_report/healing_report_<run>.html
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{Result, RunId};

/// Default artifact root, relative to the working directory.
pub const DEFAULT_ARTIFACT_DIR: &str = "Healing_Docs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    PageSource,
    FailedLocator,
    ProcessedPageSource,
    ModelOutput,
    ValidatedLocators,
    HealingReport,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::PageSource,
        ArtifactKind::FailedLocator,
        ArtifactKind::ProcessedPageSource,
        ArtifactKind::ModelOutput,
        ArtifactKind::ValidatedLocators,
        ArtifactKind::HealingReport,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactKind::PageSource => "html",
            ArtifactKind::FailedLocator => "locator",
            ArtifactKind::ProcessedPageSource => "processed_html",
            ArtifactKind::ModelOutput => "llm_output",
            ArtifactKind::ValidatedLocators => "validated_locators",
            ArtifactKind::HealingReport => "healing_report",
        }
    }

    fn file_prefix(&self) -> &'static str {
        match self {
            ArtifactKind::PageSource => "page_source_",
            ArtifactKind::FailedLocator => "failed_locator_",
            ArtifactKind::ProcessedPageSource => "processed_page_source_",
            ArtifactKind::ModelOutput => "llm_output_",
            ArtifactKind::ValidatedLocators => "validated_locators_",
            ArtifactKind::HealingReport => "healing_report_",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::PageSource
            | ArtifactKind::ProcessedPageSource
            | ArtifactKind::HealingReport => "html",
            _ => "txt",
        }
    }

    pub fn file_name(&self, run_id: &RunId) -> String {
        format!("{}{}.{}", self.file_prefix(), run_id, self.extension())
    }
}

/// Resolves and writes artifact files beneath a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, kind: ArtifactKind, run_id: &RunId) -> PathBuf {
        self.root.join(kind.dir_name()).join(kind.file_name(run_id))
    }

    /// Write `contents` as the `kind` artifact of `run_id`, creating the
    /// directory on demand. Returns the written path.
    pub fn write(&self, kind: ArtifactKind, run_id: &RunId, contents: &str) -> Result<PathBuf> {
        let path = self.path_for(kind, run_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        tracing::debug!(
            run_id = %run_id,
            kind = kind.dir_name(),
            path = %path.display(),
            digest = %content_digest(contents.as_bytes()),
            "Artifact written"
        );
        Ok(path)
    }

    pub fn read(&self, kind: ArtifactKind, run_id: &RunId) -> Result<String> {
        Ok(std::fs::read_to_string(self.path_for(kind, run_id))?)
    }
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_DIR)
    }
}

/// Paths of the artifacts a run has produced so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub page_source: Option<PathBuf>,
    pub failed_locator: Option<PathBuf>,
    pub processed_page_source: Option<PathBuf>,
    pub model_output: Option<PathBuf>,
    pub validated_locators: Option<PathBuf>,
    pub healing_report: Option<PathBuf>,
}

impl ArtifactPaths {
    pub fn record(&mut self, kind: ArtifactKind, path: PathBuf) {
        *self.slot(kind) = Some(path);
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&Path> {
        let slot = match kind {
            ArtifactKind::PageSource => &self.page_source,
            ArtifactKind::FailedLocator => &self.failed_locator,
            ArtifactKind::ProcessedPageSource => &self.processed_page_source,
            ArtifactKind::ModelOutput => &self.model_output,
            ArtifactKind::ValidatedLocators => &self.validated_locators,
            ArtifactKind::HealingReport => &self.healing_report,
        };
        slot.as_deref()
    }

    fn slot(&mut self, kind: ArtifactKind) -> &mut Option<PathBuf> {
        match kind {
            ArtifactKind::PageSource => &mut self.page_source,
            ArtifactKind::FailedLocator => &mut self.failed_locator,
            ArtifactKind::ProcessedPageSource => &mut self.processed_page_source,
            ArtifactKind::ModelOutput => &mut self.model_output,
            ArtifactKind::ValidatedLocators => &mut self.validated_locators,
            ArtifactKind::HealingReport => &mut self.healing_report,
        }
    }

    /// Number of artifacts recorded.
    pub fn count(&self) -> usize {
        ArtifactKind::ALL
            .iter()
            .filter(|kind| self.get(**kind).is_some())
            .count()
    }
}

/// SHA-256 hex digest of `bytes`.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
