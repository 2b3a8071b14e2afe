//! Project-wide locator rewrite.
//!
//! Walks the project tree, and in every in-scope file that contains the
//! failed locator replaces all occurrences literally, writing the file back
//! in place. There is no backup and no rollback: a file that fails to read or
//! write is recorded and the scan moves on.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::artifacts::content_digest;
use crate::domain::{HealError, Result};

/// Extensions rewritten when no explicit list is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["java", "loc", "properties", "rs"];

/// Which files the patcher may touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum PatchScope {
    /// Only files whose extension is in the list (compared case-insensitively).
    SourceFiles { extensions: Vec<String> },
    /// Every regular file under the root.
    AllFiles,
}

impl Default for PatchScope {
    fn default() -> Self {
        PatchScope::SourceFiles {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl PatchScope {
    pub fn includes(&self, path: &Path) -> bool {
        match self {
            PatchScope::AllFiles => true,
            PatchScope::SourceFiles { extensions } => path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| {
                    extensions
                        .iter()
                        .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
                }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
    pub failed: String,
    pub replacement: String,
    pub root: PathBuf,
    pub scope: PatchScope,
    /// Subtrees never scanned (the artifact directory, build output).
    pub exclude: Vec<PathBuf>,
}

/// What happened to one scanned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRecord {
    pub path: PathBuf,
    pub replaced: bool,
    pub occurrences: usize,
    /// SHA-256 of the content before rewriting, for files that were rewritten.
    pub original_digest: Option<String>,
    pub error: Option<String>,
}

impl PatchRecord {
    fn untouched(path: PathBuf) -> Self {
        Self {
            path,
            replaced: false,
            occurrences: 0,
            original_digest: None,
            error: None,
        }
    }

    fn failed(path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::untouched(path)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSummary {
    pub records: Vec<PatchRecord>,
}

impl PatchSummary {
    pub fn files_scanned(&self) -> usize {
        self.records.len()
    }

    pub fn files_patched(&self) -> usize {
        self.records.iter().filter(|r| r.replaced).count()
    }

    pub fn total_replacements(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.replaced)
            .map(|r| r.occurrences)
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PatchRecord> {
        self.records.iter().filter(|r| r.error.is_some())
    }
}

/// Replace `request.failed` with `request.replacement` across the project.
///
/// Fails only when the request itself is unusable (empty locator, missing
/// root); per-file problems are recorded in the summary.
pub fn patch_project(request: &PatchRequest) -> Result<PatchSummary> {
    let failed = request.failed.trim();
    let replacement = request.replacement.trim();
    if failed.is_empty() {
        return Err(HealError::Patch("failed locator is empty".to_string()));
    }

    let root = request.root.canonicalize().map_err(|e| {
        HealError::Patch(format!(
            "project root {} is not accessible: {}",
            request.root.display(),
            e
        ))
    })?;
    let excluded: Vec<PathBuf> = request
        .exclude
        .iter()
        .filter_map(|p| p.canonicalize().ok())
        .collect();

    info!(
        root = %root.display(),
        scope = ?request.scope,
        failed = %failed,
        replacement = %replacement,
        "Patching project"
    );

    let mut summary = PatchSummary::default();
    if failed == replacement {
        info!("Replacement equals the failed locator; nothing to patch");
        return Ok(summary);
    }

    let walker = WalkDir::new(&root)
        .into_iter()
        .filter_entry(|entry| !excluded.iter().any(|x| entry.path().starts_with(x)));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                warn!(path = %path.display(), error = %e, "Cannot walk entry");
                summary.records.push(PatchRecord::failed(path, e.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() || !request.scope.includes(entry.path()) {
            continue;
        }
        summary
            .records
            .push(patch_file(entry.path(), failed, replacement));
    }

    info!(
        scanned = summary.files_scanned(),
        patched = summary.files_patched(),
        replacements = summary.total_replacements(),
        failures = summary.failures().count(),
        "Project patch finished"
    );
    Ok(summary)
}

fn patch_file(path: &Path, failed: &str, replacement: &str) -> PatchRecord {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read file");
            return PatchRecord::failed(path.to_path_buf(), e.to_string());
        }
    };
    let content = match std::str::from_utf8(&bytes) {
        Ok(content) => content,
        Err(_) => {
            debug!(path = %path.display(), "Skipping non UTF-8 file");
            return PatchRecord::untouched(path.to_path_buf());
        }
    };

    let occurrences = content.matches(failed).count();
    if occurrences == 0 {
        debug!(path = %path.display(), "Locator not present");
        return PatchRecord::untouched(path.to_path_buf());
    }

    let updated = content.replace(failed, replacement);
    if let Err(e) = std::fs::write(path, updated) {
        warn!(path = %path.display(), error = %e, "Cannot write file");
        return PatchRecord::failed(path.to_path_buf(), e.to_string());
    }

    info!(path = %path.display(), occurrences, "Locator replaced");
    PatchRecord {
        path: path.to_path_buf(),
        replaced: true,
        occurrences,
        original_digest: Some(content_digest(&bytes)),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(root: &Path, scope: PatchScope) -> PatchRequest {
        PatchRequest {
            failed: "//button[@id='old']".to_string(),
            replacement: "//button[@id='new']".to_string(),
            root: root.to_path_buf(),
            scope,
            exclude: Vec::new(),
        }
    }

    #[test]
    fn default_scope_uses_extension_allow_list() {
        let scope = PatchScope::default();
        assert!(scope.includes(Path::new("src/LoginPage.java")));
        assert!(scope.includes(Path::new("locators/home.LOC")));
        assert!(scope.includes(Path::new("config.properties")));
        assert!(!scope.includes(Path::new("README.md")));
        assert!(!scope.includes(Path::new("Makefile")));
        assert!(PatchScope::AllFiles.includes(Path::new("README.md")));
    }

    #[test]
    fn replaces_every_occurrence_in_scope() {
        let dir = tempdir().expect("tempdir");
        let page = dir.path().join("LoginPage.java");
        std::fs::write(
            &page,
            "By a = By.xpath(\"//button[@id='old']\");\nBy b = By.xpath(\"//button[@id='old']\");\n",
        )
        .expect("write");
        let notes = dir.path().join("notes.md");
        std::fs::write(&notes, "//button[@id='old']").expect("write");

        let summary = patch_project(&request(dir.path(), PatchScope::default())).expect("patch");
        assert_eq!(summary.files_patched(), 1);
        assert_eq!(summary.total_replacements(), 2);
        let patched = std::fs::read_to_string(&page).expect("read");
        assert!(!patched.contains("'old'"));
        assert_eq!(patched.matches("//button[@id='new']").count(), 2);
        assert_eq!(
            std::fs::read_to_string(&notes).expect("read"),
            "//button[@id='old']"
        );
    }

    #[test]
    fn all_files_scope_is_opt_in() {
        let dir = tempdir().expect("tempdir");
        let notes = dir.path().join("notes.md");
        std::fs::write(&notes, "see //button[@id='old']").expect("write");

        let summary = patch_project(&request(dir.path(), PatchScope::AllFiles)).expect("patch");
        assert_eq!(summary.files_patched(), 1);
        assert_eq!(
            std::fs::read_to_string(&notes).expect("read"),
            "see //button[@id='new']"
        );
    }

    #[test]
    fn excluded_subtrees_are_not_scanned() {
        let dir = tempdir().expect("tempdir");
        let docs = dir.path().join("Healing_Docs").join("locator");
        std::fs::create_dir_all(&docs).expect("mkdir");
        std::fs::write(docs.join("failed_locator_r1.txt"), "//button[@id='old']").expect("write");

        let mut req = request(dir.path(), PatchScope::AllFiles);
        req.exclude = vec![dir.path().join("Healing_Docs")];
        let summary = patch_project(&req).expect("patch");
        assert_eq!(summary.files_scanned(), 0);
    }

    #[test]
    fn empty_locator_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let mut req = request(dir.path(), PatchScope::AllFiles);
        req.failed = "   ".to_string();
        assert!(matches!(patch_project(&req), Err(HealError::Patch(_))));
    }

    #[test]
    fn non_utf8_files_are_skipped() {
        let dir = tempdir().expect("tempdir");
        let blob = dir.path().join("blob.properties");
        std::fs::write(&blob, [0xff, 0xfe, 0x00, b'/']).expect("write");

        let summary = patch_project(&request(dir.path(), PatchScope::default())).expect("patch");
        assert_eq!(summary.files_scanned(), 1);
        assert_eq!(summary.files_patched(), 0);
        assert_eq!(summary.failures().count(), 0);
    }

    #[test]
    fn unreadable_path_is_recorded_as_failure() {
        let dir = tempdir().expect("tempdir");
        let record = patch_file(dir.path(), "//button[@id='old']", "//button[@id='new']");
        assert!(!record.replaced);
        assert_eq!(record.occurrences, 0);
        assert!(record.original_digest.is_none());
        assert!(record.error.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn one_unreadable_file_does_not_stop_the_others() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().expect("tempdir");
        let locked = dir.path().join("Locked.java");
        let open = dir.path().join("Open.java");
        std::fs::write(&locked, "By.xpath(\"//button[@id='old']\")").expect("write");
        std::fs::write(&open, "By.xpath(\"//button[@id='old']\")").expect("write");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).expect("chmod");

        // Permission bits do not stop a privileged user.
        if std::fs::read(&locked).is_ok() {
            return;
        }

        let summary = patch_project(&request(dir.path(), PatchScope::default())).expect("patch");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o644)).expect("chmod");

        assert_eq!(summary.files_scanned(), 2);
        assert_eq!(summary.failures().count(), 1);
        let failure = summary.failures().next().expect("failure");
        assert!(failure.path.ends_with("Locked.java"));
        assert!(!failure.replaced);

        assert_eq!(summary.files_patched(), 1);
        assert_eq!(
            std::fs::read_to_string(&open).expect("read"),
            "By.xpath(\"//button[@id='new']\")"
        );
        assert_eq!(
            std::fs::read_to_string(&locked).expect("read"),
            "By.xpath(\"//button[@id='old']\")"
        );
    }
}
