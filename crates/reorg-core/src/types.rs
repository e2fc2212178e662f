use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::remote::SshConfig;

/// A discovered file: absolute path plus byte size. Produced by a
/// `FileScanner` collaborator and treated as read-only here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size: u64,
}

impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Script,
    Document,
    Config,
    Test,
    Log,
    Other,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileType::Script => "script",
            FileType::Document => "document",
            FileType::Config => "config",
            FileType::Test => "test",
            FileType::Log => "log",
            FileType::Other => "other",
        };
        f.write_str(s)
    }
}

/// Classification decision for one file, position-correlated with the
/// scanned `FileInfo` list.
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub file: FileInfo,
    pub file_type: FileType,
    /// Explicit destination. When absent the mover falls back to a
    /// fixed per-type directory table.
    pub target_path: Option<PathBuf>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MoveOptions {
    pub dry_run: bool,
    pub overwrite_existing: bool,
    pub copy_instead_of_move: bool,
    pub preserve_timestamps: bool,
    /// Collision probing cap. On exhaustion the original (possibly
    /// colliding) target path is reused.
    pub max_conflict_probes: u32,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            overwrite_existing: false,
            copy_instead_of_move: false,
            preserve_timestamps: true,
            max_conflict_probes: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MovedFile {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct MoveStatistics {
    pub total_files: usize,
    pub successful_moves: usize,
    pub failed_moves: usize,
    pub skipped_files: usize,
    pub processing_time: Duration,
    pub total_moved_bytes: u64,
    pub average_move_time: Duration,
    pub errors: Vec<FailedFile>,
}

#[derive(Debug, Clone)]
pub struct MoveResult {
    pub success: bool,
    pub moved_files: Vec<MovedFile>,
    pub failed_files: Vec<FailedFile>,
    pub statistics: MoveStatistics,
    pub environment: String,
    pub processing_time: Duration,
}

/// How an environment's filesystem is reached. Remote-only operations
/// are unrepresentable on the `Local` arm.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Access {
    Local,
    Remote { ssh: SshConfig },
}

/// One target environment for a run: a name used in results, a root
/// directory, and how to reach it.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentSpec {
    pub name: String,
    pub root: PathBuf,
    #[serde(flatten)]
    pub access: Access,
}

impl EnvironmentSpec {
    pub fn local(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            access: Access::Local,
        }
    }

    pub fn remote(name: impl Into<String>, root: impl Into<PathBuf>, ssh: SshConfig) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            access: Access::Remote { ssh },
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.access, Access::Remote { .. })
    }
}

/// Cooperative cancellation flag, checked between files (and between
/// batches on remote moves). Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_move_options_default_probe_cap() {
        let options = MoveOptions::default();
        assert_eq!(options.max_conflict_probes, 1000);
        assert!(!options.dry_run);
    }
}
