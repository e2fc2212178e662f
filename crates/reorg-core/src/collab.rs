//! Collaborator seams the engine drives but does not implement:
//! scanning heuristics, content classification, backups, environment
//! sync, and report formatting all live behind these traits. The
//! `Null*` implementations are the defaults for anything switched off.

use std::path::Path;

use crate::error::Result;
use crate::types::{ClassificationResult, EnvironmentSpec, FileInfo};

/// Discovers the files to reorganize in one environment.
pub trait FileScanner: Send + Sync {
    fn scan(&self, environment: &EnvironmentSpec) -> Result<Vec<FileInfo>>;
}

/// Decides a type and optional explicit destination per file. The
/// returned list must be position-correlated with the input.
pub trait FileClassifier: Send + Sync {
    fn classify(
        &self,
        environment: &EnvironmentSpec,
        files: &[FileInfo],
    ) -> Result<Vec<ClassificationResult>>;
}

/// Snapshots an environment before files start moving.
pub trait BackupManager: Send + Sync {
    fn create_backup(&self, environment: &EnvironmentSpec, files: &[FileInfo]) -> Result<()>;
}

/// Reconciles environments after a run.
pub trait SyncManager: Send + Sync {
    fn sync(&self, environments: &[EnvironmentSpec]) -> Result<()>;
}

/// Renders the final run report. Formatting is out of scope here.
pub trait ReportWriter: Send + Sync {
    fn write_report(&self, report_dir: &Path, summary: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackupManager;

impl BackupManager for NullBackupManager {
    fn create_backup(&self, _environment: &EnvironmentSpec, _files: &[FileInfo]) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSyncManager;

impl SyncManager for NullSyncManager {
    fn sync(&self, _environments: &[EnvironmentSpec]) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullReportWriter;

impl ReportWriter for NullReportWriter {
    fn write_report(&self, _report_dir: &Path, _summary: &str) -> Result<()> {
        Ok(())
    }
}
