//! Applies the permission policy to batches of classified files and
//! confirms every change by re-reading the mode.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fsops::FileOps;
use crate::permissions::target_permissions;
use crate::types::{ClassificationResult, FileInfo};

#[derive(Debug, Clone)]
pub struct PermissionResult {
    pub file_path: PathBuf,
    pub previous_permissions: String,
    pub new_permissions: String,
    pub success: bool,
    pub error: Option<String>,
    pub processing_time: Duration,
}

#[derive(Debug, Clone)]
pub struct PermissionSummary {
    pub total_files: usize,
    pub successful_updates: usize,
    pub failed_updates: usize,
    pub skipped_files: usize,
    pub total_processing_time: Duration,
    pub environment: String,
    pub results: Vec<PermissionResult>,
    /// Failure-message histogram for reporting.
    pub error_summary: HashMap<String, usize>,
}

impl PermissionSummary {
    fn empty(environment: &str, skipped: usize) -> Self {
        Self {
            total_files: skipped,
            successful_updates: 0,
            failed_updates: 0,
            skipped_files: skipped,
            total_processing_time: Duration::ZERO,
            environment: environment.to_string(),
            results: Vec::new(),
            error_summary: HashMap::new(),
        }
    }

    /// Histogram of applied modes, for reporting.
    pub fn mode_summary(&self) -> HashMap<String, usize> {
        let mut modes = HashMap::new();
        for result in self.results.iter().filter(|r| r.success) {
            *modes.entry(result.new_permissions.clone()).or_insert(0) += 1;
        }
        modes
    }

    /// Count of files whose mode actually changed.
    pub fn changed_files(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.success && r.previous_permissions != r.new_permissions)
            .count()
    }
}

pub struct PermissionManager {
    ops: Arc<dyn FileOps>,
    environment: String,
}

impl PermissionManager {
    pub fn new(environment: impl Into<String>, ops: Arc<dyn FileOps>) -> Self {
        Self {
            ops,
            environment: environment.into(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Applies policy permissions to every (file, classification) pair.
    /// Per-file failures are folded into the summary; only a length
    /// mismatch aborts the call.
    pub fn set_permissions(
        &self,
        files: &[FileInfo],
        classifications: &[ClassificationResult],
    ) -> Result<PermissionSummary> {
        if files.len() != classifications.len() {
            return Err(Error::LengthMismatch {
                files: files.len(),
                classifications: classifications.len(),
            });
        }

        let start = Instant::now();
        info!(
            "setting permissions for {} files in {}",
            files.len(),
            self.environment
        );

        let mut results = Vec::with_capacity(files.len());
        let mut error_summary: HashMap<String, usize> = HashMap::new();

        for (file, classification) in files.iter().zip(classifications) {
            let result = self.set_single(file, classification);
            if let Some(error) = &result.error {
                *error_summary.entry(error.clone()).or_insert(0) += 1;
            }
            results.push(result);
        }

        let successful_updates = results.iter().filter(|r| r.success).count();
        let failed_updates = results.len() - successful_updates;
        let total_processing_time = start.elapsed();

        info!(
            "{} permission pass complete: {}/{} succeeded in {:.0?}",
            self.environment,
            successful_updates,
            files.len(),
            total_processing_time
        );

        Ok(PermissionSummary {
            total_files: files.len(),
            successful_updates,
            failed_updates,
            skipped_files: 0,
            total_processing_time,
            environment: self.environment.clone(),
            results,
            error_summary,
        })
    }

    fn set_single(
        &self,
        file: &FileInfo,
        classification: &ClassificationResult,
    ) -> PermissionResult {
        let start = Instant::now();
        let target = target_permissions(&file.path, classification.file_type);

        let previous = match self.ops.mode(&file.path) {
            Ok(mode) => mode,
            Err(e) => {
                return PermissionResult {
                    file_path: file.path.clone(),
                    previous_permissions: "unknown".to_string(),
                    new_permissions: "unknown".to_string(),
                    success: false,
                    error: Some(e.to_string()),
                    processing_time: start.elapsed(),
                }
            }
        };

        // Already compliant: no chmod issued.
        if previous == target {
            return PermissionResult {
                file_path: file.path.clone(),
                previous_permissions: previous.clone(),
                new_permissions: previous,
                success: true,
                error: None,
                processing_time: start.elapsed(),
            };
        }

        if let Err(e) = self.ops.set_mode(&file.path, target) {
            return PermissionResult {
                file_path: file.path.clone(),
                previous_permissions: previous,
                new_permissions: "unknown".to_string(),
                success: false,
                error: Some(e.to_string()),
                processing_time: start.elapsed(),
            };
        }

        // Confirm by re-reading; an unconfirmed change is a failure.
        let confirmed = match self.ops.mode(&file.path) {
            Ok(mode) => mode,
            Err(e) => {
                return PermissionResult {
                    file_path: file.path.clone(),
                    previous_permissions: previous,
                    new_permissions: "unknown".to_string(),
                    success: false,
                    error: Some(e.to_string()),
                    processing_time: start.elapsed(),
                }
            }
        };

        if confirmed == target {
            debug!(
                "permissions set: {} ({} -> {})",
                file.path.display(),
                previous,
                confirmed
            );
            PermissionResult {
                file_path: file.path.clone(),
                previous_permissions: previous,
                new_permissions: confirmed,
                success: true,
                error: None,
                processing_time: start.elapsed(),
            }
        } else {
            warn!(
                "permission change unconfirmed for {}: expected {}, got {}",
                file.path.display(),
                target,
                confirmed
            );
            PermissionResult {
                file_path: file.path.clone(),
                previous_permissions: previous,
                new_permissions: confirmed.clone(),
                success: false,
                error: Some(format!("expected {}, got {}", target, confirmed)),
                processing_time: start.elapsed(),
            }
        }
    }

    /// Lists files whose actual mode differs from policy. Unreadable
    /// files are reported with an "unknown" actual mode.
    pub fn validate_permissions(
        &self,
        files: &[FileInfo],
        classifications: &[ClassificationResult],
    ) -> Result<Vec<(PathBuf, String, String)>> {
        if files.len() != classifications.len() {
            return Err(Error::LengthMismatch {
                files: files.len(),
                classifications: classifications.len(),
            });
        }

        let mut drifted = Vec::new();
        for (file, classification) in files.iter().zip(classifications) {
            let expected = target_permissions(&file.path, classification.file_type);
            match self.ops.mode(&file.path) {
                Ok(actual) if actual == expected => {}
                Ok(actual) => drifted.push((file.path.clone(), expected.to_string(), actual)),
                Err(e) => {
                    warn!("could not read mode of {}: {}", file.path.display(), e);
                    drifted.push((
                        file.path.clone(),
                        expected.to_string(),
                        "unknown".to_string(),
                    ));
                }
            }
        }
        Ok(drifted)
    }

    /// Re-applies policy to exactly the drifted files.
    pub fn repair_permissions(
        &self,
        files: &[FileInfo],
        classifications: &[ClassificationResult],
    ) -> Result<PermissionSummary> {
        let drifted = self.validate_permissions(files, classifications)?;
        if drifted.is_empty() {
            debug!("no permission drift in {}", self.environment);
            return Ok(PermissionSummary::empty(&self.environment, files.len()));
        }

        let drifted_paths: std::collections::HashSet<&PathBuf> =
            drifted.iter().map(|(path, _, _)| path).collect();

        let mut repair_files = Vec::new();
        let mut repair_classifications = Vec::new();
        for (file, classification) in files.iter().zip(classifications) {
            if drifted_paths.contains(&file.path) {
                repair_files.push(file.clone());
                repair_classifications.push(classification.clone());
            }
        }

        self.set_permissions(&repair_files, &repair_classifications)
    }
}
