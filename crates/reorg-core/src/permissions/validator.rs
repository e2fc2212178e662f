//! Detects drift between actual and policy permissions, scores each
//! finding by security risk, and builds a prioritized repair plan.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::fsops::FileOps;
use crate::permissions::manager::{PermissionManager, PermissionSummary};
use crate::permissions::{path_contains_any, target_permissions, CRITICAL_MARKERS};
use crate::types::{ClassificationResult, FileInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueType {
    IncorrectPermissions,
    MissingFile,
    UnknownError,
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub file_path: PathBuf,
    pub expected_permissions: String,
    pub actual_permissions: String,
    pub is_valid: bool,
    pub issue_type: Option<IssueType>,
    pub issue_description: Option<String>,
    pub risk_level: RiskLevel,
    pub recommended_action: String,
}

#[derive(Debug, Clone)]
pub struct ValidationSummary {
    pub total_files: usize,
    pub valid_files: usize,
    pub invalid_files: usize,
    pub risk_level_stats: HashMap<RiskLevel, usize>,
    pub issue_type_stats: HashMap<IssueType, usize>,
    pub validation_time: Duration,
    pub environment: String,
    pub results: Vec<ValidationResult>,
}

impl ValidationSummary {
    pub fn critical_count(&self) -> usize {
        self.risk_level_stats
            .get(&RiskLevel::Critical)
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct RepairTarget {
    pub file_path: PathBuf,
    pub current_permissions: String,
    pub target_permissions: String,
    pub priority: RiskLevel,
}

#[derive(Debug, Clone)]
pub struct RepairPlan {
    pub target_files: Vec<RepairTarget>,
    pub estimated_repair_time: Duration,
    /// Paths ordered critical-first; ties keep validation order.
    pub repair_order: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

const REPAIR_COST_PER_FILE: Duration = Duration::from_millis(100);

pub struct PermissionValidator {
    ops: Arc<dyn FileOps>,
    environment: String,
    manager: PermissionManager,
}

impl PermissionValidator {
    pub fn new(environment: impl Into<String>, ops: Arc<dyn FileOps>) -> Self {
        let environment = environment.into();
        let manager = PermissionManager::new(environment.clone(), Arc::clone(&ops));
        Self {
            ops,
            environment,
            manager,
        }
    }

    /// Validates every (file, classification) pair against policy.
    /// Per-file read failures become findings; only a length mismatch
    /// aborts the call.
    pub fn validate_permissions(
        &self,
        files: &[FileInfo],
        classifications: &[ClassificationResult],
    ) -> Result<ValidationSummary> {
        if files.len() != classifications.len() {
            return Err(Error::LengthMismatch {
                files: files.len(),
                classifications: classifications.len(),
            });
        }

        let start = Instant::now();
        info!(
            "validating permissions for {} files in {}",
            files.len(),
            self.environment
        );

        let mut results = Vec::with_capacity(files.len());
        let mut risk_level_stats: HashMap<RiskLevel, usize> = HashMap::new();
        let mut issue_type_stats: HashMap<IssueType, usize> = HashMap::new();

        for (file, classification) in files.iter().zip(classifications) {
            let result = self.validate_single(file, classification);
            if !result.is_valid {
                *risk_level_stats.entry(result.risk_level).or_insert(0) += 1;
            }
            if let Some(issue) = result.issue_type {
                *issue_type_stats.entry(issue).or_insert(0) += 1;
            }
            results.push(result);
        }

        let valid_files = results.iter().filter(|r| r.is_valid).count();
        let invalid_files = results.len() - valid_files;
        let validation_time = start.elapsed();

        if invalid_files == 0 {
            info!("{} permission validation clean", self.environment);
        } else {
            warn!(
                "{} permission validation found {} drifted files",
                self.environment, invalid_files
            );
        }

        Ok(ValidationSummary {
            total_files: files.len(),
            valid_files,
            invalid_files,
            risk_level_stats,
            issue_type_stats,
            validation_time,
            environment: self.environment.clone(),
            results,
        })
    }

    fn validate_single(
        &self,
        file: &FileInfo,
        classification: &ClassificationResult,
    ) -> ValidationResult {
        let expected = target_permissions(&file.path, classification.file_type);

        match self.ops.exists(&file.path) {
            Ok(true) => {}
            Ok(false) => {
                return ValidationResult {
                    file_path: file.path.clone(),
                    expected_permissions: expected.to_string(),
                    actual_permissions: "missing".to_string(),
                    is_valid: false,
                    issue_type: Some(IssueType::MissingFile),
                    issue_description: Some("file does not exist".to_string()),
                    risk_level: RiskLevel::High,
                    recommended_action: "confirm the file's location and restore it if needed"
                        .to_string(),
                }
            }
            Err(e) => return self.unknown_error_result(file, expected, e.to_string()),
        }

        let actual = match self.ops.mode(&file.path) {
            Ok(mode) => mode,
            Err(e) => return self.unknown_error_result(file, expected, e.to_string()),
        };

        if actual == expected {
            return ValidationResult {
                file_path: file.path.clone(),
                expected_permissions: expected.to_string(),
                actual_permissions: actual,
                is_valid: true,
                issue_type: None,
                issue_description: None,
                risk_level: RiskLevel::Low,
                recommended_action: "no action required".to_string(),
            };
        }

        analyze_drift(&file.path, expected, &actual)
    }

    fn unknown_error_result(
        &self,
        file: &FileInfo,
        expected: &str,
        message: String,
    ) -> ValidationResult {
        ValidationResult {
            file_path: file.path.clone(),
            expected_permissions: expected.to_string(),
            actual_permissions: "unknown".to_string(),
            is_valid: false,
            issue_type: Some(IssueType::UnknownError),
            issue_description: Some(message),
            risk_level: RiskLevel::Medium,
            recommended_action: "inspect the file's permissions manually".to_string(),
        }
    }

    /// Orders the invalid findings into a prioritized plan with a fixed
    /// per-file cost estimate and heuristic warnings.
    pub fn create_repair_plan(&self, summary: &ValidationSummary) -> RepairPlan {
        let mut target_files: Vec<RepairTarget> = summary
            .results
            .iter()
            .filter(|r| !r.is_valid)
            .map(|r| RepairTarget {
                file_path: r.file_path.clone(),
                current_permissions: r.actual_permissions.clone(),
                target_permissions: r.expected_permissions.clone(),
                priority: r.risk_level,
            })
            .collect();

        // Stable sort: equal priorities keep validation order.
        target_files.sort_by_key(|t| Reverse(t.priority));
        let repair_order: Vec<PathBuf> = target_files.iter().map(|t| t.file_path.clone()).collect();

        let estimated_repair_time = REPAIR_COST_PER_FILE * target_files.len() as u32;

        let mut warnings = Vec::new();
        let critical = target_files
            .iter()
            .filter(|t| t.priority == RiskLevel::Critical)
            .count();
        if critical > 0 {
            warnings.push(format!(
                "{} critical security findings; repair immediately",
                critical
            ));
        }
        let scripts = target_files
            .iter()
            .filter(|t| {
                let text = t.file_path.to_string_lossy();
                text.ends_with(".sh") || text.ends_with(".py")
            })
            .count();
        if scripts > 0 {
            warnings.push(format!(
                "{} script files will change mode; execution may be affected",
                scripts
            ));
        }
        if target_files.len() > 50 {
            warnings.push(format!(
                "{} files to repair; this may take a while",
                target_files.len()
            ));
        }

        debug!(
            "repair plan: {} targets, {} warnings",
            target_files.len(),
            warnings.len()
        );

        RepairPlan {
            target_files,
            estimated_repair_time,
            repair_order,
            warnings,
        }
    }

    /// Repairs exactly the files named by the plan derived from
    /// `summary`, delegating the chmods to the PermissionManager.
    pub fn execute_auto_repair(
        &self,
        summary: &ValidationSummary,
        files: &[FileInfo],
        classifications: &[ClassificationResult],
    ) -> Result<PermissionSummary> {
        let plan = self.create_repair_plan(summary);
        if plan.target_files.is_empty() {
            debug!("auto repair: nothing to do in {}", self.environment);
            return self.manager.set_permissions(&[], &[]);
        }

        for warning in &plan.warnings {
            warn!("repair warning: {}", warning);
        }

        let planned: std::collections::HashSet<&PathBuf> =
            plan.target_files.iter().map(|t| &t.file_path).collect();

        let mut repair_files = Vec::new();
        let mut repair_classifications = Vec::new();
        for (file, classification) in files.iter().zip(classifications) {
            if planned.contains(&file.path) {
                repair_files.push(file.clone());
                repair_classifications.push(classification.clone());
            }
        }

        self.manager
            .set_permissions(&repair_files, &repair_classifications)
    }

    /// Validates immediately and then on a fixed interval until `stop`
    /// is raised, auto-repairing only when a critical finding exists.
    /// Runs on the caller's thread.
    pub fn monitor(
        &self,
        files: &[FileInfo],
        classifications: &[ClassificationResult],
        interval: Duration,
        stop: &AtomicBool,
    ) -> Result<()> {
        info!(
            "continuous permission monitoring started for {} (interval {:.0?})",
            self.environment, interval
        );

        loop {
            match self.validate_permissions(files, classifications) {
                Ok(summary) => {
                    if summary.invalid_files > 0 {
                        warn!(
                            "monitoring found {} drifted files in {}",
                            summary.invalid_files, self.environment
                        );
                        if summary.critical_count() > 0 {
                            warn!(
                                "auto-repairing {} critical findings",
                                summary.critical_count()
                            );
                            if let Err(e) =
                                self.execute_auto_repair(&summary, files, classifications)
                            {
                                error!("auto repair failed: {}", e);
                            }
                        }
                    }
                }
                Err(e) => error!("monitoring validation failed: {}", e),
            }

            // Sleep in slices so a raised stop flag is noticed promptly.
            let slept_until = Instant::now() + interval;
            while Instant::now() < slept_until {
                if stop.load(Ordering::SeqCst) {
                    info!("continuous monitoring stopped for {}", self.environment);
                    return Ok(());
                }
                thread::sleep(Duration::from_millis(100).min(interval));
            }
            if stop.load(Ordering::SeqCst) {
                info!("continuous monitoring stopped for {}", self.environment);
                return Ok(());
            }
        }
    }
}

/// Risk-scores a single expected/actual mode mismatch. Pure.
pub fn analyze_drift(path: &std::path::Path, expected: &str, actual: &str) -> ValidationResult {
    let (expected_bits, actual_bits) =
        match (u32::from_str_radix(expected, 8), u32::from_str_radix(actual, 8)) {
            (Ok(e), Ok(a)) => (e, a),
            _ => {
                return ValidationResult {
                    file_path: path.to_path_buf(),
                    expected_permissions: expected.to_string(),
                    actual_permissions: actual.to_string(),
                    is_valid: false,
                    issue_type: Some(IssueType::UnknownError),
                    issue_description: Some(format!(
                        "unparseable permission mode (expected {}, actual {})",
                        expected, actual
                    )),
                    risk_level: RiskLevel::Medium,
                    recommended_action: "inspect the file's permissions manually".to_string(),
                }
            }
        };

    let mut risk = RiskLevel::Low;
    let mut description = format!("mode differs from policy (expected {expected}, actual {actual})");
    let mut action = format!("chmod the file back to {expected}");

    // Execute bits present that policy does not grant.
    if actual_bits & 0o111 & !expected_bits != 0 {
        risk = RiskLevel::High;
        description.push_str("; unexpected execute permission");
        action = format!("security risk: restore mode {expected} immediately");
    }

    // Write bits present that policy does not grant.
    if actual_bits & 0o222 & !expected_bits != 0 {
        risk = if risk == RiskLevel::High {
            RiskLevel::Critical
        } else {
            RiskLevel::High
        };
        description.push_str("; unexpected write permission");
    }

    // Sensitive paths must never be group/world readable.
    if path_contains_any(path, CRITICAL_MARKERS) && actual_bits & 0o044 != 0 {
        risk = RiskLevel::Critical;
        description.push_str("; sensitive file readable by group/others");
        action = "urgent: restrict sensitive file to mode 600".to_string();
    }

    if actual_bits > expected_bits && risk < RiskLevel::Medium {
        risk = RiskLevel::Medium;
        description.push_str("; mode is looser than policy");
    }

    if actual_bits < expected_bits {
        description.push_str("; mode is stricter than policy");
        action.push_str(" (the tighter mode may break functionality)");
    }

    ValidationResult {
        file_path: path.to_path_buf(),
        expected_permissions: expected.to_string(),
        actual_permissions: actual.to_string(),
        is_valid: false,
        issue_type: Some(IssueType::IncorrectPermissions),
        issue_description: Some(description),
        risk_level: risk,
        recommended_action: action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_unexpected_execute_bit_is_high() {
        let result = analyze_drift(Path::new("/docs/notes.md"), "644", "755");
        assert!(result.risk_level >= RiskLevel::High);
    }

    #[test]
    fn test_execute_and_write_drift_is_critical() {
        let result = analyze_drift(Path::new("/docs/notes.md"), "644", "777");
        assert_eq!(result.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_secret_file_world_readable_is_critical() {
        let result = analyze_drift(Path::new("/configs/api_secret.json"), "600", "644");
        assert_eq!(result.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_looser_mode_without_bit_trigger_is_medium() {
        // 646 adds a write bit... use a pure numeric-looseness case:
        // expected 600, actual 604 adds a read bit for others only.
        let result = analyze_drift(Path::new("/data/plain.txt"), "600", "604");
        assert_eq!(result.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_stricter_mode_is_not_escalated() {
        let result = analyze_drift(Path::new("/scripts/run.sh"), "755", "700");
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(result
            .issue_description
            .as_deref()
            .unwrap()
            .contains("stricter"));
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }
}
