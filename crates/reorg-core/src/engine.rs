//! Run orchestration: a phase state machine driving scanning,
//! classification, moves, permissions, and validation across one or
//! more environments, with per-environment parallelism and an error
//! policy chosen by the caller.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::classifier::ExtensionClassifier;
use crate::collab::{
    BackupManager, FileClassifier, FileScanner, NullBackupManager, NullReportWriter,
    NullSyncManager, ReportWriter, SyncManager,
};
use crate::error::Result;
use crate::fsops::{FileOps, LocalOps, RemoteOps};
use crate::mover::{fallback_dir, FileMover, LocalFileMover, RemoteFileMover};
use crate::permissions::{PermissionManager, PermissionValidator};
use crate::progress::ProgressReporter;
use crate::remote::RemoteShell;
use crate::scanner::FlatFileScanner;
use crate::types::{
    Access, CancelToken, ClassificationResult, EnvironmentSpec, FileInfo, FileType, MoveOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Initializing,
    Scanning,
    Classifying,
    CreatingDirectories,
    CreatingBackup,
    MovingFiles,
    SettingPermissions,
    Syncing,
    Validating,
    GeneratingReport,
    Completed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Initializing => "initializing",
            Phase::Scanning => "scanning",
            Phase::Classifying => "classifying",
            Phase::CreatingDirectories => "creating directories",
            Phase::CreatingBackup => "creating backup",
            Phase::MovingFiles => "moving files",
            Phase::SettingPermissions => "setting permissions",
            Phase::Syncing => "syncing",
            Phase::Validating => "validating",
            Phase::GeneratingReport => "generating report",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Full,
    ScanOnly,
    ClassifyOnly,
    MoveOnly,
    SyncOnly,
}

#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    pub mode: RunMode,
    pub environments: Vec<EnvironmentSpec>,
    pub dry_run: bool,
    pub enable_parallel: bool,
    pub max_parallel: usize,
    pub create_backup: bool,
    pub set_permissions: bool,
    pub enable_sync: bool,
    pub continue_on_error: bool,
    pub move_options: MoveOptions,
    /// Remote batching: files per batch and pause between batches.
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub report_dir: PathBuf,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Full,
            environments: Vec::new(),
            dry_run: false,
            enable_parallel: true,
            max_parallel: 4,
            create_backup: false,
            set_permissions: true,
            enable_sync: false,
            continue_on_error: true,
            move_options: MoveOptions::default(),
            batch_size: 10,
            batch_delay: Duration::from_secs(1),
            report_dir: PathBuf::from("reports"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionError {
    pub phase: Phase,
    pub environment: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentResult {
    pub environment: String,
    pub scanned_files: usize,
    pub classified_files: usize,
    pub moved_files: usize,
    pub failed_moves: usize,
    pub permission_updates: usize,
    pub validation_findings: usize,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub final_phase: Phase,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub dry_run: bool,
    pub environments: Vec<EnvironmentResult>,
    pub errors: Vec<ExecutionError>,
}

/// Per-environment accumulator, owned by exactly one worker during a
/// phase and merged back by value.
struct EnvRun {
    spec: EnvironmentSpec,
    files: Vec<FileInfo>,
    classifications: Vec<ClassificationResult>,
    /// (new path, size, type) for every successfully moved file.
    moved: Vec<(PathBuf, u64, FileType)>,
    result: EnvironmentResult,
}

impl EnvRun {
    fn new(spec: EnvironmentSpec) -> Self {
        let result = EnvironmentResult {
            environment: spec.name.clone(),
            ..EnvironmentResult::default()
        };
        Self {
            spec,
            files: Vec::new(),
            classifications: Vec::new(),
            moved: Vec::new(),
            result,
        }
    }

    fn ops(&self) -> Arc<dyn FileOps> {
        match &self.spec.access {
            Access::Local => Arc::new(LocalOps),
            Access::Remote { ssh } => Arc::new(RemoteOps::new(RemoteShell::new(ssh.clone()))),
        }
    }

    fn mover(&self, cancel: CancelToken, options: &ExecutionOptions) -> Box<dyn FileMover> {
        match &self.spec.access {
            Access::Local => Box::new(LocalFileMover::new(
                self.spec.name.clone(),
                self.spec.root.clone(),
                cancel,
            )),
            Access::Remote { ssh } => Box::new(
                RemoteFileMover::new(
                    self.spec.name.clone(),
                    self.spec.root.clone(),
                    ssh.clone(),
                    cancel,
                )
                .with_batching(options.batch_size, options.batch_delay),
            ),
        }
    }
}

pub struct ExecutionEngine {
    scanner: Arc<dyn FileScanner>,
    classifier: Arc<dyn FileClassifier>,
    backup: Arc<dyn BackupManager>,
    sync: Arc<dyn SyncManager>,
    report: Arc<dyn ReportWriter>,
    cancel: CancelToken,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEngine {
    pub fn new() -> Self {
        Self {
            scanner: Arc::new(FlatFileScanner::default()),
            classifier: Arc::new(ExtensionClassifier),
            backup: Arc::new(NullBackupManager),
            sync: Arc::new(NullSyncManager),
            report: Arc::new(NullReportWriter),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_scanner(mut self, scanner: Arc<dyn FileScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn FileClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_backup(mut self, backup: Arc<dyn BackupManager>) -> Self {
        self.backup = backup;
        self
    }

    pub fn with_sync(mut self, sync: Arc<dyn SyncManager>) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_report_writer(mut self, report: Arc<dyn ReportWriter>) -> Self {
        self.report = report;
        self
    }

    /// Shared cancellation flag; raising it stops the run between
    /// files, batches, and phases.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The active phase sequence for a run. Optional phases appear only
    /// when the corresponding option is set.
    pub fn plan_phases(options: &ExecutionOptions) -> Vec<Phase> {
        let mut phases = vec![Phase::Initializing];
        match options.mode {
            RunMode::Full => {
                phases.extend([
                    Phase::Scanning,
                    Phase::Classifying,
                    Phase::CreatingDirectories,
                ]);
                if options.create_backup {
                    phases.push(Phase::CreatingBackup);
                }
                phases.push(Phase::MovingFiles);
                if options.set_permissions {
                    phases.push(Phase::SettingPermissions);
                }
                if options.enable_sync {
                    phases.push(Phase::Syncing);
                }
                phases.push(Phase::Validating);
            }
            RunMode::ScanOnly => phases.push(Phase::Scanning),
            RunMode::ClassifyOnly => phases.extend([Phase::Scanning, Phase::Classifying]),
            RunMode::MoveOnly => phases.extend([
                Phase::Scanning,
                Phase::Classifying,
                Phase::CreatingDirectories,
                Phase::MovingFiles,
            ]),
            RunMode::SyncOnly => phases.push(Phase::Syncing),
        }
        phases.push(Phase::GeneratingReport);
        phases
    }

    /// Runs the whole plan. Never returns `Err`: every failure is
    /// folded into the result's error list and success flag.
    pub fn execute(
        &self,
        options: &ExecutionOptions,
        reporter: &dyn ProgressReporter,
    ) -> ExecutionResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let phases = Self::plan_phases(options);

        info!(
            "run started: mode {:?}, {} environments, dry_run={}",
            options.mode,
            options.environments.len(),
            options.dry_run
        );

        let mut runs: Vec<EnvRun> = options
            .environments
            .iter()
            .cloned()
            .map(EnvRun::new)
            .collect();
        let mut errors: Vec<ExecutionError> = Vec::new();
        let mut final_phase = Phase::Completed;

        for (index, phase) in phases.iter().copied().enumerate() {
            if self.cancel.is_cancelled() {
                errors.push(Self::run_error(phase, None, "run cancelled"));
                final_phase = Phase::Failed;
                break;
            }

            let percent = (index * 100 / phases.len()) as u8;
            reporter.on_phase_started(phase);
            reporter.on_phase_progress(phase, 0);
            reporter.on_progress(percent, &phase.to_string());
            info!("phase: {}", phase);

            let phase_errors = self.run_phase(phase, &mut runs, options);
            if phase_errors.is_empty() {
                reporter.on_phase_progress(phase, 100);
                reporter.on_phase_completed(phase);
                continue;
            }

            for e in &phase_errors {
                error!(
                    "phase {} failed{}: {}",
                    phase,
                    e.environment
                        .as_deref()
                        .map(|name| format!(" ({})", name))
                        .unwrap_or_default(),
                    e.message
                );
            }
            reporter.on_phase_failed(phase, &phase_errors[0].message);

            if options.continue_on_error {
                errors.extend(phase_errors);
            } else {
                errors.push(phase_errors.into_iter().next().unwrap_or_else(|| {
                    Self::run_error(phase, None, "phase failed")
                }));
                final_phase = Phase::Failed;
                break;
            }
        }

        if final_phase != Phase::Failed {
            reporter.on_progress(100, "done");
        }

        let success = final_phase == Phase::Completed && errors.is_empty();
        let duration = start.elapsed();
        info!(
            "run {} in {:.0?} ({} errors)",
            if success { "completed" } else { "finished with failures" },
            duration,
            errors.len()
        );

        ExecutionResult {
            success,
            final_phase,
            started_at,
            duration,
            dry_run: options.dry_run,
            environments: runs.into_iter().map(|run| run.result).collect(),
            errors,
        }
    }

    fn run_error(phase: Phase, environment: Option<&str>, message: impl Into<String>) -> ExecutionError {
        ExecutionError {
            phase,
            environment: environment.map(str::to_string),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    fn run_phase(
        &self,
        phase: Phase,
        runs: &mut [EnvRun],
        options: &ExecutionOptions,
    ) -> Vec<ExecutionError> {
        match phase {
            Phase::Initializing => self.initialize(runs, options),
            Phase::Syncing => self.sync_phase(runs, options),
            Phase::GeneratingReport => self.report_phase(runs, options),
            _ => self.fan_out(phase, runs, options),
        }
    }

    fn initialize(&self, runs: &mut [EnvRun], _options: &ExecutionOptions) -> Vec<ExecutionError> {
        if runs.is_empty() {
            return vec![Self::run_error(
                Phase::Initializing,
                None,
                "no environments configured",
            )];
        }
        for run in runs.iter() {
            info!(
                "environment {}: root {} ({})",
                run.spec.name,
                run.spec.root.display(),
                if run.spec.is_remote() { "remote" } else { "local" }
            );
        }
        Vec::new()
    }

    /// Per-environment phases: each worker owns its `EnvRun` for the
    /// duration of the phase, so there is no shared mutable state.
    fn fan_out(
        &self,
        phase: Phase,
        runs: &mut [EnvRun],
        options: &ExecutionOptions,
    ) -> Vec<ExecutionError> {
        let worker = |run: &mut EnvRun| -> Option<ExecutionError> {
            match self.env_phase(phase, run, options) {
                Ok(()) => None,
                Err(e) => Some(Self::run_error(phase, Some(&run.spec.name), e.to_string())),
            }
        };

        let results: Vec<Option<ExecutionError>> = if options.enable_parallel && runs.len() > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(options.max_parallel.max(1))
                .build()
            {
                Ok(pool) => pool.install(|| runs.par_iter_mut().map(worker).collect()),
                Err(e) => {
                    warn!("thread pool unavailable ({}); running sequentially", e);
                    runs.iter_mut().map(worker).collect()
                }
            }
        } else {
            runs.iter_mut().map(worker).collect()
        };

        results.into_iter().flatten().collect()
    }

    fn env_phase(&self, phase: Phase, run: &mut EnvRun, options: &ExecutionOptions) -> Result<()> {
        match phase {
            Phase::Scanning => {
                run.files = self.scanner.scan(&run.spec)?;
                run.result.scanned_files = run.files.len();
            }
            Phase::Classifying => {
                run.classifications = self.classifier.classify(&run.spec, &run.files)?;
                run.result.classified_files = run.classifications.len();
            }
            Phase::CreatingDirectories => {
                if options.dry_run {
                    return Ok(());
                }
                let ops = run.ops();
                for file_type in [
                    FileType::Script,
                    FileType::Document,
                    FileType::Config,
                    FileType::Test,
                    FileType::Other,
                ] {
                    ops.mkdir_p(&run.spec.root.join(fallback_dir(file_type)))?;
                }
            }
            Phase::CreatingBackup => {
                if !options.dry_run {
                    self.backup.create_backup(&run.spec, &run.files)?;
                }
            }
            Phase::MovingFiles => {
                let mover = run.mover(self.cancel.clone(), options);
                let mut move_options = options.move_options.clone();
                move_options.dry_run = options.dry_run;
                let result = mover.move_files(&run.files, &run.classifications, &move_options)?;

                let types: HashMap<&PathBuf, FileType> = run
                    .classifications
                    .iter()
                    .map(|c| (&c.file.path, c.file_type))
                    .collect();
                run.moved = result
                    .moved_files
                    .iter()
                    .map(|m| {
                        let file_type = types
                            .get(&m.original_path)
                            .copied()
                            .unwrap_or(FileType::Other);
                        (m.new_path.clone(), m.size, file_type)
                    })
                    .collect();
                run.result.moved_files = result.statistics.successful_moves;
                run.result.failed_moves = result.statistics.failed_moves;
            }
            Phase::SettingPermissions => {
                if options.dry_run {
                    return Ok(());
                }
                let (files, classifications) = run_moved_pairs(run);
                let manager = PermissionManager::new(run.spec.name.clone(), run.ops());
                let summary = manager.set_permissions(&files, &classifications)?;
                run.result.permission_updates = summary.successful_updates;
            }
            Phase::Validating => {
                if options.dry_run {
                    return Ok(());
                }
                let (files, classifications) = run_moved_pairs(run);
                let validator = PermissionValidator::new(run.spec.name.clone(), run.ops());
                let summary = validator.validate_permissions(&files, &classifications)?;
                run.result.validation_findings = summary.invalid_files;
                if summary.invalid_files > 0 {
                    warn!(
                        "{}: {} permission findings after run",
                        run.spec.name, summary.invalid_files
                    );
                }
            }
            Phase::Initializing
            | Phase::Syncing
            | Phase::GeneratingReport
            | Phase::Completed
            | Phase::Failed => {}
        }
        Ok(())
    }

    fn sync_phase(&self, runs: &mut [EnvRun], options: &ExecutionOptions) -> Vec<ExecutionError> {
        if options.dry_run {
            return Vec::new();
        }
        let specs: Vec<EnvironmentSpec> = runs.iter().map(|run| run.spec.clone()).collect();
        match self.sync.sync(&specs) {
            Ok(()) => Vec::new(),
            Err(e) => vec![Self::run_error(Phase::Syncing, None, e.to_string())],
        }
    }

    fn report_phase(&self, runs: &mut [EnvRun], options: &ExecutionOptions) -> Vec<ExecutionError> {
        let mut summary = String::new();
        for run in runs.iter() {
            summary.push_str(&format!(
                "{}: scanned {}, classified {}, moved {} ({} failed), permissions {}\n",
                run.result.environment,
                run.result.scanned_files,
                run.result.classified_files,
                run.result.moved_files,
                run.result.failed_moves,
                run.result.permission_updates,
            ));
        }
        match self.report.write_report(&options.report_dir, &summary) {
            Ok(()) => Vec::new(),
            Err(e) => vec![Self::run_error(Phase::GeneratingReport, None, e.to_string())],
        }
    }
}

/// Rebuilds position-correlated (file, classification) pairs for the
/// post-move permission and validation passes, addressing files at
/// their new locations.
fn run_moved_pairs(run: &EnvRun) -> (Vec<FileInfo>, Vec<ClassificationResult>) {
    let mut files = Vec::with_capacity(run.moved.len());
    let mut classifications = Vec::with_capacity(run.moved.len());
    for (path, size, file_type) in &run.moved {
        let file = FileInfo::new(path.clone(), *size);
        classifications.push(ClassificationResult {
            file: file.clone(),
            file_type: *file_type,
            target_path: None,
            confidence: 1.0,
        });
        files.push(file);
    }
    (files, classifications)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_plan_with_all_options() {
        let options = ExecutionOptions {
            create_backup: true,
            enable_sync: true,
            ..ExecutionOptions::default()
        };
        let phases = ExecutionEngine::plan_phases(&options);
        assert_eq!(
            phases,
            vec![
                Phase::Initializing,
                Phase::Scanning,
                Phase::Classifying,
                Phase::CreatingDirectories,
                Phase::CreatingBackup,
                Phase::MovingFiles,
                Phase::SettingPermissions,
                Phase::Syncing,
                Phase::Validating,
                Phase::GeneratingReport,
            ]
        );
    }

    #[test]
    fn test_optional_phases_absent_by_default() {
        let phases = ExecutionEngine::plan_phases(&ExecutionOptions::default());
        assert!(!phases.contains(&Phase::CreatingBackup));
        assert!(!phases.contains(&Phase::Syncing));
        assert!(phases.contains(&Phase::SettingPermissions));
    }

    #[test]
    fn test_scan_only_plan() {
        let options = ExecutionOptions {
            mode: RunMode::ScanOnly,
            ..ExecutionOptions::default()
        };
        assert_eq!(
            ExecutionEngine::plan_phases(&options),
            vec![Phase::Initializing, Phase::Scanning, Phase::GeneratingReport]
        );
    }

    #[test]
    fn test_no_environments_fails_initialization() {
        let engine = ExecutionEngine::new();
        let result = engine.execute(
            &ExecutionOptions::default(),
            &crate::progress::SilentReporter,
        );
        assert!(!result.success);
        assert_eq!(result.errors[0].phase, Phase::Initializing);
    }
}
