//! Remote mover: the shared pipeline over SSH, paced in fixed-size
//! batches with an inter-batch delay so a large reorganization does not
//! monopolize the remote host.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::Result;
use crate::fsops::{FileOps, RemoteOps};
use crate::remote::{RemoteShell, SshConfig};
use crate::types::{CancelToken, ClassificationResult, FileInfo, MoveOptions, MoveResult};

use super::{
    assemble_result, check_lengths, dry_run_result, record_cancelled, run_slice, FileMover,
    MovePipeline,
};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Disk usage above this triggers a pre-flight warning.
const DISK_USAGE_WARN_PERCENT: u8 = 90;

/// How many moved files the post-run sampled verification re-checks.
const VERIFY_SAMPLE_SIZE: usize = 10;

pub struct RemoteFileMover {
    environment: String,
    root: PathBuf,
    ops: RemoteOps,
    cancel: CancelToken,
    batch_size: usize,
    batch_delay: Duration,
}

impl RemoteFileMover {
    pub fn new(
        environment: impl Into<String>,
        root: impl Into<PathBuf>,
        ssh: SshConfig,
        cancel: CancelToken,
    ) -> Self {
        Self {
            environment: environment.into(),
            root: root.into(),
            ops: RemoteOps::new(RemoteShell::new(ssh)),
            cancel,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    pub fn with_batching(mut self, batch_size: usize, batch_delay: Duration) -> Self {
        self.batch_size = batch_size.max(1);
        self.batch_delay = batch_delay;
        self
    }

    fn check_disk_space(&self) -> Result<()> {
        match self.ops.disk_usage_percent(&self.root)? {
            Some(usage) if usage > DISK_USAGE_WARN_PERCENT => {
                warn!(
                    "{}: remote disk {}% full at {}",
                    self.environment,
                    usage,
                    self.root.display()
                );
            }
            Some(usage) => {
                info!("{}: remote disk usage {}%", self.environment, usage);
            }
            None => {
                warn!(
                    "{}: could not determine remote disk usage",
                    self.environment
                );
            }
        }
        Ok(())
    }

    /// Re-checks a sample of the moved files once the batches are done.
    /// Discrepancies are logged, not failed: each file already passed
    /// its per-move verification.
    fn verify_sample(&self, result: &MoveResult) {
        for moved in result.moved_files.iter().take(VERIFY_SAMPLE_SIZE) {
            match self.ops.exists(&moved.new_path) {
                Ok(true) => {}
                Ok(false) => warn!(
                    "sampled verification: {} missing on {}",
                    moved.new_path.display(),
                    self.environment
                ),
                Err(e) => {
                    warn!("sampled verification aborted: {}", e);
                    return;
                }
            }
        }
    }
}

impl FileMover for RemoteFileMover {
    fn environment(&self) -> &str {
        &self.environment
    }

    fn move_files(
        &self,
        files: &[FileInfo],
        classifications: &[ClassificationResult],
        options: &MoveOptions,
    ) -> Result<MoveResult> {
        check_lengths(files, classifications)?;
        let start = Instant::now();

        if options.dry_run {
            return Ok(dry_run_result(
                &self.environment,
                &self.root,
                files,
                classifications,
                start,
            ));
        }

        self.ops.shell().test_connection()?;
        self.check_disk_space()?;

        info!(
            "moving {} files to {} in batches of {}",
            files.len(),
            self.environment,
            self.batch_size
        );

        let pipeline = MovePipeline::new(&self.ops, &self.root, &self.environment);
        let mut moved_files = Vec::new();
        let mut failed_files = Vec::new();

        let batches = files
            .chunks(self.batch_size)
            .zip(classifications.chunks(self.batch_size));
        let batch_count = files.len().div_ceil(self.batch_size);

        for (index, (batch_files, batch_classifications)) in batches.enumerate() {
            if self.cancel.is_cancelled() {
                record_cancelled(&mut failed_files, &files[index * self.batch_size..]);
                break;
            }

            info!(
                "{}: batch {}/{} ({} files)",
                self.environment,
                index + 1,
                batch_count,
                batch_files.len()
            );

            let completed = run_slice(
                &pipeline,
                batch_files,
                batch_classifications,
                options,
                &self.cancel,
                &mut moved_files,
                &mut failed_files,
            );
            if !completed {
                let next = ((index + 1) * self.batch_size).min(files.len());
                record_cancelled(&mut failed_files, &files[next..]);
                break;
            }

            if index + 1 < batch_count {
                thread::sleep(self.batch_delay);
            }
        }

        let result = assemble_result(
            &self.environment,
            moved_files,
            failed_files,
            files.len(),
            start,
        );
        self.verify_sample(&result);
        info!(
            "{}: {}/{} files moved in {:.0?}",
            self.environment,
            result.statistics.successful_moves,
            files.len(),
            result.processing_time
        );
        Ok(result)
    }
}
