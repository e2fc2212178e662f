//! Local-filesystem mover: the shared pipeline over `LocalOps`, files
//! processed strictly in input order.

use std::path::PathBuf;
use std::time::Instant;

use tracing::info;

use crate::error::Result;
use crate::fsops::LocalOps;
use crate::types::{CancelToken, ClassificationResult, FileInfo, MoveOptions, MoveResult};

use super::{
    assemble_result, check_lengths, dry_run_result, run_slice, FileMover, MovePipeline,
};

pub struct LocalFileMover {
    environment: String,
    root: PathBuf,
    ops: LocalOps,
    cancel: CancelToken,
}

impl LocalFileMover {
    pub fn new(environment: impl Into<String>, root: impl Into<PathBuf>, cancel: CancelToken) -> Self {
        Self {
            environment: environment.into(),
            root: root.into(),
            ops: LocalOps,
            cancel,
        }
    }
}

impl FileMover for LocalFileMover {
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

        info!(
            "moving {} files in {} (local)",
            files.len(),
            self.environment
        );

        let pipeline = MovePipeline::new(&self.ops, &self.root, &self.environment);
        let mut moved_files = Vec::new();
        let mut failed_files = Vec::new();
        run_slice(
            &pipeline,
            files,
            classifications,
            options,
            &self.cancel,
            &mut moved_files,
            &mut failed_files,
        );

        let result = assemble_result(
            &self.environment,
            moved_files,
            failed_files,
            files.len(),
            start,
        );
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
