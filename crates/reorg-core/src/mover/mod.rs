//! File relocation. `LocalFileMover` and `RemoteFileMover` share one
//! per-file pipeline (target resolution, collision probing, transfer,
//! permission assignment, verification) over the `FileOps` trait and
//! differ only in pacing and pre-flight checks.

pub mod local;
pub mod remote;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fsops::FileOps;
use crate::permissions::target_permissions;
use crate::types::{
    CancelToken, ClassificationResult, FailedFile, FileInfo, FileType, MoveOptions, MoveResult,
    MoveStatistics, MovedFile,
};

pub use local::LocalFileMover;
pub use remote::RemoteFileMover;

/// Moves classified files into an environment. Implementations never
/// abort the batch on a per-file failure.
pub trait FileMover: Send + Sync {
    fn environment(&self) -> &str;

    fn move_files(
        &self,
        files: &[FileInfo],
        classifications: &[ClassificationResult],
        options: &MoveOptions,
    ) -> Result<MoveResult>;
}

/// Destination directory used when a classification carries no explicit
/// target path, relative to the environment root.
pub fn fallback_dir(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Script => "development/scripts/utilities",
        FileType::Document => "development/docs/reports",
        FileType::Config => "development/configs",
        FileType::Test => "tests/legacy",
        FileType::Log | FileType::Other => "archive/unknown",
    }
}

/// Resolves the destination for one file: the classifier's explicit
/// target when present, else the fallback table joined with the source
/// basename.
pub fn resolve_target(root: &Path, classification: &ClassificationResult) -> PathBuf {
    if let Some(target) = &classification.target_path {
        return target.clone();
    }
    let name = classification
        .file
        .path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("unnamed"));
    root.join(fallback_dir(classification.file_type)).join(name)
}

/// Appends `_n` before the extension: `report.md` -> `report_2.md`.
fn numbered_variant(target: &Path, n: u32) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    match target.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

pub(crate) fn check_lengths(
    files: &[FileInfo],
    classifications: &[ClassificationResult],
) -> Result<()> {
    if files.len() != classifications.len() {
        return Err(Error::LengthMismatch {
            files: files.len(),
            classifications: classifications.len(),
        });
    }
    Ok(())
}

/// The per-file move pipeline, shared by both movers.
pub(crate) struct MovePipeline<'a> {
    ops: &'a dyn FileOps,
    root: &'a Path,
    environment: &'a str,
}

impl<'a> MovePipeline<'a> {
    pub fn new(ops: &'a dyn FileOps, root: &'a Path, environment: &'a str) -> Self {
        Self {
            ops,
            root,
            environment,
        }
    }

    /// Probes `_1`, `_2`, ... until a free name is found or the cap is
    /// exhausted, in which case the original colliding path is reused.
    fn resolve_collision(&self, target: &Path, options: &MoveOptions) -> Result<PathBuf> {
        if options.overwrite_existing || !self.ops.exists(target)? {
            return Ok(target.to_path_buf());
        }
        for n in 1..=options.max_conflict_probes {
            let candidate = numbered_variant(target, n);
            if !self.ops.exists(&candidate)? {
                return Ok(candidate);
            }
        }
        warn!(
            "collision probing exhausted after {} attempts for {}; reusing original target",
            options.max_conflict_probes,
            target.display()
        );
        Ok(target.to_path_buf())
    }

    /// Runs the whole pipeline for one file. Returns the failure as a
    /// value; only the caller decides what aborts a batch.
    pub fn move_single(
        &self,
        file: &FileInfo,
        classification: &ClassificationResult,
        options: &MoveOptions,
    ) -> std::result::Result<MovedFile, FailedFile> {
        self.move_single_inner(file, classification, options)
            .map_err(|e| FailedFile {
                path: file.path.clone(),
                error: e.to_string(),
            })
    }

    fn move_single_inner(
        &self,
        file: &FileInfo,
        classification: &ClassificationResult,
        options: &MoveOptions,
    ) -> Result<MovedFile> {
        let target = resolve_target(self.root, classification);

        if let Some(parent) = target.parent() {
            if !self.ops.is_dir(parent)? {
                self.ops.mkdir_p(parent)?;
            }
        }

        let target = self.resolve_collision(&target, options)?;

        if options.copy_instead_of_move {
            self.ops
                .copy(&file.path, &target, options.preserve_timestamps)?;
        } else {
            self.ops.rename(&file.path, &target)?;
        }

        // Permission assignment failures do not fail the move.
        let mode = target_permissions(&target, classification.file_type);
        if let Err(e) = self.ops.set_mode(&target, mode) {
            warn!(
                "could not set mode {} on {}: {}",
                mode,
                target.display(),
                e
            );
        }

        self.verify(file, &target, options)?;

        debug!(
            "moved {} -> {} ({})",
            file.path.display(),
            target.display(),
            self.environment
        );

        Ok(MovedFile {
            original_path: file.path.clone(),
            new_path: target,
            size: file.size,
        })
    }

    fn verify(&self, file: &FileInfo, target: &Path, options: &MoveOptions) -> Result<()> {
        if !self.ops.exists(target)? {
            return Err(Error::MoveFailed(format!(
                "destination {} missing after move",
                target.display()
            )));
        }
        let size = self.ops.file_size(target)?;
        if size != file.size {
            return Err(Error::MoveFailed(format!(
                "size mismatch at {}: expected {} bytes, found {}",
                target.display(),
                file.size,
                size
            )));
        }
        if !options.copy_instead_of_move && self.ops.exists(&file.path)? {
            warn!(
                "source {} still present after move",
                file.path.display()
            );
        }
        Ok(())
    }
}

/// Dry run: resolve targets and report success without touching any
/// storage (no existence probes, no SSH round trips).
pub(crate) fn dry_run_result(
    environment: &str,
    root: &Path,
    files: &[FileInfo],
    classifications: &[ClassificationResult],
    start: Instant,
) -> MoveResult {
    let moved_files: Vec<MovedFile> = files
        .iter()
        .zip(classifications)
        .map(|(file, classification)| MovedFile {
            original_path: file.path.clone(),
            new_path: resolve_target(root, classification),
            size: file.size,
        })
        .collect();
    info!(
        "dry run: {} files would be moved in {}",
        moved_files.len(),
        environment
    );
    assemble_result(environment, moved_files, Vec::new(), files.len(), start)
}

/// Marks every not-yet-processed file as failed after a cancellation.
pub(crate) fn record_cancelled(failed_files: &mut Vec<FailedFile>, remaining: &[FileInfo]) {
    for file in remaining {
        failed_files.push(FailedFile {
            path: file.path.clone(),
            error: "cancelled before processing".to_string(),
        });
    }
}

pub(crate) fn assemble_result(
    environment: &str,
    moved_files: Vec<MovedFile>,
    failed_files: Vec<FailedFile>,
    total_files: usize,
    start: Instant,
) -> MoveResult {
    let processing_time = start.elapsed();
    let successful_moves = moved_files.len();
    let failed_moves = failed_files.len();
    let total_moved_bytes = moved_files.iter().map(|f| f.size).sum();
    let average_move_time = if successful_moves > 0 {
        processing_time / successful_moves as u32
    } else {
        Duration::ZERO
    };

    MoveResult {
        success: failed_moves == 0,
        statistics: MoveStatistics {
            total_files,
            successful_moves,
            failed_moves,
            skipped_files: total_files - successful_moves - failed_moves,
            processing_time,
            total_moved_bytes,
            average_move_time,
            errors: failed_files.clone(),
        },
        moved_files,
        failed_files,
        environment: environment.to_string(),
        processing_time,
    }
}

/// Shared sequential loop over one slice of files with cancellation
/// checks between files.
pub(crate) fn run_slice(
    pipeline: &MovePipeline<'_>,
    files: &[FileInfo],
    classifications: &[ClassificationResult],
    options: &MoveOptions,
    cancel: &CancelToken,
    moved_files: &mut Vec<MovedFile>,
    failed_files: &mut Vec<FailedFile>,
) -> bool {
    for (i, (file, classification)) in files.iter().zip(classifications).enumerate() {
        if cancel.is_cancelled() {
            record_cancelled(failed_files, &files[i..]);
            return false;
        }
        match pipeline.move_single(file, classification, options) {
            Ok(moved) => moved_files.push(moved),
            Err(failed) => {
                warn!("move failed for {}: {}", failed.path.display(), failed.error);
                failed_files.push(failed);
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileType;

    fn classification(path: &str, file_type: FileType, target: Option<&str>) -> ClassificationResult {
        ClassificationResult {
            file: FileInfo::new(path, 1),
            file_type,
            target_path: target.map(PathBuf::from),
            confidence: 1.0,
        }
    }

    #[test]
    fn test_explicit_target_used_verbatim() {
        let c = classification("/src/a.sh", FileType::Script, Some("/bin/a.sh"));
        assert_eq!(resolve_target(Path::new("/env"), &c), PathBuf::from("/bin/a.sh"));
    }

    #[test]
    fn test_fallback_table_per_type() {
        let root = Path::new("/env");
        let cases = [
            (FileType::Script, "/env/development/scripts/utilities/f"),
            (FileType::Document, "/env/development/docs/reports/f"),
            (FileType::Config, "/env/development/configs/f"),
            (FileType::Test, "/env/tests/legacy/f"),
            (FileType::Log, "/env/archive/unknown/f"),
            (FileType::Other, "/env/archive/unknown/f"),
        ];
        for (file_type, expected) in cases {
            let c = classification("/src/f", file_type, None);
            assert_eq!(resolve_target(root, &c), PathBuf::from(expected));
        }
    }

    #[test]
    fn test_numbered_variant_keeps_extension() {
        assert_eq!(
            numbered_variant(Path::new("/docs/r.md"), 1),
            PathBuf::from("/docs/r_1.md")
        );
        assert_eq!(
            numbered_variant(Path::new("/docs/r.md"), 12),
            PathBuf::from("/docs/r_12.md")
        );
    }

    #[test]
    fn test_numbered_variant_without_extension() {
        assert_eq!(
            numbered_variant(Path::new("/bin/runner"), 3),
            PathBuf::from("/bin/runner_3")
        );
    }
}
