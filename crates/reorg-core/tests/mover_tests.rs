use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use reorg_core::mover::{FileMover, LocalFileMover};
use reorg_core::types::{CancelToken, ClassificationResult, FileInfo, FileType, MoveOptions};
use tempfile::{tempdir, TempDir};

fn make_file(dir: &Path, name: &str, contents: &str) -> FileInfo {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    FileInfo::new(path, contents.len() as u64)
}

fn classify(
    file: &FileInfo,
    file_type: FileType,
    target: Option<PathBuf>,
) -> ClassificationResult {
    ClassificationResult {
        file: file.clone(),
        file_type,
        target_path: target,
        confidence: 1.0,
    }
}

fn setup() -> (TempDir, TempDir, LocalFileMover) {
    let source = tempdir().unwrap();
    let root = tempdir().unwrap();
    let mover = LocalFileMover::new("test", root.path(), CancelToken::new());
    (source, root, mover)
}

fn mode_of(path: &Path) -> u32 {
    fs::metadata(path).unwrap().permissions().mode() & 0o777
}

#[test]
fn test_explicit_target_used_exactly() {
    let (source, root, mover) = setup();
    let file = make_file(source.path(), "a.sh", "#!/bin/sh\n");
    let target = root.path().join("bin/a.sh");
    let classifications = vec![classify(&file, FileType::Script, Some(target.clone()))];

    let result = mover
        .move_files(&[file.clone()], &classifications, &MoveOptions::default())
        .unwrap();

    assert!(result.success);
    assert_eq!(result.moved_files[0].new_path, target);
    assert!(target.is_file());
    assert!(!file.path.exists());
    // Script permissions assigned during the move.
    assert_eq!(mode_of(&target), 0o755);
}

#[test]
fn test_fallback_table_when_no_target() {
    let (source, root, mover) = setup();
    let file = make_file(source.path(), "notes.md", "hello");
    let classifications = vec![classify(&file, FileType::Document, None)];

    let result = mover
        .move_files(&[file], &classifications, &MoveOptions::default())
        .unwrap();

    assert!(result.success);
    assert!(root
        .path()
        .join("development/docs/reports/notes.md")
        .is_file());
}

#[test]
fn test_collision_appends_numbered_suffix() {
    let (source, root, mover) = setup();
    let target_dir = root.path().join("docs");
    fs::create_dir_all(&target_dir).unwrap();
    fs::write(target_dir.join("r.md"), "existing").unwrap();

    let file = make_file(source.path(), "r.md", "incoming");
    let classifications = vec![classify(
        &file,
        FileType::Document,
        Some(target_dir.join("r.md")),
    )];

    let result = mover
        .move_files(&[file], &classifications, &MoveOptions::default())
        .unwrap();

    assert!(result.success);
    assert_eq!(result.moved_files[0].new_path, target_dir.join("r_1.md"));
    assert_eq!(fs::read_to_string(target_dir.join("r.md")).unwrap(), "existing");
    assert_eq!(
        fs::read_to_string(target_dir.join("r_1.md")).unwrap(),
        "incoming"
    );
}

#[test]
fn test_collision_probes_past_taken_suffixes() {
    let (source, root, mover) = setup();
    let target_dir = root.path().join("docs");
    fs::create_dir_all(&target_dir).unwrap();
    fs::write(target_dir.join("r.md"), "0").unwrap();
    fs::write(target_dir.join("r_1.md"), "1").unwrap();
    fs::write(target_dir.join("r_2.md"), "2").unwrap();

    let file = make_file(source.path(), "r.md", "incoming");
    let classifications = vec![classify(
        &file,
        FileType::Document,
        Some(target_dir.join("r.md")),
    )];

    let result = mover
        .move_files(&[file], &classifications, &MoveOptions::default())
        .unwrap();

    assert_eq!(result.moved_files[0].new_path, target_dir.join("r_3.md"));
}

#[test]
fn test_exhausted_probe_cap_reuses_original_target() {
    let (source, root, mover) = setup();
    let target_dir = root.path().join("docs");
    fs::create_dir_all(&target_dir).unwrap();
    fs::write(target_dir.join("r.md"), "existing").unwrap();
    fs::write(target_dir.join("r_1.md"), "1").unwrap();
    fs::write(target_dir.join("r_2.md"), "2").unwrap();

    let file = make_file(source.path(), "r.md", "incoming");
    let classifications = vec![classify(
        &file,
        FileType::Document,
        Some(target_dir.join("r.md")),
    )];
    let options = MoveOptions {
        max_conflict_probes: 2,
        ..MoveOptions::default()
    };

    let result = mover.move_files(&[file], &classifications, &options).unwrap();

    // Both numbered candidates were taken, so the colliding path wins.
    assert!(result.success);
    assert_eq!(result.moved_files[0].new_path, target_dir.join("r.md"));
    assert_eq!(fs::read_to_string(target_dir.join("r.md")).unwrap(), "incoming");
    assert_eq!(fs::read_to_string(target_dir.join("r_1.md")).unwrap(), "1");
    assert!(!target_dir.join("r_3.md").exists());
}

#[test]
fn test_overwrite_existing_skips_probing() {
    let (source, root, mover) = setup();
    let target_dir = root.path().join("docs");
    fs::create_dir_all(&target_dir).unwrap();
    fs::write(target_dir.join("r.md"), "existing").unwrap();

    let file = make_file(source.path(), "r.md", "incoming");
    let classifications = vec![classify(
        &file,
        FileType::Document,
        Some(target_dir.join("r.md")),
    )];
    let options = MoveOptions {
        overwrite_existing: true,
        ..MoveOptions::default()
    };

    let result = mover.move_files(&[file], &classifications, &options).unwrap();

    assert!(result.success);
    assert_eq!(result.moved_files[0].new_path, target_dir.join("r.md"));
    assert_eq!(fs::read_to_string(target_dir.join("r.md")).unwrap(), "incoming");
}

#[test]
fn test_dry_run_touches_nothing_and_preserves_order() {
    let (source, root, mover) = setup();
    let files = vec![
        make_file(source.path(), "one.sh", "1"),
        make_file(source.path(), "two.md", "22"),
        make_file(source.path(), "three.toml", "333"),
    ];
    let classifications = vec![
        classify(&files[0], FileType::Script, None),
        classify(&files[1], FileType::Document, None),
        classify(&files[2], FileType::Config, None),
    ];
    let options = MoveOptions {
        dry_run: true,
        ..MoveOptions::default()
    };

    let result = mover.move_files(&files, &classifications, &options).unwrap();

    assert!(result.success);
    assert_eq!(result.moved_files.len(), 3);
    // Input order preserved.
    for (moved, file) in result.moved_files.iter().zip(&files) {
        assert_eq!(moved.original_path, file.path);
        assert!(file.path.exists(), "sources untouched in dry run");
    }
    assert_eq!(
        result.moved_files[0].new_path,
        root.path().join("development/scripts/utilities/one.sh")
    );
    // No target directories were created.
    assert!(!root.path().join("development").exists());
}

#[test]
fn test_copy_retains_source() {
    let (source, root, mover) = setup();
    let file = make_file(source.path(), "keep.md", "data");
    let classifications = vec![classify(&file, FileType::Document, None)];
    let options = MoveOptions {
        copy_instead_of_move: true,
        ..MoveOptions::default()
    };

    let result = mover
        .move_files(&[file.clone()], &classifications, &options)
        .unwrap();

    assert!(result.success);
    assert!(file.path.exists());
    assert!(root
        .path()
        .join("development/docs/reports/keep.md")
        .is_file());
}

#[test]
fn test_per_file_failure_does_not_abort_batch() {
    let (source, root, mover) = setup();
    let missing = FileInfo::new(source.path().join("absent.md"), 5);
    let present = make_file(source.path(), "real.md", "ok");
    let classifications = vec![
        classify(&missing, FileType::Document, None),
        classify(&present, FileType::Document, None),
    ];

    let result = mover
        .move_files(
            &[missing, present],
            &classifications,
            &MoveOptions::default(),
        )
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.failed_files.len(), 1);
    assert_eq!(result.moved_files.len(), 1);
    assert_eq!(result.statistics.failed_moves, 1);
    assert!(root
        .path()
        .join("development/docs/reports/real.md")
        .is_file());
}

#[test]
fn test_cancellation_records_remaining_as_failed() {
    let source = tempdir().unwrap();
    let root = tempdir().unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let mover = LocalFileMover::new("test", root.path(), cancel);

    let files = vec![
        make_file(source.path(), "a.md", "a"),
        make_file(source.path(), "b.md", "b"),
    ];
    let classifications = vec![
        classify(&files[0], FileType::Document, None),
        classify(&files[1], FileType::Document, None),
    ];

    let result = mover
        .move_files(&files, &classifications, &MoveOptions::default())
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.failed_files.len(), 2);
    assert!(result.failed_files[0].error.contains("cancelled"));
    assert!(files[0].path.exists());
}

#[test]
fn test_length_mismatch_is_fatal() {
    let (source, _root, mover) = setup();
    let file = make_file(source.path(), "a.md", "a");

    let err = mover
        .move_files(&[file], &[], &MoveOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("classification"));
}
