//! Default scanner: walks an environment root and collects regular
//! files, honoring glob ignore patterns. Remote environments are not
//! scanned here; a remote-capable `FileScanner` must be supplied.

use glob::Pattern;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::collab::FileScanner;
use crate::error::{Error, Result};
use crate::types::{EnvironmentSpec, FileInfo};

pub struct FlatFileScanner {
    ignore_patterns: Vec<Pattern>,
    max_depth: usize,
}

impl FlatFileScanner {
    pub fn new(ignore_patterns: &[String], max_depth: usize) -> Result<Self> {
        let ignore_patterns = ignore_patterns
            .iter()
            .map(|p| {
                Pattern::new(p)
                    .map_err(|e| Error::ScanFailed(format!("bad ignore pattern '{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            ignore_patterns,
            max_depth,
        })
    }

    fn is_ignored(&self, path: &std::path::Path) -> bool {
        let text = path.to_string_lossy();
        self.ignore_patterns.iter().any(|p| p.matches(&text))
    }
}

impl Default for FlatFileScanner {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            max_depth: 1,
        }
    }
}

impl FileScanner for FlatFileScanner {
    fn scan(&self, environment: &EnvironmentSpec) -> Result<Vec<FileInfo>> {
        if environment.is_remote() {
            return Err(Error::ScanFailed(format!(
                "{}: remote environments need a remote-capable scanner",
                environment.name
            )));
        }

        info!(
            "scanning {} (depth {})",
            environment.root.display(),
            self.max_depth
        );

        let mut files = Vec::new();
        for entry in WalkDir::new(&environment.root)
            .max_depth(self.max_depth)
            .into_iter()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("scan error under {}: {}", environment.root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if self.is_ignored(entry.path()) {
                debug!("ignoring {}", entry.path().display());
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            files.push(FileInfo::new(entry.path().to_path_buf(), size));
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        info!("{}: {} files found", environment.name, files.len());
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_scan_collects_top_level_files_only() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), "aa").unwrap();
        fs::write(tmp.path().join("b.sh"), "b").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/c.txt"), "c").unwrap();

        let scanner = FlatFileScanner::default();
        let env = EnvironmentSpec::local("test", tmp.path());
        let files = scanner.scan(&env).unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.sh"]);
        assert_eq!(files[0].size, 2);
    }

    #[test]
    fn test_ignore_patterns_filter_matches() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("keep.md"), "k").unwrap();
        fs::write(tmp.path().join("skip.log"), "s").unwrap();

        let scanner = FlatFileScanner::new(&["*.log".to_string()], 1).unwrap();
        let env = EnvironmentSpec::local("test", tmp.path());
        let files = scanner.scan(&env).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("keep.md"));
    }

    #[test]
    fn test_remote_environment_rejected() {
        use crate::remote::SshConfig;
        let ssh = SshConfig {
            host: "example.invalid".to_string(),
            user: "deploy".to_string(),
            port: 22,
            key_path: "/tmp/key".into(),
            timeout_secs: 1,
            max_output_bytes: 1024,
        };
        let env = EnvironmentSpec::remote("remote", "/srv", ssh);
        assert!(FlatFileScanner::default().scan(&env).is_err());
    }
}
