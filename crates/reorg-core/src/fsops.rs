//! Filesystem primitives shared by the movers and the permission
//! subsystem, with a local (std::fs) and a remote (ssh) implementation.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::warn;

use crate::error::{Error, Result};
use crate::remote::RemoteShell;

/// The primitives this engine needs from an environment's filesystem.
/// Octal modes travel as strings ("755", "600") matching what `chmod`
/// and `stat -c%a` speak.
pub trait FileOps: Send + Sync {
    fn exists(&self, path: &Path) -> Result<bool>;
    fn is_dir(&self, path: &Path) -> Result<bool>;
    fn file_size(&self, path: &Path) -> Result<u64>;
    fn mode(&self, path: &Path) -> Result<String>;
    fn set_mode(&self, path: &Path, mode: &str) -> Result<()>;
    fn mkdir_p(&self, path: &Path) -> Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn copy(&self, from: &Path, to: &Path, preserve_timestamps: bool) -> Result<()>;
    /// Filesystem usage at `path` in percent, when the environment can
    /// report it cheaply.
    fn disk_usage_percent(&self, path: &Path) -> Result<Option<u8>>;
}

fn parse_octal(mode: &str) -> Result<u32> {
    u32::from_str_radix(mode, 8)
        .map_err(|_| Error::PermissionFailed(format!("invalid octal mode '{}'", mode)))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOps;

impl FileOps for LocalOps {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(path.is_file())
    }

    fn is_dir(&self, path: &Path) -> Result<bool> {
        Ok(path.is_dir())
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn mode(&self, path: &Path) -> Result<String> {
        let metadata = fs::metadata(path)?;
        Ok(format!("{:o}", metadata.permissions().mode() & 0o777))
    }

    fn set_mode(&self, path: &Path, mode: &str) -> Result<()> {
        let bits = parse_octal(mode)?;
        fs::set_permissions(path, fs::Permissions::from_mode(bits))?;
        Ok(())
    }

    fn mkdir_p(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to)?;
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path, preserve_timestamps: bool) -> Result<()> {
        fs::copy(from, to)?;
        if preserve_timestamps {
            let metadata = fs::metadata(from)?;
            let mtime = filetime::FileTime::from_last_modification_time(&metadata);
            let atime = filetime::FileTime::from_last_access_time(&metadata);
            if let Err(e) = filetime::set_file_times(to, atime, mtime) {
                warn!("could not preserve timestamps on {}: {}", to.display(), e);
            }
        }
        Ok(())
    }

    fn disk_usage_percent(&self, _path: &Path) -> Result<Option<u8>> {
        Ok(None)
    }
}

/// Remote filesystem access: every call is a discrete SSH round trip.
#[derive(Debug, Clone)]
pub struct RemoteOps {
    shell: RemoteShell,
}

impl RemoteOps {
    pub fn new(shell: RemoteShell) -> Self {
        Self { shell }
    }

    pub fn shell(&self) -> &RemoteShell {
        &self.shell
    }

    /// Remote paths travel as ssh arguments and must be valid UTF-8.
    fn path_arg(path: &Path) -> Result<&str> {
        path.to_str().ok_or_else(|| {
            Error::MoveFailed(format!(
                "path {} cannot be represented as a remote argument",
                path.display()
            ))
        })
    }
}

impl FileOps for RemoteOps {
    fn exists(&self, path: &Path) -> Result<bool> {
        self.shell.run_ok(&["test", "-f", Self::path_arg(path)?])
    }

    fn is_dir(&self, path: &Path) -> Result<bool> {
        self.shell.run_ok(&["test", "-d", Self::path_arg(path)?])
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        let output = self.shell.run(&["stat", "-c%s", Self::path_arg(path)?])?;
        if !output.success() {
            return Err(Error::MoveFailed(format!(
                "stat failed for {}: {}",
                path.display(),
                output.stderr.trim()
            )));
        }
        output.stdout.trim().parse::<u64>().map_err(|_| {
            Error::MoveFailed(format!(
                "unparseable size '{}' for {}",
                output.stdout.trim(),
                path.display()
            ))
        })
    }

    fn mode(&self, path: &Path) -> Result<String> {
        let output = self.shell.run(&["stat", "-c%a", Self::path_arg(path)?])?;
        if !output.success() {
            return Err(Error::PermissionFailed(format!(
                "stat failed for {}: {}",
                path.display(),
                output.stderr.trim()
            )));
        }
        Ok(output.stdout.trim().to_string())
    }

    fn set_mode(&self, path: &Path, mode: &str) -> Result<()> {
        parse_octal(mode)?;
        let output = self.shell.run(&["chmod", mode, Self::path_arg(path)?])?;
        if !output.success() {
            return Err(Error::PermissionFailed(format!(
                "chmod {} failed for {}: {}",
                mode,
                path.display(),
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    fn mkdir_p(&self, path: &Path) -> Result<()> {
        let output = self.shell.run(&["mkdir", "-p", Self::path_arg(path)?])?;
        if !output.success() {
            return Err(Error::MoveFailed(format!(
                "mkdir -p failed for {}: {}",
                path.display(),
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let output = self
            .shell
            .run(&["mv", Self::path_arg(from)?, Self::path_arg(to)?])?;
        if !output.success() {
            return Err(Error::MoveFailed(format!(
                "mv {} -> {} failed: {}",
                from.display(),
                to.display(),
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path, preserve_timestamps: bool) -> Result<()> {
        let output = if preserve_timestamps {
            self.shell
                .run(&["cp", "-p", Self::path_arg(from)?, Self::path_arg(to)?])?
        } else {
            self.shell
                .run(&["cp", Self::path_arg(from)?, Self::path_arg(to)?])?
        };
        if !output.success() {
            return Err(Error::MoveFailed(format!(
                "cp {} -> {} failed: {}",
                from.display(),
                to.display(),
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    fn disk_usage_percent(&self, path: &Path) -> Result<Option<u8>> {
        let output = self.shell.run(&["df", "-h", Self::path_arg(path)?])?;
        if !output.success() {
            return Ok(None);
        }
        // Usage is the fifth column of the last line, e.g. "42%".
        let usage = output
            .stdout
            .lines()
            .last()
            .and_then(|line| line.split_whitespace().nth(4))
            .and_then(|field| field.trim_end_matches('%').parse::<u8>().ok());
        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_local_mode_round_trip() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("a.txt");
        fs::File::create(&file)
            .unwrap()
            .write_all(b"hello")
            .unwrap();

        let ops = LocalOps;
        ops.set_mode(&file, "644").unwrap();
        assert_eq!(ops.mode(&file).unwrap(), "644");
        ops.set_mode(&file, "755").unwrap();
        assert_eq!(ops.mode(&file).unwrap(), "755");
    }

    #[test]
    fn test_local_copy_retains_source() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("src.txt");
        let dst = tmp.path().join("dst.txt");
        fs::write(&src, "payload").unwrap();

        let ops = LocalOps;
        ops.copy(&src, &dst, true).unwrap();
        assert!(ops.exists(&src).unwrap());
        assert!(ops.exists(&dst).unwrap());
        assert_eq!(ops.file_size(&dst).unwrap(), 7);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "x").unwrap();
        assert!(LocalOps.set_mode(&file, "rwx").is_err());
    }

    #[test]
    fn test_remote_rejects_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        use std::path::PathBuf;

        use crate::remote::SshConfig;

        let ops = RemoteOps::new(RemoteShell::new(SshConfig {
            host: "test.invalid".to_string(),
            user: "deploy".to_string(),
            port: 22,
            key_path: PathBuf::from("/tmp/key"),
            timeout_secs: 1,
            max_output_bytes: 1024,
        }));
        let bad = PathBuf::from(OsStr::from_bytes(b"/srv/\xff\xfe"));

        // Fails before any ssh subprocess is spawned.
        let err = ops.exists(&bad).unwrap_err();
        assert!(err.to_string().contains("remote argument"));
    }
}
