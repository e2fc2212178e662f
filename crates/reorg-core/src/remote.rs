//! Remote command transport. Every remote filesystem primitive is one
//! `ssh` subprocess invocation with an argument vector — command strings
//! are never assembled by concatenating paths into shell text.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

fn default_port() -> u16 {
    22
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_output_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    pub host: String,
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub key_path: PathBuf,
    /// Applied both as the ssh ConnectTimeout and as the per-command
    /// wall-clock limit.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One SSH round trip per call. Issues at most one command at a time;
/// cloning shares only the configuration, not any connection state.
#[derive(Debug, Clone)]
pub struct RemoteShell {
    config: SshConfig,
}

impl RemoteShell {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Runs `argv` on the remote host. A wall-clock timeout kills the
    /// subprocess and surfaces as a connection failure for this command
    /// only; callers do not retry within a batch iteration. Output is
    /// drained on reader threads while the command runs, so a command
    /// producing more than the OS pipe buffer cannot stall against a
    /// full pipe and trip the timeout.
    pub fn run(&self, argv: &[&str]) -> Result<CommandOutput> {
        let start = Instant::now();
        let mut command = Command::new("ssh");
        command
            .arg("-i")
            .arg(&self.config.key_path)
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.config.timeout_secs))
            .arg("-o")
            .arg("StrictHostKeyChecking=no")
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg(format!("{}@{}", self.config.user, self.config.host))
            .args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| {
            Error::SshConnectionFailed(format!("{}: failed to spawn ssh: {}", self.config.host, e))
        })?;

        let stdout_drain = drain_capped(child.stdout.take(), self.config.max_output_bytes);
        let stderr_drain = drain_capped(child.stderr.take(), self.config.max_output_bytes);

        let deadline = self.timeout();
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None => {
                    if start.elapsed() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        // Killing closes the pipes, so the drains finish.
                        let _ = stdout_drain.join();
                        let _ = stderr_drain.join();
                        return Err(Error::SshConnectionFailed(format!(
                            "{}: command timed out after {:?}",
                            self.config.host, deadline
                        )));
                    }
                    thread::sleep(Duration::from_millis(25));
                }
            }
        };

        let stdout = stdout_drain.join().unwrap_or_default();
        let stderr = stderr_drain.join().unwrap_or_default();
        let elapsed = start.elapsed();
        let exit_code = status.code().unwrap_or(-1);

        debug!(
            "ssh {} {:?} exited {} in {:.0?}",
            self.config.host, argv, exit_code, elapsed
        );

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
            elapsed,
        })
    }

    /// Runs `argv` and reports only whether it exited zero.
    pub fn run_ok(&self, argv: &[&str]) -> Result<bool> {
        Ok(self.run(argv)?.success())
    }

    /// Cheap liveness probe; a failure here aborts the enclosing batch.
    pub fn test_connection(&self) -> Result<()> {
        let output = self.run(&["echo", "connection", "test"])?;
        if output.success() {
            debug!("connection test to {} succeeded", self.config.host);
            Ok(())
        } else {
            Err(Error::SshConnectionFailed(format!(
                "{}: connection test exited {}: {}",
                self.config.host,
                output.exit_code,
                output.stderr.trim()
            )))
        }
    }
}

/// Reads the whole stream to keep the child's pipe moving, retaining
/// only the first `cap` bytes.
fn drain_capped<R: Read + Send + 'static>(
    reader: Option<R>,
    cap: usize,
) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut kept = Vec::new();
        if let Some(mut reader) = reader {
            let mut buf = [0u8; 8192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if kept.len() < cap {
                            let take = n.min(cap - kept.len());
                            kept.extend_from_slice(&buf[..take]);
                        }
                    }
                    Err(e) => {
                        warn!("error reading ssh output: {}", e);
                        break;
                    }
                }
            }
        }
        String::from_utf8_lossy(&kept).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Tests here put a fake `ssh` on PATH; serialize them so they do
    // not race on the variable.
    static PATH_LOCK: Mutex<()> = Mutex::new(());

    fn fake_ssh(body: &str) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ssh");
        fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let path = env::var("PATH").unwrap_or_default();
        env::set_var("PATH", format!("{}:{}", dir.path().display(), path));
        dir
    }

    fn shell(timeout_secs: u64, max_output_bytes: usize) -> RemoteShell {
        RemoteShell::new(SshConfig {
            host: "test.invalid".to_string(),
            user: "deploy".to_string(),
            port: 22,
            key_path: PathBuf::from("/tmp/key"),
            timeout_secs,
            max_output_bytes,
        })
    }

    #[test]
    fn test_large_output_is_drained_without_tripping_timeout() {
        let _guard = PATH_LOCK.lock().unwrap();
        let _dir = fake_ssh("head -c 200000 /dev/zero | tr '\\0' 'a'");

        let output = shell(3, 10 * 1024 * 1024).run(&["true"]).unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.len(), 200_000);
    }

    #[test]
    fn test_output_retained_up_to_cap() {
        let _guard = PATH_LOCK.lock().unwrap();
        let _dir = fake_ssh("head -c 200000 /dev/zero | tr '\\0' 'a'");

        let output = shell(3, 1024).run(&["true"]).unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.len(), 1024);
    }

    #[test]
    fn test_stalled_command_times_out() {
        let _guard = PATH_LOCK.lock().unwrap();
        let _dir = fake_ssh("sleep 10");

        let err = shell(1, 1024).run(&["true"]).unwrap_err();

        assert!(err.to_string().contains("timed out"));
    }
}
