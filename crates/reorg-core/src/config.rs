use config::{Config, File as ConfigFile};
use serde::Deserialize;

use crate::error::Result;
use crate::types::{EnvironmentSpec, MoveOptions};

fn default_scan_depth() -> usize {
    1
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_delay_secs() -> u64 {
    1
}

/// Run configuration, loaded from `Reorg.toml` (or an explicit path).
/// Environments carry their own access settings; see
/// `EnvironmentSpec`.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub environments: Vec<EnvironmentSpec>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_scan_depth")]
    pub scan_depth: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_secs")]
    pub batch_delay_secs: u64,
    #[serde(default)]
    pub move_options: MoveOptions,
}

impl AppConfig {
    pub fn load() -> Result<AppConfig> {
        Self::load_from("Reorg")
    }

    pub fn load_from(name: &str) -> Result<AppConfig> {
        let builder = Config::builder()
            .add_source(ConfigFile::with_name(name).required(true))
            .build()?;
        Ok(builder.try_deserialize::<AppConfig>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Access;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_mixed_environments() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            file,
            r#"
ignore_patterns = ["*.tmp"]

[[environments]]
name = "workstation"
root = "/srv/files"
kind = "local"

[[environments]]
name = "staging"
root = "/var/app"
kind = "remote"

[environments.ssh]
host = "staging.internal"
user = "deploy"
key_path = "/home/ci/.ssh/id_ed25519"
"#
        )
        .unwrap();

        let path = file.path().to_string_lossy().into_owned();
        let config = AppConfig::load_from(path.trim_end_matches(".toml")).unwrap();

        assert_eq!(config.environments.len(), 2);
        assert!(matches!(config.environments[0].access, Access::Local));
        match &config.environments[1].access {
            Access::Remote { ssh } => {
                assert_eq!(ssh.host, "staging.internal");
                assert_eq!(ssh.port, 22);
                assert_eq!(ssh.timeout_secs, 30);
            }
            Access::Local => panic!("staging should be remote"),
        }
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.ignore_patterns, vec!["*.tmp"]);
    }
}
