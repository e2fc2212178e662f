//! Permission policy: a data-driven rule table mapping (file type,
//! optional path-marker set) to an octal mode. Rules are evaluated in
//! declaration order, first match wins, default "644".

pub mod manager;
pub mod validator;

use std::path::Path;

use crate::types::FileType;

pub use manager::{PermissionManager, PermissionResult, PermissionSummary};
pub use validator::{
    IssueType, PermissionValidator, RepairPlan, RepairTarget, RiskLevel, ValidationResult,
    ValidationSummary,
};

/// Path substrings that mark a config file as sensitive.
pub const SECRET_MARKERS: &[&str] = &["secret", "env", "key", "password", "credential"];

/// Path substrings that escalate world/group-readable drift to critical.
pub const CRITICAL_MARKERS: &[&str] = &["secret", "key", "password"];

pub const DEFAULT_PERMISSIONS: &str = "644";

#[derive(Debug, Clone, Copy)]
pub struct PermissionRule {
    pub file_type: FileType,
    pub permissions: &'static str,
    pub description: &'static str,
    /// When set, the rule matches only paths containing at least one
    /// of these substrings.
    pub path_markers: Option<&'static [&'static str]>,
}

pub const RULES: &[PermissionRule] = &[
    PermissionRule {
        file_type: FileType::Script,
        permissions: "755",
        description: "executable scripts",
        path_markers: None,
    },
    PermissionRule {
        file_type: FileType::Config,
        permissions: "600",
        description: "sensitive configuration",
        path_markers: Some(SECRET_MARKERS),
    },
    PermissionRule {
        file_type: FileType::Config,
        permissions: "644",
        description: "general configuration",
        path_markers: None,
    },
    PermissionRule {
        file_type: FileType::Document,
        permissions: "644",
        description: "documentation",
        path_markers: None,
    },
    PermissionRule {
        file_type: FileType::Test,
        permissions: "644",
        description: "test data",
        path_markers: None,
    },
    PermissionRule {
        file_type: FileType::Log,
        permissions: "644",
        description: "log files",
        path_markers: None,
    },
    PermissionRule {
        file_type: FileType::Other,
        permissions: "644",
        description: "unclassified files",
        path_markers: None,
    },
];

pub fn path_contains_any(path: &Path, markers: &[&str]) -> bool {
    let text = path.to_string_lossy();
    markers.iter().any(|marker| text.contains(marker))
}

/// Pure, total derivation of the policy mode for a file.
pub fn target_permissions(path: &Path, file_type: FileType) -> &'static str {
    for rule in RULES {
        if rule.file_type != file_type {
            continue;
        }
        match rule.path_markers {
            Some(markers) => {
                if path_contains_any(path, markers) {
                    return rule.permissions;
                }
            }
            None => return rule.permissions,
        }
    }
    DEFAULT_PERMISSIONS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_script_is_executable() {
        assert_eq!(
            target_permissions(&PathBuf::from("/opt/deploy.sh"), FileType::Script),
            "755"
        );
    }

    #[test]
    fn test_sensitive_config_is_owner_only() {
        for path in [
            "/etc/app/secret.toml",
            "/home/dev/.env.production",
            "/configs/api_key.json",
            "/configs/password_list.yaml",
            "/configs/db_credential.ini",
        ] {
            assert_eq!(
                target_permissions(&PathBuf::from(path), FileType::Config),
                "600",
                "path {} should be sensitive",
                path
            );
        }
    }

    #[test]
    fn test_plain_config_is_world_readable() {
        assert_eq!(
            target_permissions(&PathBuf::from("/configs/app.toml"), FileType::Config),
            "644"
        );
    }

    #[test]
    fn test_everything_else_defaults_to_644() {
        let path = PathBuf::from("/docs/readme.md");
        assert_eq!(target_permissions(&path, FileType::Document), "644");
        assert_eq!(target_permissions(&path, FileType::Test), "644");
        assert_eq!(target_permissions(&path, FileType::Log), "644");
        assert_eq!(target_permissions(&path, FileType::Other), "644");
    }

    #[test]
    fn test_secret_marker_does_not_affect_scripts() {
        // First matching rule wins: scripts stay 755 even on secret paths.
        assert_eq!(
            target_permissions(&PathBuf::from("/scripts/rotate_secret.sh"), FileType::Script),
            "755"
        );
    }
}
