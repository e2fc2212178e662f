use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("scan failed: {0}")]
    ScanFailed(String),

    #[error("move setup failed: {0}")]
    MoveFailed(String),

    #[error("SSH connection failed: {0}")]
    SshConnectionFailed(String),

    #[error("permission pass failed: {0}")]
    PermissionFailed(String),

    #[error("validation pass failed: {0}")]
    ValidationFailed(String),

    #[error("{files} files but {classifications} classification results")]
    LengthMismatch {
        files: usize,
        classifications: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
