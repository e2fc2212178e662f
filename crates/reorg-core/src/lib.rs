pub mod classifier;
pub mod collab;
pub mod config;
pub mod engine;
pub mod error;
pub mod fsops;
pub mod mover;
pub mod permissions;
pub mod progress;
pub mod remote;
pub mod scanner;
pub mod types;

pub use classifier::ExtensionClassifier;
pub use config::AppConfig;
pub use engine::{
    EnvironmentResult, ExecutionEngine, ExecutionError, ExecutionOptions, ExecutionResult, Phase,
    RunMode,
};
pub use error::{Error, Result};
pub use mover::{FileMover, LocalFileMover, RemoteFileMover};
pub use permissions::{PermissionManager, PermissionValidator, RepairPlan, RiskLevel};
pub use progress::{ProgressReporter, SilentReporter};
pub use scanner::FlatFileScanner;
pub use types::{
    Access, CancelToken, ClassificationResult, EnvironmentSpec, FileInfo, FileType, MoveOptions,
    MoveResult,
};
