use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "reorg")]
#[command(about = "Cross-environment file reorganizer", long_about = None)]
pub struct Cli {
    /// Configuration file name (without extension)
    #[arg(long, default_value = "Reorg", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Resolve targets and report without touching any files
    #[arg(long)]
    pub dry_run: bool,

    /// Snapshot each environment before moving files
    #[arg(long)]
    pub backup: bool,

    /// Process environments one at a time instead of in parallel
    #[arg(long)]
    pub sequential: bool,

    /// Abort the run on the first phase error
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Full reorganization: scan, classify, move, set permissions, validate
    Run(RunArgs),
    /// Scan configured environments and report what was found
    Scan,
    /// Scan and classify without moving anything
    Classify,
    /// Scan, classify and move, skipping the permission passes
    Move(RunArgs),
    /// Synchronize environments without moving files
    Sync,
    /// Print configuration values
    PrintConfig,
}
