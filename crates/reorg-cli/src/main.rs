mod commands;
mod logging;
mod progress;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, RunArgs};
use dotenv::dotenv;
use progress::CliReporter;
use reorg_core::{
    AppConfig, ExecutionEngine, ExecutionOptions, ExecutionResult, FlatFileScanner, RunMode,
};
use tracing::error;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let config = match AppConfig::load_from(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let result = match args.command {
        Some(Commands::Run(run_args)) => run(&config, RunMode::Full, &run_args),
        Some(Commands::Scan) => run(&config, RunMode::ScanOnly, &RunArgs::default()),
        Some(Commands::Classify) => run(&config, RunMode::ClassifyOnly, &RunArgs::default()),
        Some(Commands::Move(run_args)) => run(&config, RunMode::MoveOnly, &run_args),
        Some(Commands::Sync) => run(&config, RunMode::SyncOnly, &RunArgs::default()),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            return Ok(());
        }
        None => {
            let _ = Cli::command().print_long_help();
            return Ok(());
        }
    };

    match result {
        Ok(result) if result.success => Ok(()),
        Ok(_) => process::exit(1),
        Err(err) => {
            error!("Error: {}", err);
            process::exit(1);
        }
    }
}

fn run(
    config: &AppConfig,
    mode: RunMode,
    args: &RunArgs,
) -> Result<ExecutionResult, Box<dyn std::error::Error>> {
    let scanner = FlatFileScanner::new(&config.ignore_patterns, config.scan_depth)?;
    let engine = ExecutionEngine::new().with_scanner(Arc::new(scanner));

    let options = ExecutionOptions {
        mode,
        environments: config.environments.clone(),
        dry_run: args.dry_run,
        enable_parallel: !args.sequential,
        create_backup: args.backup,
        continue_on_error: !args.fail_fast,
        move_options: config.move_options.clone(),
        batch_size: config.batch_size,
        batch_delay: Duration::from_secs(config.batch_delay_secs),
        ..ExecutionOptions::default()
    };

    let reporter = CliReporter::new();
    let result = engine.execute(&options, &reporter);

    println!();
    for env in &result.environments {
        println!(
            "{}: {} scanned, {} classified, {} moved ({} failed), {} permission updates",
            env.environment.bold(),
            format!("{}", env.scanned_files).cyan(),
            format!("{}", env.classified_files).cyan(),
            format!("{}", env.moved_files).green(),
            format!("{}", env.failed_moves).red(),
            format!("{}", env.permission_updates).green(),
        );
    }
    if result.dry_run {
        println!("{}", "dry run: no files were touched".yellow());
    }
    for err in &result.errors {
        println!(
            "{} {} phase{}: {}",
            "error:".red(),
            err.phase,
            err.environment
                .as_deref()
                .map(|name| format!(" ({})", name))
                .unwrap_or_default(),
            err.message
        );
    }
    println!(
        "{} in {}",
        if result.success {
            "completed".green()
        } else {
            "finished with failures".red()
        },
        format!("{:.2}s", result.duration.as_secs_f64()).green(),
    );

    Ok(result)
}
