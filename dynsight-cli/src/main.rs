//! dynsight command line interface.
//!
//! Points the analysis engine at a solver result directory and renders
//! the report to the terminal, with optional JSON and HTML documents.

mod html;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use report_engine::{Engine, EngineConfig, EngineError};

/// dynsight - run diagnostics for explicit-dynamics solver output
///
/// Reads the text outputs of a finished (or crashed) run - d3hsp,
/// glstat, message logs, time histories, profiling CSVs - and reports
/// what went wrong and what to fix first.
#[derive(Parser)]
#[command(name = "dynsight")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Result directory holding the solver output files
    result_dir: PathBuf,

    /// Write the full report as JSON to this path
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Write a self-contained HTML report to this path
    #[arg(long, value_name = "PATH")]
    html: Option<PathBuf>,

    /// Cap on distinct nodes tracked from the time-history files
    #[arg(long, default_value_t = 10_000)]
    node_cap: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = EngineConfig {
        tracked_node_cap: cli.node_cap,
        ..Default::default()
    };
    let engine = Engine::new(&cli.result_dir, config);

    let cancel = engine.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        tracing::warn!("could not install Ctrl-C handler: {e}");
    }

    let report = match engine.run() {
        Ok(report) => report,
        Err(e @ EngineError::MissingRequiredInputs { .. })
        | Err(e @ EngineError::EmptyRun { .. }) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
        Err(EngineError::Aborted) => {
            eprintln!("aborted");
            return ExitCode::from(130);
        }
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    render::terminal(&report);

    if let Some(path) = &cli.json {
        if let Err(e) = write_json(&report, path) {
            eprintln!("error: could not write {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
        tracing::info!("wrote {}", path.display());
    }
    if let Some(path) = &cli.html {
        if let Err(e) = std::fs::write(path, html::render(&report)) {
            eprintln!("error: could not write {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
        tracing::info!("wrote {}", path.display());
    }

    ExitCode::SUCCESS
}

fn write_json(report: &report_engine::Report, path: &PathBuf) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}
