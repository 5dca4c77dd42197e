mod cli;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quill::config::QuillConfig;
use quill::error::is_stopped;

#[derive(Parser)]
#[command(name = "quill", version, about = "Diary assistant with a long-term memory profile")]
struct Cli {
    /// Config file (default: ~/.quill/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize finished weeks, evaluate this week's entries, analyse on Sunday
    Run {
        /// Run the weekly analysis even if today is not Sunday
        #[arg(long)]
        analyze: bool,
    },
    /// Generate missing weekly summaries
    Summarize,
    /// Evaluate one entry and append the result to it
    Evaluate {
        /// Entry date, YYYY-MM-DD (default: latest entry)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Analyse the current week
    Analyze,
    /// Inspect or compact the memory profile
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Print every fact
    Show,
    /// Print the profile size against the compaction thresholds
    Stats,
    /// Run a compaction pass now
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => QuillConfig::load_from(path)?,
        None => QuillConfig::load()?,
    };
    let _guard = init_tracing(&config)?;

    let result = match cli.command {
        Command::Run { analyze } => cli::run::run(&config, analyze).await,
        Command::Summarize => cli::summarize::summarize(&config).await,
        Command::Evaluate { date } => cli::evaluate::evaluate(&config, date).await,
        Command::Analyze => cli::analyze::analyze(&config).await,
        Command::Memory { action } => match action {
            MemoryAction::Show => cli::memory::show(&config),
            MemoryAction::Stats => cli::memory::stats(&config),
            MemoryAction::Compact => cli::memory::compact(&config).await,
        },
    };

    match result {
        Err(e) if is_stopped(&e) => {
            warn!("stopped by operator");
            Ok(())
        }
        other => other,
    }
}

/// Log to stderr, and to a daily file under the log directory when enabled.
/// The returned guard flushes the file writer on drop.
fn init_tracing(config: &QuillConfig) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_new(&config.logging.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    if !config.logging.file_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    }

    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log dir: {}", log_dir.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "app.log"));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}
