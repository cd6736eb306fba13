//! Warren - messaging operation pipelines for AMQP brokers
//!
//! Main entry point for the Warren CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, simulate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Warren - messaging operation pipelines for AMQP brokers
#[derive(Parser)]
#[command(name = "warren")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Client configuration file (default: <config dir>/warren/warren.toml)
    #[arg(short, long, global = true, env = "WARREN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write JSON logs to daily rotated files in this directory
    #[arg(long, global = true, env = "WARREN_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Client configuration management
    Config(config::ConfigArgs),

    /// Publish and consume messages on an in-memory broker
    Simulate(simulate::SimulateArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console logs go to stderr so command output stays parseable.
    let filter = if cli.verbose {
        "warren=debug,warren_operations=debug,warren_pipe=debug,warren_channel=debug,warren_config=debug,info"
    } else {
        "warren=info,warren_operations=warn,warren_pipe=warn,warren_channel=warn,warn"
    };

    use tracing_subscriber::prelude::*;
    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(tracing_subscriber::EnvFilter::new(filter));

    let _guard = match &cli.log_dir {
        Some(log_dir) => {
            let file_appender = tracing_appender::rolling::daily(log_dir, "warren.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_filter(tracing_subscriber::EnvFilter::new(
                            "warren=trace,warren_operations=trace,warren_pipe=trace,warren_channel=trace,warren_config=trace,info",
                        )),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(console).init();
            None
        }
    };

    let ctx = commands::Context {
        config_path: cli.config.or_else(commands::default_config_path),
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Config(args) => config::run(args, &ctx).await,
        Commands::Simulate(args) => simulate::run(args, &ctx).await,
    }
}
