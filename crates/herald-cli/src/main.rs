//! Herald CLI
//!
//! Operator tooling for the notification engine: validate configuration files
//! and drive the engine end to end against an in-memory backend.

use anyhow::Result;
use clap::{Parser, Subcommand};
use herald_core::config::HeraldConfig;
use herald_core::Namespace;
use herald_notify::EngineConfig;
use std::path::PathBuf;

mod handlers;

use handlers::simulate::SimulateOptions;

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Herald - realtime notification engine tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine config file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and print the resolved settings
    CheckConfig {
        /// File to check
        path: PathBuf,
    },

    /// Run the engine against an in-memory backend
    Simulate {
        /// Live events to publish
        #[arg(short = 'n', long, default_value = "10")]
        events: usize,

        /// Notifications present before sign-in
        #[arg(long, default_value = "5")]
        seed: usize,

        /// Namespace to serve (overrides the config file)
        #[arg(long)]
        namespace: Option<Namespace>,

        /// Drop the live channel before every Nth event (0 = never)
        #[arg(long, default_value = "0")]
        drop_every: usize,

        /// Make every read-state write fail
        #[arg(long)]
        fail_writes: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::CheckConfig { path } => {
            handlers::config::handle_check_config(&path)?;
        }

        Commands::Simulate {
            events,
            seed,
            namespace,
            drop_every,
            fail_writes,
        } => {
            let mut config = EngineConfig::load(cli.config.as_deref())?;
            if let Some(namespace) = namespace {
                config = config.with_namespace(namespace);
            }
            let options = SimulateOptions {
                events,
                seed,
                drop_every,
                fail_writes,
            };
            handlers::simulate::handle_simulate(config, options).await?;
        }
    }

    Ok(())
}
