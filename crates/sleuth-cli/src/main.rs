//! sleuth - case platform client
//!
//! Sign in with a wallet address, submit case analyses for AI evaluation,
//! and browse recorded submissions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sleuth_core::config::ClientConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// sleuth - case platform client
#[derive(Parser, Debug)]
#[command(name = "sleuth")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sleuth.toml")]
    config: PathBuf,

    /// Backend base URL (overrides config and `SLEUTH_API_URL`)
    #[arg(long)]
    api_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Print machine-readable JSON where supported
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Session ===
    /// Exchange a wallet address for a session token
    Login {
        /// Wallet address (0x...)
        wallet: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the current session and profile
    Whoami,

    // === Analysis ===
    /// Submit a theory to an analysis tool
    Submit(commands::submit::SubmitArgs),

    // === Browsing ===
    /// Recorded submissions
    #[command(subcommand)]
    Submissions(commands::submissions::SubmissionsCommand),

    /// Published cases
    #[command(subcommand)]
    Cases(commands::cases::CasesCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let config = ClientConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?
        .apply_env()
        .with_api_url_override(cli.api_url.clone());
    config.validate().context("invalid configuration")?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    rt.block_on(async {
        match cli.command {
            Commands::Login { wallet } => commands::auth::login(&config, &wallet, cli.json).await,
            Commands::Logout => commands::auth::logout(&config),
            Commands::Whoami => commands::auth::whoami(&config, cli.json).await,
            Commands::Submit(args) => commands::submit::run(&config, &args, cli.json).await,
            Commands::Submissions(cmd) => commands::submissions::run(&config, &cmd, cli.json).await,
            Commands::Cases(cmd) => commands::cases::run(&config, &cmd, cli.json),
        }
    })
}
