//! Syncrift command-line client
//!
//! Usage:
//!   syncrift login alice
//!   syncrift friends list
//!   syncrift challenge create bob --category TB
//!   syncrift listen --auto-ready

mod account;
mod listen;
mod social;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use syncrift::{App, ClientConfig};

#[derive(Parser)]
#[command(name = "syncrift")]
#[command(version)]
#[command(about = "Headless client for the Syncrift battle platform")]
#[command(propagate_version = true)]
struct Cli {
    /// REST backend base URL
    #[arg(long, env = "SYNCRIFT_API_URL", global = true)]
    api_url: Option<String>,

    /// STOMP-over-WebSocket broker endpoint
    #[arg(long, env = "SYNCRIFT_BROKER_URL", global = true)]
    broker_url: Option<String>,

    /// Directory holding the stored credential and stage marker
    #[arg(long, env = "SYNCRIFT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Seconds to wait before reconnecting to the broker
    #[arg(long, env = "SYNCRIFT_RECONNECT_DELAY_SECS", global = true)]
    reconnect_delay: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the credential
    Login(account::LoginArgs),

    /// Create an account
    Signup(account::SignupArgs),

    /// Forget the stored credential
    Logout,

    /// Show who is logged in
    Whoami,

    /// Manage friends and friend requests
    #[command(subcommand)]
    Friends(social::FriendsCommand),

    /// Send and answer battle challenges
    #[command(subcommand)]
    Challenge(social::ChallengeCommand),

    /// Stay connected and follow notifications and battles
    #[command(visible_alias = "l")]
    Listen(listen::ListenArgs),
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(url) = &self.broker_url {
            config.broker_url = url.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(secs) = self.reconnect_delay {
            config.reconnect_delay = Duration::from_secs(secs);
        }
        config
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,syncrift=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let app = App::from_config(cli.config()).context("failed to initialise client")?;

    match cli.command {
        Commands::Login(args) => account::login(&app, args).await,
        Commands::Signup(args) => account::signup(&app, args).await,
        Commands::Logout => account::logout(&app),
        Commands::Whoami => account::whoami(&app).await,
        Commands::Friends(cmd) => social::friends(&app, cmd).await,
        Commands::Challenge(cmd) => social::challenge(&app, cmd).await,
        Commands::Listen(args) => listen::run(app, args).await,
    }
}

/// Verify the stored credential, failing when there is none
pub(crate) async fn require_login(app: &App) -> Result<String> {
    app.session()
        .restore()
        .await
        .context("not logged in, run `syncrift login` first")
}
