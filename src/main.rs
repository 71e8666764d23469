//! cloud-init-reconciler - render and manage cloud-init user-data snippets
//!
//! Merges the computed default, the operator override and bootstrap data
//! for a machine, then writes the result to (or removes it from) the
//! snippet storage of a node.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use clap::{Args, Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cloud_init_reconciler::Reconciler;
use cloud_init_reconciler::backend::{local::LocalTransport, lookup::StaticLookup};
use cloud_init_reconciler::reconciler::render_user_data;
use cloud_init_reconciler::settings::{DefaultUserData, Settings};

#[derive(Parser)]
#[command(name = "cloud-init-reconciler")]
#[command(author, version, about = "Render and manage cloud-init user-data snippets", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged user-data for a machine
    Render {
        #[command(flatten)]
        machine: MachineArgs,

        /// Settings file (defaults and operator override)
        #[arg(short, long, env = "CLOUD_INIT_RECONCILER_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Write the merged user-data snippet to the storage backend
    Apply {
        #[command(flatten)]
        machine: MachineArgs,

        /// Settings file
        #[arg(short, long, env = "CLOUD_INIT_RECONCILER_CONFIG")]
        config: PathBuf,
    },
    /// Delete a machine's user-data snippet
    Delete {
        /// Machine name
        #[arg(short, long)]
        machine: String,

        /// Settings file
        #[arg(short, long, env = "CLOUD_INIT_RECONCILER_CONFIG")]
        config: PathBuf,
    },
}

#[derive(Args)]
struct MachineArgs {
    /// Machine name
    #[arg(short, long)]
    machine: String,

    /// File holding the bootstrap provider's user-data
    #[arg(short, long)]
    bootstrap: PathBuf,

    /// Bootstrap file is base64-encoded
    #[arg(long)]
    base64: bool,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

async fn read_bootstrap(args: &MachineArgs) -> Result<String> {
    let raw = tokio::fs::read(&args.bootstrap)
        .await
        .with_context(|| format!("failed to read {}", args.bootstrap.display()))?;

    let raw = if args.base64 {
        let text = String::from_utf8_lossy(&raw);
        BASE64
            .decode(text.trim())
            .context("bootstrap data is not valid base64")?
    } else {
        raw
    };

    String::from_utf8(raw).context("bootstrap data is not valid UTF-8")
}

async fn load_settings(path: &Path) -> Result<Settings> {
    Settings::load(path)
        .await
        .with_context(|| format!("failed to load settings from {}", path.display()))
}

fn build_reconciler(settings: &Settings) -> Reconciler {
    Reconciler::from_settings(
        settings,
        Arc::new(StaticLookup::from_settings(settings)),
        Arc::new(LocalTransport::new()),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Render { machine, config } => {
            let settings = match &config {
                Some(path) => Some(load_settings(path).await?),
                None => None,
            };
            let bootstrap = read_bootstrap(&machine).await?;

            let defaults = settings
                .as_ref()
                .map(|s| s.defaults.clone())
                .unwrap_or_else(DefaultUserData::default);
            let operator = settings.as_ref().and_then(|s| s.user.as_ref());

            let user_data = render_user_data(&defaults, &machine.machine, operator, &bootstrap)?;
            print!("{}", user_data);
        }
        Commands::Apply { machine, config } => {
            let settings = load_settings(&config).await?;
            let bootstrap = read_bootstrap(&machine).await?;

            info!("Reconciling user-data for {}", machine.machine);
            build_reconciler(&settings)
                .reconcile_user(&machine.machine, settings.user.as_ref(), &bootstrap)
                .await?;
        }
        Commands::Delete { machine, config } => {
            let settings = load_settings(&config).await?;

            info!("Deleting user-data for {}", machine);
            build_reconciler(&settings).delete_config(&machine).await?;
        }
    }

    Ok(())
}
