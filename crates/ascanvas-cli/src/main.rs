use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use ascanvas_broadcast::MemoryBroadcaster;
use ascanvas_core::config::{Config, StoreKind};
use ascanvas_core::store::{JsonCanvasStore, MemoryCanvasStore};
use ascanvas_core::CanvasRepository;
use ascanvas_gateway::GatewayState;

mod logging;

#[derive(Parser)]
#[command(
    name = "ascanvas",
    about = "Shared ASCII canvases over HTTP, with live change events",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to listen on (default: 1337)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (default: 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
    /// Check the configuration for problems
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;

    logging::init(config.logging.as_ref(), cli.verbose);

    match cli.command {
        Commands::Serve { port, bind } => {
            let port = port.unwrap_or_else(|| config.gateway_port());
            let bind = bind.unwrap_or_else(|| config.gateway_bind());

            let repo: Arc<dyn CanvasRepository> = match config.store_kind() {
                StoreKind::Memory => Arc::new(MemoryCanvasStore::new()),
                StoreKind::Json => {
                    let dir = config.store_dir();
                    tracing::info!(dir = %dir.display(), "Using JSON canvas store");
                    Arc::new(JsonCanvasStore::new(dir))
                }
            };
            let state = Arc::new(GatewayState::new(repo, Arc::new(MemoryBroadcaster::new())));

            tracing::info!("Starting ascanvas gateway on {bind}:{port}");
            ascanvas_gateway::start_gateway(state, &format!("{bind}:{port}")).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("{key} is not set in {}", config_path.display()),
            },
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for w in &warnings {
                    println!("warning: {w}");
                }
                for e in &errors {
                    println!("error: {e}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} has {} error(s)", config_path.display(), errors.len());
                }
                println!("{} is valid", config_path.display());
            }
        },
    }

    Ok(())
}
