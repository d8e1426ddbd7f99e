use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use taskbay_market::{MarketConfig, MarketCoordinator, QueryConfig, StaticCategoryDirectory};
use taskbay_node::{
    api::{start_api_server, AppState},
    config::NodeConfig,
    events::{BusRealtime, EventBus, PresenceRegistry},
    logging::init_logging,
    push::{DeviceRegistry, LogPushGateway, PushDispatcher},
};
use taskbay_storage::{BackendType, StorageConfig, StorageEngine};

#[derive(Parser)]
#[command(name = "taskbay-node", version, about = "Taskbay marketplace node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the node.
    Start {
        /// Path to a TOML config file; defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Log level when RUST_LOG is unset.
        #[arg(long, default_value = "info")]
        log_level: String,
    },
    /// Write a default config file.
    InitConfig {
        /// Where to write the config.
        #[arg(short, long, default_value = "taskbay.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Start { config, log_level } => {
            init_logging(&log_level);
            let config = NodeConfig::load_or_default(config.as_deref())?;
            run(config).await
        }
        Command::InitConfig { output } => {
            NodeConfig::default().save(&output)?;
            println!("wrote default config to {}", output.display());
            Ok(())
        }
    }
}

async fn run(config: NodeConfig) -> Result<()> {
    info!(name = %config.node.name, "🚀 Starting taskbay node");

    let storage = Arc::new(StorageEngine::new(storage_config(&config)?)?);

    let categories = Arc::new(StaticCategoryDirectory::from_tree(
        config
            .categories
            .iter()
            .map(|c| (c.id.clone(), c.subcategories.clone())),
    ));

    let bus = EventBus::new();
    let presence = PresenceRegistry::new();
    let realtime = Arc::new(BusRealtime::new(bus.clone(), presence.clone()));

    let devices = DeviceRegistry::new();
    let push = Arc::new(PushDispatcher::new(devices, Arc::new(LogPushGateway)));

    let market = Arc::new(MarketCoordinator::new(
        MarketConfig {
            query: QueryConfig {
                page_size: config.market.page_size,
            },
        },
        storage,
        categories,
        realtime,
        push,
    ));

    let state = AppState {
        market,
        node_name: config.node.name.clone(),
        started_at: Instant::now(),
    };
    let server = start_api_server(state, config.bind_addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    server.abort();
    Ok(())
}

fn storage_config(config: &NodeConfig) -> Result<StorageConfig> {
    let backend_type = match config.storage.backend.as_str() {
        "memory" => BackendType::Memory,
        #[cfg(feature = "rocksdb")]
        "rocksdb" => BackendType::RocksDb {
            path: config
                .node
                .data_dir
                .join("storage")
                .to_string_lossy()
                .into_owned(),
        },
        other => anyhow::bail!(
            "unsupported storage backend {:?} (is the feature enabled?)",
            other
        ),
    };
    Ok(StorageConfig { backend_type })
}
