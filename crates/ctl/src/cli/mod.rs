pub mod loopback;
pub mod pool;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use basinpool::config::PoolConfig;
use basinpool::controller::PoolController;
use basinpool::dbus::DbusPoolClient;
use basinpool::store::PoolStore;

use crate::cli::loopback::LoopCommand;
use crate::cli::pool::PoolCommand;

#[derive(Parser)]
#[command(version, about = "Control the basin storage provisioning engine")]
pub struct ControlCommand {
    #[arg(
        short,
        long,
        help = "Path to the basin configuration file",
        default_value = "/etc/basin/config.toml"
    )]
    config: String,

    #[arg(long, help = "Override the pool record store path")]
    store: Option<String>,

    #[command(subcommand)]
    command: ControlCommands,
}

#[derive(Parser)]
pub enum ControlCommands {
    Pool(PoolCommand),
    Loop(LoopCommand),
}

impl ControlCommand {
    pub async fn run(self) -> Result<()> {
        let mut config = PoolConfig::load(Path::new(&self.config)).await?;
        if let Some(store) = self.store {
            config.store_path = store;
        }
        self.command.run(config).await
    }
}

impl ControlCommands {
    pub async fn run(self, config: PoolConfig) -> Result<()> {
        match self {
            ControlCommands::Pool(pool) => {
                let controller = controller(&config).await?;
                pool.run(controller).await
            }

            ControlCommands::Loop(device) => device.run().await,
        }
    }
}

async fn controller(config: &PoolConfig) -> Result<PoolController> {
    let client = DbusPoolClient::system().await?;
    let store = PoolStore::open(Path::new(&config.store_path))?;
    Ok(PoolController::new(Arc::new(client), store, config))
}
