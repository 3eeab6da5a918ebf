pub mod create;
pub mod delete;
pub mod list;
pub mod read;

use anyhow::Result;
use clap::Parser;

use basinpool::controller::PoolController;

use self::create::PoolCreateCommand;
use self::delete::PoolDeleteCommand;
use self::list::PoolListCommand;
use self::read::PoolReadCommand;

#[derive(Parser)]
#[command(about = "Manage storage pools")]
pub struct PoolCommand {
    #[command(subcommand)]
    subcommand: PoolCommands,
}

#[derive(Parser)]
pub enum PoolCommands {
    Create(PoolCreateCommand),
    Read(PoolReadCommand),
    Delete(PoolDeleteCommand),
    List(PoolListCommand),
}

impl PoolCommand {
    pub async fn run(self, controller: PoolController) -> Result<()> {
        match self.subcommand {
            PoolCommands::Create(create) => create.run(controller).await,

            PoolCommands::Read(read) => read.run(controller).await,

            PoolCommands::Delete(delete) => delete.run(controller).await,

            PoolCommands::List(list) => list.run(controller).await,
        }
    }
}
