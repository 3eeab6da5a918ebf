pub mod attach;
pub mod detach;

use anyhow::Result;
use clap::Parser;

use self::attach::LoopAttachCommand;
use self::detach::LoopDetachCommand;

#[derive(Parser)]
#[command(name = "loop", about = "Manage loop devices backing logical pools")]
pub struct LoopCommand {
    #[command(subcommand)]
    subcommand: LoopCommands,
}

#[derive(Parser)]
pub enum LoopCommands {
    Attach(LoopAttachCommand),
    Detach(LoopDetachCommand),
}

impl LoopCommand {
    pub async fn run(self) -> Result<()> {
        match self.subcommand {
            LoopCommands::Attach(attach) => attach.run().await,

            LoopCommands::Detach(detach) => detach.run().await,
        }
    }
}
