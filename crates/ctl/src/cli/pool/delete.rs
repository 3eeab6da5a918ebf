use anyhow::Result;
use clap::Parser;
use uuid::Uuid;

use basinpool::controller::PoolController;

#[derive(Parser)]
#[command(about = "Delete a storage pool")]
pub struct PoolDeleteCommand {
    #[arg(help = "Identifier of the storage pool")]
    uuid: Uuid,
}

impl PoolDeleteCommand {
    pub async fn run(self, controller: PoolController) -> Result<()> {
        controller.delete(self.uuid).await?;
        Ok(())
    }
}
