use anyhow::Result;
use clap::Parser;
use uuid::Uuid;

use basinpool::controller::PoolController;

#[derive(Parser)]
#[command(about = "Read the observed state of a storage pool")]
pub struct PoolReadCommand {
    #[arg(help = "Identifier of the storage pool")]
    uuid: Uuid,
}

impl PoolReadCommand {
    pub async fn run(self, controller: PoolController) -> Result<()> {
        let Some(state) = controller.read(self.uuid).await? else {
            println!("pool {} is absent", self.uuid);
            return Ok(());
        };
        println!("name: {}", state.name);
        println!("capacity: {}", state.capacity);
        println!("allocation: {}", state.allocation);
        println!("available: {}", state.available);
        if let Some(path) = &state.target_path {
            println!("path: {}", path);
        }
        for device in &state.source_devices {
            println!("source device: {}", device);
        }
        Ok(())
    }
}
