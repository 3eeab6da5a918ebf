use anyhow::Result;
use clap::Parser;

use loopdev::LoopDevice;

#[derive(Parser)]
#[command(about = "Unbind a loop device and remove its backing file")]
pub struct LoopDetachCommand {
    #[arg(help = "Path to the loop device node")]
    device: String,
    #[arg(help = "Path to the backing file")]
    backing_file: String,
}

impl LoopDetachCommand {
    pub async fn run(self) -> Result<()> {
        let device = LoopDevice::new(self.device, self.backing_file);
        device.destroy()?;
        Ok(())
    }
}
