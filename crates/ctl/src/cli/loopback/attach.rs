use std::path::Path;

use anyhow::Result;
use clap::Parser;

use loopdev::LoopControl;

#[derive(Parser)]
#[command(about = "Bind a free loop device to a new sparse backing file")]
pub struct LoopAttachCommand {
    #[arg(short, long, help = "Size of the backing file in bytes")]
    size: u64,
    #[arg(short, long, help = "Directory to create the backing file in")]
    dir: Option<String>,
    #[arg(
        short,
        long,
        default_value = "basin-loop-",
        help = "Backing file name prefix"
    )]
    pattern: String,
}

impl LoopAttachCommand {
    pub async fn run(self) -> Result<()> {
        let control = LoopControl::open()?;
        let device = control.allocate(self.dir.as_deref().map(Path::new), &self.pattern, self.size)?;
        println!("{} {}", device.device.display(), device.backing_file.display());
        Ok(())
    }
}
