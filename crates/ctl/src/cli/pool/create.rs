use anyhow::Result;
use clap::Parser;

use basinpool::controller::PoolController;
use basinpool::definition::PoolDefinition;
use basinpool::transform::Stylesheet;

#[derive(Parser)]
#[command(about = "Create a storage pool")]
pub struct PoolCreateCommand {
    #[arg(short, long, help = "Name of the storage pool")]
    name: String,
    #[arg(short = 't', long = "type", help = "Pool type, either dir or logical")]
    kind: String,
    #[arg(short, long, help = "Target path, required for dir pools")]
    path: Option<String>,
    #[arg(
        short = 'd',
        long = "source-device",
        help = "Source device for logical pools, repeatable"
    )]
    source_devices: Vec<String>,
    #[arg(long, help = "XSLT stylesheet applied to the generated definition")]
    xslt: Option<String>,
}

impl PoolCreateCommand {
    pub async fn run(self, controller: PoolController) -> Result<()> {
        let definition = PoolDefinition::new(
            &self.name,
            &self.kind,
            self.path.as_deref(),
            &self.source_devices,
        )?;
        let stylesheet = self.xslt.map(Stylesheet::new);
        let uuid = controller.create(&definition, stylesheet.as_ref()).await?;
        println!("{}", uuid);
        Ok(())
    }
}
