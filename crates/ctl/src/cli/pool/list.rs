use anyhow::Result;
use clap::Parser;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};

use basinpool::controller::PoolController;

#[derive(Parser)]
#[command(about = "List locally recorded storage pools")]
pub struct PoolListCommand {}

impl PoolListCommand {
    pub async fn run(self, controller: PoolController) -> Result<()> {
        let mut records = controller.list_records().await?.into_iter().collect::<Vec<_>>();
        records.sort_by(|a, b| a.1.name.cmp(&b.1.name));

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
        table.set_header(vec!["name", "uuid", "type", "capacity", "path"]);
        for (uuid, record) in records {
            table.add_row(vec![
                record.name.clone(),
                uuid.to_string(),
                record.kind.clone(),
                record.capacity.to_string(),
                record.target_path.clone().unwrap_or_default(),
            ]);
        }
        println!("{}", table);
        Ok(())
    }
}
