use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use chattap::conversation::short_id;
use chattap::store::{InteractionRecord, StoreDocument};

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp, parse_timestamp, truncate_string};

#[derive(Parser)]
pub struct ListCommand {
    #[clap(
        long,
        short,
        default_value = "20",
        help = "Maximum number of conversations to display"
    )]
    pub limit: usize,

    #[clap(long, short, help = "Only show conversations with this model")]
    pub model: Option<String>,
}

impl ListCommand {
    pub fn execute(&self, document: &StoreDocument, format: OutputFormat) -> CliResult<()> {
        let mut entries: Vec<(usize, &InteractionRecord)> = document
            .prompts
            .iter()
            .enumerate()
            .filter(|(_, p)| self.model.as_deref().is_none_or(|m| p.model == m))
            .collect();

        sort_newest_first(&mut entries);
        entries.truncate(self.limit);

        match format {
            OutputFormat::Json => {
                let output: Vec<_> = entries
                    .iter()
                    .map(|(index, p)| {
                        serde_json::json!({
                            "index": index,
                            "conv_id": &p.conv_id,
                            "model": &p.model,
                            "messages_count": p.messages_count,
                            "timestamp": &p.timestamp,
                            "updated_at": &p.updated_at,
                            "response_kind": p.full_response.kind(),
                            "first_user_message": &p.first_user_message,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if entries.is_empty() {
                    println!("No conversations recorded.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["#", "Updated", "Model", "Msgs", "Conv", "First message"]);

                for (index, p) in &entries {
                    table.add_row([
                        index.to_string(),
                        format_timestamp(last_touched(p)),
                        p.model.clone(),
                        p.messages_count.to_string(),
                        short_id(&p.conv_id).to_string(),
                        truncate_string(&p.first_user_message, 50),
                    ]);
                }

                println!("{table}");
                println!(
                    "\nShowing {} of {} conversations",
                    entries.len(),
                    document.prompts.len()
                );
            }
        }

        Ok(())
    }
}

/// `updated_at`, or the capture time for records that predate it
fn last_touched(record: &InteractionRecord) -> &str {
    if record.updated_at.is_empty() {
        &record.timestamp
    } else {
        &record.updated_at
    }
}

/// Newest first by parsed time; records with unreadable times go last
fn sort_newest_first(entries: &mut [(usize, &InteractionRecord)]) {
    entries.sort_by_cached_key(|(_, p)| std::cmp::Reverse(parse_timestamp(last_touched(p))));
}
