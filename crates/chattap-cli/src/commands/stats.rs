use std::collections::BTreeMap;

use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use chattap::store::{ResponsePayload, StoreDocument};

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp};

#[derive(Parser)]
pub struct StatsCommand {}

#[derive(Default)]
struct ModelStats {
    conversations: usize,
    messages: usize,
}

impl StatsCommand {
    pub fn execute(&self, document: &StoreDocument, format: OutputFormat) -> CliResult<()> {
        let (mut structured, mut streamed, mut plain) = (0usize, 0usize, 0usize);
        let mut by_model: BTreeMap<&str, ModelStats> = BTreeMap::new();

        for record in &document.prompts {
            match record.full_response {
                ResponsePayload::Structured(_) => structured += 1,
                ResponsePayload::RawStream(_) => streamed += 1,
                ResponsePayload::PlainText(_) => plain += 1,
            }

            let model = if record.model.is_empty() {
                "unknown"
            } else {
                record.model.as_str()
            };
            let entry = by_model.entry(model).or_default();
            entry.conversations += 1;
            entry.messages += record.messages_count;
        }

        let total_messages: usize = by_model.values().map(|s| s.messages).sum();

        match format {
            OutputFormat::Json => {
                let models: serde_json::Map<String, serde_json::Value> = by_model
                    .iter()
                    .map(|(model, stats)| {
                        (
                            model.to_string(),
                            serde_json::json!({
                                "conversations": stats.conversations,
                                "messages": stats.messages,
                            }),
                        )
                    })
                    .collect();

                let output = serde_json::json!({
                    "total_conversations": document.prompts.len(),
                    "total_messages": total_messages,
                    "responses": {
                        "structured": structured,
                        "stream": streamed,
                        "text": plain,
                    },
                    "by_model": models,
                    "last_updated": &document.last_updated,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("ChatTap Statistics");
                println!("==================\n");

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Model", "Conversations", "Messages"]);

                for (model, stats) in &by_model {
                    table.add_row([
                        model.to_string(),
                        stats.conversations.to_string(),
                        stats.messages.to_string(),
                    ]);
                }

                println!("{table}\n");
                println!(
                    "Responses: {structured} structured, {streamed} streamed, {plain} plain text"
                );
                println!(
                    "Total: {} conversations, {} messages (last updated {})",
                    document.prompts.len(),
                    total_messages,
                    format_timestamp(&document.last_updated)
                );
            }
        }

        Ok(())
    }
}
