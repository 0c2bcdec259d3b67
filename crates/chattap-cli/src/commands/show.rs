use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use chattap::store::{InteractionRecord, StoreDocument};

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp};

#[derive(Parser)]
pub struct ShowCommand {
    #[clap(help = "Record index, or a prefix of its conversation id")]
    pub target: String,

    #[clap(long, help = "Print the full stored record")]
    pub raw: bool,
}

impl ShowCommand {
    pub fn execute(&self, document: &StoreDocument, format: OutputFormat) -> CliResult<()> {
        let (index, record) = resolve(document, &self.target)?;

        if self.raw {
            println!("{}", serde_json::to_string_pretty(record)?);
            return Ok(());
        }

        let reply = record.full_response.assistant_text();

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "index": index,
                    "conv_id": &record.conv_id,
                    "model": &record.model,
                    "messages_count": record.messages_count,
                    "timestamp": &record.timestamp,
                    "updated_at": &record.updated_at,
                    "response_kind": record.full_response.kind(),
                    "first_user_message": &record.first_user_message,
                    "assistant_text": &reply.text,
                    "thinking": &reply.thinking,
                    "stream_complete": record
                        .full_response
                        .is_stream()
                        .then_some(reply.is_complete),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Property", "Value"]);

                table.add_row(["Index", &index.to_string()]);
                table.add_row(["Conversation ID", non_empty(&record.conv_id)]);
                table.add_row(["Model", non_empty(&record.model)]);
                table.add_row(["Messages", &record.messages_count.to_string()]);
                table.add_row(["Captured", &format_timestamp(&record.timestamp)]);
                table.add_row(["Updated", &format_timestamp(&record.updated_at)]);
                table.add_row(["Response", record.full_response.kind()]);
                if record.full_response.is_stream() {
                    table.add_row([
                        "Stream events",
                        &format!(
                            "{} ({})",
                            reply.event_count,
                            if reply.is_complete { "complete" } else { "incomplete" }
                        ),
                    ]);
                }

                println!("{table}");
                println!("\nFirst user message:\n{}", non_empty(&record.first_user_message));
                if !reply.thinking.is_empty() {
                    println!("\nThinking:\n{}", reply.thinking);
                }
                println!("\nAssistant:\n{}", non_empty(&reply.text));
            }
        }

        Ok(())
    }
}

/// Find a record by index, else by unique conversation id prefix
fn resolve<'a>(
    document: &'a StoreDocument,
    target: &str,
) -> CliResult<(usize, &'a InteractionRecord)> {
    if let Ok(index) = target.parse::<usize>() {
        if let Some(record) = document.prompts.get(index) {
            return Ok((index, record));
        }
    }

    let matches: Vec<(usize, &InteractionRecord)> = document
        .prompts
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.conv_id.is_empty() && p.conv_id.starts_with(target))
        .collect();

    match matches.as_slice() {
        [] => Err(format!("No conversation matches '{target}'").into()),
        [single] => Ok(*single),
        _ => Err(format!(
            "'{target}' matches {} conversations, use a longer prefix",
            matches.len()
        )
        .into()),
    }
}

fn non_empty(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(ids: &[&str]) -> StoreDocument {
        let mut document = StoreDocument::empty();
        for id in ids {
            document.prompts.push(InteractionRecord {
                timestamp: String::new(),
                updated_at: String::new(),
                model: "m".to_string(),
                conv_id: id.to_string(),
                first_user_message: String::new(),
                messages_count: 1,
                full_request: serde_json::Value::Null,
                full_response: Default::default(),
            });
        }
        document
    }

    #[test]
    fn test_resolve_by_index_and_prefix() {
        let document = document(&["abc123", "abd456", "ffe789"]);

        assert_eq!(resolve(&document, "1").unwrap().0, 1);
        assert_eq!(resolve(&document, "ffe").unwrap().0, 2);
        assert_eq!(resolve(&document, "abc").unwrap().1.conv_id, "abc123");
    }

    #[test]
    fn test_resolve_rejects_ambiguous_and_unknown() {
        let document = document(&["abc123", "abd456"]);

        assert!(resolve(&document, "ab").unwrap_err().0.contains("2 conversations"));
        assert!(resolve(&document, "zzz").is_err());
        assert!(resolve(&document, "9").is_err());
    }
}
