pub mod patch;

use std::collections::HashMap;

use chrono::{DateTime, Local};
use colored::Colorize;
use tracing::debug;

use crate::history::short_id::abbreviate;
use crate::record::{MessageContent, OutputItem, RequestRecord, ResponseRecord};

const SHORT_ID_MIN_LEN: usize = 6;
const PREVIEW_CHARS: usize = 72;

/// Renders the visible output of a completed response.
pub fn render_response(record: &ResponseRecord) -> String {
    let mut out = String::new();

    for item in record.output_items() {
        match item {
            OutputItem::Message { content } => {
                for part in content {
                    match part {
                        MessageContent::OutputText { text } => out.push_str(&text),
                        MessageContent::Refusal { refusal } => {
                            out.push_str(&format!("{} {}", "refused:".red(), refusal));
                        }
                    }
                }
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            OutputItem::ApplyPatchCall { operation } => {
                out.push_str(&patch::render_operation(&operation));
            }
            OutputItem::WebSearchCall { query } => {
                let line = match query {
                    Some(query) => format!("web search: {query}"),
                    None => "web search".to_string(),
                };
                out.push_str(&format!("{}\n", line.dimmed()));
            }
            OutputItem::Reasoning => {}
            OutputItem::Other(value) => {
                debug!(
                    item_type = value.get("type").and_then(|kind| kind.as_str()),
                    "skipping unrendered output item"
                );
            }
        }
    }

    out
}

/// One-line token and cost summary.
pub fn render_usage(record: &ResponseRecord, cost: f64) -> String {
    let (input, output) = record
        .usage
        .as_ref()
        .map_or((0, 0), |usage| (usage.input_tokens, usage.output_tokens));
    format!(
        "{} {} | tokens in {} out {} | ${:.4}",
        record.id, record.model, input, output, cost
    )
    .dimmed()
    .to_string()
}

fn preview(text: &str) -> String {
    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() <= PREVIEW_CHARS {
        return line;
    }
    let mut cut: String = line.chars().take(PREVIEW_CHARS.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

fn format_timestamp(created_at: i64) -> String {
    DateTime::from_timestamp(created_at, 0)
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| created_at.to_string())
}

/// Renders up to `limit` threads, most recent first, each oldest-first.
///
/// `ids` is every stored id, used to pick unambiguous short ids.
pub fn render_threads(
    threads: &[Vec<ResponseRecord>],
    requests: &HashMap<String, RequestRecord>,
    ids: &[String],
    limit: usize,
) -> String {
    let mut out = String::new();

    for (idx, thread) in threads.iter().take(limit).enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        for record in thread {
            let short = abbreviate(&record.id, ids, SHORT_ID_MIN_LEN);
            out.push_str(&format!(
                "{} {} {} {}\n",
                short.yellow(),
                format_timestamp(record.created_at).dimmed(),
                record.model,
                record.status.as_str().dimmed()
            ));

            let asked = requests
                .get(&record.id)
                .map(|request| preview(&request.summary()))
                .unwrap_or_else(|| "(request not stored)".to_string());
            out.push_str(&format!("  {} {}\n", ">".cyan(), asked));

            let answer = if record.status.is_failure() {
                record.failure_message()
            } else {
                record.output_text()
            };
            out.push_str(&format!("  {} {}\n", "<".green(), preview(&answer)));
        }
    }

    out
}
