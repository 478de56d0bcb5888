//! Plain-text rendering of records for terminal output.

use chat_core::{MessageRecord, MessageStatus};

/// One line per record, followed by one indented line per place suggestion.
///
/// `[2024-05-01 10:00:00] Alice: hello (srv-42)`, with a `[sending]`/`[failed]` marker for
/// unconfirmed records.
pub fn format_record(record: &MessageRecord) -> String {
    let marker = match record.status {
        MessageStatus::Sent => String::new(),
        other => format!(" [{}]", other.as_str().to_ascii_lowercase()),
    };
    let mut out = format!(
        "[{}] {}: {} ({}){}",
        record
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S"),
        record.sender_name,
        record.text,
        record.id,
        marker
    );
    for suggestion in &record.suggestions {
        out.push_str("\n    - ");
        out.push_str(&suggestion.name);
        if let Some(address) = &suggestion.address {
            out.push_str(", ");
            out.push_str(address);
        }
    }
    out
}

/// Renders a whole conversation snapshot; an empty one prints a placeholder.
pub fn format_snapshot(records: &[MessageRecord]) -> String {
    if records.is_empty() {
        return "(no messages)".to_string();
    }
    records
        .iter()
        .map(format_record)
        .collect::<Vec<_>>()
        .join("\n")
}
