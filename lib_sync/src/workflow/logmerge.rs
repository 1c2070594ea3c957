//! # Maintenance Log Merge
//!
//! The destination keeps a customer's maintenance history in one text cell:
//! entries of the form `<id>-[<types>]-[<date>]-[<author>]-[<context>]`
//! joined by [`SEPARATOR`]. An entry is identified by its leading numeric id.
//!
//! ## Merge rules
//! 1. Prior entries keep their text and their order.
//! 2. Prior entries without a parseable id are dropped.
//! 3. A prior entry repeating an id already seen is dropped.
//! 4. The new entry is appended at the end unless its id is already present.
//!
//! Merging the same entry twice gives the same text as merging it once.

use std::collections::HashSet;

use chrono::DateTime;
use chrono_tz::Asia::Shanghai;

use crate::support::model::MaintenanceRecord;

pub const SEPARATOR: &str = "\n----------\n";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One history line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: i64,
    text: String,
}

impl LogEntry {
    /// Renders a maintenance record, dated in China Standard Time.
    pub fn from_record(record: &MaintenanceRecord) -> Self {
        let date = DateTime::from_timestamp_millis(record.maintenance_time)
            .map(|utc| utc.with_timezone(&Shanghai).format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        let text = format!(
            "{}-[{}]-[{}]-[{}]-[{}]",
            record.id,
            record.maintenance_types,
            date,
            record.modified_by_name,
            record.maintenance_context
        );
        Self {
            id: record.id,
            // An entry must never split into two on the next parse.
            text: text.replace(SEPARATOR, "\n"),
        }
    }

    /// Parses an already serialized entry.
    pub fn parse(raw: &str) -> Option<Self> {
        parse_id(raw).map(|id| Self {
            id,
            text: raw.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Leading numeric id of an entry, `None` when the entry is malformed.
pub fn parse_id(entry: &str) -> Option<i64> {
    let (head, _) = entry.split_once('-')?;
    head.trim().parse().ok()
}

/// Merges one entry into a serialized log.
pub fn merge(existing: &str, entry: &LogEntry) -> String {
    merge_all(existing, std::slice::from_ref(entry))
}

/// Merges entries in order into a serialized log.
pub fn merge_all(existing: &str, entries: &[LogEntry]) -> String {
    let mut seen = HashSet::new();
    let mut kept: Vec<&str> = Vec::new();

    for candidate in existing.split(SEPARATOR) {
        match parse_id(candidate) {
            Some(id) => {
                if seen.insert(id) {
                    kept.push(candidate);
                }
            }
            None if candidate.trim().is_empty() => {}
            None => log::debug!("Dropping malformed log entry: {:?}", candidate),
        }
    }

    for entry in entries {
        if seen.insert(entry.id) {
            kept.push(entry.as_str());
        }
    }

    kept.join(SEPARATOR)
}
