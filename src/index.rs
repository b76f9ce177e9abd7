/// Lightweight listing summaries for projects and sessions.
///
/// Nothing here runs the full aggregator. Session listings scan every record
/// once for timestamps, turn count and preview; project listings only read
/// each session's tail for its newest timestamp.
use crate::record::{parse_line, LogRecord};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static DRIVE_FOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([A-Z])--(.*)$").unwrap());

/// One row of the session listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListing {
    pub id: String,
    pub first_timestamp: Option<String>,
    pub latest_timestamp: Option<String>,
    /// Count of `user` and `assistant` records, payload or not.
    pub message_count: u64,
    pub preview: String,
}

/// One row of the project listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListing {
    pub id: String,
    pub display_name: String,
    pub session_count: usize,
    pub latest_timestamp: Option<String>,
}

/// Summarize one session from its parsed records.
pub fn summarize_session(id: &str, records: &[LogRecord]) -> SessionListing {
    let mut listing = SessionListing {
        id: id.to_string(),
        first_timestamp: None,
        latest_timestamp: None,
        message_count: 0,
        preview: String::new(),
    };

    for record in records {
        if let Some(ts) = record.timestamp() {
            if listing.first_timestamp.is_none() {
                listing.first_timestamp = Some(ts.to_string());
            }
            listing.latest_timestamp = Some(ts.to_string());
        }
        if record.is_turn() {
            listing.message_count += 1;
        }
        if listing.preview.is_empty() {
            if let LogRecord::User(user) = record {
                if let Some(content) = user.message.as_ref().and_then(|m| m.content.as_ref()) {
                    listing.preview = content.preview();
                }
            }
        }
    }

    listing
}

/// Newest timestamp of a transcript, found by scanning lines from the end.
///
/// Stops at the first record that parses and has a `type` and a timestamp.
pub fn latest_timestamp_from_tail(text: &str) -> Option<String> {
    text.lines()
        .rev()
        .filter_map(parse_line)
        .find_map(|rec| rec.timestamp().map(str::to_string))
}

/// Summarize a project from the newest timestamp of each of its sessions.
pub fn summarize_project(id: &str, session_latest: &[Option<String>]) -> ProjectListing {
    let latest_timestamp = session_latest.iter().flatten().max().cloned();
    ProjectListing {
        id: id.to_string(),
        display_name: decode_folder_name(id),
        session_count: session_latest.len(),
        latest_timestamp,
    }
}

/// Sort newest first by ISO-8601 string order. Missing timestamps go last.
pub fn sort_latest_first<T>(items: &mut [T], latest: impl Fn(&T) -> Option<&str>) {
    items.sort_by(|a, b| latest(b).unwrap_or("").cmp(latest(a).unwrap_or("")));
}

/// Turn a project folder name back into a readable path.
///
/// Folders like `C--Users-me-proj` are Windows drive paths with separators
/// flattened to dashes; anything else is returned unchanged.
pub fn decode_folder_name(name: &str) -> String {
    match DRIVE_FOLDER.captures(name) {
        Some(caps) => format!("{}:/{}", &caps[1], caps[2].replace('-', "/")),
        None => name.to_string(),
    }
}
