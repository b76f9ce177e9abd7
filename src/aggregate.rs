/// Session aggregation: fold one transcript's records into summary statistics
/// and the annotated message list served to the UI.
use crate::record::{timestamp_millis, LogRecord, MessageContent, Usage, UserRecord};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Seconds reported for a session whose first and last timestamps coincide.
pub const MIN_DURATION_SECS: f64 = 0.1;

/// Distinct model identifiers, kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSet(Vec<String>);

impl ModelSet {
    pub fn insert(&mut self, model: &str) -> bool {
        if self.contains(model) {
            return false;
        }
        self.0.push(model.to_string());
        true
    }

    pub fn contains(&self, model: &str) -> bool {
        self.0.iter().any(|m| m == model)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Aggregate statistics for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cache_creation_tokens: u64,
    pub total_cache_read_tokens: u64,
    pub user_turns: u64,
    pub assistant_turns: u64,
    /// User plus assistant records that carried a message payload.
    pub message_count: u64,
    pub models: ModelSet,
    pub first_timestamp: Option<String>,
    /// Timestamp of the last timestamped record in file order.
    pub latest_timestamp: Option<String>,
    pub total_duration_ms: i64,
    pub total_duration_sec: f64,
    pub total_duration_min: f64,
    pub total_tokens: u64,
    /// Sum of positive assistant response times.
    pub total_response_time_ms: i64,
    /// Output tokens per second of response time.
    pub throughput: f64,
}

impl SessionStats {
    fn add_usage(&mut self, usage: &Usage) {
        self.total_input_tokens += usage.input_tokens;
        self.total_output_tokens += usage.output_tokens;
        self.total_cache_creation_tokens += usage.cache_creation_tokens;
        self.total_cache_read_tokens += usage.cache_read_tokens;
    }

    fn observe_timestamp(&mut self, ts: &str) {
        if self.first_timestamp.is_none() {
            self.first_timestamp = Some(ts.to_string());
        }
        self.latest_timestamp = Some(ts.to_string());
    }

    fn finish(&mut self) {
        let span = match (&self.first_timestamp, &self.latest_timestamp) {
            (Some(first), Some(latest)) => timestamp_millis(first)
                .zip(timestamp_millis(latest))
                .map(|(first, latest)| latest - first),
            _ => None,
        };
        self.total_duration_ms = span.unwrap_or(0);
        self.total_duration_sec = match span {
            Some(0) => MIN_DURATION_SECS,
            Some(ms) => ms as f64 / 1000.0,
            None => 0.0,
        };
        self.total_duration_min = self.total_duration_sec / 60.0;
        self.total_tokens = self.total_input_tokens
            + self.total_output_tokens
            + self.total_cache_creation_tokens
            + self.total_cache_read_tokens;
        self.throughput = if self.total_response_time_ms > 0 && self.total_output_tokens > 0 {
            self.total_output_tokens as f64 / (self.total_response_time_ms as f64 / 1000.0)
        } else {
            0.0
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    pub uuid: Option<String>,
    pub parent_uuid: Option<String>,
    pub timestamp: Option<String>,
    pub content: Option<MessageContent>,
    pub cwd: Option<String>,
    pub version: Option<String>,
    pub git_branch: Option<String>,
    pub permission_mode: Option<String>,
    pub is_sidechain: Option<bool>,
    pub tool_use_result: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEntry {
    #[serde(flatten)]
    pub tokens: Usage,
    pub cache_creation: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantEntry {
    pub uuid: Option<String>,
    pub parent_uuid: Option<String>,
    pub timestamp: Option<String>,
    pub content: Option<MessageContent>,
    pub model: Option<String>,
    pub stop_reason: Option<String>,
    pub is_sidechain: Option<bool>,
    pub usage: UsageEntry,
    /// Set when the parent user message is known and both timestamps parse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<i64>,
    /// `response_time_ms / 1000`, or 0 for a non-positive response time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_sec: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemEntry {
    pub subtype: Option<String>,
    pub content: Option<Value>,
    pub timestamp: Option<String>,
    pub level: Option<String>,
}

/// A user, assistant or system record reshaped for output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnnotatedMessage {
    User(UserEntry),
    Assistant(AssistantEntry),
    System(SystemEntry),
}

/// Result of aggregating one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionAggregate {
    pub messages: Vec<AnnotatedMessage>,
    pub stats: SessionStats,
}

/// Aggregate an ordered record sequence.
///
/// One forward pass builds the counters and the message list; a second pass
/// over the messages pairs each assistant reply with its parent user message
/// to measure response time.
pub fn aggregate_session(records: &[LogRecord]) -> SessionAggregate {
    let mut stats = SessionStats::default();
    let mut messages = Vec::new();
    let mut users: HashMap<&str, &UserRecord> = HashMap::new();

    for record in records {
        if let Some(ts) = record.timestamp() {
            stats.observe_timestamp(ts);
        }

        match record {
            LogRecord::User(user) => {
                let Some(message) = &user.message else {
                    continue;
                };
                stats.user_turns += 1;
                stats.message_count += 1;
                if let Some(uuid) = user.meta.uuid.as_deref() {
                    users.entry(uuid).or_insert(user);
                }
                messages.push(AnnotatedMessage::User(UserEntry {
                    uuid: user.meta.uuid.clone(),
                    parent_uuid: user.meta.parent_uuid.clone(),
                    timestamp: user.meta.timestamp.clone(),
                    content: message.content.clone(),
                    cwd: user.cwd.clone(),
                    version: user.version.clone(),
                    git_branch: user.git_branch.clone(),
                    permission_mode: user.permission_mode.clone(),
                    is_sidechain: user.is_sidechain,
                    tool_use_result: user.tool_use_result.clone(),
                }));
            }
            LogRecord::Assistant(assistant) => {
                let Some(message) = &assistant.message else {
                    continue;
                };
                stats.assistant_turns += 1;
                stats.message_count += 1;
                stats.add_usage(&message.usage);
                if let Some(model) = message.model.as_deref() {
                    stats.models.insert(model);
                }
                messages.push(AnnotatedMessage::Assistant(AssistantEntry {
                    uuid: assistant.meta.uuid.clone(),
                    parent_uuid: assistant.meta.parent_uuid.clone(),
                    timestamp: assistant.meta.timestamp.clone(),
                    content: message.content.clone(),
                    model: message.model.clone(),
                    stop_reason: message.stop_reason.clone(),
                    is_sidechain: assistant.is_sidechain,
                    usage: UsageEntry {
                        tokens: message.usage,
                        cache_creation: message.cache_creation.clone(),
                    },
                    response_time_ms: None,
                    response_time_sec: None,
                }));
            }
            LogRecord::System(system) => {
                messages.push(AnnotatedMessage::System(SystemEntry {
                    subtype: system.subtype.clone(),
                    content: system.content.clone(),
                    timestamp: system.meta.timestamp.clone(),
                    level: system.level.clone(),
                }));
            }
            LogRecord::Other(_) => {}
        }
    }

    for message in &mut messages {
        let AnnotatedMessage::Assistant(entry) = message else {
            continue;
        };
        let Some(parent) = entry
            .parent_uuid
            .as_deref()
            .and_then(|uuid| users.get(uuid))
        else {
            continue;
        };
        let asked = parent.meta.timestamp.as_deref();
        let Some(elapsed) = response_time_ms(asked, entry.timestamp.as_deref()) else {
            continue;
        };
        entry.response_time_ms = Some(elapsed);
        if elapsed > 0 {
            entry.response_time_sec = Some(elapsed as f64 / 1000.0);
            stats.total_response_time_ms += elapsed;
        } else {
            entry.response_time_sec = Some(0.0);
        }
    }

    stats.finish();
    SessionAggregate { messages, stats }
}

fn response_time_ms(asked: Option<&str>, answered: Option<&str>) -> Option<i64> {
    let asked = timestamp_millis(asked?)?;
    let answered = timestamp_millis(answered?)?;
    Some(answered - asked)
}
