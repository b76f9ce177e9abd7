/// Transcript record parsing: one JSONL line in, one typed record out.
///
/// Parsing is tolerant. A line that is blank, is not JSON, or has no string
/// `type` field yields `None` and the caller moves on to the next line.
use serde::Serialize;
use serde_json::Value;

/// Number of characters kept when building a listing preview.
pub const PREVIEW_CHARS: usize = 120;

/// Identity and time fields shared by every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMeta {
    pub uuid: Option<String>,
    pub parent_uuid: Option<String>,
    /// Raw ISO-8601 string as written in the log. Empty strings are dropped.
    pub timestamp: Option<String>,
}

/// Message content is either plain text or an ordered list of content blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<Value>),
}

impl MessageContent {
    fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::String(s) => Some(MessageContent::Text(s.clone())),
            Value::Array(blocks) => Some(MessageContent::Blocks(blocks.clone())),
            _ => None,
        }
    }

    /// Short text preview: the first `PREVIEW_CHARS` characters of the text,
    /// or of the first text block (a bare string or `{"type":"text"}`).
    pub fn preview(&self) -> String {
        let text = match self {
            MessageContent::Text(s) => s.as_str(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .find_map(|b| match b {
                    Value::String(s) => Some(s.as_str()),
                    Value::Object(_) if b.get("type").and_then(|t| t.as_str()) == Some("text") => {
                        Some(b.get("text").and_then(|t| t.as_str()).unwrap_or(""))
                    }
                    _ => None,
                })
                .unwrap_or(""),
        };
        text.chars().take(PREVIEW_CHARS).collect()
    }
}

/// Token accounting attached to an assistant message. Missing fields are 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl Usage {
    fn from_value(v: &Value) -> Self {
        let field = |name: &str| v.get(name).and_then(|t| t.as_u64()).unwrap_or(0);
        Self {
            input_tokens: field("input_tokens"),
            output_tokens: field("output_tokens"),
            cache_creation_tokens: field("cache_creation_input_tokens"),
            cache_read_tokens: field("cache_read_input_tokens"),
        }
    }

    /// Sum of all four token counters.
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }

    /// Input plus output, excluding cache traffic.
    pub fn active(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    pub content: Option<MessageContent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub meta: RecordMeta,
    /// `None` when the record has no `message` payload.
    pub message: Option<UserMessage>,
    pub cwd: Option<String>,
    pub version: Option<String>,
    pub git_branch: Option<String>,
    pub permission_mode: Option<String>,
    pub is_sidechain: Option<bool>,
    pub tool_use_result: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantMessage {
    pub content: Option<MessageContent>,
    pub model: Option<String>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
    /// Whether the message carried a `usage` object at all.
    pub has_usage: bool,
    /// Raw `usage.cache_creation` breakdown, passed through untouched.
    pub cache_creation: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantRecord {
    pub meta: RecordMeta,
    pub message: Option<AssistantMessage>,
    pub is_sidechain: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemRecord {
    pub meta: RecordMeta,
    pub subtype: Option<String>,
    pub content: Option<Value>,
    pub level: Option<String>,
}

/// A classified transcript record.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    User(UserRecord),
    Assistant(AssistantRecord),
    System(SystemRecord),
    /// Any other record type (summaries, snapshots, ...). Only its timestamp matters.
    Other(RecordMeta),
}

impl LogRecord {
    pub fn meta(&self) -> &RecordMeta {
        match self {
            LogRecord::User(r) => &r.meta,
            LogRecord::Assistant(r) => &r.meta,
            LogRecord::System(r) => &r.meta,
            LogRecord::Other(meta) => meta,
        }
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.meta().timestamp.as_deref()
    }

    /// True for `user` and `assistant` records, with or without a payload.
    pub fn is_turn(&self) -> bool {
        matches!(self, LogRecord::User(_) | LogRecord::Assistant(_))
    }
}

fn string_field(v: &Value, name: &str) -> Option<String> {
    v.get(name).and_then(|s| s.as_str()).map(str::to_string)
}

fn non_null(v: &Value, name: &str) -> Option<Value> {
    v.get(name).filter(|x| !x.is_null()).cloned()
}

/// Parse one line of a transcript. Returns `None` for anything that should be skipped.
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let v: Value = serde_json::from_str(line).ok()?;
    classify(&v)
}

/// Classify an already-parsed JSON value by its `type` discriminator.
pub fn classify(v: &Value) -> Option<LogRecord> {
    let kind = v.get("type")?.as_str()?;
    let meta = RecordMeta {
        uuid: string_field(v, "uuid"),
        parent_uuid: string_field(v, "parentUuid"),
        timestamp: string_field(v, "timestamp").filter(|t| !t.is_empty()),
    };
    let message = v.get("message").filter(|m| !m.is_null());

    let record = match kind {
        "user" => LogRecord::User(UserRecord {
            meta,
            message: message.map(|m| UserMessage {
                content: m.get("content").and_then(MessageContent::from_value),
            }),
            cwd: string_field(v, "cwd"),
            version: string_field(v, "version"),
            git_branch: string_field(v, "gitBranch"),
            permission_mode: string_field(v, "permissionMode"),
            is_sidechain: v.get("isSidechain").and_then(|b| b.as_bool()),
            tool_use_result: non_null(v, "toolUseResult"),
        }),
        "assistant" => LogRecord::Assistant(AssistantRecord {
            meta,
            message: message.map(|m| {
                let usage = m.get("usage").filter(|u| u.is_object());
                AssistantMessage {
                    content: m.get("content").and_then(MessageContent::from_value),
                    model: string_field(m, "model").filter(|s| !s.is_empty()),
                    stop_reason: string_field(m, "stop_reason"),
                    usage: usage.map(Usage::from_value).unwrap_or_default(),
                    has_usage: usage.is_some(),
                    cache_creation: usage.and_then(|u| non_null(u, "cache_creation")),
                }
            }),
            is_sidechain: v.get("isSidechain").and_then(|b| b.as_bool()),
        }),
        "system" => LogRecord::System(SystemRecord {
            meta,
            subtype: string_field(v, "subtype"),
            content: non_null(v, "content"),
            level: string_field(v, "level"),
        }),
        _ => LogRecord::Other(meta),
    };
    Some(record)
}

/// Parse every line of a transcript, dropping the ones that fail.
///
/// Returns the records in file order together with the number of skipped
/// non-blank lines.
pub fn parse_records(text: &str) -> (Vec<LogRecord>, usize) {
    let mut skipped = 0;
    let records = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| {
            let rec = parse_line(l);
            if rec.is_none() {
                skipped += 1;
            }
            rec
        })
        .collect();
    (records, skipped)
}

/// Convert an ISO-8601 timestamp to milliseconds since the Unix epoch.
///
/// Timestamps without an offset are read as UTC.
pub fn timestamp_millis(ts: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(ts) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(ts, fmt).ok())
        .map(|dt| dt.and_utc().timestamp_millis())
}
