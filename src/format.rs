/// Response shapes for the session detail endpoint.
use crate::aggregate::{AnnotatedMessage, SessionAggregate, SessionStats};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cache_creation_tokens: u64,
    pub total_cache_read_tokens: u64,
    pub user_turns: u64,
    pub assistant_turns: u64,
    pub message_count: u64,
    pub models: Vec<String>,
    pub first_timestamp: Option<String>,
    pub latest_timestamp: Option<String>,
    pub total_duration_ms: i64,
    pub total_duration_sec: f64,
    pub total_duration_min: f64,
    pub total_tokens: u64,
    pub total_response_time_ms: i64,
    pub throughput: f64,
}

impl From<SessionStats> for StatsResponse {
    fn from(s: SessionStats) -> Self {
        Self {
            total_input_tokens: s.total_input_tokens,
            total_output_tokens: s.total_output_tokens,
            total_cache_creation_tokens: s.total_cache_creation_tokens,
            total_cache_read_tokens: s.total_cache_read_tokens,
            user_turns: s.user_turns,
            assistant_turns: s.assistant_turns,
            message_count: s.message_count,
            models: s.models.iter().map(str::to_string).collect(),
            first_timestamp: s.first_timestamp,
            latest_timestamp: s.latest_timestamp,
            total_duration_ms: s.total_duration_ms,
            total_duration_sec: s.total_duration_sec,
            total_duration_min: s.total_duration_min,
            total_tokens: s.total_tokens,
            total_response_time_ms: s.total_response_time_ms,
            throughput: s.throughput,
        }
    }
}

/// `{messages, stats}` as returned for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResponse {
    pub messages: Vec<AnnotatedMessage>,
    pub stats: StatsResponse,
}

impl From<SessionAggregate> for SessionResponse {
    fn from(agg: SessionAggregate) -> Self {
        Self {
            messages: agg.messages,
            stats: agg.stats.into(),
        }
    }
}
