/// Wall-clock token report for a single transcript file.
///
/// Considers only assistant messages that report non-zero usage. Throughput
/// here is measured over the span between the first and last such message,
/// idle time included; the per-message table shows the rate between
/// consecutive messages.
use crate::record::{parse_records, timestamp_millis, LogRecord, Usage};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReport {
    pub token_messages: u64,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
    pub totals: Usage,
    pub total_tokens: u64,
    pub active_tokens: u64,
    /// `None` unless both the first and last timestamps parse.
    pub duration_ms: Option<i64>,
    pub throughput_all: f64,
    pub throughput_active: f64,
    pub intervals: Vec<TokenInterval>,
}

/// One assistant message with non-zero input or output tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInterval {
    pub timestamp: Option<String>,
    pub usage: Usage,
    /// Milliseconds since the previous interval row.
    pub gap_ms: Option<i64>,
    pub active_throughput: f64,
}

fn per_second(tokens: u64, ms: i64) -> f64 {
    if ms > 0 {
        tokens as f64 / (ms as f64 / 1000.0)
    } else {
        0.0
    }
}

pub fn build_report(records: &[LogRecord]) -> TokenReport {
    let mut report = TokenReport::default();
    let mut prev_ms: Option<i64> = None;

    for record in records {
        let LogRecord::Assistant(assistant) = record else {
            continue;
        };
        let Some(message) = assistant.message.as_ref().filter(|m| m.has_usage) else {
            continue;
        };
        let usage = message.usage;
        if usage.total() == 0 {
            continue;
        }

        let ts = assistant.meta.timestamp.clone();
        report.token_messages += 1;
        if report.first_timestamp.is_none() {
            report.first_timestamp = ts.clone();
        }
        report.last_timestamp = ts.clone();
        report.totals.input_tokens += usage.input_tokens;
        report.totals.output_tokens += usage.output_tokens;
        report.totals.cache_creation_tokens += usage.cache_creation_tokens;
        report.totals.cache_read_tokens += usage.cache_read_tokens;

        if usage.active() == 0 {
            continue;
        }
        let now_ms = ts.as_deref().and_then(timestamp_millis);
        let gap_ms = prev_ms.zip(now_ms).map(|(prev, now)| now - prev);
        report.intervals.push(TokenInterval {
            timestamp: ts,
            usage,
            gap_ms,
            active_throughput: gap_ms.map(|g| per_second(usage.active(), g)).unwrap_or(0.0),
        });
        prev_ms = now_ms;
    }

    report.total_tokens = report.totals.total();
    report.active_tokens = report.totals.active();
    report.duration_ms = match (&report.first_timestamp, &report.last_timestamp) {
        (Some(first), Some(last)) => timestamp_millis(first)
            .zip(timestamp_millis(last))
            .map(|(first, last)| last - first),
        _ => None,
    };
    let span = report.duration_ms.unwrap_or(0);
    report.throughput_all = per_second(report.total_tokens, span);
    report.throughput_active = per_second(report.active_tokens, span);
    report
}

/// Read and analyse one transcript file.
pub fn analyze_file(path: &Path) -> Result<TokenReport, ReportError> {
    let bytes = std::fs::read(path).map_err(|e| ReportError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    let (records, skipped) = parse_records(&text);
    tracing::debug!(file = %path.display(), records = records.len(), skipped, "parsed transcript");
    Ok(build_report(&records))
}

/// Plain-text rendering of a report.
pub fn render(report: &TokenReport) -> String {
    let rule = "=".repeat(80);
    let mut out = String::new();
    let t = &report.totals;

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Token statistics");
    let _ = writeln!(out, "Messages with tokens: {}", report.token_messages);
    let _ = writeln!(
        out,
        "First timestamp: {}",
        report.first_timestamp.as_deref().unwrap_or("-")
    );
    let _ = writeln!(
        out,
        "Last timestamp:  {}",
        report.last_timestamp.as_deref().unwrap_or("-")
    );

    match report.duration_ms {
        Some(ms) => {
            let _ = writeln!(out);
            let _ = writeln!(out, "Duration: {ms}ms ({:.2}s)", ms as f64 / 1000.0);
            let _ = writeln!(out, "Input tokens:          {}", t.input_tokens);
            let _ = writeln!(out, "Output tokens:         {}", t.output_tokens);
            let _ = writeln!(out, "Cache creation tokens: {}", t.cache_creation_tokens);
            let _ = writeln!(out, "Cache read tokens:     {}", t.cache_read_tokens);
            let _ = writeln!(out, "Total tokens (all):    {}", report.total_tokens);
            let _ = writeln!(out, "Total tokens (active): {}", report.active_tokens);
            let _ = writeln!(out);
            let _ = writeln!(out, "Throughput (all):    {:.2} tokens/s", report.throughput_all);
            let _ = writeln!(
                out,
                "Throughput (active): {:.2} tokens/s",
                report.throughput_active
            );
        }
        None => {
            let _ = writeln!(out, "No token data found");
        }
    }

    if !report.intervals.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Per-message detail");
        let _ = writeln!(out, "{rule}");
        for row in &report.intervals {
            if let Some(gap) = row.gap_ms {
                let _ = writeln!(
                    out,
                    "Time diff: {gap}ms ({:.3}s), active {} tokens, {:.2} tokens/s",
                    gap as f64 / 1000.0,
                    row.usage.active(),
                    row.active_throughput
                );
            }
            let _ = writeln!(out, "  {}", row.timestamp.as_deref().unwrap_or("-"));
            let _ = writeln!(
                out,
                "    input {}, output {}, cache create {}, cache read {}, total {}",
                row.usage.input_tokens,
                row.usage.output_tokens,
                row.usage.cache_creation_tokens,
                row.usage.cache_read_tokens,
                row.usage.total()
            );
        }
    }
    let _ = writeln!(out, "{rule}");
    out
}

#[derive(Debug)]
pub enum ReportError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Read { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Read { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_jsonl(dir: &Path, lines: &[&str]) -> PathBuf {
        let path = dir.join("session.jsonl");
        let mut f = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn report_ignores_zero_usage_and_non_assistant() {
        let dir = TempDir::new().unwrap();
        let path = write_jsonl(
            dir.path(),
            &[
                r#"{"type":"user","timestamp":"2025-06-01T10:00:00Z","message":{"content":"q"}}"#,
                r#"{"type":"assistant","timestamp":"2025-06-01T10:00:01Z","message":{"usage":{"input_tokens":0,"output_tokens":0}}}"#,
                r#"{"type":"assistant","timestamp":"2025-06-01T10:00:02Z","message":{}}"#,
                r#"{"type":"assistant","timestamp":"2025-06-01T10:00:04Z","message":{"usage":{"input_tokens":10,"output_tokens":30,"cache_read_input_tokens":60}}}"#,
                "not json",
                r#"{"type":"assistant","timestamp":"2025-06-01T10:00:14Z","message":{"usage":{"input_tokens":5,"output_tokens":15}}}"#,
            ],
        );

        let report = analyze_file(&path).unwrap();
        assert_eq!(report.token_messages, 2);
        assert_eq!(report.first_timestamp.as_deref(), Some("2025-06-01T10:00:04Z"));
        assert_eq!(report.last_timestamp.as_deref(), Some("2025-06-01T10:00:14Z"));
        assert_eq!(report.total_tokens, 120);
        assert_eq!(report.active_tokens, 60);
        assert_eq!(report.duration_ms, Some(10_000));
        assert!((report.throughput_all - 12.0).abs() < 1e-9);
        assert!((report.throughput_active - 6.0).abs() < 1e-9);

        assert_eq!(report.intervals.len(), 2);
        assert_eq!(report.intervals[0].gap_ms, None);
        assert_eq!(report.intervals[1].gap_ms, Some(10_000));
        assert!((report.intervals[1].active_throughput - 2.0).abs() < 1e-9);
    }

    #[test]
    fn cache_only_message_counts_but_has_no_interval() {
        let records: Vec<LogRecord> = [
            r#"{"type":"assistant","timestamp":"2025-06-01T10:00:00Z","message":{"usage":{"cache_read_input_tokens":100}}}"#,
        ]
        .iter()
        .filter_map(|l| crate::record::parse_line(l))
        .collect();
        let report = build_report(&records);
        assert_eq!(report.token_messages, 1);
        assert!(report.intervals.is_empty());
        assert_eq!(report.duration_ms, Some(0));
        assert_eq!(report.throughput_all, 0.0);
    }

    #[test]
    fn empty_report_renders_no_data() {
        let report = build_report(&[]);
        assert_eq!(report.duration_ms, None);
        let text = render(&report);
        assert!(text.contains("Messages with tokens: 0"));
        assert!(text.contains("No token data found"));
    }

    #[test]
    fn render_includes_totals_and_intervals() {
        let records: Vec<LogRecord> = [
            r#"{"type":"assistant","timestamp":"2025-06-01T10:00:00Z","message":{"usage":{"input_tokens":1,"output_tokens":1}}}"#,
            r#"{"type":"assistant","timestamp":"2025-06-01T10:00:02Z","message":{"usage":{"input_tokens":2,"output_tokens":2}}}"#,
        ]
        .iter()
        .filter_map(|l| crate::record::parse_line(l))
        .collect();
        let text = render(&build_report(&records));
        assert!(text.contains("Duration: 2000ms (2.00s)"));
        assert!(text.contains("Total tokens (all):    6"));
        assert!(text.contains("Time diff: 2000ms (2.000s), active 4 tokens, 2.00 tokens/s"));
    }

    #[test]
    fn report_serializes_camel_case() {
        let v = serde_json::to_value(build_report(&[])).unwrap();
        assert_eq!(v["tokenMessages"], 0);
        assert_eq!(v["totals"]["inputTokens"], 0);
        assert!(v["durationMs"].is_null());
    }

    #[test]
    fn missing_file_is_error() {
        let err = analyze_file(Path::new("/nonexistent/file.jsonl")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn invalid_utf8_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(br#"{"type":"assistant","timestamp":"2025-06-01T10:00:00Z","message":{"usage":{"input_tokens":1,"output_tokens":4}}}"#);
        bytes.extend_from_slice(b"\n\xff\xfe garbage\n");
        bytes.extend_from_slice(br#"{"type":"assistant","timestamp":"2025-06-01T10:00:05Z","message":{"usage":{"input_tokens":2,"output_tokens":3}}}"#);
        std::fs::write(&path, bytes).unwrap();

        let report = analyze_file(&path).unwrap();
        assert_eq!(report.token_messages, 2);
        assert_eq!(report.total_tokens, 10);
        assert_eq!(report.duration_ms, Some(5_000));
    }
}
