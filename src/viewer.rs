/// The viewer's read operations: list projects, list sessions, load one session.
///
/// Each call reads what it needs from disk and computes its result from
/// scratch; nothing is cached between calls.
use crate::aggregate::aggregate_session;
use crate::format::SessionResponse;
use crate::index::{
    latest_timestamp_from_tail, sort_latest_first, summarize_project, summarize_session,
    ProjectListing, SessionListing,
};
use crate::record::parse_records;
use crate::store::{read_transcript, ProjectsRoot, StoreError};
use std::path::Path;

/// All projects that contain at least one session, newest first.
pub fn list_projects(root: &ProjectsRoot) -> Result<Vec<ProjectListing>, ViewerError> {
    let mut projects = Vec::new();
    for id in root.project_ids()? {
        let sessions = root.session_files(&root.root().join(&id));
        if sessions.is_empty() {
            continue;
        }
        let latest: Vec<Option<String>> = sessions
            .iter()
            .map(|s| match read_transcript(&s.path) {
                Ok(text) => latest_timestamp_from_tail(&text),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable session in project listing");
                    None
                }
            })
            .collect();
        projects.push(summarize_project(&id, &latest));
    }

    sort_latest_first(&mut projects, |p| p.latest_timestamp.as_deref());
    Ok(projects)
}

/// Session summaries for one project, newest first.
pub fn list_sessions(
    root: &ProjectsRoot,
    project_id: &str,
) -> Result<Vec<SessionListing>, ViewerError> {
    let dir = root.project_dir(project_id)?;
    let mut sessions = Vec::new();
    for file in root.session_files(&dir) {
        let text = read_transcript(&file.path)?;
        let records = parse_logged(&file.path, &text);
        sessions.push(summarize_session(&file.id, &records));
    }

    sort_latest_first(&mut sessions, |s| s.latest_timestamp.as_deref());
    Ok(sessions)
}

/// Full message list and statistics for one session.
pub fn get_session(
    root: &ProjectsRoot,
    project_id: &str,
    session_id: &str,
) -> Result<SessionResponse, ViewerError> {
    let path = root.session_file(project_id, session_id)?;
    let text = read_transcript(&path)?;
    let records = parse_logged(&path, &text);
    Ok(aggregate_session(&records).into())
}

fn parse_logged(path: &Path, text: &str) -> Vec<crate::record::LogRecord> {
    let (records, skipped) = parse_records(text);
    if skipped > 0 {
        tracing::debug!(file = %path.display(), skipped, "skipped malformed transcript lines");
    }
    records
}

/// Failure of a viewer operation, as reported to callers.
#[derive(Debug)]
pub enum ViewerError {
    NotFound(String),
    Internal(String),
}

impl std::fmt::Display for ViewerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewerError::NotFound(msg) | ViewerError::Internal(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ViewerError {}

impl From<StoreError> for ViewerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { what, ref id } => {
                tracing::debug!(what, id = %id, "lookup missed");
                ViewerError::NotFound(e.to_string())
            }
            StoreError::InvalidId { ref id } => {
                tracing::debug!(id = %id, "rejected id");
                ViewerError::NotFound(e.to_string())
            }
            StoreError::Io { .. } => ViewerError::Internal(e.to_string()),
        }
    }
}
