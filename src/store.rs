use std::path::{Path, PathBuf};

/// Extension of session transcript files.
pub const SESSION_EXT: &str = "jsonl";

/// The projects root: one subdirectory per project, one `.jsonl` file per session.
#[derive(Debug, Clone)]
pub struct ProjectsRoot {
    root: PathBuf,
    reserved: Vec<String>,
}

/// A session transcript on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFile {
    /// File stem, used as the session id.
    pub id: String,
    pub path: PathBuf,
}

impl ProjectsRoot {
    /// Create a root; directories named in `reserved` are never listed as projects.
    pub fn new(root: impl Into<PathBuf>, reserved: Vec<String>) -> Self {
        Self {
            root: root.into(),
            reserved,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of project directories, excluding reserved names. Unordered.
    pub fn project_ids(&self) -> Result<Vec<String>, StoreError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| StoreError::Io {
            path: self.root.clone(),
            source: e,
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::Io {
                path: self.root.clone(),
                source: e,
            })?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.reserved.iter().any(|r| *r == name) {
                continue;
            }
            ids.push(name);
        }
        Ok(ids)
    }

    /// Directory for a project, failing with `NotFound` if it does not exist.
    pub fn project_dir(&self, project_id: &str) -> Result<PathBuf, StoreError> {
        validate_id(project_id)?;
        let dir = self.root.join(project_id);
        if !dir.is_dir() {
            return Err(StoreError::NotFound {
                what: "Project",
                id: project_id.to_string(),
            });
        }
        Ok(dir)
    }

    /// Session transcripts in a project directory.
    ///
    /// An unreadable directory yields an empty list.
    pub fn session_files(&self, project_dir: &Path) -> Vec<SessionFile> {
        let entries = match std::fs::read_dir(project_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %project_dir.display(), error = %e, "cannot list sessions");
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(SESSION_EXT))
            .filter_map(|path| {
                let id = path.file_stem()?.to_string_lossy().into_owned();
                Some(SessionFile { id, path })
            })
            .collect()
    }

    /// Path to a session transcript, failing with `NotFound` if it does not exist.
    pub fn session_file(&self, project_id: &str, session_id: &str) -> Result<PathBuf, StoreError> {
        validate_id(project_id)?;
        validate_id(session_id)?;
        let path = self
            .root
            .join(project_id)
            .join(format!("{session_id}.{SESSION_EXT}"));
        if !path.is_file() {
            return Err(StoreError::NotFound {
                what: "Session",
                id: session_id.to_string(),
            });
        }
        Ok(path)
    }
}

/// Read a whole transcript as text. Invalid UTF-8 is replaced with U+FFFD so
/// a damaged line only spoils itself.
pub fn read_transcript(path: &Path) -> Result<String, StoreError> {
    let bytes = std::fs::read(path).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Ids come from URL segments and must name a single path component.
fn validate_id(id: &str) -> Result<(), StoreError> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains('/')
        || id.contains('\\')
        || id.contains('\0');
    if bad {
        return Err(StoreError::InvalidId { id: id.to_string() });
    }
    Ok(())
}

/// Errors from the projects directory.
#[derive(Debug)]
pub enum StoreError {
    NotFound { what: &'static str, id: String },
    InvalidId { id: String },
    Io { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound { what, .. } => write!(f, "{what} not found"),
            StoreError::InvalidId { id } => write!(f, "invalid id: {id:?}"),
            StoreError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
