use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from viewer.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ViewerConfig {
    pub server: ServerConfig,
    pub projects: ProjectsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Directory of UI assets served for non-API paths. Skipped if absent.
    pub static_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProjectsConfig {
    /// Root holding one directory per project.
    pub dir: PathBuf,
    /// Directory names under `dir` that are not projects.
    pub reserved: Vec<String>,
}

// --- Default implementations ---

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: PathBuf::from("public"),
        }
    }
}

impl Default for ProjectsConfig {
    fn default() -> Self {
        let dir = std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".claude").join("projects"))
            .unwrap_or_else(|| PathBuf::from(".."));
        Self {
            dir,
            reserved: vec!["viewer".to_string(), "memory".to_string()],
        }
    }
}

impl ViewerConfig {
    /// Load config from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}
