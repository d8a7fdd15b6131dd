use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Invalid {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Runtime knobs for the session core. Every field has a default, so a
/// partial (or missing) config file is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlowConfig {
    /// Explicit shell; wins over the host environment and platform default.
    pub shell: Option<String>,
    /// Export `FORCE_COLOR=1` to every block process.
    pub force_color: bool,
    /// Size of a single stdout/stderr read, i.e. the largest output chunk.
    pub read_buffer_size: usize,
    /// Program used for branch lookups.
    pub git_program: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            shell: None,
            force_color: true,
            read_buffer_size: 4096,
            git_program: "git".to_string(),
        }
    }
}

impl FlowConfig {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Invalid {
            path: path.display().to_string(),
            source,
        })
    }

    /// `FLOW_SHELL` overrides whatever the file said.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(shell) = std::env::var("FLOW_SHELL") {
            if !shell.trim().is_empty() {
                self.shell = Some(shell);
            }
        }
        self
    }
}
