use crate::core::layout::RunLayout;
use crate::engine::external::PreparedInputs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("File I/O error for run state '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse run state '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to serialize run state: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RunStatus {
    Preparing,
    Growing,
    Equilibrating,
    Done,
    Aborted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        iteration: Option<usize>,
    },
}

/// Durable progress record of one growth run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunState {
    pub identifier: String,
    pub total_iterations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<usize>,
    pub status: RunStatus,
    /// Outputs of the one-time preparation, reused when the run is resumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepared: Option<PreparedInputs>,
}

impl RunState {
    pub fn new(identifier: &str, total_iterations: usize) -> Self {
        Self {
            identifier: identifier.to_string(),
            total_iterations,
            last_completed: None,
            status: RunStatus::Preparing,
            prepared: None,
        }
    }

    /// Returns `Ok(None)` when no state file exists yet.
    pub fn load(path: &Path) -> Result<Option<Self>, StateError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StateError::Io {
                    path: path.to_string_lossy().to_string(),
                    source: e,
                });
            }
        };
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| StateError::Parse {
                path: path.to_string_lossy().to_string(),
                source: e,
            })
    }

    /// Writes to a sibling temporary file, then renames it over `path`.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let content = toml::to_string(self)?;
        atomic_write(path, content.as_bytes()).map_err(|e| StateError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Whether a persisted state describes the same run shape.
    pub fn matches(&self, identifier: &str, total_iterations: usize) -> bool {
        self.identifier == identifier && self.total_iterations == total_iterations
    }

    pub fn is_completed(&self, iteration: usize) -> bool {
        self.last_completed.is_some_and(|last| iteration <= last)
    }

    pub fn mark_completed(&mut self, iteration: usize) {
        self.last_completed = Some(iteration);
        self.status = if iteration >= self.total_iterations {
            RunStatus::Equilibrating
        } else {
            RunStatus::Growing
        };
    }

    pub fn is_done(&self) -> bool {
        self.status == RunStatus::Done
    }

    /// Rebuilds a state from restart sentinels for runs that predate the
    /// state file. Only the contiguous prefix of completed iterations counts.
    pub fn recover_from_sentinels(layout: &RunLayout, total_iterations: usize) -> Self {
        let mut state = Self::new(layout.identifier(), total_iterations);
        for i in 0..=total_iterations {
            if !layout.sentinel(i).is_file() {
                break;
            }
            state.mark_completed(i);
        }
        if state.last_completed == Some(total_iterations)
            && layout.equilibration_sentinel().is_file()
            && layout.pregrow_selection().is_file()
        {
            state.status = RunStatus::Done;
        }
        debug!(
            identifier = layout.identifier(),
            last_completed = ?state.last_completed,
            status = ?state.status,
            "Recovered run state from restart sentinels"
        );
        state
    }

    /// Loads the authoritative state for a restarted run, migrating from
    /// sentinels when the file is absent or belongs to a different run shape.
    pub fn resume(layout: &RunLayout, total_iterations: usize) -> Result<Self, StateError> {
        let path = layout.state_file();
        match Self::load(&path)? {
            Some(state) if state.matches(layout.identifier(), total_iterations) => {
                info!(
                    path = %path.display(),
                    last_completed = ?state.last_completed,
                    "Resuming from persisted run state"
                );
                Ok(state)
            }
            _ => {
                let state = Self::recover_from_sentinels(layout, total_iterations);
                state.save(&path)?;
                Ok(state)
            }
        }
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("state");
    let tmp = path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)
}
