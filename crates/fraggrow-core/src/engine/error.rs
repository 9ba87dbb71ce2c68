use std::path::PathBuf;
use thiserror::Error;

use super::config::ConfigError;
use super::external::ExternalError;
use super::state::StateError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Run state error: {0}")]
    State(#[from] StateError),

    #[error("Preparation failed: {0}")]
    PreparationFailed(#[source] ExternalError),

    #[error("Iteration {iteration} failed during {phase}: {source}")]
    IterationFailed {
        iteration: usize,
        phase: &'static str,
        #[source]
        source: ExternalError,
    },

    #[error("Iteration {iteration} did not produce required artifact '{path}'")]
    MissingArtifact { iteration: usize, path: PathBuf },

    #[error("Equilibration failed during {phase}: {source}")]
    EquilibrationFailed {
        phase: &'static str,
        #[source]
        source: ExternalError,
    },
}

impl EngineError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        }
    }

    /// The growing iteration this error belongs to, if any.
    pub fn iteration(&self) -> Option<usize> {
        match self {
            EngineError::IterationFailed { iteration, .. }
            | EngineError::MissingArtifact { iteration, .. } => Some(*iteration),
            _ => None,
        }
    }
}
