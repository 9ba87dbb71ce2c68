use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// An atom of the initial template that becomes a different atom in the final
/// template and keeps its own parameters until the last step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomTransformation {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Transformation list must contain atom-name pairs, found {tokens} names")]
    OddTokenCount { tokens: usize },
}

pub fn load(path: &Path) -> Result<Vec<AtomTransformation>, TransformError> {
    let content = std::fs::read_to_string(path).map_err(|e| TransformError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    parse(&content)
}

/// Whitespace-separated atom names read pairwise: `from to from to ...`.
pub fn parse(content: &str) -> Result<Vec<AtomTransformation>, TransformError> {
    let tokens: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim_start().starts_with('#'))
        .flat_map(str::split_whitespace)
        .collect();
    if tokens.len() % 2 != 0 {
        return Err(TransformError::OddTokenCount {
            tokens: tokens.len(),
        });
    }
    Ok(tokens
        .chunks_exact(2)
        .map(|p| AtomTransformation {
            from: p[0].to_string(),
            to: p[1].to_string(),
        })
        .collect())
}
