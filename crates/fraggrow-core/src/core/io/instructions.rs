use std::path::Path;
use thiserror::Error;

/// One `(fragment, core anchor, fragment anchor)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthInstruction {
    pub fragment_id: String,
    pub core_anchor: String,
    pub fragment_anchor: String,
}

/// A chain of triples grown one after the other, from one line of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionLine {
    pub line_number: usize,
    pub chain: Vec<GrowthInstruction>,
}

#[derive(Debug, Error)]
pub enum InstructionError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error(
        "Malformed instruction on line {line_number}: expected a multiple of 3 tokens, found {tokens}"
    )]
    Malformed { line_number: usize, tokens: usize },
}

pub fn load(path: &Path) -> Result<Vec<Result<InstructionLine, InstructionError>>, InstructionError> {
    let content = std::fs::read_to_string(path).map_err(|e| InstructionError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    Ok(parse(&content))
}

/// Parses every non-blank, non-comment line. Malformed lines are returned as
/// errors in place so callers can report them and carry on.
pub fn parse(content: &str) -> Vec<Result<InstructionLine, InstructionError>> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| parse_line(idx + 1, line).transpose())
        .collect()
}

pub fn parse_line(
    line_number: usize,
    line: &str,
) -> Result<Option<InstructionLine>, InstructionError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens.len() % 3 != 0 {
        return Err(InstructionError::Malformed {
            line_number,
            tokens: tokens.len(),
        });
    }

    let chain = tokens
        .chunks_exact(3)
        .map(|t| GrowthInstruction {
            fragment_id: t[0].to_string(),
            core_anchor: t[1].to_string(),
            fragment_anchor: t[2].to_string(),
        })
        .collect();

    Ok(Some(InstructionLine { line_number, chain }))
}
