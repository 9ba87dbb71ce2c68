use std::path::Path;
use thiserror::Error;

/// A parsed simulation report: one header line of column names followed by
/// one numeric row per accepted simulation step.
///
/// Column names may contain single spaces (`Binding Energy`), so the header is
/// split on runs of two or more whitespace characters. Data rows are split on
/// any whitespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Report '{origin}' has no header line")]
    MissingHeader { origin: String },
    #[error("Invalid value '{value}' on line {line} of report '{origin}'")]
    InvalidValue {
        origin: String,
        line: usize,
        value: String,
    },
    #[error("Line {line} of report '{origin}' has {found} values, expected {expected}")]
    ColumnCount {
        origin: String,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Criterion '{criterion}' does not match any report column (available: {available:?})")]
    CriterionNotFound {
        criterion: String,
        available: Vec<String>,
    },
}

impl Report {
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path).map_err(|e| ReportError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    pub fn parse(content: &str, origin: &str) -> Result<Self, ReportError> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty());

        let (_, header) = lines.next().ok_or_else(|| ReportError::MissingHeader {
            origin: origin.to_string(),
        })?;
        let columns = split_header(header);
        if columns.is_empty() {
            return Err(ReportError::MissingHeader {
                origin: origin.to_string(),
            });
        }

        let mut rows = Vec::new();
        for (line_idx, line) in lines {
            let mut row = Vec::with_capacity(columns.len());
            for token in line.split_whitespace() {
                let value = token.parse::<f64>().map_err(|_| ReportError::InvalidValue {
                    origin: origin.to_string(),
                    line: line_idx + 1,
                    value: token.to_string(),
                })?;
                row.push(value);
            }
            if row.len() != columns.len() {
                return Err(ReportError::ColumnCount {
                    origin: origin.to_string(),
                    line: line_idx + 1,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn column_index(&self, criterion: &str) -> Result<usize, ReportError> {
        let wanted = criterion.trim();
        self.columns
            .iter()
            .position(|c| c == wanted)
            .ok_or_else(|| ReportError::CriterionNotFound {
                criterion: criterion.to_string(),
                available: self.columns.clone(),
            })
    }

    /// Values of one column, in row order.
    pub fn column(&self, index: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().filter_map(move |r| r.get(index).copied())
    }
}

fn split_header(line: &str) -> Vec<String> {
    let line = line.trim().trim_start_matches('#').replace('\t', "  ");
    line.split("  ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
