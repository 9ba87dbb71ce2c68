use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Unterminated placeholder starting at byte {offset} in control template")]
    Unterminated { offset: usize },
}

/// A simulator control file with `$NAME` or `${NAME}` placeholders.
///
/// Names consist of ASCII letters, digits and underscores. Placeholders with
/// no supplied value are written back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlTemplate {
    source: String,
}

impl ControlTemplate {
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path).map_err(|e| TemplateError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Ok(Self { source })
    }

    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn render(&self, values: &BTreeMap<&str, String>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source.as_str();
        let mut consumed = 0;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            let (name, raw_len) = if let Some(braced) = after.strip_prefix('{') {
                let end = braced.find('}').ok_or(TemplateError::Unterminated {
                    offset: consumed + pos,
                })?;
                (&braced[..end], end + 3)
            } else {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], end + 1)
            };

            let raw = &rest[pos..pos + raw_len];
            match values.get(name) {
                Some(value) if !name.is_empty() => out.push_str(value),
                _ => out.push_str(raw),
            }

            consumed += pos + raw_len;
            rest = &rest[pos + raw_len..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Every placeholder name referenced by the template.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut rest = self.source.as_str();
        while let Some(pos) = rest.find('$') {
            let after = &rest[pos + 1..];
            let name = match after.strip_prefix('{') {
                Some(braced) => braced.split('}').next().unwrap_or(""),
                None => {
                    let end = after
                        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                        .unwrap_or(after.len());
                    &after[..end]
                }
            };
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
            rest = after;
        }
        names
    }
}

/// Formats input structures as the simulator's `complexes` entries.
pub fn format_complexes(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| json!({ "files": [{ "path": p.to_string_lossy() }] }).to_string())
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Escapes a value for a quoted JSON string slot, without the quotes.
pub fn escape_json_str(value: &str) -> String {
    let quoted = Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}
