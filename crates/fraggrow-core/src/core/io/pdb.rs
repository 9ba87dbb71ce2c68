use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Trajectory '{path}' contains no structures")]
    Empty { path: String },
    #[error("Model {index} not found in trajectory '{path}' ({available} models available)")]
    ModelNotFound {
        path: String,
        index: usize,
        available: usize,
    },
}

/// The snapshots of a multi-model PDB trajectory, in file order.
///
/// Records between `MODEL` and `ENDMDL` form one snapshot. A file without any
/// `MODEL` record is treated as a single snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trajectory {
    models: Vec<Vec<String>>,
}

impl Trajectory {
    pub fn load(path: &Path) -> Result<Self, PdbError> {
        let content = std::fs::read_to_string(path).map_err(|e| PdbError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let trajectory = Self::parse(&content);
        if trajectory.is_empty() {
            return Err(PdbError::Empty {
                path: path.to_string_lossy().to_string(),
            });
        }
        Ok(trajectory)
    }

    pub fn parse(content: &str) -> Self {
        let mut models = Vec::new();
        let mut current: Option<Vec<String>> = None;
        let mut loose = Vec::new();

        for line in content.lines() {
            let record = line.get(..6).unwrap_or(line).trim_end();
            match record {
                "MODEL" => {
                    if let Some(model) = current.take() {
                        models.push(model);
                    }
                    current = Some(Vec::new());
                }
                "ENDMDL" => {
                    if let Some(model) = current.take() {
                        models.push(model);
                    }
                }
                "END" => {}
                _ => match current.as_mut() {
                    Some(model) => model.push(line.to_string()),
                    None => loose.push(line.to_string()),
                },
            }
        }
        if let Some(model) = current.take() {
            models.push(model);
        }
        if models.is_empty() && loose.iter().any(|l| !l.trim().is_empty()) {
            models.push(loose);
        }

        Self { models }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model(&self, index: usize) -> Option<&[String]> {
        self.models.get(index).map(Vec::as_slice)
    }

    /// Writes snapshot `index` as a standalone PDB file.
    pub fn write_model(&self, index: usize, origin: &Path, path: &Path) -> Result<(), PdbError> {
        let model = self.model(index).ok_or_else(|| PdbError::ModelNotFound {
            path: origin.to_string_lossy().to_string(),
            index,
            available: self.len(),
        })?;
        let io_err = |e| PdbError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        };
        let file = std::fs::File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        for line in model {
            writeln!(writer, "{}", line).map_err(io_err)?;
        }
        writeln!(writer, "END").map_err(io_err)?;
        writer.flush().map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TRAJECTORY: &str = "\
MODEL        1
ATOM      1  N   ALA A   1      11.104   6.134  -6.504  1.00  0.00           N
HETATM    2  C1  GRW L 900       1.000   2.000   3.000  1.00  0.00           C
ENDMDL
MODEL        2
ATOM      1  N   ALA A   1      11.204   6.034  -6.404  1.00  0.00           N
HETATM    2  C1  GRW L 900       1.100   2.100   3.100  1.00  0.00           C
ENDMDL
END
";

    #[test]
    fn parse_splits_models() {
        let trajectory = Trajectory::parse(TRAJECTORY);
        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.model(1).unwrap().len(), 2);
        assert!(trajectory.model(1).unwrap()[1].contains("1.100"));
    }

    #[test]
    fn file_without_model_records_is_one_snapshot() {
        let content = "ATOM      1  N   ALA A   1      11.104   6.134  -6.504\nEND\n";
        let trajectory = Trajectory::parse(content);
        assert_eq!(trajectory.len(), 1);
        assert_eq!(trajectory.model(0).unwrap().len(), 1);
    }

    #[test]
    fn write_model_produces_standalone_file() {
        let dir = tempdir().unwrap();
        let origin = dir.path().join("trajectory_1.pdb");
        let target = dir.path().join("initial_0_0.pdb");
        let trajectory = Trajectory::parse(TRAJECTORY);

        trajectory.write_model(0, &origin, &target).unwrap();

        let written = std::fs::read_to_string(&target).unwrap();
        assert!(written.starts_with("ATOM"));
        assert!(written.trim_end().ends_with("END"));
        assert!(!written.contains("MODEL"));
    }

    #[test]
    fn write_model_rejects_missing_index() {
        let dir = tempdir().unwrap();
        let trajectory = Trajectory::parse(TRAJECTORY);
        let result = trajectory.write_model(5, &dir.path().join("t.pdb"), &dir.path().join("o.pdb"));
        assert!(matches!(
            result,
            Err(PdbError::ModelNotFound { index: 5, available: 2, .. })
        ));
    }

    #[test]
    fn load_rejects_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.pdb");
        std::fs::write(&path, "END\n").unwrap();
        assert!(matches!(Trajectory::load(&path), Err(PdbError::Empty { .. })));
    }
}
