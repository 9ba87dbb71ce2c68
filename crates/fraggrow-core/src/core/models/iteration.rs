use crate::core::schedule::OverlapFactor;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

/// Which template policy applies at a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Step 0: reuses the template built during preparation.
    Initial,
    /// `0 < i < N`: requests an interpolated template.
    Intermediate,
    /// Step `N`: installs the unmodified final template.
    Final,
}

impl StepKind {
    pub fn classify(step: usize, total: usize) -> Self {
        if step == 0 {
            StepKind::Initial
        } else if step >= total {
            StepKind::Final
        } else {
            StepKind::Intermediate
        }
    }
}

/// Structures selected from one iteration's simulation output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePool {
    iteration: usize,
    structures: Vec<PathBuf>,
}

impl CandidatePool {
    pub fn new(iteration: usize, mut structures: Vec<PathBuf>) -> Self {
        structures.sort();
        Self {
            iteration,
            structures,
        }
    }

    /// Reads every `.pdb` file in `dir`, sorted by file name.
    pub fn load(dir: &Path, iteration: usize) -> io::Result<Self> {
        let mut structures = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_pdb = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdb"));
            if path.is_file() && is_pdb {
                structures.push(path);
            }
        }
        Ok(Self::new(iteration, structures))
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn structures(&self) -> &[PathBuf] {
        &self.structures
    }

    pub fn into_structures(self) -> Vec<PathBuf> {
        self.structures
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn basenames(&self) -> BTreeSet<String> {
        basenames(&self.structures)
    }
}

pub fn basenames(paths: &[PathBuf]) -> BTreeSet<String> {
    paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

/// Everything the orchestrator derived for one growing iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationState {
    pub index: usize,
    pub kind: StepKind,
    pub inputs: Vec<PathBuf>,
    pub template: PathBuf,
    pub overlap: OverlapFactor,
    pub control_file: PathBuf,
    pub results_dir: PathBuf,
    pub pool_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn classify_covers_boundaries() {
        assert_eq!(StepKind::classify(0, 5), StepKind::Initial);
        assert_eq!(StepKind::classify(1, 5), StepKind::Intermediate);
        assert_eq!(StepKind::classify(4, 5), StepKind::Intermediate);
        assert_eq!(StepKind::classify(5, 5), StepKind::Final);
    }

    #[test]
    fn load_lists_only_pdb_files_in_name_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("initial_1_0.pdb"), "ATOM").unwrap();
        fs::write(dir.path().join("initial_0_0.pdb"), "ATOM").unwrap();
        fs::write(dir.path().join("selection.csv"), "rank").unwrap();
        fs::create_dir(dir.path().join("nested.pdb")).unwrap();

        let pool = CandidatePool::load(dir.path(), 3).unwrap();

        assert_eq!(pool.iteration(), 3);
        assert_eq!(pool.len(), 2);
        assert_eq!(
            pool.basenames().into_iter().collect::<Vec<_>>(),
            vec!["initial_0_0.pdb", "initial_1_0.pdb"]
        );
        assert!(pool.structures()[0].ends_with("initial_0_0.pdb"));
    }

    #[test]
    fn load_fails_for_missing_directory() {
        let dir = tempdir().unwrap();
        assert!(CandidatePool::load(&dir.path().join("absent"), 0).is_err());
    }
}
