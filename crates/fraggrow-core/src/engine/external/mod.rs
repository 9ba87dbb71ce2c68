//! Contracts of the external collaborators driven by the growth workflow, and
//! the implementations shipped with the library.
//!
//! The workflow only ever talks to the traits in this module. Every request
//! carries absolute paths, so no implementation depends on the process working
//! directory.

pub mod configurer;
pub mod interpolator;
pub mod preparer;
pub mod process;
pub mod runner;
pub mod selector;

use crate::core::io::control::TemplateError;
use crate::core::io::pdb::PdbError;
use crate::core::io::report::ReportError;
use crate::core::io::transform::{AtomTransformation, TransformError};
use crate::core::models::run::GrowthRun;
use crate::core::schedule::OverlapFactor;
use crate::engine::config::{SelectionCondition, SimulationConfig};
use process::ProcessError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use configurer::TemplateConfigurer;
pub use interpolator::CommandInterpolator;
pub use preparer::{CommandPreparer, ProvidedInputs};
pub use runner::CommandRunner;
pub use selector::{CommandClusterer, ReportRankSelector};

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Required input '{path}' does not exist")]
    MissingInput { path: PathBuf },

    #[error("Expected output '{path}' was not produced")]
    MissingOutput { path: PathBuf },

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Pdb(#[from] PdbError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("Failed to write CSV summary '{path}': {source}")]
    Csv { path: String, source: csv::Error },

    #[error("Selection failed: {0}")]
    Selection(String),
}

impl ExternalError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        ExternalError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        }
    }
}

pub(crate) fn require_file(path: &Path) -> Result<(), ExternalError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ExternalError::MissingInput {
            path: path.to_path_buf(),
        })
    }
}

pub(crate) fn require_output(path: &Path) -> Result<(), ExternalError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ExternalError::MissingOutput {
            path: path.to_path_buf(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PreparationRequest<'a> {
    pub run: &'a GrowthRun,
    pub output_dir: &'a Path,
}

/// Inputs every growth run starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PreparedInputs {
    pub seed_structure: PathBuf,
    pub initial_template: PathBuf,
    pub final_template: PathBuf,
    #[serde(default)]
    pub transformations: Vec<AtomTransformation>,
}

impl PreparedInputs {
    /// Whether every prepared file is still on disk.
    pub fn is_intact(&self) -> bool {
        [
            &self.seed_structure,
            &self.initial_template,
            &self.final_template,
        ]
        .iter()
        .all(|p| p.is_file())
    }
}

pub trait StructurePreparer {
    fn prepare(&self, request: &PreparationRequest<'_>) -> Result<PreparedInputs, ExternalError>;
}

#[derive(Debug, Clone)]
pub struct TemplateRequest<'a> {
    pub initial: &'a Path,
    pub final_template: &'a Path,
    pub transformations: &'a [AtomTransformation],
    pub anchor_atom: &'a str,
    pub replacement_atom: &'a str,
    pub step_index: usize,
    pub step_total: usize,
    pub output_dir: &'a Path,
    pub template_name: &'a str,
}

pub trait StructureInterpolator {
    /// Builds the template of `step_index` and returns
    /// `<output_dir>/<template_name>_<step_index>`.
    fn build_template(&self, request: &TemplateRequest<'_>) -> Result<PathBuf, ExternalError>;
}

#[derive(Debug, Clone)]
pub struct ConfigurationRequest<'a> {
    pub simulation: &'a SimulationConfig,
    pub inputs: &'a [PathBuf],
    pub step_index: usize,
    pub overlap: OverlapFactor,
    pub output_dir: &'a Path,
    pub templates_dir: &'a Path,
    pub control_file: &'a Path,
    pub steps_override: Option<usize>,
}

pub trait SimulationConfigurer {
    /// Writes the control file and returns its path. The result must depend
    /// only on the request so a restarted run renders identical bytes.
    fn materialize(&self, request: &ConfigurationRequest<'_>) -> Result<PathBuf, ExternalError>;
}

#[derive(Debug, Clone)]
pub struct SimulationRequest<'a> {
    pub control_file: &'a Path,
    pub results_dir: &'a Path,
    pub resource_budget: usize,
}

/// Report and trajectory files of one finished simulation, one pair per worker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimulationOutput {
    pub results_dir: PathBuf,
    pub pairs: Vec<(PathBuf, PathBuf)>,
}

impl SimulationOutput {
    pub fn report(&self) -> Option<&Path> {
        self.pairs.first().map(|(r, _)| r.as_path())
    }
}

pub trait SimulationRunner {
    /// Blocks until the simulation exits.
    fn run(&self, request: &SimulationRequest<'_>) -> Result<SimulationOutput, ExternalError>;
}

#[derive(Debug, Clone)]
pub struct ClusterParams<'a> {
    pub resname: &'a str,
    pub distance_contact: f64,
    pub threshold: f64,
    pub epsilon: f64,
    pub condition: SelectionCondition,
    pub metric_weights: &'a str,
    pub n_clusters: usize,
    pub report_name: &'a str,
    pub trajectory_name: &'a str,
}

#[derive(Debug, Clone)]
pub struct SelectionRequest<'a> {
    pub output: &'a SimulationOutput,
    pub column: usize,
    pub max_structures: usize,
    pub output_dir: &'a Path,
    pub params: &'a ClusterParams<'a>,
}

pub trait StructureSelector {
    /// Resolves a criterion name to a report column index.
    fn rank(&self, report: &Path, criterion: &str) -> Result<usize, ExternalError>;

    /// Writes at most `max_structures` representative structures into
    /// `output_dir` and returns their paths.
    fn cluster(&self, request: &SelectionRequest<'_>) -> Result<Vec<PathBuf>, ExternalError>;

    /// Writes the best `max_structures` snapshots ranked by `column`, best first.
    fn select_best(&self, request: &SelectionRequest<'_>) -> Result<Vec<PathBuf>, ExternalError> {
        selector::select_ranked(request)
    }
}
