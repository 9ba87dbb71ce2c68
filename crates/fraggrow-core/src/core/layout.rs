//! The on-disk namespace owned by one growth run.
//!
//! Every path is derived from an absolute working directory and the run
//! identifier, so no component needs to rely on the process working directory.
//!
//! ```text
//! <workdir>/templates/<id>/                       active template + per-step templates
//! <workdir>/templates/<id>/prepared/              preparation outputs
//! <workdir>/<pdbout>_<id>/<i>/                    candidate pool of iteration i
//! <workdir>/<growing_output>_<id>_<resfold><i>/   simulation results of iteration i
//! <workdir>/equilibration_result_<id>/            equilibration results
//! <workdir>/selected_result_<id>/                 equilibration selection
//! <workdir>/pregrow/selection_<id>.pdb            seed for a chained run
//! <workdir>/control_<id>.conf                     control file of the current step
//! <workdir>/run_state_<id>.toml                   persisted run state
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// File whose presence inside a pool folder marks the iteration as complete.
pub const SENTINEL_FILE_NAME: &str = "initial_0_0.pdb";

const TEMPLATES_DIR: &str = "templates";
const PREPARED_DIR: &str = "prepared";
const PREGROW_DIR: &str = "pregrow";

/// Configurable folder and file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutNames {
    pub pdbout: String,
    pub growing_output: String,
    pub resfold: String,
    pub template_name: String,
}

impl Default for LayoutNames {
    fn default() -> Self {
        Self {
            pdbout: "pdbout".to_string(),
            growing_output: "growing_output".to_string(),
            resfold: "growing_output".to_string(),
            template_name: "grwz".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    workdir: PathBuf,
    identifier: String,
    names: LayoutNames,
}

impl RunLayout {
    pub fn new(workdir: &Path, identifier: &str, names: &LayoutNames) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            identifier: identifier.to_string(),
            names: names.clone(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn template_name(&self) -> &str {
        &self.names.template_name
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.workdir.join(TEMPLATES_DIR).join(&self.identifier)
    }

    pub fn prepared_dir(&self) -> PathBuf {
        self.templates_dir().join(PREPARED_DIR)
    }

    /// The template the simulator reads; overwritten at every step.
    pub fn active_template(&self) -> PathBuf {
        self.templates_dir().join(&self.names.template_name)
    }

    /// `<template_name>_<step>` inside the templates folder.
    pub fn step_template(&self, step: usize) -> PathBuf {
        step_template_path(&self.templates_dir(), &self.names.template_name, step)
    }

    pub fn pool_root(&self) -> PathBuf {
        self.workdir
            .join(format!("{}_{}", self.names.pdbout, self.identifier))
    }

    pub fn pool_dir(&self, iteration: usize) -> PathBuf {
        self.pool_root().join(iteration.to_string())
    }

    pub fn sentinel(&self, iteration: usize) -> PathBuf {
        self.pool_dir(iteration).join(SENTINEL_FILE_NAME)
    }

    pub fn results_dir(&self, iteration: usize) -> PathBuf {
        self.workdir.join(format!(
            "{}_{}_{}{}",
            self.names.growing_output, self.identifier, self.names.resfold, iteration
        ))
    }

    pub fn equilibration_dir(&self) -> PathBuf {
        self.workdir
            .join(format!("equilibration_result_{}", self.identifier))
    }

    pub fn selected_dir(&self) -> PathBuf {
        self.workdir
            .join(format!("selected_result_{}", self.identifier))
    }

    pub fn equilibration_sentinel(&self) -> PathBuf {
        self.selected_dir().join(SENTINEL_FILE_NAME)
    }

    pub fn pregrow_dir(&self) -> PathBuf {
        self.workdir.join(PREGROW_DIR)
    }

    pub fn pregrow_selection(&self) -> PathBuf {
        self.pregrow_dir()
            .join(format!("selection_{}.pdb", self.identifier))
    }

    pub fn control_file(&self) -> PathBuf {
        self.workdir.join(format!("control_{}.conf", self.identifier))
    }

    pub fn state_file(&self) -> PathBuf {
        self.workdir
            .join(format!("run_state_{}.toml", self.identifier))
    }
}

pub fn step_template_path(dir: &Path, template_name: &str, step: usize) -> PathBuf {
    dir.join(format!("{}_{}", template_name, step))
}

/// Idempotent directory creation; an existing folder is not an error.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)
}
