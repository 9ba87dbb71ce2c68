use super::process::ExternalCommand;
use super::{
    ExternalError, PreparationRequest, PreparedInputs, StructurePreparer, require_file,
    require_output,
};
use crate::core::io::transform;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const PREPARED_COMPLEX: &str = "complex.pdb";
pub const PREPARED_INITIAL_TEMPLATE: &str = "initial_template";
pub const PREPARED_FINAL_TEMPLATE: &str = "final_template";
pub const PREPARED_TRANSFORM: &str = "transform.txt";

/// Inputs supplied directly by the user: the complex already carries the
/// fragment, and both templates exist on disk.
#[derive(Debug, Clone)]
pub struct ProvidedInputs {
    pub seed_structure: PathBuf,
    pub initial_template: PathBuf,
    pub final_template: PathBuf,
    pub transformations: Option<PathBuf>,
}

impl StructurePreparer for ProvidedInputs {
    fn prepare(&self, _request: &PreparationRequest<'_>) -> Result<PreparedInputs, ExternalError> {
        require_file(&self.seed_structure)?;
        require_file(&self.initial_template)?;
        require_file(&self.final_template)?;
        let transformations = match &self.transformations {
            Some(path) => {
                require_file(path)?;
                transform::load(path)?
            }
            None => Vec::new(),
        };
        Ok(PreparedInputs {
            seed_structure: self.seed_structure.clone(),
            initial_template: self.initial_template.clone(),
            final_template: self.final_template.clone(),
            transformations,
        })
    }
}

/// Delegates fragment attachment to an external program.
///
/// The program receives the complex, the fragment structure and both anchor
/// atoms, and must write `complex.pdb`, `initial_template`, `final_template`
/// and `transform.txt` into the output directory.
#[derive(Debug, Clone)]
pub struct CommandPreparer {
    pub program: PathBuf,
    /// Leading arguments, e.g. the script an interpreter should run.
    pub program_args: Vec<String>,
    pub fragment_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl CommandPreparer {
    fn fragment_path(&self, fragment_id: &str) -> PathBuf {
        match &self.fragment_dir {
            Some(dir) => dir.join(fragment_id),
            None => PathBuf::from(fragment_id),
        }
    }

    fn command(&self, request: &PreparationRequest<'_>, fragment: &Path) -> ExternalCommand {
        let run = request.run;
        ExternalCommand::new(&self.program)
            .args(&self.program_args)
            .named("complex", run.complex())
            .named("fragment", fragment)
            .named("core-atom", run.core_anchor())
            .named("fragment-atom", run.fragment_anchor())
            .named("output-dir", request.output_dir)
            .current_dir(request.output_dir)
            .log_file(&request.output_dir.join("preparation.log"))
            .timeout(self.timeout)
    }
}

impl StructurePreparer for CommandPreparer {
    fn prepare(&self, request: &PreparationRequest<'_>) -> Result<PreparedInputs, ExternalError> {
        let run = request.run;
        require_file(run.complex())?;
        let fragment = self.fragment_path(run.fragment_id());
        require_file(&fragment)?;
        std::fs::create_dir_all(request.output_dir)
            .map_err(|e| ExternalError::io(request.output_dir, e))?;

        info!(
            identifier = run.identifier(),
            fragment = %fragment.display(),
            "Attaching fragment to complex"
        );
        self.command(request, &fragment).run()?;

        let dir = request.output_dir;
        let prepared = PreparedInputs {
            seed_structure: dir.join(PREPARED_COMPLEX),
            initial_template: dir.join(PREPARED_INITIAL_TEMPLATE),
            final_template: dir.join(PREPARED_FINAL_TEMPLATE),
            transformations: Vec::new(),
        };
        require_output(&prepared.seed_structure)?;
        require_output(&prepared.initial_template)?;
        require_output(&prepared.final_template)?;

        let transform_file = dir.join(PREPARED_TRANSFORM);
        let transformations = if transform_file.is_file() {
            transform::load(&transform_file)?
        } else {
            Vec::new()
        };
        Ok(PreparedInputs {
            transformations,
            ..prepared
        })
    }
}
