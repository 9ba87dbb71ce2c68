use super::process::ExternalCommand;
use super::{ExternalError, StructureInterpolator, TemplateRequest, require_file, require_output};
use crate::core::io::transform::AtomTransformation;
use crate::core::layout::step_template_path;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Runs an external template builder once per step.
///
/// The builder is expected to morph bond lengths, van der Waals radii and
/// charges between the two templates and to write
/// `<output_dir>/<template_name>_<step>`.
#[derive(Debug, Clone)]
pub struct CommandInterpolator {
    pub program: PathBuf,
    pub program_args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl CommandInterpolator {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            program_args: Vec::new(),
            timeout: None,
        }
    }
}

fn write_transformations(
    dir: &Path,
    transformations: &[AtomTransformation],
) -> Result<PathBuf, ExternalError> {
    let path = dir.join("transformations.txt");
    let mut content = String::new();
    for t in transformations {
        let _ = writeln!(content, "{} {}", t.from, t.to);
    }
    std::fs::write(&path, content).map_err(|e| ExternalError::io(&path, e))?;
    Ok(path)
}

impl StructureInterpolator for CommandInterpolator {
    fn build_template(&self, request: &TemplateRequest<'_>) -> Result<PathBuf, ExternalError> {
        require_file(request.initial)?;
        require_file(request.final_template)?;
        std::fs::create_dir_all(request.output_dir)
            .map_err(|e| ExternalError::io(request.output_dir, e))?;
        let transform_file = write_transformations(request.output_dir, request.transformations)?;

        let expected = step_template_path(
            request.output_dir,
            request.template_name,
            request.step_index,
        );
        debug!(
            step = request.step_index,
            total = request.step_total,
            output = %expected.display(),
            "Building interpolated template"
        );
        ExternalCommand::new(&self.program)
            .args(&self.program_args)
            .named("initial", request.initial)
            .named("final", request.final_template)
            .named("transform", &transform_file)
            .named("anchor-atom", request.anchor_atom)
            .named("replacement-atom", request.replacement_atom)
            .named("step", request.step_index.to_string())
            .named("total", request.step_total.to_string())
            .named("output-dir", request.output_dir)
            .named("template-name", request.template_name)
            .current_dir(request.output_dir)
            .log_file(&request.output_dir.join("interpolation.log"))
            .timeout(self.timeout)
            .run()?;

        require_output(&expected)?;
        Ok(expected)
    }
}
