use super::{ConfigurationRequest, ExternalError, SimulationConfigurer};
use crate::core::io::control::{ControlTemplate, escape_json_str, format_complexes};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Renders the user's control-file template natively.
///
/// Recognized placeholders: `COMPLEXES`, `RESULTS_FOLDER`, `LICENSE`,
/// `OVERLAP`, `STEPS`, `SEED`, `TEMPLATES`, `REPORT_NAME`, `TRAJECTORY_NAME`
/// and `ITERATION`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateConfigurer;

impl TemplateConfigurer {
    /// Placeholder values. Paths are escaped for quoted JSON slots.
    pub fn values(request: &ConfigurationRequest<'_>) -> BTreeMap<&'static str, String> {
        let sim = request.simulation;
        let steps = request.steps_override.unwrap_or(sim.steps);
        let path = |p: &Path| escape_json_str(&p.to_string_lossy());

        let mut values = BTreeMap::new();
        values.insert("COMPLEXES", format_complexes(request.inputs));
        values.insert("RESULTS_FOLDER", path(request.output_dir));
        values.insert("LICENSE", path(&sim.license));
        values.insert("OVERLAP", request.overlap.to_string());
        values.insert("STEPS", steps.to_string());
        values.insert("SEED", sim.seed.to_string());
        values.insert("TEMPLATES", path(request.templates_dir));
        values.insert(
            "REPORT_NAME",
            path(&request.output_dir.join(&sim.report_name)),
        );
        values.insert(
            "TRAJECTORY_NAME",
            path(&request.output_dir.join(format!("{}.pdb", sim.trajectory_name))),
        );
        values.insert("ITERATION", request.step_index.to_string());
        values
    }
}

impl SimulationConfigurer for TemplateConfigurer {
    fn materialize(&self, request: &ConfigurationRequest<'_>) -> Result<PathBuf, ExternalError> {
        let template = ControlTemplate::load(&request.simulation.control_template)?;
        let values = Self::values(request);
        for name in template.placeholders() {
            if !values.contains_key(name.as_str()) {
                warn!(placeholder = %name, "Control template placeholder has no value; left as written");
            }
        }
        let rendered = template.render(&values)?;

        debug!(
            step = request.step_index,
            overlap = %request.overlap,
            control_file = %request.control_file.display(),
            "Writing control file"
        );
        std::fs::write(request.control_file, rendered)
            .map_err(|e| ExternalError::io(request.control_file, e))?;
        Ok(request.control_file.to_path_buf())
    }
}
