use fraggrow::engine::config::DEFAULT_CRITERION;
use std::path::PathBuf;

/// Values used when neither the command line nor the configuration file sets them.
///
/// Simulation and selection tuning defaults live in the core builder; these
/// cover what only the command line decides.
pub struct DefaultsConfig {
    pub iterations: usize,
    pub min_overlap: f64,
    pub max_overlap: f64,
    pub criterion: String,
    pub workdir: PathBuf,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            min_overlap: 0.5,
            max_overlap: 0.7,
            criterion: DEFAULT_CRITERION.to_string(),
            workdir: PathBuf::from("."),
        }
    }
}
