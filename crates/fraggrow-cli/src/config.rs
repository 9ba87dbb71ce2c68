use crate::cli::ConfigOverrides;
use crate::error::{CliError, Result};
use crate::utils::parser;
use defaults::DefaultsConfig;
use fraggrow::core::layout::LayoutNames;
use fraggrow::engine::config::{GrowthConfig, GrowthConfigBuilder, SelectionCondition};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

mod defaults;

/// How candidate structures are picked from a finished simulation.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMethod {
    /// Rank every snapshot by the criterion column and keep the best ones.
    #[default]
    Rank,
    /// Hand clustering to an external program.
    Command,
}

impl FromStr for SelectionMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "rank" => Ok(SelectionMethod::Rank),
            "command" => Ok(SelectionMethod::Command),
            other => Err(format!("expected 'rank' or 'command', got '{}'", other)),
        }
    }
}

/// An external program together with its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

/// Fully merged configuration for one invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub growth: GrowthConfig,
    pub interpolator: ExternalTool,
    /// Fragment attachment program; required by `series` only.
    pub preparer: Option<ExternalTool>,
    pub fragment_dir: Option<PathBuf>,
    /// `None` selects with the native ranker.
    pub clusterer: Option<ExternalTool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialSimulationConfig {
    executable: Option<PathBuf>,
    launcher: Option<PathBuf>,
    budget_flag: Option<String>,
    license: Option<PathBuf>,
    control_template: Option<PathBuf>,
    steps: Option<usize>,
    equilibration_steps: Option<usize>,
    resource_budget: Option<usize>,
    seed: Option<u64>,
    report_name: Option<String>,
    trajectory_name: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialGrowthConfig {
    iterations: Option<usize>,
    min_overlap: Option<f64>,
    max_overlap: Option<f64>,
    workdir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialSelectionConfig {
    criterion: Option<String>,
    condition: Option<String>,
    method: Option<SelectionMethod>,
    program: Option<PathBuf>,
    args: Option<Vec<String>>,
    timeout_secs: Option<u64>,
    resname: Option<String>,
    distance_contact: Option<f64>,
    threshold: Option<f64>,
    epsilon: Option<f64>,
    metric_weights: Option<String>,
    n_clusters: Option<usize>,
    equilibration_count: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialToolConfig {
    program: Option<PathBuf>,
    args: Option<Vec<String>>,
    timeout_secs: Option<u64>,
    /// Only meaningful for the preparation program.
    fragment_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialLayoutConfig {
    pdbout: Option<String>,
    growing_output: Option<String>,
    resfold: Option<String>,
    template_name: Option<String>,
}

impl PartialLayoutConfig {
    fn into_names(self) -> LayoutNames {
        let defaults = LayoutNames::default();
        LayoutNames {
            pdbout: self.pdbout.unwrap_or(defaults.pdbout),
            growing_output: self.growing_output.unwrap_or(defaults.growing_output),
            resfold: self.resfold.unwrap_or(defaults.resfold),
            template_name: self.template_name.unwrap_or(defaults.template_name),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    simulation: Option<PartialSimulationConfig>,
    growth: Option<PartialGrowthConfig>,
    selection: Option<PartialSelectionConfig>,
    interpolation: Option<PartialToolConfig>,
    preparation: Option<PartialToolConfig>,
    layout: Option<PartialLayoutConfig>,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Layers the configuration: CLI flag, then `--set`, then file, then defaults.
    pub fn merge_with_cli(mut self, overrides: &ConfigOverrides) -> Result<AppConfig> {
        self.apply_set_values(&overrides.set_values)?;
        let defaults = DefaultsConfig::default();

        let sim = self.simulation.take().unwrap_or_default();
        let growth = self.growth.take().unwrap_or_default();
        let selection = self.selection.take().unwrap_or_default();
        let layout = self.layout.take().unwrap_or_default();

        let resource_budget = overrides.cpus.or(sim.resource_budget).ok_or_else(|| {
            CliError::Config(
                "`simulation.resource-budget` is required (or pass --cpus).".to_string(),
            )
        })?;

        let mut builder = GrowthConfigBuilder::new()
            .executable(program_path(required(sim.executable, "simulation.executable")?)?)
            .launcher(sim.launcher)
            .license(absolute(&required(sim.license, "simulation.license")?)?)
            .control_template(required(
                sim.control_template,
                "simulation.control-template",
            )?)
            .resource_budget(resource_budget)
            .timeout(sim.timeout_secs.map(Duration::from_secs))
            .iterations(
                overrides
                    .iterations
                    .or(growth.iterations)
                    .unwrap_or(defaults.iterations),
            )
            .overlap_bounds(
                growth.min_overlap.unwrap_or(defaults.min_overlap),
                growth.max_overlap.unwrap_or(defaults.max_overlap),
            )
            .criterion(
                overrides
                    .criterion
                    .clone()
                    .or(selection.criterion)
                    .unwrap_or(defaults.criterion),
            )
            .workdir(absolute(&growth.workdir.unwrap_or(defaults.workdir))?)
            .names(layout.into_names())
            .restart(overrides.restart);

        if let Some(flag) = sim.budget_flag {
            builder = builder.budget_flag(flag);
        }
        if let Some(steps) = sim.steps {
            builder = builder.steps(steps);
        }
        if let Some(steps) = sim.equilibration_steps {
            builder = builder.equilibration_steps(steps);
        }
        if let Some(seed) = sim.seed {
            builder = builder.seed(seed);
        }
        if let Some(name) = sim.report_name {
            builder = builder.report_name(name);
        }
        if let Some(name) = sim.trajectory_name {
            builder = builder.trajectory_name(name);
        }
        if let Some(condition) = selection.condition {
            let condition = SelectionCondition::from_str(&condition)
                .map_err(|e| CliError::Config(e.to_string()))?;
            builder = builder.condition(condition);
        }
        if let Some(resname) = selection.resname {
            builder = builder.resname(resname);
        }
        if let Some(value) = selection.distance_contact {
            builder = builder.distance_contact(value);
        }
        if let Some(value) = selection.threshold {
            builder = builder.threshold(value);
        }
        if let Some(value) = selection.epsilon {
            builder = builder.epsilon(value);
        }
        if let Some(weights) = selection.metric_weights {
            builder = builder.metric_weights(weights);
        }
        if let Some(n) = selection.n_clusters {
            builder = builder.n_clusters(n);
        }
        if let Some(n) = selection.equilibration_count {
            builder = builder.equilibration_count(n);
        }

        let growth_config = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        let interpolation = self.interpolation.take().unwrap_or_default();
        let interpolator = ExternalTool {
            program: program_path(required(interpolation.program, "interpolation.program")?)?,
            args: interpolation.args.unwrap_or_default(),
            timeout: interpolation.timeout_secs.map(Duration::from_secs),
        };

        let preparation = self.preparation.take().unwrap_or_default();
        let fragment_dir = preparation
            .fragment_dir
            .as_deref()
            .map(absolute)
            .transpose()?;
        let preparer = preparation
            .program
            .map(|program| -> Result<ExternalTool> {
                Ok(ExternalTool {
                    program: program_path(program)?,
                    args: preparation.args.unwrap_or_default(),
                    timeout: preparation.timeout_secs.map(Duration::from_secs),
                })
            })
            .transpose()?;

        let clusterer = match selection.method.unwrap_or_default() {
            SelectionMethod::Rank => None,
            SelectionMethod::Command => Some(ExternalTool {
                program: program_path(required(selection.program, "selection.program")?)?,
                args: selection.args.unwrap_or_default(),
                timeout: selection.timeout_secs.map(Duration::from_secs),
            }),
        };

        Ok(AppConfig {
            growth: growth_config,
            interpolator,
            preparer,
            fragment_dir,
            clusterer,
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        if set_values.is_empty() {
            return Ok(());
        }
        let sim = self.simulation.get_or_insert_with(Default::default);
        let growth = self.growth.get_or_insert_with(Default::default);
        let selection = self.selection.get_or_insert_with(Default::default);
        let interpolation = self.interpolation.get_or_insert_with(Default::default);
        let preparation = self.preparation.get_or_insert_with(Default::default);
        let layout = self.layout.get_or_insert_with(Default::default);

        for kv_pair in set_values {
            let (key, value) = parser::parse_key_value(kv_pair)?;
            let integer = || parser::parse_value::<usize>(key, value, "integer");
            let seconds = || parser::parse_value::<u64>(key, value, "integer");
            let float = || parser::parse_value::<f64>(key, value, "float");
            let text = || Some(value.to_string());
            let path = || Some(PathBuf::from(value));

            match key {
                "simulation.executable" => sim.executable = path(),
                "simulation.launcher" => sim.launcher = path(),
                "simulation.budget-flag" => sim.budget_flag = text(),
                "simulation.license" => sim.license = path(),
                "simulation.control-template" => sim.control_template = path(),
                "simulation.steps" => sim.steps = Some(integer()?),
                "simulation.equilibration-steps" => sim.equilibration_steps = Some(integer()?),
                "simulation.resource-budget" => sim.resource_budget = Some(integer()?),
                "simulation.seed" => sim.seed = Some(seconds()?),
                "simulation.report-name" => sim.report_name = text(),
                "simulation.trajectory-name" => sim.trajectory_name = text(),
                "simulation.timeout-secs" => sim.timeout_secs = Some(seconds()?),

                "growth.iterations" => growth.iterations = Some(integer()?),
                "growth.min-overlap" => growth.min_overlap = Some(float()?),
                "growth.max-overlap" => growth.max_overlap = Some(float()?),
                "growth.workdir" => growth.workdir = path(),

                "selection.criterion" => selection.criterion = text(),
                "selection.condition" => selection.condition = text(),
                "selection.method" => {
                    selection.method = Some(value.parse().map_err(|reason| {
                        CliError::Config(format!("Invalid value for {}: {}", key, reason))
                    })?)
                }
                "selection.program" => selection.program = path(),
                "selection.args" => selection.args = Some(parser::parse_args(value)),
                "selection.timeout-secs" => selection.timeout_secs = Some(seconds()?),
                "selection.resname" => selection.resname = text(),
                "selection.distance-contact" => selection.distance_contact = Some(float()?),
                "selection.threshold" => selection.threshold = Some(float()?),
                "selection.epsilon" => selection.epsilon = Some(float()?),
                "selection.metric-weights" => selection.metric_weights = text(),
                "selection.n-clusters" => selection.n_clusters = Some(integer()?),
                "selection.equilibration-count" => {
                    selection.equilibration_count = Some(integer()?)
                }

                "interpolation.program" => interpolation.program = path(),
                "interpolation.args" => interpolation.args = Some(parser::parse_args(value)),
                "interpolation.timeout-secs" => interpolation.timeout_secs = Some(seconds()?),

                "preparation.program" => preparation.program = path(),
                "preparation.args" => preparation.args = Some(parser::parse_args(value)),
                "preparation.timeout-secs" => preparation.timeout_secs = Some(seconds()?),
                "preparation.fragment-dir" => preparation.fragment_dir = path(),

                "layout.pdbout" => layout.pdbout = text(),
                "layout.growing-output" => layout.growing_output = text(),
                "layout.resfold" => layout.resfold = text(),
                "layout.template-name" => layout.template_name = text(),

                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| {
        CliError::Config(format!(
            "A value for '{}' is required either in the config file or via --set.",
            key
        ))
    })
}

/// External programs run from per-step folders, so relative paths are anchored
/// to the current directory. Bare names are left for `PATH` lookup.
fn program_path(program: PathBuf) -> Result<PathBuf> {
    if program.components().count() > 1 {
        absolute(&program)
    } else {
        Ok(program)
    }
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}
