use crate::core::layout::LayoutNames;
use crate::core::schedule::InterpolationSchedule;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CRITERION: &str = "Binding Energy";
pub const DEFAULT_EQUILIBRATION_SELECTION: usize = 10;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Whether lower or higher criterion values rank first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionCondition {
    #[default]
    Min,
    Max,
}

impl SelectionCondition {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionCondition::Min => "min",
            SelectionCondition::Max => "max",
        }
    }
}

impl fmt::Display for SelectionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionCondition {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Ok(SelectionCondition::Min),
            "max" => Ok(SelectionCondition::Max),
            other => Err(ConfigError::InvalidParameter {
                name: "condition",
                reason: format!("expected 'min' or 'max', got '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub executable: PathBuf,
    pub launcher: Option<PathBuf>,
    pub budget_flag: String,
    pub license: PathBuf,
    pub control_template: PathBuf,
    pub steps: usize,
    pub equilibration_steps: usize,
    pub resource_budget: usize,
    pub seed: u64,
    pub report_name: String,
    pub trajectory_name: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    pub criterion: String,
    pub condition: SelectionCondition,
    pub resname: String,
    pub distance_contact: f64,
    pub threshold: f64,
    pub epsilon: f64,
    pub metric_weights: String,
    pub n_clusters: usize,
    pub equilibration_count: usize,
}

/// Everything a growth run needs, built once and shared by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthConfig {
    pub simulation: SimulationConfig,
    pub schedule: InterpolationSchedule,
    pub selection: SelectionConfig,
    pub workdir: PathBuf,
    pub names: LayoutNames,
    pub restart: bool,
}

impl GrowthConfig {
    pub fn iterations(&self) -> usize {
        self.schedule.iterations()
    }
}

#[derive(Default)]
pub struct GrowthConfigBuilder {
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
    timeout: Option<Duration>,
    iterations: Option<usize>,
    min_overlap: Option<f64>,
    max_overlap: Option<f64>,
    criterion: Option<String>,
    condition: Option<SelectionCondition>,
    resname: Option<String>,
    distance_contact: Option<f64>,
    threshold: Option<f64>,
    epsilon: Option<f64>,
    metric_weights: Option<String>,
    n_clusters: Option<usize>,
    equilibration_count: Option<usize>,
    workdir: Option<PathBuf>,
    names: Option<LayoutNames>,
    restart: bool,
}

impl GrowthConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executable(mut self, path: PathBuf) -> Self {
        self.executable = Some(path);
        self
    }
    pub fn launcher(mut self, launcher: Option<PathBuf>) -> Self {
        self.launcher = launcher;
        self
    }
    pub fn budget_flag(mut self, flag: String) -> Self {
        self.budget_flag = Some(flag);
        self
    }
    pub fn license(mut self, path: PathBuf) -> Self {
        self.license = Some(path);
        self
    }
    pub fn control_template(mut self, path: PathBuf) -> Self {
        self.control_template = Some(path);
        self
    }
    pub fn steps(mut self, steps: usize) -> Self {
        self.steps = Some(steps);
        self
    }
    pub fn equilibration_steps(mut self, steps: usize) -> Self {
        self.equilibration_steps = Some(steps);
        self
    }
    pub fn resource_budget(mut self, budget: usize) -> Self {
        self.resource_budget = Some(budget);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn report_name(mut self, name: String) -> Self {
        self.report_name = Some(name);
        self
    }
    pub fn trajectory_name(mut self, name: String) -> Self {
        self.trajectory_name = Some(name);
        self
    }
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = Some(iterations);
        self
    }
    pub fn overlap_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_overlap = Some(min);
        self.max_overlap = Some(max);
        self
    }
    pub fn criterion(mut self, criterion: String) -> Self {
        self.criterion = Some(criterion);
        self
    }
    pub fn condition(mut self, condition: SelectionCondition) -> Self {
        self.condition = Some(condition);
        self
    }
    pub fn resname(mut self, resname: String) -> Self {
        self.resname = Some(resname);
        self
    }
    pub fn distance_contact(mut self, value: f64) -> Self {
        self.distance_contact = Some(value);
        self
    }
    pub fn threshold(mut self, value: f64) -> Self {
        self.threshold = Some(value);
        self
    }
    pub fn epsilon(mut self, value: f64) -> Self {
        self.epsilon = Some(value);
        self
    }
    pub fn metric_weights(mut self, weights: String) -> Self {
        self.metric_weights = Some(weights);
        self
    }
    pub fn n_clusters(mut self, n: usize) -> Self {
        self.n_clusters = Some(n);
        self
    }
    pub fn equilibration_count(mut self, n: usize) -> Self {
        self.equilibration_count = Some(n);
        self
    }
    pub fn workdir(mut self, path: PathBuf) -> Self {
        self.workdir = Some(path);
        self
    }
    pub fn names(mut self, names: LayoutNames) -> Self {
        self.names = Some(names);
        self
    }
    pub fn restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }

    pub fn build(self) -> Result<GrowthConfig, ConfigError> {
        let resource_budget = self
            .resource_budget
            .ok_or(ConfigError::MissingParameter("resource_budget"))?;
        if resource_budget == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "resource_budget",
                reason: "at least one process is required".to_string(),
            });
        }

        let simulation = SimulationConfig {
            executable: self
                .executable
                .ok_or(ConfigError::MissingParameter("executable"))?,
            launcher: self.launcher,
            budget_flag: self.budget_flag.unwrap_or_else(|| "-np".to_string()),
            license: self
                .license
                .ok_or(ConfigError::MissingParameter("license"))?,
            control_template: self
                .control_template
                .ok_or(ConfigError::MissingParameter("control_template"))?,
            steps: positive("steps", self.steps.unwrap_or(6))?,
            equilibration_steps: positive(
                "equilibration_steps",
                self.equilibration_steps.unwrap_or(20),
            )?,
            resource_budget,
            seed: self.seed.unwrap_or(1279183),
            report_name: self.report_name.unwrap_or_else(|| "report".to_string()),
            trajectory_name: self
                .trajectory_name
                .unwrap_or_else(|| "trajectory".to_string()),
            timeout: self.timeout,
        };

        let schedule = InterpolationSchedule::new(
            self.iterations
                .ok_or(ConfigError::MissingParameter("iterations"))?,
            self.min_overlap.unwrap_or(0.5),
            self.max_overlap.unwrap_or(0.7),
        )
        .map_err(|e| ConfigError::InvalidParameter {
            name: "schedule",
            reason: e.to_string(),
        })?;

        let pool_capacity = resource_budget.saturating_sub(1).max(1);
        let selection = SelectionConfig {
            criterion: self
                .criterion
                .unwrap_or_else(|| DEFAULT_CRITERION.to_string()),
            condition: self.condition.unwrap_or_default(),
            resname: self.resname.unwrap_or_else(|| "GRW".to_string()),
            distance_contact: self.distance_contact.unwrap_or(4.0),
            threshold: self.threshold.unwrap_or(0.3),
            epsilon: self.epsilon.unwrap_or(0.5),
            metric_weights: self.metric_weights.unwrap_or_else(|| "linear".to_string()),
            n_clusters: positive("n_clusters", self.n_clusters.unwrap_or(pool_capacity))?,
            equilibration_count: positive(
                "equilibration_count",
                self.equilibration_count
                    .unwrap_or(DEFAULT_EQUILIBRATION_SELECTION),
            )?,
        };
        if selection.criterion.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "criterion",
                reason: "must not be empty".to_string(),
            });
        }

        let workdir = self
            .workdir
            .ok_or(ConfigError::MissingParameter("workdir"))?;
        if !workdir.is_absolute() {
            return Err(ConfigError::InvalidParameter {
                name: "workdir",
                reason: format!("'{}' is not an absolute path", workdir.display()),
            });
        }

        Ok(GrowthConfig {
            simulation,
            schedule,
            selection,
            workdir,
            names: self.names.unwrap_or_default(),
            restart: self.restart,
        })
    }
}

fn positive(name: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(ConfigError::InvalidParameter {
            name,
            reason: "must be greater than zero".to_string(),
        })
    } else {
        Ok(value)
    }
}
