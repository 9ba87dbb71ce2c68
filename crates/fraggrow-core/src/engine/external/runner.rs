use super::process::ExternalCommand;
use super::{
    ExternalError, SimulationOutput, SimulationRequest, SimulationRunner, require_file,
    require_output,
};
use crate::engine::config::SimulationConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const SIMULATION_LOG: &str = "simulation.log";

/// Launches the simulation executable, optionally through an MPI-style
/// launcher that receives the resource budget.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    pub executable: PathBuf,
    pub launcher: Option<PathBuf>,
    pub budget_flag: String,
    pub report_name: String,
    pub trajectory_name: String,
    pub timeout: Option<Duration>,
}

impl CommandRunner {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            launcher: config.launcher.clone(),
            budget_flag: config.budget_flag.clone(),
            report_name: config.report_name.clone(),
            trajectory_name: config.trajectory_name.clone(),
            timeout: config.timeout,
        }
    }

    pub fn command(&self, request: &SimulationRequest<'_>) -> ExternalCommand {
        let cmd = match &self.launcher {
            Some(launcher) => ExternalCommand::new(launcher)
                .arg(&self.budget_flag)
                .arg(request.resource_budget.to_string())
                .arg(&self.executable),
            None => ExternalCommand::new(&self.executable),
        };
        cmd.arg(request.control_file)
            .current_dir(request.results_dir)
            .log_file(&request.results_dir.join(SIMULATION_LOG))
            .timeout(self.timeout)
    }
}

impl SimulationRunner for CommandRunner {
    fn run(&self, request: &SimulationRequest<'_>) -> Result<SimulationOutput, ExternalError> {
        require_file(request.control_file)?;
        std::fs::create_dir_all(request.results_dir)
            .map_err(|e| ExternalError::io(request.results_dir, e))?;

        let cmd = self.command(request);
        info!(
            command = %cmd.command_line(),
            results = %request.results_dir.display(),
            "Starting simulation"
        );
        cmd.run()?;

        collect_output(
            request.results_dir,
            &self.report_name,
            &self.trajectory_name,
        )
    }
}

/// Gathers `<report>_<k>` / `<trajectory>_<k>.pdb` pairs for `k = 1, 2, ...`
/// until the first missing report. The first pair must exist.
pub fn collect_output(
    results_dir: &Path,
    report_name: &str,
    trajectory_name: &str,
) -> Result<SimulationOutput, ExternalError> {
    let report = |k: usize| results_dir.join(format!("{}_{}", report_name, k));
    let trajectory = |k: usize| results_dir.join(format!("{}_{}.pdb", trajectory_name, k));

    require_output(&report(1))?;
    require_output(&trajectory(1))?;

    let pairs = (1..)
        .map(|k| (report(k), trajectory(k)))
        .take_while(|(r, t)| r.is_file() && t.is_file())
        .collect();
    Ok(SimulationOutput {
        results_dir: results_dir.to_path_buf(),
        pairs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn runner(executable: &str, launcher: Option<&str>) -> CommandRunner {
        CommandRunner {
            executable: PathBuf::from(executable),
            launcher: launcher.map(PathBuf::from),
            budget_flag: "-np".to_string(),
            report_name: "report".to_string(),
            trajectory_name: "trajectory".to_string(),
            timeout: None,
        }
    }

    #[test]
    fn launcher_receives_budget_before_executable() {
        let r = runner("/opt/sim/bin/sim", Some("mpirun"));
        let cmd = r.command(&SimulationRequest {
            control_file: Path::new("/w/control_x.conf"),
            results_dir: Path::new("/w/out"),
            resource_budget: 48,
        });
        assert_eq!(
            cmd.command_line(),
            "mpirun -np 48 /opt/sim/bin/sim /w/control_x.conf"
        );
    }

    #[test]
    fn collect_output_requires_first_pair_and_stops_at_gap() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            collect_output(dir.path(), "report", "trajectory"),
            Err(ExternalError::MissingOutput { .. })
        ));

        for k in [1, 2, 4] {
            fs::write(dir.path().join(format!("report_{}", k)), "").unwrap();
            fs::write(dir.path().join(format!("trajectory_{}.pdb", k)), "").unwrap();
        }
        let out = collect_output(dir.path(), "report", "trajectory").unwrap();
        assert_eq!(out.pairs.len(), 2);
        assert_eq!(out.report(), Some(dir.path().join("report_1").as_path()));
    }

    #[cfg(unix)]
    #[test]
    fn run_executes_in_results_dir_and_checks_outputs() {
        let dir = tempdir().unwrap();
        // With `sh` as the executable, the control file is the script it runs.
        let control = dir.path().join("control.conf");
        fs::write(
            &control,
            "printf '#Step  Binding Energy\\n1  -3.5\\n' > report_1\necho MODEL > trajectory_1.pdb\n",
        )
        .unwrap();
        let results = dir.path().join("growing_output_x_step0");

        let out = runner("sh", None)
            .run(&SimulationRequest {
                control_file: &control,
                results_dir: &results,
                resource_budget: 2,
            })
            .unwrap();

        assert_eq!(out.pairs.len(), 1);
        assert!(results.join("report_1").is_file());
        assert!(results.join(SIMULATION_LOG).is_file());
    }

    #[cfg(unix)]
    #[test]
    fn missing_report_after_success_is_an_error() {
        let dir = tempdir().unwrap();
        let control = dir.path().join("control.conf");
        fs::write(&control, "exit 0\n").unwrap();
        let results = dir.path().join("out");
        let err = runner("sh", None)
            .run(&SimulationRequest {
                control_file: &control,
                results_dir: &results,
                resource_budget: 1,
            })
            .unwrap_err();
        assert!(matches!(err, ExternalError::MissingOutput { .. }));
    }
}
