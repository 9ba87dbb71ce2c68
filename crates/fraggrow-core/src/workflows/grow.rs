use crate::core::layout::{RunLayout, ensure_dir};
use crate::core::models::iteration::{CandidatePool, IterationState, StepKind};
use crate::core::models::run::GrowthRun;
use crate::core::schedule::InterpolationSchedule;
use crate::engine::config::{ConfigError, GrowthConfig};
use crate::engine::error::EngineError;
use crate::engine::external::{
    ClusterParams, ConfigurationRequest, ExternalError, PreparationRequest, PreparedInputs,
    SelectionRequest, SimulationConfigurer, SimulationOutput, SimulationRequest,
    SimulationRunner, StructureInterpolator, StructurePreparer, StructureSelector,
    TemplateRequest,
};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{RunState, RunStatus};
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

/// The external tools one growth run drives.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub preparer: &'a dyn StructurePreparer,
    pub interpolator: &'a dyn StructureInterpolator,
    pub configurer: &'a dyn SimulationConfigurer,
    pub runner: &'a dyn SimulationRunner,
    pub selector: &'a dyn StructureSelector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Preparing,
    Growing(usize),
    Equilibrating,
    Done,
}

#[derive(Debug, Clone)]
pub struct GrowthOutcome {
    pub identifier: String,
    /// Phases that did work, in order. Iterations skipped on restart are absent.
    pub phases: Vec<RunPhase>,
    pub iterations: Vec<IterationState>,
    pub skipped: Vec<usize>,
    pub equilibration_skipped: bool,
    pub selected: Vec<PathBuf>,
    pub pregrow_selection: PathBuf,
}

impl GrowthOutcome {
    pub fn executed(&self) -> Vec<usize> {
        self.iterations.iter().map(|s| s.index).collect()
    }
}

/// Runs one growth attempt from preparation to the equilibrated selection.
///
/// In restart mode every iteration recorded as complete is skipped; the
/// persisted run state is authoritative and restart sentinels are consulted
/// only when no matching state exists. On failure the run state is saved as
/// aborted before the error is returned.
#[instrument(skip_all, name = "growth_workflow", fields(identifier = run.identifier()))]
pub fn run(
    run: &GrowthRun,
    config: &GrowthConfig,
    collaborators: &Collaborators<'_>,
    reporter: &ProgressReporter,
) -> Result<GrowthOutcome, EngineError> {
    let schedule = InterpolationSchedule::new(
        run.iterations(),
        config.schedule.min_overlap(),
        config.schedule.max_overlap(),
    )
    .map_err(|e| ConfigError::InvalidParameter {
        name: "iterations",
        reason: e.to_string(),
    })?;

    let layout = RunLayout::new(&config.workdir, run.identifier(), &config.names);
    ensure_dir(layout.workdir()).map_err(|e| EngineError::io(layout.workdir(), e))?;
    let state = if config.restart {
        RunState::resume(&layout, run.iterations())?
    } else {
        let state = RunState::new(run.identifier(), run.iterations());
        state.save(&layout.state_file())?;
        state
    };

    info!(
        iterations = run.iterations(),
        budget = run.resource_budget(),
        restart = config.restart,
        last_completed = ?state.last_completed,
        "Starting growth run"
    );

    let mut orchestrator = Orchestrator {
        run,
        config,
        tools: collaborators,
        reporter,
        layout,
        schedule,
        state,
        outcome: GrowthOutcome {
            identifier: run.identifier().to_string(),
            phases: Vec::new(),
            iterations: Vec::new(),
            skipped: Vec::new(),
            equilibration_skipped: false,
            selected: Vec::new(),
            pregrow_selection: PathBuf::new(),
        },
    };

    match orchestrator.execute() {
        Ok(()) => Ok(orchestrator.outcome),
        Err(e) => {
            orchestrator.abort(&e);
            Err(e)
        }
    }
}

struct Orchestrator<'a, 'c> {
    run: &'a GrowthRun,
    config: &'a GrowthConfig,
    tools: &'a Collaborators<'c>,
    reporter: &'a ProgressReporter<'a>,
    layout: RunLayout,
    schedule: InterpolationSchedule,
    state: RunState,
    outcome: GrowthOutcome,
}

impl Orchestrator<'_, '_> {
    fn execute(&mut self) -> Result<(), EngineError> {
        // === Phase 0: Preparation ===
        let prepared = self.prepare()?;

        // === Phase 1: Growing iterations ===
        self.reporter.report(Progress::PhaseStart { name: "Growing" });
        for i in 0..=self.run.iterations() {
            self.grow(i, &prepared)?;
        }
        self.reporter.report(Progress::PhaseFinish);

        // === Phase 2: Equilibration ===
        self.equilibrate(&prepared)?;

        self.outcome.phases.push(RunPhase::Done);
        self.outcome.pregrow_selection = self.layout.pregrow_selection();
        info!(
            executed = self.outcome.iterations.len(),
            skipped = self.outcome.skipped.len(),
            selection = %self.outcome.pregrow_selection.display(),
            "Growth run finished"
        );
        Ok(())
    }

    fn abort(&mut self, cause: &EngineError) {
        let iteration = cause.iteration();
        error!(?iteration, error = %cause, "Growth run aborted");
        self.state.status = RunStatus::Aborted { iteration };
        if let Err(e) = self.state.save(&self.layout.state_file()) {
            warn!(error = %e, "Failed to persist aborted run state");
        }
    }

    fn save_state(&self) -> Result<(), EngineError> {
        Ok(self.state.save(&self.layout.state_file())?)
    }

    fn cluster_params(&self) -> ClusterParams<'_> {
        let selection = &self.config.selection;
        ClusterParams {
            resname: &selection.resname,
            distance_contact: selection.distance_contact,
            threshold: selection.threshold,
            epsilon: selection.epsilon,
            condition: selection.condition,
            metric_weights: &selection.metric_weights,
            n_clusters: selection.n_clusters,
            report_name: &self.config.simulation.report_name,
            trajectory_name: &self.config.simulation.trajectory_name,
        }
    }

    fn template_request<'r>(
        &'r self,
        prepared: &'r PreparedInputs,
        initial: &'r Path,
        step: usize,
        output_dir: &'r Path,
    ) -> TemplateRequest<'r> {
        TemplateRequest {
            initial,
            final_template: &prepared.final_template,
            transformations: &prepared.transformations,
            anchor_atom: self.run.core_anchor(),
            replacement_atom: self.run.fragment_anchor(),
            step_index: step,
            step_total: self.run.iterations(),
            output_dir,
            template_name: self.layout.template_name(),
        }
    }

    fn install_template(&self, source: &Path) -> Result<PathBuf, EngineError> {
        let active = self.layout.active_template();
        if source != active {
            std::fs::copy(source, &active).map_err(|e| EngineError::io(source, e))?;
        }
        Ok(active)
    }

    /// Structures of a completed iteration's pool. Absence of the sentinel is
    /// fatal: the next simulation cannot be configured without it.
    fn completed_pool(&self, iteration: usize) -> Result<CandidatePool, EngineError> {
        let sentinel = self.layout.sentinel(iteration);
        if !sentinel.is_file() {
            return Err(EngineError::MissingArtifact {
                iteration,
                path: sentinel,
            });
        }
        let dir = self.layout.pool_dir(iteration);
        CandidatePool::load(&dir, iteration).map_err(|e| EngineError::io(&dir, e))
    }

    fn prepare(&mut self) -> Result<PreparedInputs, EngineError> {
        self.reporter.report(Progress::PhaseStart {
            name: "Preparation",
        });
        self.outcome.phases.push(RunPhase::Preparing);

        let templates_dir = self.layout.templates_dir();
        let prepared_dir = self.layout.prepared_dir();
        for dir in [&templates_dir, &prepared_dir, &self.layout.pool_root()] {
            ensure_dir(dir).map_err(|e| EngineError::io(dir, e))?;
        }

        let prepared = match self.reusable_preparation() {
            Some(prepared) => {
                info!(
                    complex = %prepared.seed_structure.display(),
                    "Reusing inputs prepared by the interrupted run"
                );
                prepared
            }
            None => {
                let prepared = self
                    .tools
                    .preparer
                    .prepare(&PreparationRequest {
                        run: self.run,
                        output_dir: &prepared_dir,
                    })
                    .map_err(EngineError::PreparationFailed)?;
                self.state.prepared = Some(prepared.clone());
                prepared
            }
        };

        let step_zero = self.layout.step_template(0);
        if self.config.restart && step_zero.is_file() {
            info!(template = %step_zero.display(), "Reusing step-0 template");
        } else {
            let request =
                self.template_request(&prepared, &prepared.initial_template, 0, &templates_dir);
            let built = self
                .tools
                .interpolator
                .build_template(&request)
                .map_err(EngineError::PreparationFailed)?;
            if built != step_zero {
                std::fs::copy(&built, &step_zero).map_err(|e| EngineError::io(&built, e))?;
            }
        }

        if matches!(
            self.state.status,
            RunStatus::Preparing | RunStatus::Aborted { .. }
        ) {
            self.state.status = RunStatus::Growing;
        }
        self.save_state()?;
        self.reporter.report(Progress::PhaseFinish);
        Ok(prepared)
    }

    /// Preparation is one-time: a restarted run keeps the inputs recorded in
    /// its state as long as they are still on disk.
    fn reusable_preparation(&self) -> Option<PreparedInputs> {
        if !self.config.restart {
            return None;
        }
        let prepared = self.state.prepared.as_ref()?;
        if prepared.is_intact() {
            Some(prepared.clone())
        } else {
            warn!("Recorded preparation outputs are missing, preparing again");
            None
        }
    }

    fn grow(&mut self, i: usize, prepared: &PreparedInputs) -> Result<(), EngineError> {
        let total = self.run.iterations();
        if self.state.is_completed(i) {
            info!(iteration = i, "Iteration already complete, skipping");
            self.outcome.skipped.push(i);
            self.reporter.report(Progress::IterationSkipped { index: i });
            return Ok(());
        }
        self.reporter
            .report(Progress::IterationStart { index: i, total });

        let kind = StepKind::classify(i, total);
        let overlap = self.schedule.overlap(i);
        let inputs = if i == 0 {
            vec![prepared.seed_structure.clone()]
        } else {
            self.completed_pool(i - 1)?.into_structures()
        };
        info!(iteration = i, ?kind, %overlap, inputs = inputs.len(), "Growing");

        let failed = |phase: &'static str| {
            move |source: ExternalError| EngineError::IterationFailed {
                iteration: i,
                phase,
                source,
            }
        };

        let results_dir = self.layout.results_dir(i);
        let pool_dir = self.layout.pool_dir(i);
        let templates_dir = self.layout.templates_dir();
        let control_file = self
            .tools
            .configurer
            .materialize(&ConfigurationRequest {
                simulation: &self.config.simulation,
                inputs: &inputs,
                step_index: i,
                overlap,
                output_dir: &results_dir,
                templates_dir: &templates_dir,
                control_file: &self.layout.control_file(),
                steps_override: None,
            })
            .map_err(failed("configuration"))?;

        let template = match kind {
            StepKind::Initial => self.install_template(&self.layout.step_template(0))?,
            StepKind::Intermediate => {
                let previous = self.layout.step_template(i - 1);
                let request = self.template_request(prepared, &previous, i, &templates_dir);
                let built = self
                    .tools
                    .interpolator
                    .build_template(&request)
                    .map_err(failed("interpolation"))?;
                self.install_template(&built)?
            }
            StepKind::Final => self.install_template(&prepared.final_template)?,
        };

        for dir in [&results_dir, &pool_dir] {
            ensure_dir(dir).map_err(|e| EngineError::io(dir, e))?;
        }
        clear_structures(&pool_dir)?;

        let output = self
            .tools
            .runner
            .run(&SimulationRequest {
                control_file: &control_file,
                results_dir: &results_dir,
                resource_budget: self.run.resource_budget(),
            })
            .map_err(failed("simulation"))?;

        self.select(i, &output, &pool_dir);

        let pool = self.completed_pool(i)?;
        let capacity = self.run.pool_capacity();
        if pool.len() < capacity {
            warn!(
                iteration = i,
                selected = pool.len(),
                expected = capacity,
                "Candidate pool is smaller than the resource budget allows"
            );
        }

        self.state.mark_completed(i);
        self.save_state()?;
        self.outcome.phases.push(RunPhase::Growing(i));
        self.outcome.iterations.push(IterationState {
            index: i,
            kind,
            inputs,
            template,
            overlap,
            control_file,
            results_dir,
            pool_dir,
        });
        self.reporter.report(Progress::IterationFinish { index: i });
        Ok(())
    }

    /// Ranks and clusters one simulation into `pool_dir`. Failures are logged;
    /// the caller decides whether the pool is usable.
    fn select(&self, i: usize, output: &SimulationOutput, pool_dir: &Path) {
        let Some(report) = output.report() else {
            error!(iteration = i, "Simulation produced no report, nothing to select");
            return;
        };
        let column = match self.tools.selector.rank(report, self.run.criterion()) {
            Ok(column) => column,
            Err(e) => {
                error!(
                    iteration = i,
                    criterion = self.run.criterion(),
                    error = %e,
                    "Ranking criterion not found in report, skipping selection"
                );
                return;
            }
        };
        let params = self.cluster_params();
        let request = SelectionRequest {
            output,
            column,
            max_structures: self.run.pool_capacity(),
            output_dir: pool_dir,
            params: &params,
        };
        if let Err(e) = self.tools.selector.cluster(&request) {
            error!(iteration = i, error = %e, "Selection of candidate structures failed");
        }
    }

    fn equilibrate(&mut self, prepared: &PreparedInputs) -> Result<(), EngineError> {
        if self.state.is_done() {
            info!("Equilibration already complete, skipping");
            self.outcome.equilibration_skipped = true;
            let dir = self.layout.selected_dir();
            self.outcome.selected = CandidatePool::load(&dir, self.run.iterations() + 1)
                .map_err(|e| EngineError::io(&dir, e))?
                .into_structures();
            return Ok(());
        }

        self.reporter.report(Progress::PhaseStart {
            name: "Equilibration",
        });
        self.outcome.phases.push(RunPhase::Equilibrating);
        self.state.status = RunStatus::Equilibrating;
        self.save_state()?;

        let total = self.run.iterations();
        let inputs = self.completed_pool(total)?.into_structures();
        self.install_template(&prepared.final_template)?;

        let failed = |phase: &'static str| {
            move |source: ExternalError| EngineError::EquilibrationFailed { phase, source }
        };

        let results_dir = self.layout.equilibration_dir();
        let selected_dir = self.layout.selected_dir();
        let templates_dir = self.layout.templates_dir();
        for dir in [&results_dir, &selected_dir, &self.layout.pregrow_dir()] {
            ensure_dir(dir).map_err(|e| EngineError::io(dir, e))?;
        }
        clear_structures(&selected_dir)?;

        info!(
            inputs = inputs.len(),
            steps = self.config.simulation.equilibration_steps,
            "Equilibrating final candidate pool"
        );
        let control_file = self
            .tools
            .configurer
            .materialize(&ConfigurationRequest {
                simulation: &self.config.simulation,
                inputs: &inputs,
                step_index: total + 1,
                overlap: self.schedule.overlap(total),
                output_dir: &results_dir,
                templates_dir: &templates_dir,
                control_file: &self.layout.control_file(),
                steps_override: Some(self.config.simulation.equilibration_steps),
            })
            .map_err(failed("configuration"))?;

        let output = self
            .tools
            .runner
            .run(&SimulationRequest {
                control_file: &control_file,
                results_dir: &results_dir,
                resource_budget: self.run.resource_budget(),
            })
            .map_err(failed("simulation"))?;

        let report = output.report().ok_or_else(|| EngineError::EquilibrationFailed {
            phase: "ranking",
            source: ExternalError::MissingOutput {
                path: results_dir.join(&self.config.simulation.report_name),
            },
        })?;
        let column = self
            .tools
            .selector
            .rank(report, self.run.criterion())
            .map_err(failed("ranking"))?;
        let params = self.cluster_params();
        let selected = self
            .tools
            .selector
            .select_best(&SelectionRequest {
                output: &output,
                column,
                max_structures: self.config.selection.equilibration_count,
                output_dir: &selected_dir,
                params: &params,
            })
            .map_err(failed("selection"))?;

        let top = selected.first().ok_or_else(|| EngineError::EquilibrationFailed {
            phase: "selection",
            source: ExternalError::Selection("no structure was selected".to_string()),
        })?;
        let pregrow = self.layout.pregrow_selection();
        std::fs::copy(top, &pregrow).map_err(|e| EngineError::io(&pregrow, e))?;

        self.state.status = RunStatus::Done;
        self.save_state()?;
        self.outcome.selected = selected;
        self.reporter.report(Progress::PhaseFinish);
        Ok(())
    }
}

/// Removes structures left behind by an earlier, incomplete attempt.
fn clear_structures(dir: &Path) -> Result<(), EngineError> {
    let pool = CandidatePool::load(dir, 0).map_err(|e| EngineError::io(dir, e))?;
    for path in pool.structures() {
        std::fs::remove_file(path).map_err(|e| EngineError::io(path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout::LayoutNames;
    use crate::core::models::iteration::basenames;
    use crate::core::models::run::GrowthTarget;
    use crate::engine::config::GrowthConfigBuilder;
    use crate::engine::external::ReportRankSelector;
    use std::cell::{Cell, RefCell};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    struct FakePreparer {
        inputs: PreparedInputs,
        calls: Cell<usize>,
    }

    impl StructurePreparer for FakePreparer {
        fn prepare(&self, _: &PreparationRequest<'_>) -> Result<PreparedInputs, ExternalError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.inputs.clone())
        }
    }

    #[derive(Default)]
    struct FakeInterpolator {
        steps: RefCell<Vec<usize>>,
    }

    impl StructureInterpolator for FakeInterpolator {
        fn build_template(&self, r: &TemplateRequest<'_>) -> Result<PathBuf, ExternalError> {
            self.steps.borrow_mut().push(r.step_index);
            let path = r
                .output_dir
                .join(format!("{}_{}", r.template_name, r.step_index));
            fs::write(&path, format!("template step {}", r.step_index)).unwrap();
            Ok(path)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Configured {
        step: usize,
        inputs: Vec<PathBuf>,
        overlap: String,
        steps_override: Option<usize>,
    }

    #[derive(Default)]
    struct FakeConfigurer {
        calls: RefCell<Vec<Configured>>,
    }

    impl SimulationConfigurer for FakeConfigurer {
        fn materialize(&self, r: &ConfigurationRequest<'_>) -> Result<PathBuf, ExternalError> {
            self.calls.borrow_mut().push(Configured {
                step: r.step_index,
                inputs: r.inputs.to_vec(),
                overlap: r.overlap.to_string(),
                steps_override: r.steps_override,
            });
            fs::write(r.control_file, format!("step {}", r.step_index)).unwrap();
            Ok(r.control_file.to_path_buf())
        }
    }

    /// Writes a report and trajectory with `snapshots` models, and records
    /// which template was active when each simulation ran.
    struct FakeRunner {
        active_template: PathBuf,
        fail_in: Option<PathBuf>,
        snapshots: usize,
        runs: RefCell<Vec<(PathBuf, String)>>,
    }

    impl SimulationRunner for FakeRunner {
        fn run(&self, r: &SimulationRequest<'_>) -> Result<SimulationOutput, ExternalError> {
            let template = fs::read_to_string(&self.active_template).unwrap();
            self.runs
                .borrow_mut()
                .push((r.results_dir.to_path_buf(), template));
            if self.fail_in.as_deref() == Some(r.results_dir) {
                return Err(ExternalError::MissingOutput {
                    path: r.results_dir.join("report_1"),
                });
            }
            let report = r.results_dir.join("report_1");
            let trajectory = r.results_dir.join("trajectory_1.pdb");
            let rows: String = (0..self.snapshots)
                .map(|m| format!("{}  {:.1}\n", m, -1.5 - (m % 3) as f64))
                .collect();
            fs::write(&report, format!("#Step  Binding Energy\n{}", rows)).unwrap();
            let models: String = (0..self.snapshots)
                .map(|m| format!("MODEL\nATOM      1  C1  GRW L   1 m{}\nENDMDL\n", m))
                .collect();
            fs::write(&trajectory, models).unwrap();
            Ok(SimulationOutput {
                results_dir: r.results_dir.to_path_buf(),
                pairs: vec![(report, trajectory)],
            })
        }
    }

    /// Ranks normally but never writes any structure.
    struct EmptySelector;

    impl StructureSelector for EmptySelector {
        fn rank(&self, report: &Path, criterion: &str) -> Result<usize, ExternalError> {
            ReportRankSelector.rank(report, criterion)
        }
        fn cluster(&self, _: &SelectionRequest<'_>) -> Result<Vec<PathBuf>, ExternalError> {
            Ok(Vec::new())
        }
    }

    struct Fixture {
        dir: TempDir,
        preparer: FakePreparer,
        interpolator: FakeInterpolator,
        configurer: FakeConfigurer,
        runner: FakeRunner,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let inputs_dir = dir.path().join("inputs");
            fs::create_dir_all(&inputs_dir).unwrap();
            let seed = inputs_dir.join("complex.pdb");
            let initial = inputs_dir.join("initial_template");
            let final_template = inputs_dir.join("final_template");
            fs::write(&seed, "MODEL\nATOM seed\nENDMDL\n").unwrap();
            fs::write(&initial, "initial").unwrap();
            fs::write(&final_template, "final").unwrap();

            let layout = RunLayout::new(dir.path(), "fragC3H1", &LayoutNames::default());
            Self {
                preparer: FakePreparer {
                    inputs: PreparedInputs {
                        seed_structure: seed,
                        initial_template: initial,
                        final_template,
                        transformations: Vec::new(),
                    },
                    calls: Cell::new(0),
                },
                interpolator: FakeInterpolator::default(),
                configurer: FakeConfigurer::default(),
                runner: FakeRunner {
                    active_template: layout.active_template(),
                    fail_in: None,
                    snapshots: 3,
                    runs: RefCell::new(Vec::new()),
                },
                dir,
            }
        }

        fn layout(&self) -> RunLayout {
            RunLayout::new(self.dir.path(), "fragC3H1", &LayoutNames::default())
        }

        fn growth_run(&self, criterion: &str) -> GrowthRun {
            GrowthRun::new(
                GrowthTarget {
                    complex: self.preparer.inputs.seed_structure.clone(),
                    fragment_id: "frag.pdb".to_string(),
                    core_anchor: "C3".to_string(),
                    fragment_anchor: "H1".to_string(),
                },
                3,
                criterion,
                4,
            )
        }

        fn config(&self, restart: bool) -> GrowthConfig {
            GrowthConfigBuilder::new()
                .executable(PathBuf::from("/opt/sim/bin/sim"))
                .license(PathBuf::from("/opt/sim/licenses"))
                .control_template(self.dir.path().join("control_template.conf"))
                .resource_budget(4)
                .iterations(3)
                .workdir(self.dir.path().to_path_buf())
                .restart(restart)
                .build()
                .unwrap()
        }

        fn run_with(
            &self,
            selector: &dyn StructureSelector,
            criterion: &str,
            restart: bool,
        ) -> Result<GrowthOutcome, EngineError> {
            let tools = Collaborators {
                preparer: &self.preparer,
                interpolator: &self.interpolator,
                configurer: &self.configurer,
                runner: &self.runner,
                selector,
            };
            run(
                &self.growth_run(criterion),
                &self.config(restart),
                &tools,
                &ProgressReporter::new(),
            )
        }

        fn run(&self, restart: bool) -> Result<GrowthOutcome, EngineError> {
            self.run_with(&ReportRankSelector, "Binding Energy", restart)
        }

        fn simulation_count(&self) -> usize {
            self.runner.runs.borrow().len()
        }
    }

    #[test]
    fn full_run_reaches_done_with_linear_overlaps() {
        let fx = Fixture::new();
        let outcome = fx.run(false).unwrap();

        assert_eq!(outcome.executed(), vec![0, 1, 2, 3]);
        assert_eq!(
            outcome.phases,
            vec![
                RunPhase::Preparing,
                RunPhase::Growing(0),
                RunPhase::Growing(1),
                RunPhase::Growing(2),
                RunPhase::Growing(3),
                RunPhase::Equilibrating,
                RunPhase::Done,
            ]
        );
        let overlaps: Vec<String> = fx
            .configurer
            .calls
            .borrow()
            .iter()
            .map(|c| c.overlap.clone())
            .collect();
        assert_eq!(overlaps, vec!["0.50", "0.57", "0.63", "0.70", "0.70"]);
        assert_eq!(fx.simulation_count(), 5);

        let layout = fx.layout();
        assert!(layout.pregrow_selection().is_file());
        assert_eq!(outcome.selected.len(), 3);
        let state = RunState::load(&layout.state_file()).unwrap().unwrap();
        assert_eq!(state.status, RunStatus::Done);
        assert_eq!(state.last_completed, Some(3));
    }

    #[test]
    fn first_iteration_uses_seed_and_equilibration_uses_final_pool() {
        let fx = Fixture::new();
        fx.run(false).unwrap();

        let calls = fx.configurer.calls.borrow();
        assert_eq!(calls[0].inputs, vec![fx.preparer.inputs.seed_structure.clone()]);
        let equilibration = calls.last().unwrap();
        assert_eq!(equilibration.step, 4);
        assert_eq!(equilibration.steps_override, Some(20));
        assert_eq!(
            basenames(&equilibration.inputs),
            CandidatePool::load(&fx.layout().pool_dir(3), 3).unwrap().basenames()
        );
    }

    #[test]
    fn each_iteration_consumes_the_previous_pool() {
        let fx = Fixture::new();
        fx.run(false).unwrap();

        let layout = fx.layout();
        let calls = fx.configurer.calls.borrow();
        for i in 1..=3 {
            let pool = CandidatePool::load(&layout.pool_dir(i - 1), i - 1).unwrap();
            assert_eq!(pool.len(), 3);
            assert_eq!(basenames(&calls[i].inputs), pool.basenames());
        }
    }

    #[test]
    fn boundary_steps_never_interpolate() {
        let fx = Fixture::new();
        fx.run(false).unwrap();

        // Step 0 is built once during preparation; only 0 < i < N interpolate.
        assert_eq!(*fx.interpolator.steps.borrow(), vec![0, 1, 2]);
        let templates: Vec<String> = fx
            .runner
            .runs
            .borrow()
            .iter()
            .map(|(_, t)| t.clone())
            .collect();
        assert_eq!(
            templates,
            vec![
                "template step 0",
                "template step 1",
                "template step 2",
                "final",
                "final",
            ]
        );
    }

    #[test]
    fn restart_after_completion_runs_no_simulation() {
        let fx = Fixture::new();
        fx.run(false).unwrap();
        let before = fx.simulation_count();

        let outcome = fx.run(true).unwrap();

        assert_eq!(fx.simulation_count(), before);
        assert!(outcome.executed().is_empty());
        assert_eq!(outcome.skipped, vec![0, 1, 2, 3]);
        assert!(outcome.equilibration_skipped);
        assert_eq!(outcome.phases, vec![RunPhase::Preparing, RunPhase::Done]);
        assert_eq!(outcome.selected.len(), 3);
    }

    #[test]
    fn simulation_failure_aborts_and_restart_resumes_at_failed_iteration() {
        let mut fx = Fixture::new();
        let failing = fx.layout().results_dir(2);
        fx.runner.fail_in = Some(failing);

        let err = fx.run(false).unwrap_err();
        assert!(matches!(
            err,
            EngineError::IterationFailed { iteration: 2, phase: "simulation", .. }
        ));
        let state = RunState::load(&fx.layout().state_file()).unwrap().unwrap();
        assert_eq!(state.last_completed, Some(1));
        assert_eq!(state.status, RunStatus::Aborted { iteration: Some(2) });

        fx.runner.fail_in = None;
        let outcome = fx.run(true).unwrap();
        assert_eq!(outcome.skipped, vec![0, 1]);
        assert_eq!(outcome.executed(), vec![2, 3]);
    }

    #[test]
    fn restart_without_state_file_falls_back_to_sentinels() {
        let fx = Fixture::new();
        fx.run(false).unwrap();
        let layout = fx.layout();
        fs::remove_file(layout.state_file()).unwrap();
        fs::remove_file(layout.sentinel(2)).unwrap();
        let before = fx.simulation_count();

        let outcome = fx.run(true).unwrap();

        assert_eq!(outcome.skipped, vec![0, 1]);
        assert_eq!(outcome.executed(), vec![2, 3]);
        // Iterations 2 and 3 plus equilibration.
        assert_eq!(fx.simulation_count() - before, 3);
    }

    #[test]
    fn restart_reconfigures_identically() {
        let fx = Fixture::new();
        fx.run(false).unwrap();
        let layout = fx.layout();
        let first = fx.configurer.calls.borrow()[2].clone();
        fs::remove_file(layout.state_file()).unwrap();
        fs::remove_file(layout.sentinel(2)).unwrap();

        fx.run(true).unwrap();

        let calls = fx.configurer.calls.borrow();
        let again = calls.iter().rev().find(|c| c.step == 2).unwrap();
        assert_eq!(*again, first);
    }

    #[test]
    fn empty_selection_fails_fast_with_missing_artifact() {
        let fx = Fixture::new();
        let err = fx.run_with(&EmptySelector, "Binding Energy", false).unwrap_err();

        assert!(matches!(err, EngineError::MissingArtifact { iteration: 0, .. }));
        assert_eq!(fx.simulation_count(), 1);
        let state = RunState::load(&fx.layout().state_file()).unwrap().unwrap();
        assert_eq!(state.status, RunStatus::Aborted { iteration: Some(0) });
    }

    #[test]
    fn unknown_criterion_skips_selection_and_fails_fast() {
        let fx = Fixture::new();
        let err = fx
            .run_with(&ReportRankSelector, "Total Energy", false)
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingArtifact { iteration: 0, .. }));
    }

    #[test]
    fn fresh_run_ignores_previous_progress() {
        let fx = Fixture::new();
        fx.run(false).unwrap();
        let before = fx.simulation_count();

        let outcome = fx.run(false).unwrap();

        assert_eq!(outcome.executed(), vec![0, 1, 2, 3]);
        assert_eq!(fx.simulation_count() - before, 5);
    }

    #[test]
    fn progress_events_cover_every_iteration() {
        use std::sync::{Arc, Mutex};
        let fx = Fixture::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |p| {
            if let Progress::IterationFinish { index } = p {
                sink.lock().unwrap().push(index);
            }
        }));
        let tools = Collaborators {
            preparer: &fx.preparer,
            interpolator: &fx.interpolator,
            configurer: &fx.configurer,
            runner: &fx.runner,
            selector: &ReportRankSelector,
        };
        run(&fx.growth_run("Binding Energy"), &fx.config(false), &tools, &reporter).unwrap();
        assert_eq!(*events.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn restart_reuses_prepared_inputs() {
        let fx = Fixture::new();
        fx.run(false).unwrap();
        assert_eq!(fx.preparer.calls.get(), 1);
        let state = RunState::load(&fx.layout().state_file()).unwrap().unwrap();
        assert_eq!(state.prepared.as_ref(), Some(&fx.preparer.inputs));

        fx.run(true).unwrap();
        assert_eq!(fx.preparer.calls.get(), 1);

        fs::remove_file(fx.layout().sentinel(3)).unwrap();
        let mut state = RunState::load(&fx.layout().state_file()).unwrap().unwrap();
        state.last_completed = Some(2);
        state.status = RunStatus::Aborted { iteration: Some(3) };
        state.save(&fx.layout().state_file()).unwrap();

        let outcome = fx.run(true).unwrap();
        assert_eq!(outcome.executed(), vec![3]);
        assert_eq!(fx.preparer.calls.get(), 1);
    }

    #[test]
    fn restart_prepares_again_when_prepared_files_are_gone() {
        let fx = Fixture::new();
        fx.run(false).unwrap();
        let mut state = RunState::load(&fx.layout().state_file()).unwrap().unwrap();
        if let Some(prepared) = state.prepared.as_mut() {
            prepared.final_template = fx.dir.path().join("gone");
        }
        state.save(&fx.layout().state_file()).unwrap();

        fx.run(true).unwrap();

        assert_eq!(fx.preparer.calls.get(), 2);
        let state = RunState::load(&fx.layout().state_file()).unwrap().unwrap();
        assert_eq!(state.prepared.as_ref(), Some(&fx.preparer.inputs));
    }

    #[test]
    fn short_pools_still_feed_every_iteration() {
        let mut fx = Fixture::new();
        fx.runner.snapshots = 2;
        let outcome = fx.run(false).unwrap();

        assert_eq!(outcome.executed(), vec![0, 1, 2, 3]);
        assert_eq!(outcome.phases.last(), Some(&RunPhase::Done));
        let layout = fx.layout();
        let calls = fx.configurer.calls.borrow();
        for i in 1..=3 {
            let pool = CandidatePool::load(&layout.pool_dir(i - 1), i - 1).unwrap();
            assert_eq!(pool.len(), 2);
            assert!(pool.len() < fx.growth_run("Binding Energy").pool_capacity());
            assert_eq!(basenames(&calls[i].inputs), pool.basenames());
        }
        assert_eq!(outcome.selected.len(), 2);
    }
}
