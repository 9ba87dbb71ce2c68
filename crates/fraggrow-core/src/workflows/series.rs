use super::grow::{self, Collaborators};
use crate::core::io::instructions::{InstructionError, InstructionLine};
use crate::core::layout::RunLayout;
use crate::core::models::run::{GrowthRun, GrowthTarget};
use crate::engine::config::GrowthConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

#[derive(Debug)]
pub struct ChainFailure {
    pub identifier: String,
    pub error: EngineError,
}

#[derive(Debug)]
pub struct ChainReport {
    pub line_number: usize,
    /// Identifiers of the runs that finished, in chain order.
    pub completed: Vec<String>,
    pub failure: Option<ChainFailure>,
    /// Equilibrated selection of the last finished run.
    pub final_selection: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct SeriesReport {
    pub chains: Vec<ChainReport>,
    pub rejected: Vec<InstructionError>,
}

impl SeriesReport {
    pub fn is_success(&self) -> bool {
        self.rejected.is_empty() && self.chains.iter().all(|c| c.failure.is_none())
    }

    pub fn failed_chains(&self) -> impl Iterator<Item = &ChainReport> {
        self.chains.iter().filter(|c| c.failure.is_some())
    }
}

/// Grows every chain of an instruction file in order.
///
/// The first triple of a chain grows from `base_complex`; each later triple
/// grows from the equilibrated selection of the triple before it. A failed run
/// ends its chain, and the series continues with the next line.
#[instrument(skip_all, name = "series_workflow")]
pub fn run(
    base_complex: &Path,
    lines: Vec<Result<InstructionLine, InstructionError>>,
    config: &GrowthConfig,
    collaborators: &Collaborators<'_>,
    reporter: &ProgressReporter,
) -> SeriesReport {
    let mut report = SeriesReport::default();
    let mut seen: HashSet<String> = HashSet::new();

    for line in lines {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Skipping malformed instruction line");
                report.rejected.push(e);
                continue;
            }
        };
        reporter.report(Progress::Message(format!(
            "Instruction line {} ({} fragment(s))",
            line.line_number,
            line.chain.len()
        )));

        let mut chain = ChainReport {
            line_number: line.line_number,
            completed: Vec::new(),
            failure: None,
            final_selection: None,
        };
        let mut complex = base_complex.to_path_buf();

        for instruction in &line.chain {
            let growth = GrowthRun::new(
                GrowthTarget {
                    complex: complex.clone(),
                    fragment_id: instruction.fragment_id.clone(),
                    core_anchor: instruction.core_anchor.clone(),
                    fragment_anchor: instruction.fragment_anchor.clone(),
                },
                config.iterations(),
                config.selection.criterion.clone(),
                config.simulation.resource_budget,
            );
            if !seen.insert(growth.identifier().to_string()) {
                warn!(
                    identifier = growth.identifier(),
                    line = line.line_number,
                    "Identifier already used earlier in this series; its folders will be reused"
                );
            }
            info!(
                line = line.line_number,
                identifier = growth.identifier(),
                complex = %complex.display(),
                "Growing fragment"
            );

            match grow::run(&growth, config, collaborators, reporter) {
                Ok(outcome) => {
                    complex = chained_complex(config, &outcome.identifier);
                    chain.final_selection = Some(complex.clone());
                    chain.completed.push(outcome.identifier);
                }
                Err(e) => {
                    error!(
                        line = line.line_number,
                        identifier = growth.identifier(),
                        error = %e,
                        "Growth run failed, abandoning the rest of this chain"
                    );
                    chain.failure = Some(ChainFailure {
                        identifier: growth.identifier().to_string(),
                        error: e,
                    });
                    break;
                }
            }
        }
        report.chains.push(chain);
    }
    report
}

/// The complex a chained run starts from: the previous run's equilibrated selection.
pub fn chained_complex(config: &GrowthConfig, previous_identifier: &str) -> PathBuf {
    RunLayout::new(&config.workdir, previous_identifier, &config.names).pregrow_selection()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::instructions;
    use crate::engine::config::GrowthConfigBuilder;
    use crate::engine::external::{
        ConfigurationRequest, ExternalError, PreparationRequest, PreparedInputs,
        ReportRankSelector, SimulationConfigurer, SimulationOutput, SimulationRequest,
        SimulationRunner, StructureInterpolator, StructurePreparer, TemplateRequest,
    };
    use std::cell::RefCell;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    /// Records the complex of every run and fabricates its prepared inputs.
    struct RecordingPreparer {
        complexes: RefCell<Vec<PathBuf>>,
    }

    impl StructurePreparer for RecordingPreparer {
        fn prepare(&self, r: &PreparationRequest<'_>) -> Result<PreparedInputs, ExternalError> {
            self.complexes.borrow_mut().push(r.run.complex().to_path_buf());
            if r.run.fragment_id() == "broken" {
                return Err(ExternalError::Selection("cannot attach".to_string()));
            }
            let seed = r.output_dir.join("complex.pdb");
            let initial = r.output_dir.join("initial_template");
            let fin = r.output_dir.join("final_template");
            fs::write(&seed, "MODEL\nENDMDL\n").unwrap();
            fs::write(&initial, "initial").unwrap();
            fs::write(&fin, "final").unwrap();
            Ok(PreparedInputs {
                seed_structure: seed,
                initial_template: initial,
                final_template: fin,
                transformations: Vec::new(),
            })
        }
    }

    struct CopyInterpolator;

    impl StructureInterpolator for CopyInterpolator {
        fn build_template(&self, r: &TemplateRequest<'_>) -> Result<PathBuf, ExternalError> {
            let path = r
                .output_dir
                .join(format!("{}_{}", r.template_name, r.step_index));
            fs::copy(r.initial, &path).unwrap();
            Ok(path)
        }
    }

    struct PlainConfigurer;

    impl SimulationConfigurer for PlainConfigurer {
        fn materialize(&self, r: &ConfigurationRequest<'_>) -> Result<PathBuf, ExternalError> {
            fs::write(r.control_file, r.step_index.to_string()).unwrap();
            Ok(r.control_file.to_path_buf())
        }
    }

    struct FixedRunner;

    impl SimulationRunner for FixedRunner {
        fn run(&self, r: &SimulationRequest<'_>) -> Result<SimulationOutput, ExternalError> {
            let report = r.results_dir.join("report_1");
            let trajectory = r.results_dir.join("trajectory_1.pdb");
            fs::write(&report, "#Step  Binding Energy\n0  -2.0\n1  -3.0\n").unwrap();
            fs::write(&trajectory, "MODEL\nATOM a\nENDMDL\nMODEL\nATOM b\nENDMDL\n").unwrap();
            Ok(SimulationOutput {
                results_dir: r.results_dir.to_path_buf(),
                pairs: vec![(report, trajectory)],
            })
        }
    }

    fn config(dir: &TempDir) -> GrowthConfig {
        GrowthConfigBuilder::new()
            .executable(PathBuf::from("/opt/sim/bin/sim"))
            .license(PathBuf::from("/opt/sim/licenses"))
            .control_template(dir.path().join("control.conf"))
            .resource_budget(3)
            .iterations(1)
            .workdir(dir.path().to_path_buf())
            .build()
            .unwrap()
    }

    fn run_series(dir: &TempDir, content: &str) -> (SeriesReport, Vec<PathBuf>) {
        let preparer = RecordingPreparer {
            complexes: RefCell::new(Vec::new()),
        };
        let tools = Collaborators {
            preparer: &preparer,
            interpolator: &CopyInterpolator,
            configurer: &PlainConfigurer,
            runner: &FixedRunner,
            selector: &ReportRankSelector,
        };
        let base = dir.path().join("receptor.pdb");
        let report = run(
            &base,
            instructions::parse(content),
            &config(dir),
            &tools,
            &ProgressReporter::new(),
        );
        (report, preparer.complexes.into_inner())
    }

    #[test]
    fn chained_triples_grow_from_previous_selection() {
        let dir = tempdir().unwrap();
        let (report, complexes) = run_series(&dir, "amide C3 H1 methyl C7 H2\n");

        assert!(report.is_success());
        assert_eq!(report.chains[0].completed, vec!["amideC3H1", "methylC7H2"]);
        assert_eq!(complexes[0], dir.path().join("receptor.pdb"));
        assert_eq!(complexes[1], chained_complex(&config(&dir), "amideC3H1"));
        assert!(complexes[1].is_file());
    }

    #[test]
    fn malformed_lines_are_rejected_without_running() {
        let dir = tempdir().unwrap();
        let (report, complexes) =
            run_series(&dir, "amide C3 H1 extra\n# comment\n\nmethyl C7 H2\n");

        assert_eq!(report.rejected.len(), 1);
        assert!(matches!(
            report.rejected[0],
            InstructionError::Malformed { line_number: 1, tokens: 4 }
        ));
        assert_eq!(report.chains.len(), 1);
        assert_eq!(report.chains[0].line_number, 4);
        assert_eq!(complexes.len(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn failure_ends_chain_but_not_series() {
        let dir = tempdir().unwrap();
        let (report, complexes) =
            run_series(&dir, "broken C1 H1 amide C3 H1\nmethyl C7 H2\n");

        assert_eq!(report.chains.len(), 2);
        let first = &report.chains[0];
        assert!(first.completed.is_empty());
        assert_eq!(first.failure.as_ref().unwrap().identifier, "brokenC1H1");
        assert!(matches!(
            first.failure.as_ref().unwrap().error,
            EngineError::PreparationFailed(_)
        ));
        assert!(report.chains[1].failure.is_none());
        assert_eq!(report.failed_chains().count(), 1);
        // The second triple of the broken chain never ran.
        assert_eq!(complexes.len(), 2);
    }
}
