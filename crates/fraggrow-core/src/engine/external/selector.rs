use super::process::ExternalCommand;
use super::{ExternalError, SelectionRequest, StructureSelector};
use crate::core::io::pdb::Trajectory;
use crate::core::io::report::Report;
use crate::core::models::iteration::CandidatePool;
use crate::engine::config::SelectionCondition;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const SELECTION_SUMMARY: &str = "selection.csv";

/// Native ranking: every snapshot of every report/trajectory pair is scored by
/// one report column and the best ones are written as standalone structures.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportRankSelector;

impl StructureSelector for ReportRankSelector {
    fn rank(&self, report: &Path, criterion: &str) -> Result<usize, ExternalError> {
        Ok(Report::load(report)?.column_index(criterion)?)
    }

    fn cluster(&self, request: &SelectionRequest<'_>) -> Result<Vec<PathBuf>, ExternalError> {
        let limit = request.max_structures.min(request.params.n_clusters);
        select_ranked(&SelectionRequest {
            max_structures: limit,
            ..request.clone()
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    value: f64,
    pair: usize,
    model: usize,
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    rank: usize,
    value: f64,
    report: &'a str,
    trajectory: &'a str,
    model: usize,
    structure: &'a str,
}

fn compare(condition: SelectionCondition, a: &Candidate, b: &Candidate) -> Ordering {
    let by_value = match condition {
        SelectionCondition::Min => a.value.total_cmp(&b.value),
        SelectionCondition::Max => b.value.total_cmp(&a.value),
    };
    by_value
        .then(a.pair.cmp(&b.pair))
        .then(a.model.cmp(&b.model))
}

/// Writes the `max_structures` best snapshots as `initial_<rank>_0.pdb`, best
/// first, and a `selection.csv` summary next to them.
pub fn select_ranked(request: &SelectionRequest<'_>) -> Result<Vec<PathBuf>, ExternalError> {
    let pairs = &request.output.pairs;
    let mut candidates = Vec::new();
    for (pair, (report_path, _)) in pairs.iter().enumerate() {
        let report = Report::load(report_path)?;
        for (model, value) in report.column(request.column).enumerate() {
            if value.is_finite() {
                candidates.push(Candidate { value, pair, model });
            }
        }
    }
    if candidates.is_empty() {
        return Err(ExternalError::Selection(format!(
            "no finite values in column {} of {} report(s) under '{}'",
            request.column,
            pairs.len(),
            request.output.results_dir.display()
        )));
    }
    candidates.sort_by(|a, b| compare(request.params.condition, a, b));

    std::fs::create_dir_all(request.output_dir)
        .map_err(|e| ExternalError::io(request.output_dir, e))?;

    let mut trajectories: HashMap<usize, Trajectory> = HashMap::new();
    let mut written = Vec::new();
    let mut summary = Vec::new();
    for candidate in candidates {
        if written.len() >= request.max_structures {
            break;
        }
        let (report_path, trajectory_path) = &pairs[candidate.pair];
        let trajectory = match trajectories.entry(candidate.pair) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(Trajectory::load(trajectory_path)?)
            }
        };
        if trajectory.model(candidate.model).is_none() {
            warn!(
                trajectory = %trajectory_path.display(),
                model = candidate.model,
                available = trajectory.len(),
                "Report row has no matching trajectory model, skipping"
            );
            continue;
        }
        let target = request
            .output_dir
            .join(format!("initial_{}_0.pdb", written.len()));
        trajectory.write_model(candidate.model, trajectory_path, &target)?;
        summary.push((written.len(), candidate, report_path, trajectory_path));
        written.push(target);
    }

    write_summary(request.output_dir, &summary, &written)?;
    debug!(
        selected = written.len(),
        output = %request.output_dir.display(),
        "Selection written"
    );
    Ok(written)
}

fn write_summary(
    dir: &Path,
    rows: &[(usize, Candidate, &PathBuf, &PathBuf)],
    written: &[PathBuf],
) -> Result<(), ExternalError> {
    let path = dir.join(SELECTION_SUMMARY);
    let csv_err = |e| ExternalError::Csv {
        path: path.to_string_lossy().to_string(),
        source: e,
    };
    let mut writer = csv::Writer::from_path(&path).map_err(csv_err)?;
    for ((rank, candidate, report, trajectory), structure) in rows.iter().zip(written) {
        writer
            .serialize(SummaryRow {
                rank: *rank,
                value: candidate.value,
                report: &report.to_string_lossy(),
                trajectory: &trajectory.to_string_lossy(),
                model: candidate.model,
                structure: &structure.to_string_lossy(),
            })
            .map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|e| ExternalError::io(&path, e))
}

/// Delegates clustering to an external program; ranking stays native.
#[derive(Debug, Clone)]
pub struct CommandClusterer {
    pub program: PathBuf,
    pub program_args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl CommandClusterer {
    fn command(&self, request: &SelectionRequest<'_>) -> ExternalCommand {
        let p = request.params;
        let results = &request.output.results_dir;
        ExternalCommand::new(&self.program)
            .args(&self.program_args)
            .named("resname", p.resname)
            .named("cpus", (request.max_structures + 1).to_string())
            .named("column", request.column.to_string())
            .named("distance-contact", p.distance_contact.to_string())
            .named("threshold", p.threshold.to_string())
            .named(
                "trajectory",
                results.join(format!("{}_*.pdb", p.trajectory_name)),
            )
            .named("output-dir", request.output_dir)
            .named("epsilon", p.epsilon.to_string())
            .named("report", results.join(p.report_name))
            .named("condition", p.condition.as_str())
            .named("metric-weights", p.metric_weights)
            .named("n-clusters", p.n_clusters.to_string())
            .current_dir(results)
            .log_file(&results.join("clustering.log"))
            .timeout(self.timeout)
    }
}

impl StructureSelector for CommandClusterer {
    fn rank(&self, report: &Path, criterion: &str) -> Result<usize, ExternalError> {
        ReportRankSelector.rank(report, criterion)
    }

    fn cluster(&self, request: &SelectionRequest<'_>) -> Result<Vec<PathBuf>, ExternalError> {
        std::fs::create_dir_all(request.output_dir)
            .map_err(|e| ExternalError::io(request.output_dir, e))?;
        self.command(request).run()?;

        let pool = CandidatePool::load(request.output_dir, 0)
            .map_err(|e| ExternalError::io(request.output_dir, e))?;
        if pool.len() > request.max_structures {
            warn!(
                produced = pool.len(),
                limit = request.max_structures,
                "Clustering produced more structures than requested"
            );
        }
        Ok(pool.into_structures())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::external::{ClusterParams, SimulationOutput};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn params(condition: SelectionCondition) -> ClusterParams<'static> {
        ClusterParams {
            resname: "GRW",
            distance_contact: 4.0,
            threshold: 0.3,
            epsilon: 0.5,
            condition,
            metric_weights: "linear",
            n_clusters: 10,
            report_name: "report",
            trajectory_name: "trajectory",
        }
    }

    fn model(tag: &str) -> String {
        format!("MODEL\nATOM      1  C1  GRW L   1      {}\nENDMDL\n", tag)
    }

    /// Two workers; values per snapshot are listed in row order.
    fn simulation(values: &[&[f64]]) -> (TempDir, SimulationOutput) {
        let dir = tempdir().unwrap();
        let mut pairs = Vec::new();
        for (w, rows) in values.iter().enumerate() {
            let report = dir.path().join(format!("report_{}", w + 1));
            let trajectory = dir.path().join(format!("trajectory_{}.pdb", w + 1));
            let mut r = String::from("#Step  Binding Energy\n");
            let mut t = String::new();
            for (i, v) in rows.iter().enumerate() {
                r.push_str(&format!("{}  {}\n", i, v));
                t.push_str(&model(&format!("w{}m{}", w + 1, i)));
            }
            fs::write(&report, r).unwrap();
            fs::write(&trajectory, t).unwrap();
            pairs.push((report, trajectory));
        }
        let output = SimulationOutput {
            results_dir: dir.path().to_path_buf(),
            pairs,
        };
        (dir, output)
    }

    #[test]
    fn rank_resolves_criterion_to_column() {
        let (_dir, output) = simulation(&[&[1.0]]);
        let column = ReportRankSelector
            .rank(output.report().unwrap(), "Binding Energy")
            .unwrap();
        assert_eq!(column, 1);
    }

    #[test]
    fn rank_fails_for_unknown_criterion() {
        let (_dir, output) = simulation(&[&[1.0]]);
        let err = ReportRankSelector
            .rank(output.report().unwrap(), "Total Energy")
            .unwrap_err();
        assert!(matches!(err, ExternalError::Report(_)));
    }

    #[test]
    fn select_ranked_orders_across_workers_and_skips_nan() {
        let (dir, output) = simulation(&[&[-1.0, -5.0, f64::NAN], &[-3.0, 2.0]]);
        let out = dir.path().join("pool");
        let p = params(SelectionCondition::Min);
        let selected = select_ranked(&SelectionRequest {
            output: &output,
            column: 1,
            max_structures: 3,
            output_dir: &out,
            params: &p,
        })
        .unwrap();

        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0], out.join("initial_0_0.pdb"));
        assert!(fs::read_to_string(&selected[0]).unwrap().contains("w1m1"));
        assert!(fs::read_to_string(&selected[1]).unwrap().contains("w2m0"));
        assert!(fs::read_to_string(&selected[2]).unwrap().contains("w1m0"));

        let mut reader = csv::Reader::from_path(out.join(SELECTION_SUMMARY)).unwrap();
        assert_eq!(reader.records().count(), 3);
    }

    #[test]
    fn max_condition_prefers_largest_values() {
        let (dir, output) = simulation(&[&[-1.0, -5.0, 4.0]]);
        let out = dir.path().join("pool");
        let p = params(SelectionCondition::Max);
        let selected = ReportRankSelector
            .select_best(&SelectionRequest {
                output: &output,
                column: 1,
                max_structures: 1,
                output_dir: &out,
                params: &p,
            })
            .unwrap();
        assert!(fs::read_to_string(&selected[0]).unwrap().contains("w1m2"));
    }

    #[test]
    fn cluster_is_bounded_by_cluster_count() {
        let (dir, output) = simulation(&[&[1.0, 2.0, 3.0, 4.0]]);
        let out = dir.path().join("pool");
        let mut p = params(SelectionCondition::Min);
        p.n_clusters = 2;
        let selected = ReportRankSelector
            .cluster(&SelectionRequest {
                output: &output,
                column: 1,
                max_structures: 3,
                output_dir: &out,
                params: &p,
            })
            .unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn all_nan_column_is_a_selection_error() {
        let (dir, output) = simulation(&[&[f64::NAN]]);
        let out = dir.path().join("pool");
        let p = params(SelectionCondition::Min);
        let err = select_ranked(&SelectionRequest {
            output: &output,
            column: 1,
            max_structures: 3,
            output_dir: &out,
            params: &p,
        })
        .unwrap_err();
        assert!(matches!(err, ExternalError::Selection(_)));
    }

    #[cfg(unix)]
    #[test]
    fn command_clusterer_lists_produced_structures() {
        let (dir, output) = simulation(&[&[1.0]]);
        let script = dir.path().join("cluster.sh");
        fs::write(
            &script,
            "while [ $# -gt 0 ]; do [ \"$1\" = \"--output-dir\" ] && out=\"$2\"; shift; done\n\
             touch \"$out/initial_0_0.pdb\" \"$out/initial_1_0.pdb\"\n",
        )
        .unwrap();
        let clusterer = CommandClusterer {
            program: PathBuf::from("sh"),
            program_args: vec![script.to_string_lossy().to_string()],
            timeout: None,
        };
        let out = dir.path().join("pool");
        let p = params(SelectionCondition::Min);
        let selected = clusterer
            .cluster(&SelectionRequest {
                output: &output,
                column: 1,
                max_structures: 4,
                output_dir: &out,
                params: &p,
            })
            .unwrap();
        assert_eq!(selected.len(), 2);
    }
}
