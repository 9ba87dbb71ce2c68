use crate::cli::ScheduleArgs;
use crate::error::{CliError, Result};
use fraggrow::core::models::iteration::StepKind;
use fraggrow::core::schedule::InterpolationSchedule;

pub fn run(args: ScheduleArgs) -> Result<()> {
    for line in render(&args)? {
        println!("{}", line);
    }
    Ok(())
}

/// One line per step: index, overlap factor and template policy.
fn render(args: &ScheduleArgs) -> Result<Vec<String>> {
    let schedule = InterpolationSchedule::new(args.iterations, args.min_overlap, args.max_overlap)
        .map_err(|e| CliError::Argument(e.to_string()))?;

    let mut lines = vec![format!("{:>4}  {:>7}  {}", "step", "overlap", "template")];
    lines.extend(schedule.steps().map(|(step, overlap)| {
        let template = match StepKind::classify(step, schedule.iterations()) {
            StepKind::Initial => "initial",
            StepKind::Intermediate => "interpolated",
            StepKind::Final => "final",
        };
        format!("{:>4}  {:>7}  {}", step, overlap.to_string(), template)
    }));
    Ok(lines)
}
