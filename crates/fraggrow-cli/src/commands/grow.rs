use super::Toolchain;
use crate::cli::GrowArgs;
use crate::config::{PartialRunConfig, absolute};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use fraggrow::{
    core::models::run::{GrowthRun, GrowthTarget},
    engine::{external::ProvidedInputs, progress::ProgressReporter},
    workflows,
};
use tracing::info;

pub async fn run(args: GrowArgs) -> Result<()> {
    let partial_config = PartialRunConfig::from_file(&args.overrides.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args.overrides)?;

    // Simulations run from their own result folders, so every input is anchored here.
    let inputs = ProvidedInputs {
        seed_structure: absolute(&args.complex)?,
        initial_template: absolute(&args.initial_template)?,
        final_template: absolute(&args.final_template)?,
        transformations: args.transform.as_deref().map(absolute).transpose()?,
    };
    let growth = GrowthRun::new(
        GrowthTarget {
            complex: inputs.seed_structure.clone(),
            fragment_id: args.fragment,
            core_anchor: args.core_atom,
            fragment_anchor: args.fragment_atom,
        },
        config.growth.iterations(),
        config.growth.selection.criterion.clone(),
        config.growth.simulation.resource_budget,
    );
    let toolchain = Toolchain::new(&config, Box::new(inputs));

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Growing run '{}' over {} iterations in {}",
        growth.identifier(),
        growth.iterations(),
        config.growth.workdir.display()
    );
    info!("Invoking the core growth workflow...");

    let outcome = tokio::task::block_in_place(|| {
        workflows::grow::run(
            &growth,
            &config.growth,
            &toolchain.collaborators(),
            &reporter,
        )
    })?;

    let executed = outcome.executed();
    info!(
        executed = executed.len(),
        skipped = outcome.skipped.len(),
        "Workflow finished"
    );
    if !outcome.skipped.is_empty() {
        println!(
            "  Resumed: {} iteration(s) were already complete.",
            outcome.skipped.len()
        );
    }
    println!(
        "✓ {} structure(s) selected after equilibration.",
        outcome.selected.len()
    );
    println!(
        "✓ Best structure written to: {}",
        outcome.pregrow_selection.display()
    );
    Ok(())
}
