use super::Toolchain;
use crate::cli::SeriesArgs;
use crate::config::{AppConfig, PartialRunConfig, absolute};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use fraggrow::{
    core::io::instructions,
    engine::{external::CommandPreparer, progress::ProgressReporter},
    workflows::{self, series::SeriesReport},
};
use tracing::{info, warn};

pub async fn run(args: SeriesArgs) -> Result<()> {
    let partial_config = PartialRunConfig::from_file(&args.overrides.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args.overrides)?;

    let lines = instructions::load(&args.instructions).map_err(|e| CliError::FileParsing {
        path: args.instructions.clone(),
        source: e.into(),
    })?;
    let base_complex = absolute(&args.complex)?;
    let toolchain = Toolchain::new(&config, Box::new(preparer(&config)?));

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Running {} instruction line(s) from {}",
        lines.len(),
        args.instructions.display()
    );

    let report = tokio::task::block_in_place(|| {
        workflows::series::run(
            &base_complex,
            lines,
            &config.growth,
            &toolchain.collaborators(),
            &reporter,
        )
    });

    print_summary(&report);
    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::Other(anyhow::anyhow!(
            "{} chain(s) failed and {} line(s) were rejected",
            report.failed_chains().count(),
            report.rejected.len()
        )))
    }
}

fn preparer(config: &AppConfig) -> Result<CommandPreparer> {
    let tool = config.preparer.as_ref().ok_or_else(|| {
        CliError::Config(
            "The `series` command requires `preparation.program` to attach fragments.".to_string(),
        )
    })?;
    if config.fragment_dir.is_none() {
        warn!("`preparation.fragment-dir` is not set; fragment names are used as paths.");
    }
    Ok(CommandPreparer {
        program: tool.program.clone(),
        program_args: tool.args.clone(),
        fragment_dir: config.fragment_dir.clone(),
        timeout: tool.timeout,
    })
}

fn print_summary(report: &SeriesReport) {
    for rejected in &report.rejected {
        println!("✗ {}", rejected);
    }
    for chain in &report.chains {
        match &chain.failure {
            None => println!(
                "✓ Line {}: grew {}",
                chain.line_number,
                chain.completed.join(" -> ")
            ),
            Some(failure) => {
                println!(
                    "✗ Line {}: run '{}' failed: {}",
                    chain.line_number, failure.identifier, failure.error
                );
                if !chain.completed.is_empty() {
                    println!("  Completed before the failure: {}", chain.completed.join(", "));
                }
            }
        }
        if let Some(selection) = &chain.final_selection {
            println!("  Final structure: {}", selection.display());
        }
    }
}
