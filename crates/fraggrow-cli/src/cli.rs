use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "FragGrow Developers",
    version,
    about = "FragGrow CLI - Grow ligand fragments inside a receptor through a sequence of externally simulated interpolation steps.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Grow one fragment from a prepared complex and a pair of templates.
    Grow(GrowArgs),
    /// Grow every fragment chain listed in an instruction file.
    Series(SeriesArgs),
    /// Print the overlap factor used at every growing iteration.
    Schedule(ScheduleArgs),
}

/// Arguments for the `grow` subcommand.
#[derive(Args, Debug)]
pub struct GrowArgs {
    // --- Core Arguments ---
    /// Complex that already carries the fragment at its initial, shrunken size.
    #[arg(short = 'x', long, required = true, value_name = "PATH")]
    pub complex: PathBuf,

    /// Ligand template the growth starts from.
    #[arg(long, required = true, value_name = "PATH")]
    pub initial_template: PathBuf,

    /// Ligand template of the fully grown fragment.
    #[arg(long = "final-template", required = true, value_name = "PATH")]
    pub final_template: PathBuf,

    /// Atom pairs whose parameters are morphed between the two templates.
    #[arg(short, long, value_name = "PATH")]
    pub transform: Option<PathBuf>,

    // --- Run Identity ---
    /// Fragment name, used to derive the run identifier.
    #[arg(short, long, required = true, value_name = "NAME")]
    pub fragment: String,

    /// Core atom the fragment is attached to.
    #[arg(long, required = true, value_name = "ATOM")]
    pub core_atom: String,

    /// Fragment atom bonded to the core.
    #[arg(long, required = true, value_name = "ATOM")]
    pub fragment_atom: String,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Arguments for the `series` subcommand.
#[derive(Args, Debug)]
pub struct SeriesArgs {
    /// Instruction file; each line is a chain of `fragment core-atom fragment-atom` triples.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub instructions: PathBuf,

    /// Complex the first triple of every chain grows from.
    #[arg(short = 'x', long, required = true, value_name = "PATH")]
    pub complex: PathBuf,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Arguments for the `schedule` subcommand.
#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Number of growing iterations N; the schedule covers steps 0..=N.
    #[arg(short = 'n', long, default_value_t = 10, value_name = "INT")]
    pub iterations: usize,

    /// Overlap factor at step 0.
    #[arg(long, default_value_t = 0.5, value_name = "FLOAT")]
    pub min_overlap: f64,

    /// Overlap factor at step N.
    #[arg(long, default_value_t = 0.7, value_name = "FLOAT")]
    pub max_overlap: f64,
}

/// Options shared by every command that launches simulations.
#[derive(Args, Debug, Default)]
pub struct ConfigOverrides {
    /// Path to the run configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    // --- Growth Overrides ---
    /// Override the number of growing iterations.
    #[arg(short = 'n', long, value_name = "INT")]
    pub iterations: Option<usize>,

    /// Override the report column used to rank structures.
    #[arg(long = "criteria", value_name = "NAME")]
    pub criterion: Option<String>,

    /// Override the number of processes handed to each simulation.
    #[arg(long = "cpus", value_name = "INT")]
    pub cpus: Option<usize>,

    /// Resume from the last completed iteration instead of starting over.
    #[arg(short, long)]
    pub restart: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S growth.iterations=5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grow_accepts_all_required_arguments() {
        let cli = Cli::parse_from([
            "fraggrow",
            "grow",
            "-x",
            "complex.pdb",
            "--initial-template",
            "grwz_initial",
            "--final-template",
            "grwz_final",
            "-f",
            "amide",
            "--core-atom",
            "C3",
            "--fragment-atom",
            "H1",
            "-c",
            "run.toml",
            "--cpus",
            "48",
            "--restart",
        ]);
        let Commands::Grow(args) = cli.command else {
            panic!("Expected 'grow' subcommand");
        };
        assert_eq!(args.fragment, "amide");
        assert_eq!(args.overrides.cpus, Some(48));
        assert!(args.overrides.restart);
        assert!(args.transform.is_none());
    }

    #[test]
    fn schedule_has_defaults() {
        let cli = Cli::parse_from(["fraggrow", "schedule"]);
        let Commands::Schedule(args) = cli.command else {
            panic!("Expected 'schedule' subcommand");
        };
        assert_eq!(args.iterations, 10);
        assert_eq!(args.min_overlap, 0.5);
        assert_eq!(args.max_overlap, 0.7);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["fraggrow", "-q", "-v", "schedule"]);
        assert!(result.is_err());
    }

    #[test]
    fn series_collects_repeated_set_values() {
        let cli = Cli::parse_from([
            "fraggrow",
            "series",
            "-i",
            "instructions.txt",
            "-x",
            "receptor.pdb",
            "-c",
            "run.toml",
            "-S",
            "growth.iterations=3",
            "-S",
            "selection.condition=max",
        ]);
        let Commands::Series(args) = cli.command else {
            panic!("Expected 'series' subcommand");
        };
        assert_eq!(
            args.overrides.set_values,
            vec!["growth.iterations=3", "selection.condition=max"]
        );
    }
}
