#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "datademo: synthesize and age demo data in a document repository",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format (overrides `--json`, `FORMAT` and the user config).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Initialize a datademo repository",
        long_about = "Create .datademo/ with a default config and an empty document store.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    dd init\n\n    # Rewrite config files of an existing repository\n    dd init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Create synthetic documents",
        long_about = "Create documents with filled-in fields across the known document types.",
        after_help = "EXAMPLES:\n    # Create 20 documents of every type\n    dd seed\n\n    # Reproducible projects only\n    dd seed --count 50 --type Project --seed 7"
    )]
    Seed(cmd::seed::SeedArgs),

    #[command(
        next_help_heading = "Bulk Updates",
        about = "Shift every date by whole days",
        long_about = "Walk every document type with date fields and move each date by the same number of days, \
                      with the dublincore listener suspended so modification dates are shifted, not restamped.",
        after_help = "EXAMPLES:\n    # Move everything 30 days forward\n    dd shift-dates --days 30\n\n    # Age a demo prepared on a given day so it looks fresh today\n    dd shift-dates --since 2024-01-15\n\n    # Run on a worker thread with status lines\n    dd shift-dates --days 7 --background"
    )]
    ShiftDates(cmd::shift_dates::ShiftDatesArgs),

    #[command(
        next_help_heading = "Bulk Updates",
        about = "Randomize creation and modification history",
        long_about = "Give every matching document random created/modified dates and a random last contributor.",
        after_help = "EXAMPLES:\n    # Randomize all documents\n    dd randomize --user alice --user bob\n\n    # Only notes, reproducibly\n    dd randomize --type Note --seed 3"
    )]
    Randomize(cmd::randomize::RandomizeArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show repository statistics",
        long_about = "Show document counts per type and the state of every listener.",
        after_help = "EXAMPLES:\n    # Counts and listeners\n    dd stats\n\n    # Emit machine-readable output\n    dd stats --json"
    )]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Read",
        about = "List document types and their date fields",
        long_about = "List known document types, their schemas and the date fields a shift would update.",
        after_help = "EXAMPLES:\n    # All types\n    dd types\n\n    # Only types with dates\n    dd types --with-dates"
    )]
    Types(cmd::types::TypesArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Inspect and toggle save listeners",
        after_help = "EXAMPLES:\n    # Show listeners\n    dd listeners list\n\n    # Stop version labels from being bumped\n    dd listeners disable opchainlistener"
    )]
    Listeners(cmd::listeners::ListenersArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Show or change configuration",
        after_help = "EXAMPLES:\n    # Effective configuration\n    dd config show\n\n    # Smaller commit batches\n    dd config set shift.docs_per_transaction 20\n\n    # Default to JSON output\n    dd config set --scope user user.output json"
    )]
    Config(cmd::config::ConfigArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    dd completions bash\n\n    # Generate zsh completions\n    dd completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DATADEMO_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "datademo=debug,info"
        } else {
            "datademo=info,warn"
        })
    });

    let format = env::var("DATADEMO_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, &project_root, output),
        Commands::Seed(ref args) => cmd::seed::run_seed(args, output, &project_root),
        Commands::ShiftDates(ref args) => {
            cmd::shift_dates::run_shift_dates(args, output, &project_root)
        }
        Commands::Randomize(ref args) => {
            cmd::randomize::run_randomize(args, output, &project_root)
        }
        Commands::Stats(ref args) => cmd::stats::run_stats(args, output, &project_root),
        Commands::Types(ref args) => cmd::types::run_types(args, output, &project_root),
        Commands::Listeners(ref args) => {
            cmd::listeners::run_listeners(args, output, &project_root)
        }
        Commands::Config(ref args) => cmd::config::run_config(args, &project_root, output),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["dd", "stats", "--json"]);
        assert!(cli.json);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn format_flag_overrides_json() {
        let cli = Cli::parse_from(["dd", "--json", "--format", "text", "stats"]);
        assert_eq!(cli.output_mode(), OutputMode::Text);
    }

    #[test]
    fn shift_dates_requires_an_amount() {
        assert!(Cli::try_parse_from(["dd", "shift-dates"]).is_err());
        assert!(Cli::try_parse_from(["dd", "shift-dates", "--days", "3", "--since", "2020-01-01"]).is_err());
    }

    #[test]
    fn shift_dates_accepts_negative_days() {
        let cli = Cli::parse_from(["dd", "shift-dates", "--days", "-14", "--disable-listener", "audit"]);
        match cli.command {
            Commands::ShiftDates(args) => {
                assert_eq!(args.days, Some(-14));
                assert_eq!(args.listeners, ["audit"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn listeners_subcommand_parses() {
        let cli = Cli::parse_from(["dd", "listeners", "disable", "opchainlistener"]);
        assert!(matches!(
            cli.command,
            Commands::Listeners(cmd::listeners::ListenersArgs {
                command: cmd::listeners::ListenerCommand::Disable { .. }
            })
        ));
    }
}
