pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use thosejobs_core::config::{AppConfig, LogFormat};
use tracing_subscriber::EnvFilter;

use commands::jobs::JobsCommand;
use commands::profile::ProfileCommand;
use commands::quotes::QuotesCommand;
use commands::role::RoleCommand;
use commands::GlobalArgs;

#[derive(Debug, Parser)]
#[command(
    name = "thosejobs",
    about = "ThoseJobs marketplace operator CLI",
    long_about = "Run migrations, load demo data and drive the job and quotation workflows \
                  against the configured database. Every command prints one JSON document.",
    after_help = "Examples:\n  thosejobs seed\n  thosejobs --as demo-worker-001 jobs list\n  \
                  thosejobs --as demo-provider-001 quotes accept demo-quote-open"
)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Config file (must exist)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "URL", help = "Override database.url")]
    database_url: Option<String>,
    #[arg(long = "as", global = true, value_name = "PROFILE_ID", help = "Act as this profile")]
    acting_as: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Load the deterministic demo marketplace")]
    Seed {
        #[arg(long, help = "Remove previously seeded rows before loading")]
        reset: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(subcommand, about = "Post, browse and move jobs through their lifecycle")]
    Jobs(JobsCommand),
    #[command(subcommand, about = "Submit, review and accept quotations")]
    Quotes(QuotesCommand),
    #[command(subcommand, about = "Manage the acting profile's role")]
    Role(RoleCommand),
    #[command(subcommand, about = "Inspect or rename the acting profile")]
    Profile(ProfileCommand),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {
        config_path: cli.config,
        database_url: cli.database_url,
        acting_as: cli.acting_as,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(&global),
        Command::Seed { reset } => commands::seed::run(&global, reset),
        Command::Config => commands::config::run(&global),
        Command::Jobs(command) => commands::jobs::run(&global, command),
        Command::Quotes(command) => commands::quotes::run(&global, command),
        Command::Role(command) => commands::role::run(&global, command),
        Command::Profile(command) => commands::profile::run(&global, command),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single JSON document. A broken config
/// is reported by the command itself.
fn init_logging(global: &GlobalArgs) {
    let Ok(config) = AppConfig::load(global.load_options()) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
