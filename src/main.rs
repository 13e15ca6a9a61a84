mod cli;
mod core;

use clap::{Parser, Subcommand};

use crate::cli::output::OutputOptions;
use crate::core::config::AppConfig;

#[derive(Parser)]
#[command(name = "cmon", about = "Claude plan usage monitor", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format (text|json)
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch current usage once and record it
    Usage,
    /// Poll usage on an interval, alerting on thresholds
    Watch {
        /// Seconds between polls (30, 60 or 120)
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Show the recorded 24-hour usage trend
    History,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    core::logging::init(cli.verbose);

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable config, using defaults");
            AppConfig::default()
        }
    };

    let output_opts = OutputOptions::resolve(
        cli.json,
        cli.format.as_deref(),
        cli.pretty,
        cli.no_color,
        cli.verbose,
        &config.settings,
    );

    match cli.command {
        None | Some(Commands::Usage) => cli::usage_cmd::run(&config, &output_opts).await?,
        Some(Commands::Watch { interval }) => {
            cli::watch_cmd::run(interval, &config, &output_opts).await?
        }
        Some(Commands::History) => cli::history_cmd::run(&config, &output_opts)?,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => cli::config_cmd::init(&output_opts)?,
            ConfigAction::Check => cli::config_cmd::check(&output_opts)?,
            ConfigAction::Show => cli::config_cmd::show(&config, &output_opts)?,
        },
    }

    Ok(())
}
