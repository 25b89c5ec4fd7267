//! `liquid`: replay liquid-democracy scenarios and report tallies.

use anyhow::Context;
use clap::Parser;
use liquid_cli::{CliConfig, OutputFormat, Scenario};
use liquid_utils::LogFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "liquid", about = "Liquid-democracy delegation and tally replay")]
struct Cli {
    /// Path to a TOML configuration file. CLI flags and env vars override it.
    #[arg(long, env = "LIQUID_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "LIQUID_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "LIQUID_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Replay a scenario and print every proposal's tally and final powers.
    Run {
        scenario: PathBuf,

        /// Report format: "text" or "json".
        #[arg(long, env = "LIQUID_OUTPUT")]
        output: Option<OutputFormat>,

        /// Log and skip failing steps instead of aborting.
        #[arg(long)]
        keep_going: bool,
    },
    /// Parse a scenario without replaying it.
    Check { scenario: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CliConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CliConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }

    liquid_utils::init_logging(config.log_format, &config.log_level);

    match cli.command {
        Command::Run {
            scenario,
            output,
            keep_going,
        } => {
            let parsed = Scenario::from_toml_file(&scenario)?;
            tracing::info!(
                scenario = %scenario.display(),
                steps = parsed.steps.len(),
                participants = parsed.stakes.len(),
                "replaying scenario"
            );
            let report = parsed.run(keep_going || config.keep_going)?;
            match output.unwrap_or(config.output) {
                OutputFormat::Text => print!("{report}"),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        Command::Check { scenario } => {
            let parsed = Scenario::from_toml_file(&scenario)?;
            println!(
                "{}: {} participants, {} steps",
                scenario.display(),
                parsed.stakes.len(),
                parsed.steps.len()
            );
        }
    }
    Ok(())
}
