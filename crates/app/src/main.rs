use std::path::PathBuf;

use animation_conformance_core::{HarnessConfig, HarnessError, SamplingAnimationDriver};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod demo;

use demo::DemoElement;

fn main() -> animation_conformance_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            filter,
            with_stale_read,
            json,
        } => run(config.as_ref(), filter, with_stale_read, json),
        Commands::Config { config } => print_config(config.as_ref()),
    }
}

fn run(
    config: Option<&PathBuf>,
    filter: Option<String>,
    with_stale_read: bool,
    json: bool,
) -> animation_conformance_core::Result<()> {
    let mut config = load_config(config)?;
    if filter.is_some() {
        config.selection = filter;
    }
    tracing::info!(
        interval_ms = config.scheduler.interval_ms,
        measurements = config.sampling.number_of_measurements,
        selection = config.selection.as_deref(),
        "starting conformance run"
    );

    let target = DemoElement::new(with_stale_read);
    let mut driver = SamplingAnimationDriver::new(Box::new(target), &config)?;
    let summary = driver.run_to_completion()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{summary}");
    }

    if summary.passed {
        Ok(())
    } else {
        Err(HarnessError::msg(format!("conformance run failed: {summary}")))
    }
}

fn load_config(path: Option<&PathBuf>) -> animation_conformance_core::Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::load(path),
        None => Ok(HarnessConfig::default()),
    }
}

fn print_config(path: Option<&PathBuf>) -> animation_conformance_core::Result<()> {
    println!("{}", load_config(path)?.to_json_pretty()?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Property animation conformance harness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Animate every property of the demo element and report verdicts.
    Run {
        /// JSON configuration file; defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Regex selecting properties by `Owner.Name`.
        #[arg(short, long)]
        filter: Option<String>,
        /// Add a property that keeps returning a cached value.
        #[arg(long)]
        with_stale_read: bool,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as JSON.
    Config {
        /// JSON configuration file; defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
