//! AnatomyHero command-line tooling
//!
//! Validates viewer configuration, looks up part descriptions the same way
//! the viewer does, and manages a JSON annotation store.

mod annotations;
mod describe;

use std::path::PathBuf;

use anatomyhero_core::{load_config, save_default_config};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::annotations::AnnotationCommand;

#[derive(Parser, Debug)]
#[command(name = "anatomyhero")]
#[command(about = "AnatomyHero viewer configuration and annotation tooling")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "anatomyhero.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate the configuration, then list its systems
    Config {
        /// Write the default configuration to the config path first
        #[arg(long)]
        write_default: bool,
    },
    /// Describe a part: bundled catalogue first, then Wikipedia
    Describe {
        /// Part name, e.g. "Heart"
        name: String,
    },
    /// Manage a JSON annotation store
    Annotations {
        /// Path to the store file
        #[arg(short, long)]
        store: PathBuf,

        #[command(subcommand)]
        action: AnnotationCommand,
    },
}

fn log_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&args.log_level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("AnatomyHero v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Config { write_default } => {
            if write_default {
                save_default_config(&args.config).with_context(|| {
                    format!("Failed to write default config to {}", args.config.display())
                })?;
                info!(path = %args.config.display(), "Wrote default configuration");
            }
            let config = load_config(&args.config)
                .with_context(|| format!("Invalid configuration {}", args.config.display()))?;

            println!("{} systems:", config.systems.len());
            for system in &config.systems {
                println!("  - {} ({}) -> {}", system.label(), system.id, system.model_path());
            }
            println!(
                "Opacity: resting {:.2}, faded {:.2}",
                config.appearance.resting_opacity, config.appearance.faded_opacity
            );
            println!("Annotations key: {}", config.storage.annotations_key);
        }
        Command::Describe { name } => {
            let config = load_config(&args.config)
                .with_context(|| format!("Invalid configuration {}", args.config.display()))?;
            let describer = describe::Describer::new(&config)?;
            let description = describer.describe(&name).await;
            println!("{}\n\n{}", description.title, description.info);
        }
        Command::Annotations { store, action } => {
            annotations::run(&store, action)?;
        }
    }

    Ok(())
}
