use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use filewarden::{Engine, NotifySource, RealFileSystem, RuleSet, Settings, logging};

#[derive(Parser)]
#[command(name = "filewarden")]
#[command(about = "Watches directories and organizes changed files by content type")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the configured directories and apply the action rules
    Run {
        /// Path to the configuration file (overrides discovery)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a starter filewarden.toml into the current directory
    Init {
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Config {
        /// Path to the configuration file (overrides discovery)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(config),
        Commands::Init { force } => {
            let path = Settings::init_config_file(force)?;
            println!("Created configuration at: {}", path.display());
            Ok(())
        }
        Commands::Config { config } => {
            let settings = load_settings(config)?;
            print!("{}", toml::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

fn load_settings(config: Option<PathBuf>) -> anyhow::Result<Settings> {
    let settings = match config {
        Some(path) => Settings::load_from(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Settings::load().context("failed to load configuration")?,
    };
    Ok(settings)
}

fn run(config: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = load_settings(config)?;
    logging::init_with_config(&settings.logging);
    settings.log_summary();

    if settings.watches.is_empty() {
        anyhow::bail!("no watch directories configured; run 'filewarden init' and edit filewarden.toml");
    }

    let source = NotifySource::new().context("failed to initialize filesystem watcher")?;
    let mut engine = Engine::new(source, RealFileSystem, &settings.engine);
    engine.start(&settings.watches, RuleSet::new(settings.rules.clone()));

    let stats = engine.stats();
    if stats.watched_paths == 0 {
        anyhow::bail!("none of the configured directories could be watched");
    }

    // Runs until the process is terminated externally. Embedders use
    // Engine::stop_flag() for deterministic shutdown.
    engine.run();
    Ok(())
}
