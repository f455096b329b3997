//! Config command - View and manage configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use reviewbot_config::ConfigLoader;
use serde::Serialize;

use super::{config_root, load_config};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration (global → local → flags)
    Show(ShowArgs),

    /// Write a configuration file with default values
    Init(InitArgs),

    /// Show configuration file paths
    Path(PathArgs),
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON instead of TOML
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Create ~/.reviewbot/config.toml instead of ./.reviewbot/config.toml
    #[arg(long)]
    global: bool,
}

#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Configuration file locations
#[derive(Debug, Serialize)]
struct ConfigPaths {
    global: Option<PathBuf>,
    local: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    explicit: Option<PathBuf>,
    global_exists: bool,
    local_exists: bool,
}

/// Execute a config subcommand
pub async fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, global),
        ConfigCommand::Init(args) => execute_init(args),
        ConfigCommand::Path(args) => execute_path(args, global),
    }
}

fn execute_show(args: ShowArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let text = toml::to_string_pretty(&config).context("Failed to render configuration")?;
        print!("{}", text);
    }

    if let Err(e) = config.validate() {
        eprintln!("warning: {}", e);
    }
    Ok(())
}

fn execute_init(args: InitArgs) -> Result<()> {
    let loader = ConfigLoader::new();
    let path = if args.global {
        loader.init_global()?
    } else {
        loader.init_local(&config_root()?)?
    };
    println!("Configuration file: {}", path.display());
    Ok(())
}

fn execute_path(args: PathArgs, global: GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();
    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&config_root()?);

    let paths = ConfigPaths {
        global_exists: global_path.as_ref().map(|p| p.exists()).unwrap_or(false),
        local_exists: local_path.exists(),
        global: global_path,
        local: local_path,
        explicit: global.config,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    println!("Configuration Paths");
    println!("===================\n");

    match paths.global {
        Some(ref gp) => println!("Global: {} ({})", gp.display(), exists_label(paths.global_exists)),
        None => println!("Global: not available (no home directory)"),
    }
    println!("Local:  {} ({})", paths.local.display(), exists_label(paths.local_exists));
    if let Some(ref explicit) = paths.explicit {
        println!("--config: {} (replaces local)", explicit.display());
    }
    Ok(())
}

fn exists_label(exists: bool) -> &'static str {
    if exists {
        "exists"
    } else {
        "not found"
    }
}
