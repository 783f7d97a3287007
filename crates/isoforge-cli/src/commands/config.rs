//! Configuration file management command

use anyhow::{Context, Result};
use console::style;
use isoforge_core::Settings;
use std::path::PathBuf;

/// Arguments for the config command
pub struct ConfigArgs {
    /// Initialize a new configuration file with defaults
    pub init: bool,
    /// Show the path to the configuration file
    pub path: bool,
    /// Show configuration in JSON format
    pub json: bool,
    /// Suppress human-readable output
    pub quiet: bool,
    /// Effective configuration file path
    pub config_path: Option<PathBuf>,
}

/// Execute the config command
pub fn execute(args: ConfigArgs) -> Result<()> {
    if args.path {
        match &args.config_path {
            Some(path) => println!("{}", path.display()),
            None => eprintln!("{}", style("Could not determine config path").yellow()),
        }
        return Ok(());
    }

    if args.init {
        return init_config(args.config_path, args.quiet);
    }

    show_config(args.config_path, args.json, args.quiet)
}

/// Initialize a new configuration file with default values
fn init_config(config_path: Option<PathBuf>, quiet: bool) -> Result<()> {
    let path = config_path.context("Could not determine configuration directory")?;

    if path.exists() {
        if !quiet {
            eprintln!(
                "{} Configuration file already exists at: {}",
                style("Warning:").yellow(),
                path.display()
            );
            eprintln!("Use a text editor to modify it, or delete it to re-initialize.");
        }
        return Ok(());
    }

    let saved_path = Settings::default()
        .save_to_path(Some(path))
        .context("Failed to save configuration file")?;

    if !quiet {
        println!(
            "{} Created configuration file at: {}",
            style("Success:").green(),
            saved_path.display()
        );
        println!();
        println!("Example settings:");
        println!();
        println!("  [build]");
        println!("  media = \"CDR\"              # Default media type");
        println!("  output_dir = \"/srv/images\" # Where timestamped images go");
        println!("  checksum = \"sha256\"        # Always write a checksum file");
        println!();
        println!("  [behavior]");
        println!("  force = false");
    }

    Ok(())
}

/// Show the current configuration
fn show_config(config_path: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let settings = Settings::load_from_path(config_path.clone());

    if json {
        let json_output = serde_json::to_string_pretty(&settings)
            .context("Failed to serialize settings to JSON")?;
        println!("{}", json_output);
        return Ok(());
    }

    if quiet {
        return Ok(());
    }

    println!("{}", style("Isoforge Configuration").bold());
    println!();

    if let Some(path) = &config_path {
        if config_exists {
            println!("  {} {}", style("Config file:").dim(), path.display());
        } else {
            println!(
                "  {} {} {}",
                style("Config file:").dim(),
                path.display(),
                style("(not found, using defaults)").yellow()
            );
        }
    }
    println!();

    println!("{}", style("[build]").cyan());
    println!("  media = \"{}\"", settings.build.media);
    println!("  progress = \"{}\"", settings.build.progress);
    match &settings.build.output_dir {
        Some(dir) => println!("  output_dir = \"{}\"", dir.display()),
        None => println!("  output_dir = {}", style("(current directory)").dim()),
    }
    match settings.build.checksum {
        Some(algorithm) => println!("  checksum = \"{}\"", algorithm.name()),
        None => println!("  checksum = {}", style("(none)").dim()),
    }
    println!();

    println!("{}", style("[behavior]").cyan());
    println!("  force = {}", settings.behavior.force);
    println!("  quiet = {}", settings.behavior.quiet);

    if !config_exists {
        println!();
        println!(
            "{}",
            style("Run 'isoforge config --init' to create a configuration file.").dim()
        );
    }

    Ok(())
}
