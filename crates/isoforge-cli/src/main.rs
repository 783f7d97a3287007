//! Isoforge - Assemble files and directories into optical-disc images
//!
//! # Usage
//!
//! ```bash
//! # Build an image named after the current time
//! isoforge build ~/photos ~/notes.txt
//!
//! # Build a CD-R image with a title, replacing an existing file
//! isoforge build ~/photos -o photos.iso --media CDR --title PHOTOS --force
//!
//! # Bootable image with a checksum sidecar
//! isoforge build ./rootfs --boot-file etfsboot.com --checksum sha256
//!
//! # List writable media types
//! isoforge media
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use clap_mangen::Man;
use console::style;
use isoforge_core::Settings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod progress;

/// Isoforge - Assemble files and directories into optical-disc images
#[derive(Parser)]
#[command(name = "isoforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use a specific configuration file
    #[arg(long, global = true, value_name = "FILE", env = "ISOFORGE_CONFIG")]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an image from files and directories
    Build {
        /// Files and directories to place at the root of the image
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Image file to write (default: <output_dir>/yyyyMMdd-HHmmss.iso)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Target media type (see `isoforge media`)
        #[arg(short, long, value_name = "TYPE")]
        media: Option<String>,

        /// Volume title (at most 32 characters)
        #[arg(short, long)]
        title: Option<String>,

        /// Boot sector image for a bootable disc
        #[arg(short, long, value_name = "PATH")]
        boot_file: Option<PathBuf>,

        /// Overwrite the output file if it exists
        #[arg(short, long)]
        force: bool,

        /// Progress display (none, status, dots)
        #[arg(short, long, value_name = "MODE")]
        progress: Option<String>,

        /// Write a checksum file next to the image (sha256, sha512)
        #[arg(short, long, value_name = "ALGORITHM")]
        checksum: Option<String>,

        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List writable media types
    Media {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show or initialize the configuration file
    Config {
        /// Create a configuration file with default values
        #[arg(long)]
        init: bool,

        /// Print the configuration file path
        #[arg(long)]
        path: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Generate man pages
    Mangen {
        /// Output directory for man pages
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
}

fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("{} {}", style("Error:").red().bold(), panic_info);
    }));

    if let Err(e) = run() {
        eprintln!("{} {}", style("Error:").red().bold(), e);

        if std::env::var("RUST_BACKTRACE").is_ok() {
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  {} {}", style("Caused by:").yellow(), cause);
                source = cause.source();
            }
        }

        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config_file.clone().or_else(Settings::config_path);
    let settings = Settings::load_from_path(config_path.clone());
    let quiet = cli.quiet || settings.behavior.quiet;

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build {
            sources,
            output,
            media,
            title,
            boot_file,
            force,
            progress,
            checksum,
            json,
        } => commands::build::execute(commands::build::BuildArgs {
            sources,
            output,
            media,
            title,
            boot_file,
            force,
            progress,
            checksum,
            json,
            quiet,
            settings,
        }),
        Commands::Media { json } => commands::media::execute(json, quiet),
        Commands::Config { init, path, json } => {
            commands::config::execute(commands::config::ConfigArgs {
                init,
                path,
                json,
                quiet,
                config_path,
            })
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
        Commands::Mangen { out_dir } => {
            let cmd = Cli::command();
            std::fs::create_dir_all(&out_dir)?;

            let man = Man::new(cmd.clone());
            let mut buffer = Vec::new();
            man.render(&mut buffer)?;
            std::fs::write(out_dir.join("isoforge.1"), buffer)?;
            if !quiet {
                println!("Generated: {}", out_dir.join("isoforge.1").display());
            }

            for subcommand in cmd.get_subcommands() {
                let name = subcommand.get_name();
                if subcommand.is_hide_set()
                    || name == "completions"
                    || name == "mangen"
                    || name == "help"
                {
                    continue;
                }

                let man = Man::new(subcommand.clone());
                let mut buffer = Vec::new();
                man.render(&mut buffer)?;
                let filename = format!("isoforge-{}.1", name);
                std::fs::write(out_dir.join(&filename), buffer)?;
                if !quiet {
                    println!("Generated: {}", out_dir.join(&filename).display());
                }
            }
            Ok(())
        }
    }
}
