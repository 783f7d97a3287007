//! Build command - assembles sources into an image file
//!
//! Resolves CLI flags against the settings file, runs the assembly with the
//! xorriso backend and reports skipped items, warnings and the copy summary.

use anyhow::{Context, Result};
use chrono::Local;
use console::style;
use isoforge_core::{
    write_sidecar, AssemblyReport, BuildConfiguration, ChecksumAlgorithm, ImageAssembler,
    MediaType, OverwritePolicy, ProgressMode, Settings, XorrisoBuilder,
};
use serde_json::json;
use std::path::PathBuf;

use crate::progress::{format_size, ProgressDisplay};

/// Arguments for the build command
pub struct BuildArgs {
    pub sources: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub media: Option<String>,
    pub title: Option<String>,
    pub boot_file: Option<PathBuf>,
    pub force: bool,
    pub progress: Option<String>,
    pub checksum: Option<String>,
    pub json: bool,
    pub quiet: bool,
    pub settings: Settings,
}

/// Execute the build command
pub fn execute(args: BuildArgs) -> Result<()> {
    let config = build_configuration(&args)?;
    let silent = args.quiet || args.json;

    let display = ProgressDisplay::new(config.progress, silent);
    let config = config.progress(display.mode());

    if !silent {
        println!(
            "{} {} ({}, \"{}\")",
            style("Building").bold(),
            style(config.destination.display()).cyan(),
            config.media,
            config.volume_title
        );
        println!(
            "  {} {} source(s)",
            style("✓").green(),
            args.sources.len()
        );
    }

    let checksum = config.checksum;
    let media = config.media;
    let volume_title = config.volume_title.clone();

    let outcome = ImageAssembler::new(XorrisoBuilder::new(), config)
        .on_progress(display.callback())
        .assemble(args.sources);
    display.finish();

    let report = outcome?;

    if !args.quiet {
        for failure in &report.item_failures {
            eprintln!("{} {}", style("Warning:").yellow(), failure);
        }
        for warning in &report.warnings {
            eprintln!("{} {}", style("Warning:").yellow(), warning);
        }
    }

    let sidecar = match (checksum, report.copy.checksum.as_deref()) {
        (Some(algorithm), Some(hex)) => Some(
            write_sidecar(&report.destination, algorithm, hex)
                .context("Failed to write checksum file")?,
        ),
        _ => None,
    };

    if args.json {
        let output = report_json(&report, media, &volume_title, checksum, sidecar.as_ref());
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize report")?
        );
        return Ok(());
    }

    if !args.quiet {
        print_summary(&report, checksum, sidecar.as_ref());
    }

    Ok(())
}

/// Merge CLI flags over the settings file into a build configuration
fn build_configuration(args: &BuildArgs) -> Result<BuildConfiguration> {
    let defaults = &args.settings.build;

    let media = match &args.media {
        Some(name) => name.parse::<MediaType>()?,
        None => defaults.media,
    };

    let progress = match &args.progress {
        Some(mode) => mode.parse::<ProgressMode>()?,
        None => defaults.progress,
    };

    let checksum = match &args.checksum {
        Some(name) => Some(name.parse::<ChecksumAlgorithm>()?),
        None => defaults.checksum,
    };

    let mut config = match &args.output {
        Some(path) => BuildConfiguration::new(path.clone()),
        None => {
            let dir = match &defaults.output_dir {
                Some(dir) => dir.clone(),
                None => std::env::current_dir().context("Failed to read current directory")?,
            };
            BuildConfiguration::timestamped(&dir, &Local::now())
        }
    };

    if let Some(title) = &args.title {
        config = config.volume_title(title.clone());
    }

    let config = config
        .media(media)
        .boot_image(args.boot_file.clone())
        .overwrite(OverwritePolicy::from_force(
            args.force || args.settings.behavior.force,
        ))
        .progress(progress)
        .checksum(checksum);

    config.validate()?;
    Ok(config)
}

fn print_summary(
    report: &AssemblyReport,
    checksum: Option<ChecksumAlgorithm>,
    sidecar: Option<&PathBuf>,
) {
    println!(
        "  {} Wrote {} blocks ({}) in {:.1}s ({})",
        style("✓").green(),
        report.copy.blocks_written,
        format_size(report.bytes),
        report.copy.elapsed.as_secs_f64(),
        report.copy.speed_display()
    );

    if let (Some(algorithm), Some(hex)) = (checksum, report.copy.checksum.as_deref()) {
        println!("  {} {}: {}", style("✓").green(), algorithm.name(), hex);
    }
    if let Some(path) = sidecar {
        println!("  {} Checksum file: {}", style("✓").green(), path.display());
    }

    if report.is_complete() {
        println!(
            "\n{} {}",
            style("✓ Image complete:").green().bold(),
            report.destination.display()
        );
    } else {
        println!(
            "\n{} {} ({} of {} sources skipped)",
            style("Image written with warnings:").yellow().bold(),
            report.destination.display(),
            report.item_failures.len(),
            report.ingested + report.item_failures.len()
        );
    }
}

fn report_json(
    report: &AssemblyReport,
    media: MediaType,
    volume_title: &str,
    checksum: Option<ChecksumAlgorithm>,
    sidecar: Option<&PathBuf>,
) -> serde_json::Value {
    let failures: Vec<_> = report
        .item_failures
        .iter()
        .map(|f| json!({ "source": f.subject(), "error": f.to_string() }))
        .collect();

    json!({
        "destination": report.destination,
        "media": media,
        "volume_title": volume_title,
        "ingested": report.ingested,
        "item_failures": failures,
        "warnings": report.warnings,
        "blocks_written": report.copy.blocks_written,
        "block_size": report.copy.block_size,
        "bytes_written": report.bytes,
        "elapsed_secs": report.copy.elapsed.as_secs_f64(),
        "average_speed": report.copy.average_speed,
        "checksum": checksum.zip(report.copy.checksum.clone()).map(|(algorithm, hex)| {
            json!({ "algorithm": algorithm, "value": hex })
        }),
        "checksum_file": sidecar,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use isoforge_core::{BuildSettings, CopyResult, ItemFailure};
    use std::time::Duration;

    fn args() -> BuildArgs {
        BuildArgs {
            sources: vec![PathBuf::from("a")],
            output: Some(PathBuf::from("/tmp/out.iso")),
            media: None,
            title: None,
            boot_file: None,
            force: false,
            progress: None,
            checksum: None,
            json: false,
            quiet: true,
            settings: Settings::default(),
        }
    }

    #[test]
    fn test_configuration_defaults() {
        let config = build_configuration(&args()).unwrap();
        assert_eq!(config.destination, PathBuf::from("/tmp/out.iso"));
        assert_eq!(config.volume_title, "out");
        assert_eq!(config.media, MediaType::DvdplusrwDuallayer);
        assert_eq!(config.overwrite, OverwritePolicy::FailIfExists);
        assert_eq!(config.progress, ProgressMode::Status);
    }

    #[test]
    fn test_flags_override_settings() {
        let mut a = args();
        a.settings.build = BuildSettings {
            media: MediaType::Cdr,
            progress: ProgressMode::None,
            output_dir: None,
            checksum: Some(ChecksumAlgorithm::Sha512),
        };
        a.media = Some("bdr".to_string());
        a.progress = Some("dots".to_string());
        a.checksum = Some("sha256".to_string());
        a.title = Some("ARCHIVE".to_string());
        a.force = true;

        let config = build_configuration(&a).unwrap();
        assert_eq!(config.media, MediaType::Bdr);
        assert_eq!(config.progress, ProgressMode::Markers);
        assert_eq!(config.checksum, Some(ChecksumAlgorithm::Sha256));
        assert_eq!(config.volume_title, "ARCHIVE");
        assert_eq!(config.overwrite, OverwritePolicy::CreateOrTruncate);
    }

    #[test]
    fn test_settings_used_without_flags() {
        let mut a = args();
        a.settings.build.media = MediaType::Dvdram;
        a.settings.build.checksum = Some(ChecksumAlgorithm::Sha256);
        a.settings.behavior.force = true;

        let config = build_configuration(&a).unwrap();
        assert_eq!(config.media, MediaType::Dvdram);
        assert_eq!(config.checksum, Some(ChecksumAlgorithm::Sha256));
        assert_eq!(config.overwrite, OverwritePolicy::CreateOrTruncate);
    }

    #[test]
    fn test_timestamped_default_destination() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut a = args();
        a.output = None;
        a.settings.build.output_dir = Some(dir.path().to_path_buf());

        let config = build_configuration(&a).unwrap();
        assert_eq!(config.destination.parent(), Some(dir.path()));
        let name = config.destination.file_name().unwrap().to_string_lossy();
        assert!(name.ends_with(".iso"));
        assert_eq!(name.len(), "yyyymmdd-hhmmss.iso".len());
        assert_eq!(format!("{}.iso", config.volume_title), name);
    }

    #[test]
    fn test_long_output_name_without_title() {
        let mut a = args();
        a.output = Some(PathBuf::from(
            "/tmp/quarterly-financial-records-backup-2024.iso",
        ));

        let config = build_configuration(&a).unwrap();
        assert_eq!(config.volume_title.chars().count(), 32);
        assert!(config.volume_title.starts_with("quarterly-financial"));
    }

    #[test]
    fn test_invalid_flags_rejected() {
        let mut a = args();
        a.media = Some("CDROM".to_string());
        assert!(build_configuration(&a).is_err());

        let mut a = args();
        a.progress = Some("loud".to_string());
        assert!(build_configuration(&a).is_err());

        let mut a = args();
        a.title = Some("X".repeat(33));
        assert!(build_configuration(&a).is_err());
    }

    #[test]
    fn test_report_json() {
        let report = AssemblyReport {
            destination: PathBuf::from("/tmp/out.iso"),
            ingested: 2,
            item_failures: vec![ItemFailure::SourceResolution {
                input: "gone".to_string(),
                reason: "not found".to_string(),
            }],
            warnings: vec![],
            copy: CopyResult {
                blocks_written: 3,
                bytes_written: 6144,
                block_size: 2048,
                elapsed: Duration::from_millis(1500),
                average_speed: 6144,
                progress_events: 0,
                checksum: Some("abc".to_string()),
            },
            bytes: 6144,
        };

        let value = report_json(
            &report,
            MediaType::Cdr,
            "OUT",
            Some(ChecksumAlgorithm::Sha256),
            None,
        );
        assert_eq!(value["media"], "CDR");
        assert_eq!(value["blocks_written"], 3);
        assert_eq!(value["item_failures"][0]["source"], "gone");
        assert_eq!(value["checksum"]["algorithm"], "sha256");
        assert_eq!(value["checksum"]["value"], "abc");
        assert!(value["checksum_file"].is_null());
    }
}
