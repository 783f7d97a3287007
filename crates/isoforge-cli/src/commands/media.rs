//! Media command - lists writable media types

use anyhow::{Context, Result};
use console::style;
use isoforge_core::MediaType;
use serde_json::json;

use crate::progress::format_size;

/// Execute the media command
pub fn execute(json: bool, quiet: bool) -> Result<()> {
    // JSON output is machine-readable, so it ignores --quiet
    if json {
        let entries: Vec<_> = MediaType::ALL.iter().map(|m| media_json(*m)).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("Failed to serialize media list")?
        );
        return Ok(());
    }

    if quiet {
        return Ok(());
    }

    println!(
        "{} {} writable media type(s):\n",
        style("Found").green().bold(),
        MediaType::ALL.len()
    );

    for media in MediaType::ALL {
        let marker = if media == MediaType::default() {
            style(" (default)").cyan().to_string()
        } else {
            String::new()
        };
        let boot = if media.is_blu_ray() {
            style("no boot image").yellow().to_string()
        } else {
            style("bootable").green().to_string()
        };

        println!(
            "  {:>2}  {:<20} {:>10}  {}{}",
            media.id(),
            style(media.name()).white().bold(),
            format_size(media.capacity_bytes()),
            boot,
            marker
        );
    }

    Ok(())
}

fn media_json(media: MediaType) -> serde_json::Value {
    json!({
        "id": media.id(),
        "name": media.name(),
        "capacity_sectors": media.capacity_sectors(),
        "capacity_bytes": media.capacity_bytes(),
        "blu_ray": media.is_blu_ray(),
        "default": media == MediaType::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_json() {
        let value = media_json(MediaType::Cdr);
        assert_eq!(value["id"], 2);
        assert_eq!(value["name"], "CDR");
        assert_eq!(value["blu_ray"], false);
        assert_eq!(value["default"], false);

        let value = media_json(MediaType::DvdplusrwDuallayer);
        assert_eq!(value["default"], true);
    }

    #[test]
    fn test_execute_quiet() {
        assert!(execute(false, true).is_ok());
    }
}
