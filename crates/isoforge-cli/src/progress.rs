//! Progress display for the copy phase
//!
//! `status` mode drives an indicatif bar fed from rate-limited events,
//! `dots` prints one `.` per block to stderr, `none` shows nothing.

use indicatif::{ProgressBar, ProgressStyle};
use isoforge_core::{CopyProgress, ProgressMode};
use std::io::Write;

/// Terminal side of the copy progress callback
#[derive(Clone)]
pub struct ProgressDisplay {
    mode: ProgressMode,
    bar: ProgressBar,
}

impl ProgressDisplay {
    /// Create a display for `mode`; `hidden` suppresses all output
    pub fn new(mode: ProgressMode, hidden: bool) -> Self {
        let bar = if hidden || mode != ProgressMode::Status {
            ProgressBar::hidden()
        } else {
            create_block_progress_bar()
        };
        let mode = if hidden { ProgressMode::None } else { mode };
        Self { mode, bar }
    }

    /// Progress mode the copy engine should run with
    pub fn mode(&self) -> ProgressMode {
        self.mode
    }

    /// Callback to hand to the assembler
    pub fn callback(&self) -> impl Fn(&CopyProgress) + Send + Sync + 'static {
        let display = self.clone();
        move |progress| display.update(progress)
    }

    fn update(&self, progress: &CopyProgress) {
        match self.mode {
            ProgressMode::None => {}
            ProgressMode::Status => {
                self.bar.set_length(progress.total_blocks);
                self.bar.set_position(progress.blocks_written);
                self.bar.set_message(format!(
                    "{}, ETA: {}",
                    progress.speed_display(),
                    progress.eta_display()
                ));
            }
            ProgressMode::Markers => {
                let mut stderr = std::io::stderr().lock();
                let _ = stderr.write_all(b".");
                let _ = stderr.flush();
            }
        }
    }

    /// Clear the bar or end the marker line
    pub fn finish(&self) {
        match self.mode {
            ProgressMode::Status => self.bar.finish_and_clear(),
            ProgressMode::Markers => eprintln!(),
            ProgressMode::None => {}
        }
    }
}

fn create_block_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template(
            "  {spinner:.green} Writing [{bar:40.cyan/blue}] {pos}/{len} blocks ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    pb.set_style(style);
    pb
}

/// Format a size in bytes to human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(format_size(1024u64 * 1024 * 1024 * 1024), "1.00 TB");
    }

    #[test]
    fn test_hidden_display_disables_progress() {
        let display = ProgressDisplay::new(ProgressMode::Markers, true);
        assert_eq!(display.mode(), ProgressMode::None);
    }

    #[test]
    fn test_display_keeps_mode() {
        for mode in [ProgressMode::None, ProgressMode::Status, ProgressMode::Markers] {
            assert_eq!(ProgressDisplay::new(mode, false).mode(), mode);
        }
    }

    #[test]
    fn test_status_callback_updates_bar() {
        let display = ProgressDisplay::new(ProgressMode::Status, false);
        let callback = display.callback();

        let mut progress = CopyProgress::new(10, 2048);
        progress.blocks_written = 4;
        callback(&progress);

        assert_eq!(display.bar.length(), Some(10));
        assert_eq!(display.bar.position(), 4);
        display.finish();
    }
}
