//! Configuration for an image build

use crate::checksum::ChecksumAlgorithm;
use crate::error::{Error, Result};
use crate::media::MediaType;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Longest volume title the image format accepts
pub const MAX_VOLUME_TITLE_LEN: usize = 32;

/// Default minimum spacing between status progress events
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// What to do when the destination already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    /// Refuse to touch an existing file
    #[default]
    FailIfExists,
    /// Truncate an existing file or create a new one
    CreateOrTruncate,
}

impl OverwritePolicy {
    /// Policy for a `--force` style flag
    pub fn from_force(force: bool) -> Self {
        if force {
            OverwritePolicy::CreateOrTruncate
        } else {
            OverwritePolicy::FailIfExists
        }
    }
}

/// How copy progress is surfaced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// No progress events
    None,
    /// Rate-limited status events
    #[default]
    Status,
    /// One marker event per completed block
    #[serde(rename = "dots", alias = "markers")]
    Markers,
}

impl fmt::Display for ProgressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProgressMode::None => "none",
            ProgressMode::Status => "status",
            ProgressMode::Markers => "dots",
        };
        f.write_str(name)
    }
}

impl FromStr for ProgressMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(ProgressMode::None),
            "status" | "bar" => Ok(ProgressMode::Status),
            "dots" | "markers" => Ok(ProgressMode::Markers),
            other => Err(Error::InvalidConfig(format!(
                "unknown progress mode: {} (expected none, status or dots)",
                other
            ))),
        }
    }
}

/// Immutable description of one build, fixed at invocation start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfiguration {
    /// Where the image is written
    pub destination: PathBuf,

    /// Target media type
    pub media: MediaType,

    /// Volume title recorded in the image
    pub volume_title: String,

    /// Optional boot sector image
    pub boot_image: Option<PathBuf>,

    /// Behaviour when the destination exists
    pub overwrite: OverwritePolicy,

    /// Progress reporting mode
    pub progress: ProgressMode,

    /// Digest to compute while writing
    pub checksum: Option<ChecksumAlgorithm>,
}

impl BuildConfiguration {
    /// Create a configuration with defaults for everything but the destination
    ///
    /// The volume title defaults to the destination's file stem, cut to
    /// [`MAX_VOLUME_TITLE_LEN`] characters.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        let destination = destination.into();
        let volume_title = destination
            .file_stem()
            .map(|stem| {
                stem.to_string_lossy()
                    .chars()
                    .take(MAX_VOLUME_TITLE_LEN)
                    .collect::<String>()
            })
            .unwrap_or_default();

        Self {
            destination,
            media: MediaType::default(),
            volume_title,
            boot_image: None,
            overwrite: OverwritePolicy::default(),
            progress: ProgressMode::default(),
            checksum: None,
        }
    }

    /// Create a configuration named after a point in time
    ///
    /// Both the file name (`yyyyMMdd-HHmmss.iso`) and the volume title use the
    /// timestamp, placed in `dir`.
    pub fn timestamped<Tz: TimeZone>(dir: &Path, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        let stamp = at.format(TIMESTAMP_FORMAT).to_string();
        let mut config = Self::new(dir.join(format!("{}.iso", stamp)));
        config.volume_title = stamp;
        config
    }

    /// Set the media type
    pub fn media(mut self, media: MediaType) -> Self {
        self.media = media;
        self
    }

    /// Set the volume title
    pub fn volume_title(mut self, title: impl Into<String>) -> Self {
        self.volume_title = title.into();
        self
    }

    /// Set the boot image
    pub fn boot_image(mut self, path: Option<PathBuf>) -> Self {
        self.boot_image = path;
        self
    }

    /// Set the overwrite policy
    pub fn overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    /// Set the progress mode
    pub fn progress(mut self, mode: ProgressMode) -> Self {
        self.progress = mode;
        self
    }

    /// Set the checksum algorithm
    pub fn checksum(mut self, algorithm: Option<ChecksumAlgorithm>) -> Self {
        self.checksum = algorithm;
        self
    }

    /// Check the fields that do not depend on the filesystem
    pub fn validate(&self) -> Result<()> {
        if self.destination.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("destination path is empty".to_string()));
        }
        if self.destination.file_name().is_none() {
            return Err(Error::InvalidConfig(format!(
                "destination is not a file path: {}",
                self.destination.display()
            )));
        }
        if self.volume_title.chars().count() > MAX_VOLUME_TITLE_LEN {
            return Err(Error::InvalidConfig(format!(
                "volume title is longer than {} characters: {}",
                MAX_VOLUME_TITLE_LEN, self.volume_title
            )));
        }
        Ok(())
    }
}

/// Engine-level settings for a single block copy
#[derive(Debug, Clone)]
pub struct CopyConfig {
    /// Progress reporting mode
    pub progress: ProgressMode,

    /// Minimum spacing between status events
    pub progress_interval: Duration,

    /// Digest to compute over the written bytes
    pub checksum: Option<ChecksumAlgorithm>,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            progress: ProgressMode::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            checksum: None,
        }
    }
}

impl CopyConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the progress mode
    pub fn progress(mut self, mode: ProgressMode) -> Self {
        self.progress = mode;
        self
    }

    /// Set the minimum spacing between status events
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set the checksum algorithm
    pub fn checksum(mut self, algorithm: Option<ChecksumAlgorithm>) -> Self {
        self.checksum = algorithm;
        self
    }
}

impl From<&BuildConfiguration> for CopyConfig {
    fn from(config: &BuildConfiguration) -> Self {
        CopyConfig::new()
            .progress(config.progress)
            .checksum(config.checksum)
    }
}
