//! # Isoforge Core
//!
//! Core library for assembling optical-disc images and streaming them to a file.
//!
//! ## Modules
//!
//! - `assembly`: End-to-end build facade with guaranteed destination disposal
//! - `builder`: The image builder seam, driven one source at a time
//! - `copier`: Block copy engine with throttled progress
//! - `stream`: Block streams and the reader adapter over them
//! - `sink`: Exclusively locked destination file
//! - `source`: Source resolution
//! - `media`: Writable media types and capacities
//! - `checksum`: Digests computed while writing, plus sidecar files
//! - `error`: Fatal and per-item error types
//! - `config`: Runtime configuration
//! - `settings`: Persistent user settings from configuration file
//! - `xorriso`: Builder backend using the `xorriso` program (feature `xorriso`)
//!
//! ## Example
//!
//! ```ignore
//! use isoforge_core::{BuildConfiguration, ImageAssembler, MediaType, XorrisoBuilder};
//!
//! let config = BuildConfiguration::new("backup.iso")
//!     .media(MediaType::Dvdplusr)
//!     .volume_title("BACKUP");
//!
//! let report = ImageAssembler::new(XorrisoBuilder::new(), config)
//!     .on_progress(|p| println!("{}", p.status_line()))
//!     .assemble(["photos", "notes.txt"])?;
//!
//! println!("Wrote {} blocks to {:?}", report.copy.blocks_written, report.destination);
//! for failure in &report.item_failures {
//!     eprintln!("skipped: {}", failure);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assembly;
pub mod builder;
pub mod checksum;
pub mod config;
pub mod copier;
pub mod error;
pub mod media;
pub mod settings;
pub mod sink;
pub mod source;
pub mod stream;
#[cfg(feature = "xorriso")]
pub mod xorriso;

pub use assembly::{validate_boot_file, AssemblyReport, ImageAssembler};
pub use builder::ImageBuilder;
#[cfg(feature = "checksum")]
pub use checksum::ChecksumHasher;
pub use checksum::{sidecar_path, write_sidecar, ChecksumAlgorithm};
pub use config::{
    BuildConfiguration, CopyConfig, OverwritePolicy, ProgressMode, DEFAULT_PROGRESS_INTERVAL,
    MAX_VOLUME_TITLE_LEN,
};
pub use copier::{
    format_duration, format_speed, BlockCopier, CopyProgress, CopyResult, CopyState,
    ProgressCallback,
};
pub use error::{Error, ItemFailure, Result};
pub use media::{MediaType, SECTOR_SIZE};
pub use settings::{BehaviorSettings, BuildSettings, Settings, SettingsError};
pub use sink::OutputSink;
pub use source::{ImageSource, SourceInput, SourceKind};
pub use stream::{
    ImageStream, ReaderStream, StatusCode, StreamReader, STATUS_IO, STATUS_OVERRUN,
    STATUS_TRAILING_DATA, STATUS_TRUNCATED,
};
#[cfg(feature = "xorriso")]
pub use xorriso::{XorrisoBuilder, XORRISO_PROGRAM};
