//! Image assembly facade
//!
//! [`ImageAssembler`] runs one build from start to finish:
//!
//! 1. Validate the configuration and the boot file
//! 2. Open the destination exclusively
//! 3. Configure the builder (media, title, boot image)
//! 4. Ingest sources one at a time, recording per-item failures
//! 5. Build the image and stream it into the destination
//! 6. Finalize the destination
//!
//! Once the destination is open, every fatal error disposes of it before
//! being returned. The partial file stays on disk, closed.

use crate::builder::ImageBuilder;
use crate::config::{BuildConfiguration, CopyConfig, DEFAULT_PROGRESS_INTERVAL};
use crate::copier::{BlockCopier, CopyProgress, CopyResult, ProgressCallback};
use crate::error::{Error, ItemFailure, Result};
use crate::sink::OutputSink;
use crate::source::SourceInput;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Outcome of a successful assembly
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    /// Image file that was written
    pub destination: PathBuf,

    /// Sources accepted into the image tree
    pub ingested: usize,

    /// Sources that were skipped, in input order
    pub item_failures: Vec<ItemFailure>,

    /// Advisory warnings that did not stop the build
    pub warnings: Vec<String>,

    /// Statistics of the block copy
    pub copy: CopyResult,

    /// Size of the finalized file in bytes
    pub bytes: u64,
}

impl AssemblyReport {
    /// Whether every source made it into the image
    pub fn is_complete(&self) -> bool {
        self.item_failures.is_empty()
    }
}

/// Result of the configure-and-ingest phase
struct Ingestion {
    ingested: usize,
    item_failures: Vec<ItemFailure>,
    warnings: Vec<String>,
}

/// Drives an [`ImageBuilder`] into a destination file
pub struct ImageAssembler<B: ImageBuilder> {
    builder: B,
    config: BuildConfiguration,
    progress_interval: Duration,
    progress_callback: Option<ProgressCallback>,
}

impl<B: ImageBuilder> ImageAssembler<B> {
    /// Create an assembler for one build
    pub fn new(builder: B, config: BuildConfiguration) -> Self {
        Self {
            builder,
            config,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            progress_callback: None,
        }
    }

    /// Minimum spacing between status progress events
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set a progress callback for the copy phase
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CopyProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Configuration this assembler runs with
    pub fn config(&self) -> &BuildConfiguration {
        &self.config
    }

    /// Build the image from `sources` and write it to the destination
    ///
    /// Sources are pulled from the iterator one at a time. A source that
    /// cannot be resolved or that the builder refuses is recorded in
    /// [`AssemblyReport::item_failures`] and skipped.
    ///
    /// # Errors
    /// * [`Error::InvalidConfig`] / [`Error::InvalidBootFile`] - before anything is created
    /// * [`Error::AlreadyExists`] / [`Error::DestinationBusy`] - destination not opened
    /// * [`Error::Builder`], [`Error::ReadFailure`], [`Error::WriteFailure`] -
    ///   destination disposed, partial file left in place
    pub fn assemble<I>(mut self, sources: I) -> Result<AssemblyReport>
    where
        I: IntoIterator,
        I::Item: Into<SourceInput>,
    {
        self.config.validate()?;
        if let Some(ref boot) = self.config.boot_image {
            validate_boot_file(boot)?;
        }

        let mut sink = OutputSink::open(&self.config.destination, self.config.overwrite)?;
        tracing::info!(
            "Assembling {} image \"{}\" at {}",
            self.config.media,
            self.config.volume_title,
            self.config.destination.display()
        );

        let outcome = self.ingest(sources).and_then(|ingestion| {
            let copy = self.build_and_copy(&mut sink)?;
            Ok((ingestion, copy))
        });

        let (ingestion, copy) = match outcome {
            Ok(done) => done,
            Err(e) => {
                sink.dispose();
                tracing::warn!(
                    "Image assembly failed, partial file left at {}: {}",
                    self.config.destination.display(),
                    e
                );
                return Err(e);
            }
        };

        let bytes = sink.close_and_finalize().inspect_err(|e| {
            tracing::warn!(
                "Failed to finalize {}: {}",
                self.config.destination.display(),
                e
            );
        })?;

        tracing::info!(
            "Wrote {} blocks ({} bytes) to {}",
            copy.blocks_written,
            bytes,
            self.config.destination.display()
        );

        Ok(AssemblyReport {
            destination: self.config.destination,
            ingested: ingestion.ingested,
            item_failures: ingestion.item_failures,
            warnings: ingestion.warnings,
            copy,
            bytes,
        })
    }

    /// Configure the builder and feed it every source
    fn ingest<I>(&mut self, sources: I) -> Result<Ingestion>
    where
        I: IntoIterator,
        I::Item: Into<SourceInput>,
    {
        let mut warnings = Vec::new();

        self.builder.select_media(self.config.media)?;
        self.builder.set_volume_title(&self.config.volume_title)?;

        if let Some(ref boot) = self.config.boot_image {
            if self.config.media.is_blu_ray() {
                let warning = format!(
                    "Boot images are not supported on {} media; {} may not boot",
                    self.config.media,
                    self.config.destination.display()
                );
                tracing::warn!("{}", warning);
                warnings.push(warning);
            }
            self.builder.set_boot_image(boot)?;
        }

        let mut ingested = 0;
        let mut item_failures = Vec::new();

        for input in sources {
            let source = match input.into().resolve() {
                Ok(source) => source,
                Err(failure) => {
                    tracing::warn!("{}", failure);
                    item_failures.push(failure);
                    continue;
                }
            };

            match self.builder.add_tree(&source) {
                Ok(()) => {
                    tracing::debug!("Added {}", source.path().display());
                    ingested += 1;
                }
                Err(reason) => {
                    let failure = ItemFailure::TreeIngestion {
                        path: source.path().to_path_buf(),
                        reason,
                    };
                    tracing::warn!("{}", failure);
                    item_failures.push(failure);
                }
            }
        }

        tracing::debug!(
            "Ingested {} sources ({} skipped)",
            ingested,
            item_failures.len()
        );

        Ok(Ingestion {
            ingested,
            item_failures,
            warnings,
        })
    }

    fn build_and_copy(&mut self, sink: &mut OutputSink) -> Result<CopyResult> {
        let mut stream = self.builder.build()?;

        let copy_config = CopyConfig::from(&self.config).progress_interval(self.progress_interval);
        let mut copier = BlockCopier::with_config(copy_config);
        if let Some(callback) = self.progress_callback.take() {
            copier = copier.on_progress(callback);
        }

        copier.copy(&mut stream, sink)
    }
}

/// Check that a boot image exists and is a regular file
pub fn validate_boot_file(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| Error::InvalidBootFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if !metadata.is_file() {
        return Err(Error::InvalidBootFile {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }

    Ok(())
}
