//! Block copy engine
//!
//! This module streams an assembled image into its destination, handling:
//! - Fixed-size block reads through [`StreamReader`]
//! - Block-count accounting (a short block still counts as one block)
//! - Throttled or per-block progress callbacks
//! - Final flush of the destination
//!
//! An engine performs exactly one copy. It moves `Idle → Copying` when
//! [`BlockCopier::copy`] starts and ends in `Completed` or `Failed`.

use crate::config::{CopyConfig, ProgressMode};
use crate::error::{Error, Result};
use crate::stream::{ImageStream, StreamReader};
use std::io::Write;
use std::time::{Duration, Instant};

#[cfg(feature = "checksum")]
use crate::checksum::ChecksumHasher;

/// Copy progress information
#[derive(Debug, Clone)]
pub struct CopyProgress {
    /// Blocks written so far
    pub blocks_written: u64,

    /// Total number of blocks in the image
    pub total_blocks: u64,

    /// Bytes written so far
    pub bytes_written: u64,

    /// Block size of the image
    pub block_size: usize,

    /// Current write speed in bytes per second
    pub speed_bps: u64,

    /// Elapsed time since start
    pub elapsed: Duration,
}

impl CopyProgress {
    /// Create a new progress instance
    pub fn new(total_blocks: u64, block_size: usize) -> Self {
        Self {
            blocks_written: 0,
            total_blocks,
            bytes_written: 0,
            block_size,
            speed_bps: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate completion percentage (0.0 to 100.0)
    pub fn percentage(&self) -> f64 {
        if self.total_blocks == 0 {
            100.0
        } else {
            (self.blocks_written as f64 / self.total_blocks as f64) * 100.0
        }
    }

    /// Check if every block has been written
    pub fn is_complete(&self) -> bool {
        self.blocks_written >= self.total_blocks
    }

    /// Status line text, e.g. `1200/4000 blocks (30.0%)`
    pub fn status_line(&self) -> String {
        format!(
            "{}/{} blocks ({:.1}%)",
            self.blocks_written,
            self.total_blocks,
            self.percentage()
        )
    }

    /// Estimated seconds remaining, once a speed is known
    pub fn eta_seconds(&self) -> Option<u64> {
        let remaining_blocks = self.total_blocks.saturating_sub(self.blocks_written);
        if self.speed_bps == 0 || remaining_blocks == 0 {
            return None;
        }
        Some(remaining_blocks * self.block_size as u64 / self.speed_bps)
    }

    /// Format speed for display (e.g., "45.2 MB/s")
    pub fn speed_display(&self) -> String {
        format_speed(self.speed_bps)
    }

    /// Format ETA for display (e.g., "2m 30s")
    pub fn eta_display(&self) -> String {
        match self.eta_seconds() {
            Some(secs) if secs > 0 => format_duration(secs),
            _ => "calculating...".to_string(),
        }
    }
}

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(&CopyProgress) + Send + Sync>;

/// Lifecycle of a [`BlockCopier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyState {
    /// Constructed, not yet started
    Idle,
    /// Copy in progress
    Copying,
    /// Every block written and the sink flushed
    Completed,
    /// Aborted by a read, write or flush failure
    Failed,
}

/// Result of a completed copy
#[derive(Debug, Clone)]
pub struct CopyResult {
    /// Blocks written (equals the image's total block count)
    pub blocks_written: u64,

    /// Bytes written
    pub bytes_written: u64,

    /// Block size of the image
    pub block_size: usize,

    /// Total time elapsed
    pub elapsed: Duration,

    /// Average speed in bytes per second
    pub average_speed: u64,

    /// Number of progress events emitted
    pub progress_events: u64,

    /// Digest of the written bytes (if a checksum algorithm was set)
    pub checksum: Option<String>,
}

impl CopyResult {
    /// Format average speed for display
    pub fn speed_display(&self) -> String {
        format_speed(self.average_speed)
    }
}

/// Copy engine for a single image
pub struct BlockCopier {
    config: CopyConfig,
    progress_callback: Option<ProgressCallback>,
    state: CopyState,
}

impl BlockCopier {
    /// Create a new engine with default configuration
    pub fn new() -> Self {
        Self::with_config(CopyConfig::default())
    }

    /// Create a new engine with custom configuration
    pub fn with_config(config: CopyConfig) -> Self {
        Self {
            config,
            progress_callback: None,
            state: CopyState::Idle,
        }
    }

    /// Set a progress callback
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CopyProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> CopyState {
        self.state
    }

    /// Copy every block of `source` into `sink`
    ///
    /// # Arguments
    /// * `source` - Assembled image, borrowed for the duration of the copy
    /// * `sink` - Destination open for sequential writing
    ///
    /// # Returns
    /// * `Ok(CopyResult)` - Every block written and the sink flushed
    /// * `Err(Error::ReadFailure)` - The producer failed; carries blocks written
    /// * `Err(Error::WriteFailure)` - Writing or flushing the sink failed
    /// * `Err(Error::InvalidState)` - This engine already ran a copy
    pub fn copy<S, W>(&mut self, source: &mut S, sink: &mut W) -> Result<CopyResult>
    where
        S: ImageStream + ?Sized,
        W: Write + ?Sized,
    {
        if self.state != CopyState::Idle {
            return Err(Error::InvalidState(format!(
                "copy engine already used (state: {:?})",
                self.state
            )));
        }

        self.state = CopyState::Copying;
        let outcome = self.copy_blocks(source, sink);
        self.state = match outcome {
            Ok(_) => CopyState::Completed,
            Err(_) => CopyState::Failed,
        };
        outcome
    }

    fn copy_blocks<S, W>(&self, source: &mut S, sink: &mut W) -> Result<CopyResult>
    where
        S: ImageStream + ?Sized,
        W: Write + ?Sized,
    {
        let block_size = source.block_size();
        let total_blocks = source.total_blocks();
        if block_size == 0 {
            return Err(Error::InvalidConfig(
                "image stream reports a block size of zero".to_string(),
            ));
        }

        tracing::debug!(
            "Copying {} blocks of {} bytes (progress: {})",
            total_blocks,
            block_size,
            self.config.progress
        );

        let start_time = Instant::now();
        let mut progress = CopyProgress::new(total_blocks, block_size);
        let mut speed_tracker = SpeedTracker::new();
        let mut throttle =
            ProgressThrottle::new(self.config.progress, self.config.progress_interval, start_time);

        #[cfg(feature = "checksum")]
        let mut hasher = self.config.checksum.map(ChecksumHasher::new);

        // Dropped on every exit path, including early returns below
        let mut buffer = vec![0u8; block_size];
        let mut reader = StreamReader::new(source);

        while progress.blocks_written < total_blocks {
            let bytes_read = reader.read(&mut buffer).map_err(|e| match e {
                Error::ReadFailure { status, .. } => Error::ReadFailure {
                    status,
                    blocks_written: progress.blocks_written,
                },
                other => other,
            })?;

            sink.write_all(&buffer[..bytes_read])
                .map_err(|source| Error::WriteFailure {
                    blocks_written: progress.blocks_written,
                    source,
                })?;

            #[cfg(feature = "checksum")]
            if let Some(ref mut h) = hasher {
                h.update(&buffer[..bytes_read]);
            }

            progress.blocks_written += 1;
            progress.bytes_written += bytes_read as u64;

            let now = Instant::now();
            progress.elapsed = now.duration_since(start_time);
            speed_tracker.update(now, progress.bytes_written);
            progress.speed_bps = speed_tracker.current_speed();

            if throttle.should_emit(now) {
                if let Some(ref callback) = self.progress_callback {
                    callback(&progress);
                }
            }
        }

        sink.flush().map_err(|source| Error::WriteFailure {
            blocks_written: progress.blocks_written,
            source,
        })?;

        let elapsed = start_time.elapsed();
        let average_speed = if elapsed.as_secs() > 0 {
            progress.bytes_written / elapsed.as_secs()
        } else {
            progress.bytes_written
        };

        #[cfg(feature = "checksum")]
        let checksum = hasher.map(ChecksumHasher::finalize_hex);
        #[cfg(not(feature = "checksum"))]
        let checksum = None;

        tracing::debug!(
            "Copied {} blocks ({} bytes) in {:?}",
            progress.blocks_written,
            progress.bytes_written,
            elapsed
        );

        Ok(CopyResult {
            blocks_written: progress.blocks_written,
            bytes_written: progress.bytes_written,
            block_size,
            elapsed,
            average_speed,
            progress_events: throttle.emitted,
            checksum,
        })
    }
}

impl Default for BlockCopier {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides which completed blocks produce a progress event
struct ProgressThrottle {
    mode: ProgressMode,
    interval: Duration,
    last_emit: Instant,
    emitted: u64,
}

impl ProgressThrottle {
    fn new(mode: ProgressMode, interval: Duration, start: Instant) -> Self {
        Self {
            mode,
            interval,
            last_emit: start,
            emitted: 0,
        }
    }

    fn should_emit(&mut self, now: Instant) -> bool {
        let emit = match self.mode {
            ProgressMode::None => false,
            ProgressMode::Markers => true,
            // Measured from the previous emission, not a fixed schedule
            ProgressMode::Status => now.duration_since(self.last_emit) >= self.interval,
        };
        if emit {
            self.last_emit = now;
            self.emitted += 1;
        }
        emit
    }
}

/// Speed tracking with smoothing
struct SpeedTracker {
    samples: Vec<(Instant, u64)>,
    max_samples: usize,
}

impl SpeedTracker {
    fn new() -> Self {
        Self {
            samples: Vec::with_capacity(10),
            max_samples: 10,
        }
    }

    fn update(&mut self, now: Instant, bytes_written: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.remove(0);
        }
        self.samples.push((now, bytes_written));
    }

    fn current_speed(&self) -> u64 {
        let (Some(first), Some(last)) = (self.samples.first(), self.samples.last()) else {
            return 0;
        };

        let duration = last.0.duration_since(first.0);
        let bytes = last.1.saturating_sub(first.1);

        if duration.as_millis() > 0 {
            (bytes as f64 / duration.as_secs_f64()) as u64
        } else {
            0
        }
    }
}

/// Format speed for display
pub fn format_speed(bytes_per_second: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes_per_second >= GB {
        format!("{:.1} GB/s", bytes_per_second as f64 / GB as f64)
    } else if bytes_per_second >= MB {
        format!("{:.1} MB/s", bytes_per_second as f64 / MB as f64)
    } else if bytes_per_second >= KB {
        format!("{:.1} KB/s", bytes_per_second as f64 / KB as f64)
    } else {
        format!("{} B/s", bytes_per_second)
    }
}

/// Format duration for display
pub fn format_duration(seconds: u64) -> String {
    if seconds >= 3600 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else if seconds >= 60 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{ReaderStream, StatusCode};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    /// Stream of `total` blocks, each filled with its index, optionally failing
    struct CountingStream {
        block_size: usize,
        total: u64,
        reads: u64,
        fail_at: Option<(u64, i32)>,
        short_last: Option<usize>,
    }

    impl CountingStream {
        fn new(block_size: usize, total: u64) -> Self {
            Self {
                block_size,
                total,
                reads: 0,
                fail_at: None,
                short_last: None,
            }
        }
    }

    impl ImageStream for CountingStream {
        fn block_size(&self) -> usize {
            self.block_size
        }

        fn total_blocks(&self) -> u64 {
            self.total
        }

        fn read_block(&mut self, buf: &mut [u8]) -> std::result::Result<usize, StatusCode> {
            self.reads += 1;
            if let Some((k, status)) = self.fail_at {
                if self.reads == k {
                    return Err(StatusCode(status));
                }
            }
            buf.fill(self.reads as u8);
            match self.short_last {
                Some(n) if self.reads == self.total => Ok(n),
                _ => Ok(buf.len()),
            }
        }
    }

    /// Sink counting write calls, optionally failing after some bytes
    #[derive(Default)]
    struct CountingSink {
        data: Vec<u8>,
        writes: u64,
        flushes: u64,
        fail_after: Option<usize>,
        fail_flush: bool,
    }

    impl Write for CountingSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(limit) = self.fail_after {
                if self.data.len() >= limit {
                    return Err(std::io::Error::other("no space left"));
                }
            }
            self.writes += 1;
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            if self.fail_flush {
                return Err(std::io::Error::other("flush failed"));
            }
            Ok(())
        }
    }

    // -------------------------------------------------------------------------
    // CopyProgress tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_copy_progress_percentage() {
        let mut progress = CopyProgress::new(200, 2048);
        assert_eq!(progress.percentage(), 0.0);

        progress.blocks_written = 50;
        assert_eq!(progress.percentage(), 25.0);

        progress.blocks_written = 200;
        assert_eq!(progress.percentage(), 100.0);
        assert!(progress.is_complete());
    }

    #[test]
    fn test_copy_progress_zero_total() {
        let progress = CopyProgress::new(0, 2048);
        assert_eq!(progress.percentage(), 100.0);
        assert!(progress.is_complete());
    }

    #[test]
    fn test_copy_progress_status_line() {
        let mut progress = CopyProgress::new(4000, 2048);
        progress.blocks_written = 1200;
        assert_eq!(progress.status_line(), "1200/4000 blocks (30.0%)");
    }

    #[test]
    fn test_copy_progress_eta() {
        let mut progress = CopyProgress::new(100, 1024);
        assert_eq!(progress.eta_display(), "calculating...");

        progress.blocks_written = 40;
        progress.speed_bps = 1024;
        assert_eq!(progress.eta_seconds(), Some(60));
        assert_eq!(progress.eta_display(), "1m 0s");

        progress.blocks_written = 100;
        assert_eq!(progress.eta_seconds(), None);
    }

    // -------------------------------------------------------------------------
    // Copy loop tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_copy_reads_and_writes_every_block() {
        let mut stream = CountingStream::new(512, 6);
        let mut sink = CountingSink::default();

        let mut copier = BlockCopier::new();
        let result = copier.copy(&mut stream, &mut sink).unwrap();

        assert_eq!(stream.reads, 6);
        assert_eq!(sink.writes, 6);
        assert_eq!(sink.flushes, 1);
        assert_eq!(result.blocks_written, 6);
        assert_eq!(result.bytes_written, 6 * 512);
        assert_eq!(sink.data.len(), 6 * 512);
        assert_eq!(sink.data[512], 2);
        assert_eq!(copier.state(), CopyState::Completed);
    }

    #[test]
    fn test_copy_short_block_counts_as_block() {
        let mut stream = CountingStream::new(512, 3);
        stream.short_last = Some(100);
        let mut sink = CountingSink::default();

        let result = BlockCopier::new().copy(&mut stream, &mut sink).unwrap();

        assert_eq!(result.blocks_written, 3);
        assert_eq!(result.bytes_written, 2 * 512 + 100);
        assert_eq!(sink.data.len(), 2 * 512 + 100);
    }

    #[test]
    fn test_copy_zero_blocks() {
        let mut stream = CountingStream::new(2048, 0);
        let mut sink = CountingSink::default();
        let events = Arc::new(AtomicU64::new(0));
        let events_clone = Arc::clone(&events);

        let mut copier = BlockCopier::with_config(CopyConfig::new().progress(ProgressMode::Markers))
            .on_progress(move |_| {
                events_clone.fetch_add(1, Ordering::SeqCst);
            });
        let result = copier.copy(&mut stream, &mut sink).unwrap();

        assert_eq!(stream.reads, 0);
        assert_eq!(sink.writes, 0);
        assert_eq!(result.blocks_written, 0);
        assert_eq!(result.progress_events, 0);
        assert_eq!(events.load(Ordering::SeqCst), 0);
        assert_eq!(copier.state(), CopyState::Completed);
    }

    #[test]
    fn test_copy_read_failure_reports_partial_count() {
        let mut stream = CountingStream::new(256, 10);
        stream.fail_at = Some((4, -2147467259));
        let mut sink = CountingSink::default();

        let mut copier = BlockCopier::new();
        let err = copier.copy(&mut stream, &mut sink).unwrap_err();

        match err {
            Error::ReadFailure {
                status,
                blocks_written,
            } => {
                assert_eq!(status, -2147467259);
                assert_eq!(blocks_written, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stream.reads, 4);
        assert_eq!(sink.writes, 3);
        assert_eq!(sink.flushes, 0);
        assert_eq!(copier.state(), CopyState::Failed);
    }

    #[test]
    fn test_copy_write_failure() {
        let mut stream = CountingStream::new(256, 10);
        let mut sink = CountingSink {
            fail_after: Some(512),
            ..Default::default()
        };

        let mut copier = BlockCopier::new();
        let err = copier.copy(&mut stream, &mut sink).unwrap_err();

        assert!(matches!(
            err,
            Error::WriteFailure {
                blocks_written: 2,
                ..
            }
        ));
        assert_eq!(stream.reads, 3);
        assert_eq!(copier.state(), CopyState::Failed);
    }

    #[test]
    fn test_copy_flush_failure_is_fatal() {
        let mut stream = CountingStream::new(256, 2);
        let mut sink = CountingSink {
            fail_flush: true,
            ..Default::default()
        };

        let mut copier = BlockCopier::new();
        let err = copier.copy(&mut stream, &mut sink).unwrap_err();

        assert!(matches!(
            err,
            Error::WriteFailure {
                blocks_written: 2,
                ..
            }
        ));
        assert_eq!(copier.state(), CopyState::Failed);
    }

    #[test]
    fn test_copy_rejects_zero_block_size() {
        let mut stream = CountingStream::new(0, 3);
        let mut sink = CountingSink::default();

        let mut copier = BlockCopier::new();
        let err = copier.copy(&mut stream, &mut sink).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(stream.reads, 0);
        assert_eq!(copier.state(), CopyState::Failed);
    }

    #[test]
    fn test_copy_engine_is_single_use() {
        let mut copier = BlockCopier::new();
        let mut sink = CountingSink::default();

        copier
            .copy(&mut CountingStream::new(64, 1), &mut sink)
            .unwrap();
        let err = copier
            .copy(&mut CountingStream::new(64, 1), &mut sink)
            .unwrap_err();

        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(copier.state(), CopyState::Completed);
    }

    #[test]
    fn test_copy_from_reader_stream() {
        let data: Vec<u8> = (0..5000).map(|i| (i % 256) as u8).collect();
        let mut stream = ReaderStream::with_len(Cursor::new(data.clone()), 2048, 5000);
        let mut target = Vec::new();

        let result = BlockCopier::new().copy(&mut stream, &mut target).unwrap();

        assert_eq!(result.blocks_written, 3);
        assert_eq!(target, data);
    }

    // -------------------------------------------------------------------------
    // Progress policy tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_markers_emit_once_per_block() {
        let mut stream = CountingStream::new(128, 7);
        let mut sink = CountingSink::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let mut copier = BlockCopier::with_config(CopyConfig::new().progress(ProgressMode::Markers))
            .on_progress(move |p| {
                seen_clone.lock().unwrap().push(p.blocks_written);
            });
        let result = copier.copy(&mut stream, &mut sink).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(result.progress_events, 7);
    }

    #[test]
    fn test_none_mode_is_silent() {
        let mut stream = CountingStream::new(128, 7);
        let mut sink = CountingSink::default();
        let events = Arc::new(AtomicU64::new(0));
        let events_clone = Arc::clone(&events);

        let mut copier = BlockCopier::with_config(CopyConfig::new().progress(ProgressMode::None))
            .on_progress(move |_| {
                events_clone.fetch_add(1, Ordering::SeqCst);
            });
        copier.copy(&mut stream, &mut sink).unwrap();

        assert_eq!(events.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_status_mode_fast_copy_is_not_per_block() {
        let mut stream = CountingStream::new(64, 1000);
        let mut sink = CountingSink::default();

        let mut copier = BlockCopier::with_config(
            CopyConfig::new()
                .progress(ProgressMode::Status)
                .progress_interval(Duration::from_secs(60)),
        );
        let result = copier.copy(&mut stream, &mut sink).unwrap();

        assert_eq!(result.blocks_written, 1000);
        assert_eq!(result.progress_events, 0);
    }

    #[test]
    fn test_throttle_uses_previous_emission() {
        let start = Instant::now();
        let mut throttle =
            ProgressThrottle::new(ProgressMode::Status, Duration::from_millis(100), start);

        assert!(!throttle.should_emit(start + Duration::from_millis(50)));
        assert!(throttle.should_emit(start + Duration::from_millis(100)));
        // Next emission is measured from 100ms, not from a 200ms schedule slot
        assert!(!throttle.should_emit(start + Duration::from_millis(150)));
        assert!(throttle.should_emit(start + Duration::from_millis(450)));
        assert!(!throttle.should_emit(start + Duration::from_millis(500)));
        assert!(throttle.should_emit(start + Duration::from_millis(550)));
        assert_eq!(throttle.emitted, 3);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut stream = CountingStream::new(32, 50);
        let mut sink = CountingSink::default();
        let last = Arc::new(AtomicU64::new(0));
        let last_clone = Arc::clone(&last);

        let mut copier = BlockCopier::with_config(CopyConfig::new().progress(ProgressMode::Markers))
            .on_progress(move |p| {
                let prev = last_clone.swap(p.blocks_written, Ordering::SeqCst);
                assert!(p.blocks_written >= prev);
                assert!(p.blocks_written <= p.total_blocks);
            });
        copier.copy(&mut stream, &mut sink).unwrap();

        assert_eq!(last.load(Ordering::SeqCst), 50);
    }

    // -------------------------------------------------------------------------
    // Checksum tests
    // -------------------------------------------------------------------------

    #[cfg(feature = "checksum")]
    #[test]
    fn test_copy_computes_checksum_of_written_bytes() {
        use crate::checksum::{ChecksumAlgorithm, ChecksumHasher};

        let data = vec![0x42u8; 3000];
        let mut stream = ReaderStream::with_len(Cursor::new(data.clone()), 1024, 3000);
        let mut target = Vec::new();

        let mut copier = BlockCopier::with_config(
            CopyConfig::new().checksum(Some(ChecksumAlgorithm::Sha256)),
        );
        let result = copier.copy(&mut stream, &mut target).unwrap();

        let mut expected = ChecksumHasher::new(ChecksumAlgorithm::Sha256);
        expected.update(&data);
        assert_eq!(result.checksum, Some(expected.finalize_hex()));
    }

    #[test]
    fn test_copy_without_checksum() {
        let mut stream = CountingStream::new(64, 2);
        let result = BlockCopier::new()
            .copy(&mut stream, &mut Vec::new())
            .unwrap();
        assert!(result.checksum.is_none());
    }

    // -------------------------------------------------------------------------
    // Format functions tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(0), "0 B/s");
        assert_eq!(format_speed(512), "512 B/s");
        assert_eq!(format_speed(1024), "1.0 KB/s");
        assert_eq!(format_speed(1536), "1.5 KB/s");
        assert_eq!(format_speed(1024 * 1024), "1.0 MB/s");
        assert_eq!(format_speed(1024 * 1024 * 1024), "1.0 GB/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3661), "1h 1m");
    }

    #[test]
    fn test_speed_tracker() {
        let mut tracker = SpeedTracker::new();
        assert_eq!(tracker.current_speed(), 0);

        let t0 = Instant::now();
        tracker.update(t0, 0);
        assert_eq!(tracker.current_speed(), 0);

        tracker.update(t0 + Duration::from_millis(500), 1024 * 1024);
        assert_eq!(tracker.current_speed(), 2 * 1024 * 1024);
    }
}
