//! Destination file management
//!
//! [`OutputSink`] owns the image file from creation to close. It is opened
//! before any source is ingested, so every later failure has to dispose of it
//! explicitly; [`Drop`] disposes as a last resort.

use crate::config::OverwritePolicy;
use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Write buffer in front of the destination file
const SINK_BUFFER_SIZE: usize = 1024 * 1024;

/// Exclusively held destination file
#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
}

impl OutputSink {
    /// Create the destination according to `policy`
    ///
    /// With [`OverwritePolicy::FailIfExists`] the file is created atomically and
    /// an existing file yields [`Error::AlreadyExists`]. With
    /// [`OverwritePolicy::CreateOrTruncate`] an existing file is truncated, but
    /// only after the exclusive lock is held.
    pub fn open(path: &Path, policy: OverwritePolicy) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true);
        match policy {
            OverwritePolicy::FailIfExists => options.create_new(true),
            OverwritePolicy::CreateOrTruncate => options.create(true),
        };

        let file = options.open(path).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => Error::AlreadyExists(path.to_path_buf()),
            _ => Error::Io(e),
        })?;

        file.try_lock_exclusive().map_err(|e| lock_error(path, e))?;

        if policy == OverwritePolicy::CreateOrTruncate {
            file.set_len(0)?;
        }

        tracing::debug!("Opened destination {:?} ({:?})", path, policy);

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::with_capacity(SINK_BUFFER_SIZE, file)),
            bytes_written: 0,
        })
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Whether the handle is still open
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Flush, sync and close the destination
    ///
    /// Returns the number of bytes in the finished file.
    pub fn close_and_finalize(mut self) -> Result<u64> {
        let Some(writer) = self.writer.take() else {
            return Err(Error::InvalidState(format!(
                "destination {} is already closed",
                self.path.display()
            )));
        };

        let file = writer.into_inner().map_err(|e| Error::WriteFailure {
            blocks_written: 0,
            source: e.into_error(),
        })?;
        file.sync_all().map_err(|source| Error::WriteFailure {
            blocks_written: 0,
            source,
        })?;
        if let Err(e) = FileExt::unlock(&file) {
            tracing::debug!("Failed to unlock {:?}: {}", self.path, e);
        }

        tracing::debug!("Finalized {:?} ({} bytes)", self.path, self.bytes_written);
        Ok(self.bytes_written)
    }

    /// Close the handle in whatever state it is in
    ///
    /// Buffered bytes are still pushed to the file on a best-effort basis so the
    /// partial file reflects what was written; errors are logged, not returned.
    /// Calling this more than once is harmless.
    pub fn dispose(&mut self) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };

        if let Err(e) = writer.flush() {
            tracing::debug!("Discarding buffered data for {:?}: {}", self.path, e);
        }
        match writer.into_inner() {
            Ok(file) => {
                let _ = FileExt::unlock(&file);
            }
            Err(e) => {
                let _ = FileExt::unlock(e.into_parts().1.get_ref());
            }
        }
        tracing::debug!("Disposed destination {:?}", self.path);
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| std::io::Error::new(ErrorKind::BrokenPipe, "destination closed"))?;
        let n = writer.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Err(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "destination closed",
            )),
        }
    }
}

impl Drop for OutputSink {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Contention means another holder; anything else is a real I/O failure
fn lock_error(path: &Path, err: std::io::Error) -> Error {
    let contended = fs2::lock_contended_error();
    if err.kind() == ErrorKind::WouldBlock
        || (err.raw_os_error().is_some() && err.raw_os_error() == contended.raw_os_error())
    {
        Error::DestinationBusy(path.to_path_buf())
    } else {
        Error::Io(err)
    }
}
