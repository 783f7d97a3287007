//! Block-oriented image streams and the reader adapter over them
//!
//! An image producer exposes its output through [`ImageStream`]: a fixed
//! block size, a total block count, and a read primitive that either reports
//! how many bytes it placed in the caller's buffer or fails with a status
//! code. [`StreamReader`] turns that primitive into a plain
//! `read(buffer) -> bytes` call with typed failures.

use crate::error::{Error, Result};
use std::io::Read;

/// Status reported when a producer claims to have read more than it was given
pub const STATUS_OVERRUN: i32 = -2;

/// Status reported for I/O failures that carry no OS error code
pub const STATUS_IO: i32 = -1;

/// Status reported when a producer ends before its advertised block count
pub const STATUS_TRUNCATED: i32 = -3;

/// Status reported when a producer has output past its advertised block count
pub const STATUS_TRAILING_DATA: i32 = -4;

/// Failure status code from an image producer's read primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub i32);

impl From<&std::io::Error> for StatusCode {
    fn from(err: &std::io::Error) -> Self {
        StatusCode(err.raw_os_error().unwrap_or(STATUS_IO))
    }
}

/// Sequential byte source of an assembled image
pub trait ImageStream {
    /// Size of every block in bytes (always > 0 for a valid stream)
    fn block_size(&self) -> usize;

    /// Number of blocks the producer will deliver
    fn total_blocks(&self) -> u64;

    /// Read the next block into `buf`
    ///
    /// Returns the number of bytes placed at the start of `buf`, or the
    /// producer's failure status. The byte count is meaningless on failure.
    fn read_block(&mut self, buf: &mut [u8]) -> std::result::Result<usize, StatusCode>;
}

impl<S: ImageStream + ?Sized> ImageStream for Box<S> {
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn total_blocks(&self) -> u64 {
        (**self).total_blocks()
    }

    fn read_block(&mut self, buf: &mut [u8]) -> std::result::Result<usize, StatusCode> {
        (**self).read_block(buf)
    }
}

/// Pull adapter over an [`ImageStream`]
pub struct StreamReader<'a, S: ImageStream + ?Sized> {
    stream: &'a mut S,
    blocks_read: u64,
}

impl<'a, S: ImageStream + ?Sized> StreamReader<'a, S> {
    /// Borrow a stream for reading
    pub fn new(stream: &'a mut S) -> Self {
        Self {
            stream,
            blocks_read: 0,
        }
    }

    /// Read one block into `buffer`, returning the number of valid bytes
    ///
    /// A failure status becomes [`Error::ReadFailure`] annotated with the
    /// number of blocks this reader had already delivered.
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let capacity = buffer.len();
        match self.stream.read_block(buffer) {
            Ok(n) if n <= capacity => {
                self.blocks_read += 1;
                Ok(n)
            }
            Ok(n) => {
                tracing::debug!("Producer reported {} bytes for a {} byte buffer", n, capacity);
                Err(Error::ReadFailure {
                    status: STATUS_OVERRUN,
                    blocks_written: self.blocks_read,
                })
            }
            Err(StatusCode(status)) => Err(Error::ReadFailure {
                status,
                blocks_written: self.blocks_read,
            }),
        }
    }

    /// Blocks successfully read so far
    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Block size of the underlying stream
    pub fn block_size(&self) -> usize {
        self.stream.block_size()
    }

    /// Total block count of the underlying stream
    pub fn total_blocks(&self) -> u64 {
        self.stream.total_blocks()
    }
}

/// [`ImageStream`] over any [`Read`] with a known geometry
pub struct ReaderStream<R: Read> {
    reader: R,
    block_size: usize,
    total_blocks: u64,
}

impl<R: Read> ReaderStream<R> {
    /// Wrap a reader delivering `total_blocks` blocks of `block_size` bytes
    pub fn new(reader: R, block_size: usize, total_blocks: u64) -> Self {
        Self {
            reader,
            block_size,
            total_blocks,
        }
    }

    /// Wrap a reader of `len` bytes, rounding the block count up
    pub fn with_len(reader: R, block_size: usize, len: u64) -> Self {
        let total_blocks = if block_size == 0 {
            0
        } else {
            len.div_ceil(block_size as u64)
        };
        Self::new(reader, block_size, total_blocks)
    }

    /// Unwrap the inner reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> ImageStream for ReaderStream<R> {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    fn read_block(&mut self, buf: &mut [u8]) -> std::result::Result<usize, StatusCode> {
        read_exact_or_eof(&mut self.reader, buf).map_err(|e| StatusCode::from(&e))
    }
}

/// Read exactly the buffer size or until EOF
pub(crate) fn read_exact_or_eof<R: Read>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut total_read = 0;

    while total_read < buffer.len() {
        match reader.read(&mut buffer[total_read..]) {
            Ok(0) => break,
            Ok(n) => total_read += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(total_read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Stream replaying a fixed list of primitive results
    struct Scripted {
        results: Vec<std::result::Result<usize, StatusCode>>,
    }

    impl ImageStream for Scripted {
        fn block_size(&self) -> usize {
            8
        }

        fn total_blocks(&self) -> u64 {
            self.results.len() as u64
        }

        fn read_block(&mut self, buf: &mut [u8]) -> std::result::Result<usize, StatusCode> {
            let next = self.results.remove(0);
            if let Ok(n) = next {
                let len = n.min(buf.len());
                buf[..len].fill(0x5A);
            }
            next
        }
    }

    #[test]
    fn test_reader_passes_byte_counts() {
        let mut stream = Scripted {
            results: vec![Ok(8), Ok(3), Ok(0)],
        };
        let mut reader = StreamReader::new(&mut stream);
        let mut buf = [0u8; 8];

        assert_eq!(reader.read(&mut buf).unwrap(), 8);
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.blocks_read(), 3);
    }

    #[test]
    fn test_reader_translates_status() {
        let mut stream = Scripted {
            results: vec![Ok(8), Err(StatusCode(-2147024882))],
        };
        let mut reader = StreamReader::new(&mut stream);
        let mut buf = [0u8; 8];

        reader.read(&mut buf).unwrap();
        let err = reader.read(&mut buf).unwrap_err();
        match err {
            Error::ReadFailure {
                status,
                blocks_written,
            } => {
                assert_eq!(status, -2147024882);
                assert_eq!(blocks_written, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reader_rejects_overrun() {
        let mut stream = Scripted {
            results: vec![Ok(9)],
        };
        let mut reader = StreamReader::new(&mut stream);
        let mut buf = [0u8; 16];

        // Buffer is 16 but the producer only claims 9, so this is fine
        assert_eq!(reader.read(&mut buf).unwrap(), 9);

        let mut stream = Scripted {
            results: vec![Ok(9)],
        };
        let mut reader = StreamReader::new(&mut stream);
        let mut small = [0u8; 8];
        let err = reader.read(&mut small).unwrap_err();
        assert!(matches!(
            err,
            Error::ReadFailure {
                status: STATUS_OVERRUN,
                blocks_written: 0
            }
        ));
    }

    #[test]
    fn test_reader_stream_geometry() {
        let stream = ReaderStream::with_len(Cursor::new(vec![0u8; 5000]), 2048, 5000);
        assert_eq!(stream.block_size(), 2048);
        assert_eq!(stream.total_blocks(), 3);

        let stream = ReaderStream::with_len(Cursor::new(Vec::new()), 2048, 0);
        assert_eq!(stream.total_blocks(), 0);
    }

    #[test]
    fn test_reader_stream_short_tail() {
        let data: Vec<u8> = (0..20).collect();
        let mut stream = ReaderStream::with_len(Cursor::new(data), 8, 20);
        let mut buf = [0u8; 8];

        assert_eq!(stream.read_block(&mut buf), Ok(8));
        assert_eq!(stream.read_block(&mut buf), Ok(8));
        assert_eq!(stream.read_block(&mut buf), Ok(4));
        assert_eq!(&buf[..4], &[16, 17, 18, 19]);
        assert_eq!(stream.read_block(&mut buf), Ok(0));
    }

    #[test]
    fn test_reader_stream_maps_io_errors() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("broken pipe"))
            }
        }

        let mut stream = ReaderStream::new(Failing, 8, 1);
        let mut buf = [0u8; 8];
        assert_eq!(stream.read_block(&mut buf), Err(StatusCode(STATUS_IO)));

        struct OsFailing;
        impl Read for OsFailing {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from_raw_os_error(5))
            }
        }

        let mut stream = ReaderStream::new(OsFailing, 8, 1);
        assert_eq!(stream.read_block(&mut buf), Err(StatusCode(5)));
    }

    #[test]
    fn test_read_exact_or_eof_retries_interrupted() {
        struct Flaky {
            interrupted: bool,
            inner: Cursor<Vec<u8>>,
        }
        impl Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if !self.interrupted {
                    self.interrupted = true;
                    return Err(std::io::ErrorKind::Interrupted.into());
                }
                self.inner.read(buf)
            }
        }

        let mut flaky = Flaky {
            interrupted: false,
            inner: Cursor::new(vec![1, 2, 3]),
        };
        let mut buf = [0u8; 4];
        assert_eq!(read_exact_or_eof(&mut flaky, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }
}
