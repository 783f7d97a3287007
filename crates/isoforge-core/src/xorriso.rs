//! Image builder backed by the `xorriso` program
//!
//! The tree is collected as graft points and handed to
//! `xorriso -as mkisofs` in two passes: `-print-size` to learn the sector
//! count, then a run with `-o -` whose standard output becomes the image
//! stream. Nothing touches the destination until the copy engine writes it.

use crate::builder::ImageBuilder;
use crate::error::{Error, Result};
use crate::media::{MediaType, SECTOR_SIZE};
use crate::source::ImageSource;
use crate::stream::{
    read_exact_or_eof, ImageStream, StatusCode, STATUS_IO, STATUS_OVERRUN, STATUS_TRAILING_DATA,
    STATUS_TRUNCATED,
};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use walkdir::WalkDir;

/// Default program name, looked up in `PATH`
pub const XORRISO_PROGRAM: &str = "xorriso";

/// Boot images land under this directory in the image
const BOOT_DIR: &str = "boot";

/// Filesystem flags shared by both passes
const FS_FLAGS: &[&str] = &["-J", "-R", "-graft-points"];

/// Lines of xorriso diagnostics kept for a failed streaming pass
const STDERR_TAIL_LINES: usize = 5;

#[derive(Debug, Clone)]
struct Graft {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

impl Graft {
    fn pathspec(&self) -> OsString {
        let mut spec = OsString::from(&self.name);
        spec.push(if self.is_dir { "/=" } else { "=" });
        spec.push(&self.path);
        spec
    }
}

/// [`ImageBuilder`] driving `xorriso -as mkisofs`
#[derive(Debug, Clone)]
pub struct XorrisoBuilder {
    program: PathBuf,
    media: MediaType,
    volume_title: String,
    boot_image: Option<PathBuf>,
    grafts: Vec<Graft>,
    used_bytes: u64,
}

impl XorrisoBuilder {
    /// Create a builder using `xorriso` from `PATH`
    pub fn new() -> Self {
        Self::with_program(XORRISO_PROGRAM)
    }

    /// Create a builder using a specific executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            media: MediaType::default(),
            volume_title: String::new(),
            boot_image: None,
            grafts: Vec::new(),
            used_bytes: 0,
        }
    }

    /// Media type currently selected
    pub fn media(&self) -> MediaType {
        self.media
    }

    /// Bytes claimed by the items added so far, rounded to whole sectors
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Number of items in the tree
    pub fn item_count(&self) -> usize {
        self.grafts.len()
    }

    /// Arguments common to both passes, ending with the graft points
    fn mkisofs_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-as", "mkisofs", "-quiet"]
            .iter()
            .chain(FS_FLAGS)
            .map(OsString::from)
            .collect();

        if !self.volume_title.is_empty() {
            args.push("-V".into());
            args.push(self.volume_title.clone().into());
        }

        let mut pathspecs: Vec<OsString> = self.grafts.iter().map(Graft::pathspec).collect();

        if let Some(ref boot) = self.boot_image {
            let name = boot
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "boot.img".to_string());
            let in_image = format!("{}/{}", BOOT_DIR, name);

            for flag in ["-b", in_image.as_str(), "-no-emul-boot", "-boot-load-size", "4"] {
                args.push(flag.into());
            }

            let mut spec = OsString::from(&in_image);
            spec.push("=");
            spec.push(boot);
            pathspecs.push(spec);
        }

        args.extend(pathspecs);
        args
    }

    fn command(&self) -> Command {
        Command::new(&self.program)
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        if e.kind() == ErrorKind::NotFound {
            Error::Builder(format!(
                "{} not found. Install xorriso to build images.",
                self.program.display()
            ))
        } else {
            Error::Builder(format!("failed to run {}: {}", self.program.display(), e))
        }
    }

    /// First pass: ask xorriso how many sectors the image will take
    fn print_size(&self) -> Result<u64> {
        let output = self
            .command()
            .args(self.mkisofs_args())
            .arg("-print-size")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let detail = stderr.lines().last().unwrap_or("no diagnostic output");
            return Err(Error::Builder(format!(
                "xorriso could not size the image ({}): {}",
                output.status, detail
            )));
        }

        parse_sector_count(&stdout)
            .or_else(|| parse_sector_count(&stderr))
            .ok_or_else(|| Error::Builder("xorriso did not report an image size".to_string()))
    }
}

impl Default for XorrisoBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder for XorrisoBuilder {
    fn select_media(&mut self, media: MediaType) -> Result<()> {
        tracing::debug!(
            "Media {} selected ({} sectors)",
            media,
            media.capacity_sectors()
        );
        self.media = media;
        Ok(())
    }

    fn set_volume_title(&mut self, title: &str) -> Result<()> {
        self.volume_title = title.to_string();
        Ok(())
    }

    fn set_boot_image(&mut self, path: &Path) -> Result<()> {
        let size = std::fs::metadata(path)?.len();
        self.used_bytes += round_to_sector(size);
        self.boot_image = Some(path.to_path_buf());
        Ok(())
    }

    fn add_tree(&mut self, source: &ImageSource) -> std::result::Result<(), String> {
        let name = source.image_name();
        if self.grafts.iter().any(|g| g.name == name) {
            return Err(format!("an entry named '{}' is already in the image", name));
        }

        let size = measure(source.path())?;
        let capacity = self.media.capacity_bytes();
        if self.used_bytes + size > capacity {
            return Err(format!(
                "{} bytes would exceed the {} capacity ({} of {} bytes used)",
                size, self.media, self.used_bytes, capacity
            ));
        }

        tracing::debug!("Grafting {:?} as '{}' ({} bytes)", source.path(), name, size);
        self.used_bytes += size;
        self.grafts.push(Graft {
            name,
            path: source.path().to_path_buf(),
            is_dir: source.is_dir(),
        });
        Ok(())
    }

    fn build(&mut self) -> Result<Box<dyn ImageStream>> {
        let total_blocks = self.print_size()?;
        tracing::debug!("xorriso will produce {} sectors", total_blocks);

        let mut child = self
            .command()
            .args(self.mkisofs_args())
            .args(["-o", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Builder("xorriso output pipe unavailable".to_string()))?;
        let diagnostics = child
            .stderr
            .take()
            .map(|stderr| thread::spawn(move || stderr_tail(stderr)));

        Ok(Box::new(XorrisoStream {
            stdout: Some(stdout),
            child: Some(child),
            diagnostics,
            total_blocks,
            blocks_read: 0,
        }))
    }
}

/// Image stream reading the standard output of a running xorriso
///
/// The byte count must match the `-print-size` answer exactly: output ending
/// early fails with [`STATUS_TRUNCATED`], output running past the last block
/// fails with [`STATUS_TRAILING_DATA`], and a non-zero exit surfaces as its
/// exit code on the block where it is noticed.
struct XorrisoStream {
    stdout: Option<ChildStdout>,
    child: Option<Child>,
    diagnostics: Option<JoinHandle<String>>,
    total_blocks: u64,
    blocks_read: u64,
}

impl XorrisoStream {
    /// Close the pipe and collect the exit status
    ///
    /// With `kill` set the process is terminated first; its status is then
    /// not inspected.
    fn reap(&mut self, kill: bool) -> std::result::Result<(), StatusCode> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if kill {
            let _ = child.kill();
        }
        let waited = child.wait();
        let tail = self
            .diagnostics
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        match waited {
            Ok(_) if kill => Ok(()),
            Ok(status) if status.success() => Ok(()),
            Ok(status) => {
                if tail.is_empty() {
                    tracing::warn!("xorriso exited with {}", status);
                } else {
                    tracing::warn!("xorriso exited with {}: {}", status, tail);
                }
                Err(StatusCode(status.code().unwrap_or(STATUS_IO)))
            }
            Err(e) => Err(StatusCode::from(&e)),
        }
    }

    /// After the last block the pipe must be at end of file
    fn expect_eof(&mut self) -> std::result::Result<(), StatusCode> {
        let mut next = [0u8; 1];
        let extra = match self.stdout.as_mut() {
            Some(stdout) => {
                read_exact_or_eof(stdout, &mut next).map_err(|e| StatusCode::from(&e))?
            }
            None => 0,
        };
        if extra > 0 {
            tracing::warn!(
                "xorriso produced more than the {} sectors it announced",
                self.total_blocks
            );
            self.reap(true)?;
            return Err(StatusCode(STATUS_TRAILING_DATA));
        }
        self.reap(false)
    }
}

impl ImageStream for XorrisoStream {
    fn block_size(&self) -> usize {
        SECTOR_SIZE
    }

    fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    fn read_block(&mut self, buf: &mut [u8]) -> std::result::Result<usize, StatusCode> {
        if self.blocks_read >= self.total_blocks {
            return Err(StatusCode(STATUS_OVERRUN));
        }
        let Some(stdout) = self.stdout.as_mut() else {
            return Err(StatusCode(STATUS_TRUNCATED));
        };

        let n = read_exact_or_eof(stdout, buf).map_err(|e| StatusCode::from(&e))?;
        if n < buf.len() {
            // Sectors are always whole, so a short read is an early end
            self.reap(false)?;
            tracing::warn!(
                "xorriso output ended at sector {} of {}",
                self.blocks_read,
                self.total_blocks
            );
            return Err(StatusCode(STATUS_TRUNCATED));
        }

        self.blocks_read += 1;
        if self.blocks_read == self.total_blocks {
            self.expect_eof()?;
        }
        Ok(n)
    }
}

impl Drop for XorrisoStream {
    fn drop(&mut self) {
        // Closing stdout first lets a blocked writer exit
        if let Err(StatusCode(code)) = self.reap(false) {
            tracing::debug!("xorriso finished with status {}", code);
        }
    }
}

/// Last few lines xorriso wrote to stderr, joined with `; `
fn stderr_tail(stderr: ChildStderr) -> String {
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    for line in BufReader::new(stderr).lines().map_while(std::io::Result::ok) {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("; ")
}

/// Size an entry occupies in the image, in whole sectors
fn measure(path: &Path) -> std::result::Result<u64, String> {
    let metadata = std::fs::metadata(path).map_err(|e| e.to_string())?;
    if !metadata.is_dir() {
        return Ok(round_to_sector(metadata.len()));
    }

    let mut total = 0u64;
    for entry in WalkDir::new(path).follow_links(true) {
        let entry = entry.map_err(|e| e.to_string())?;
        if entry.file_type().is_file() {
            let len = entry.metadata().map_err(|e| e.to_string())?.len();
            total += round_to_sector(len);
        } else if entry.file_type().is_dir() {
            // Directory records take at least one sector
            total += SECTOR_SIZE as u64;
        }
    }
    Ok(total)
}

fn round_to_sector(len: u64) -> u64 {
    len.div_ceil(SECTOR_SIZE as u64) * SECTOR_SIZE as u64
}

/// Find the sector count in `-print-size` output
///
/// Accepts either a bare number or a `... = N` line; the last match wins.
fn parse_sector_count(output: &str) -> Option<u64> {
    output.lines().rev().find_map(|line| {
        let value = line.rsplit('=').next().unwrap_or(line).trim();
        value.parse::<u64>().ok()
    })
}
