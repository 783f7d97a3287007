//! Image checksums computed while streaming
//!
//! The copy engine feeds every written block through a [`ChecksumHasher`] so
//! the digest of the produced image is known without reading it back.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// SHA-256 (recommended)
    Sha256,
    /// SHA-512
    Sha512,
}

impl ChecksumAlgorithm {
    /// Get algorithm name
    pub fn name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "SHA-256",
            ChecksumAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Get the expected output length in hex characters
    pub fn hex_length(&self) -> usize {
        match self {
            ChecksumAlgorithm::Sha256 => 64,
            ChecksumAlgorithm::Sha512 => 128,
        }
    }

    /// Get common file extension for this algorithm
    pub fn extension(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => ".sha256",
            ChecksumAlgorithm::Sha512 => ".sha512",
        }
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(ChecksumAlgorithm::Sha256),
            "sha512" => Ok(ChecksumAlgorithm::Sha512),
            other => Err(Error::InvalidConfig(format!(
                "unsupported checksum algorithm: {} (expected sha256 or sha512)",
                other
            ))),
        }
    }
}

/// Incremental hasher for one of the supported algorithms
#[cfg(feature = "checksum")]
pub enum ChecksumHasher {
    /// SHA-256 state
    Sha256(sha2::Sha256),
    /// SHA-512 state
    Sha512(sha2::Sha512),
}

#[cfg(feature = "checksum")]
impl ChecksumHasher {
    /// Start a new digest
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        use sha2::Digest;
        match algorithm {
            ChecksumAlgorithm::Sha256 => ChecksumHasher::Sha256(sha2::Sha256::new()),
            ChecksumAlgorithm::Sha512 => ChecksumHasher::Sha512(sha2::Sha512::new()),
        }
    }

    /// Feed bytes into the digest
    pub fn update(&mut self, data: &[u8]) {
        use sha2::Digest;
        match self {
            ChecksumHasher::Sha256(h) => h.update(data),
            ChecksumHasher::Sha512(h) => h.update(data),
        }
    }

    /// Finish and return the lowercase hex digest
    pub fn finalize_hex(self) -> String {
        use sha2::Digest;
        match self {
            ChecksumHasher::Sha256(h) => to_hex(&h.finalize()),
            ChecksumHasher::Sha512(h) => to_hex(&h.finalize()),
        }
    }
}

#[cfg(feature = "checksum")]
fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Path of the sidecar file for an image (`image.iso` → `image.iso.sha256`)
pub fn sidecar_path(image: &Path, algorithm: ChecksumAlgorithm) -> PathBuf {
    let mut name = image.as_os_str().to_os_string();
    name.push(algorithm.extension());
    PathBuf::from(name)
}

/// Write `<hex>  <filename>` next to the image so `sha256sum -c` accepts it
pub fn write_sidecar(image: &Path, algorithm: ChecksumAlgorithm, hex: &str) -> Result<PathBuf> {
    let filename = image
        .file_name()
        .ok_or_else(|| Error::InvalidConfig(format!("not a file path: {}", image.display())))?
        .to_string_lossy();

    let path = sidecar_path(image, algorithm);
    std::fs::write(&path, format!("{}  {}\n", hex, filename))?;
    tracing::debug!("Wrote {} checksum to {:?}", algorithm.name(), path);
    Ok(path)
}
