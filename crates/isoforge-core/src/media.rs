//! Optical media types understood by the image builder
//!
//! Identifiers follow the physical media type numbering used by disc
//! mastering APIs. Only writable media are valid build targets; read-only and
//! physical types are recognised by name so they can be rejected with a
//! useful message.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size of one image sector in bytes
pub const SECTOR_SIZE: usize = 2048;

const CD_SECTORS: u64 = 359_846;
const DVD_SECTORS: u64 = 2_295_104;
const DVD_RAM_SECTORS: u64 = 2_236_704;
const DVD_DL_SECTORS: u64 = 4_173_824;
const BD_SECTORS: u64 = 12_219_392;

/// Writable media type targeted by an image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    /// CD-R
    Cdr,
    /// CD-RW
    Cdrw,
    /// DVD-RAM
    Dvdram,
    /// DVD+R
    Dvdplusr,
    /// DVD+RW
    Dvdplusrw,
    /// DVD+R dual layer
    DvdplusrDuallayer,
    /// DVD-R
    Dvddashr,
    /// DVD-RW
    Dvddashrw,
    /// DVD-R dual layer
    DvddashrDuallayer,
    /// DVD+RW dual layer
    #[default]
    DvdplusrwDuallayer,
    /// BD-R
    Bdr,
    /// BD-RE
    Bdre,
}

impl MediaType {
    /// Every writable media type, in identifier order
    pub const ALL: [MediaType; 12] = [
        MediaType::Cdr,
        MediaType::Cdrw,
        MediaType::Dvdram,
        MediaType::Dvdplusr,
        MediaType::Dvdplusrw,
        MediaType::DvdplusrDuallayer,
        MediaType::Dvddashr,
        MediaType::Dvddashrw,
        MediaType::DvddashrDuallayer,
        MediaType::DvdplusrwDuallayer,
        MediaType::Bdr,
        MediaType::Bdre,
    ];

    /// Identifier consumed by the builder's media-defaults selection
    pub fn id(self) -> u32 {
        match self {
            MediaType::Cdr => 2,
            MediaType::Cdrw => 3,
            MediaType::Dvdram => 5,
            MediaType::Dvdplusr => 6,
            MediaType::Dvdplusrw => 7,
            MediaType::DvdplusrDuallayer => 8,
            MediaType::Dvddashr => 9,
            MediaType::Dvddashrw => 10,
            MediaType::DvddashrDuallayer => 11,
            MediaType::DvdplusrwDuallayer => 13,
            MediaType::Bdr => 18,
            MediaType::Bdre => 19,
        }
    }

    /// Canonical name (e.g. `DVDPLUSR_DUALLAYER`)
    pub fn name(self) -> &'static str {
        match self {
            MediaType::Cdr => "CDR",
            MediaType::Cdrw => "CDRW",
            MediaType::Dvdram => "DVDRAM",
            MediaType::Dvdplusr => "DVDPLUSR",
            MediaType::Dvdplusrw => "DVDPLUSRW",
            MediaType::DvdplusrDuallayer => "DVDPLUSR_DUALLAYER",
            MediaType::Dvddashr => "DVDDASHR",
            MediaType::Dvddashrw => "DVDDASHRW",
            MediaType::DvddashrDuallayer => "DVDDASHR_DUALLAYER",
            MediaType::DvdplusrwDuallayer => "DVDPLUSRW_DUALLAYER",
            MediaType::Bdr => "BDR",
            MediaType::Bdre => "BDRE",
        }
    }

    /// Nominal capacity in 2048-byte sectors
    pub fn capacity_sectors(self) -> u64 {
        match self {
            MediaType::Cdr | MediaType::Cdrw => CD_SECTORS,
            MediaType::Dvdram => DVD_RAM_SECTORS,
            MediaType::Dvdplusr
            | MediaType::Dvdplusrw
            | MediaType::Dvddashr
            | MediaType::Dvddashrw => DVD_SECTORS,
            MediaType::DvdplusrDuallayer
            | MediaType::DvddashrDuallayer
            | MediaType::DvdplusrwDuallayer => DVD_DL_SECTORS,
            MediaType::Bdr | MediaType::Bdre => BD_SECTORS,
        }
    }

    /// Nominal capacity in bytes
    pub fn capacity_bytes(self) -> u64 {
        self.capacity_sectors() * SECTOR_SIZE as u64
    }

    /// Blu-ray media cannot carry a boot image through the builder
    pub fn is_blu_ray(self) -> bool {
        matches!(self, MediaType::Bdr | MediaType::Bdre)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Media names that exist but cannot be written to
const READ_ONLY_MEDIA: &[&str] = &[
    "UNKNOWN",
    "CDROM",
    "DVDROM",
    "DISK",
    "HDDVDROM",
    "HDDVDR",
    "HDDVDRAM",
    "BDROM",
];

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");

        if let Some(media) = MediaType::ALL
            .iter()
            .copied()
            .find(|m| m.name() == normalized)
        {
            return Ok(media);
        }

        if READ_ONLY_MEDIA.contains(&normalized.as_str()) {
            return Err(Error::InvalidConfig(format!(
                "media type {} is not a writable target",
                normalized
            )));
        }

        Err(Error::InvalidConfig(format!(
            "unknown media type: {} (run 'isoforge media' for the list)",
            s.trim()
        )))
    }
}
