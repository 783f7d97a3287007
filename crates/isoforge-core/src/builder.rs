//! Image builder abstraction
//!
//! The file system image itself is produced by an external builder. Assembly
//! only drives it through this trait: media parameters first, then the tree
//! one item at a time, then a final build that hands back an
//! [`ImageStream`].

use crate::error::Result;
use crate::media::MediaType;
use crate::source::ImageSource;
use crate::stream::ImageStream;
use std::path::Path;

/// Builder that turns a set of source entries into a block stream
#[cfg_attr(test, mockall::automock)]
pub trait ImageBuilder {
    /// Apply the defaults of a media type (capacity, format level)
    fn select_media(&mut self, media: MediaType) -> Result<()>;

    /// Set the volume title recorded in the image
    fn set_volume_title(&mut self, title: &str) -> Result<()>;

    /// Attach a boot sector image
    fn set_boot_image(&mut self, path: &Path) -> Result<()>;

    /// Add one entry to the root of the image tree
    ///
    /// `Err` carries the builder's reason for refusing this item only; the
    /// caller records it and moves on to the next source.
    fn add_tree(&mut self, source: &ImageSource) -> std::result::Result<(), String>;

    /// Produce the assembled image
    fn build(&mut self) -> Result<Box<dyn ImageStream>>;
}

impl<B: ImageBuilder + ?Sized> ImageBuilder for Box<B> {
    fn select_media(&mut self, media: MediaType) -> Result<()> {
        (**self).select_media(media)
    }

    fn set_volume_title(&mut self, title: &str) -> Result<()> {
        (**self).set_volume_title(title)
    }

    fn set_boot_image(&mut self, path: &Path) -> Result<()> {
        (**self).set_boot_image(path)
    }

    fn add_tree(&mut self, source: &ImageSource) -> std::result::Result<(), String> {
        (**self).add_tree(source)
    }

    fn build(&mut self) -> Result<Box<dyn ImageStream>> {
        (**self).build()
    }
}
