//! Tag and artwork transfer via lofty
//!
//! Reads the source's primary tag (or the first tag present), re-maps every
//! item that ID3v2 can represent, copies all pictures, and writes the result
//! into the freshly transcoded MP3.

use super::{TagTransfer, ToolError};
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{Tag, TagType};
use std::path::Path;

/// lofty-backed tag transfer (target is always written as ID3v2)
pub struct LoftyTagTransfer;

impl LoftyTagTransfer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoftyTagTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl TagTransfer for LoftyTagTransfer {
    fn transfer(&self, source: &Path, target: &Path) -> Result<usize, ToolError> {
        let tagged_file = Probe::open(source)
            .map_err(|e| ToolError::Tags(format!("open {}: {}", source.display(), e)))?
            .read()
            .map_err(|e| ToolError::Tags(format!("read {}: {}", source.display(), e)))?;

        let Some(source_tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            tracing::debug!(source = %source.display(), "Source has no tags to transfer");
            return Ok(0);
        };

        let mut id3 = Tag::new(TagType::Id3v2);
        let mut copied = 0usize;

        for item in source_tag.items() {
            if id3.insert(item.clone()) {
                copied += 1;
            }
        }
        for picture in source_tag.pictures() {
            id3.push_picture(picture.clone());
            copied += 1;
        }

        // Replaces whatever tag the transcoder wrote; lofty writes ID3v2.4
        id3.save_to_path(target, WriteOptions::default())
            .map_err(|e| ToolError::Tags(format!("write {}: {}", target.display(), e)))?;

        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            items = copied,
            "Tags transferred"
        );
        Ok(copied)
    }
}
