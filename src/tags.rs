//! Audio tag access: reading track identity and embedding lyrics.

use lofty::config::WriteOptions;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use std::path::Path;

use crate::error::TagError;
use crate::models::Track;

/// Reads and writes audio file metadata.
pub trait AudioTags: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<Track, TagError>;
    fn embed_lyrics(&self, path: &Path, body: &str) -> Result<(), TagError>;
}

/// `AudioTags` backed by lofty; handles every container lofty can probe.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTags;

fn non_blank(value: Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AudioTags for LoftyTags {
    fn read_tags(&self, path: &Path) -> Result<Track, TagError> {
        let unreadable = |reason: String| TagError::Unreadable {
            path: path.to_path_buf(),
            reason,
        };
        let tagged_file = Probe::open(path)
            .and_then(|p| p.read())
            .map_err(|e| unreadable(e.to_string()))?;

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .ok_or_else(|| unreadable("no tags".to_string()))?;

        let missing = |field| TagError::MissingField {
            path: path.to_path_buf(),
            field,
        };
        let title = non_blank(tag.title()).ok_or_else(|| missing("title"))?;
        let artist = non_blank(tag.artist()).ok_or_else(|| missing("artist"))?;
        let album = non_blank(tag.album());
        let duration_secs =
            u32::try_from(tagged_file.properties().duration().as_secs()).unwrap_or(0);

        Ok(Track {
            path: path.to_path_buf(),
            title,
            artist,
            album,
            duration_secs,
        })
    }

    fn embed_lyrics(&self, path: &Path, body: &str) -> Result<(), TagError> {
        let embed_err = |reason: String| TagError::Embed {
            path: path.to_path_buf(),
            reason,
        };
        let mut tagged_file = Probe::open(path)
            .and_then(|p| p.read())
            .map_err(|e| embed_err(e.to_string()))?;

        if tagged_file.primary_tag().is_none() {
            let tag_type = tagged_file.primary_tag_type();
            tagged_file.insert_tag(Tag::new(tag_type));
        }
        let tag = tagged_file
            .primary_tag_mut()
            .ok_or_else(|| embed_err("format has no writable tag".to_string()))?;
        if !tag.insert_text(ItemKey::Lyrics, body.to_string()) {
            return Err(embed_err("tag format does not support lyrics".to_string()));
        }

        tagged_file
            .save_to_path(path, WriteOptions::default())
            .map_err(|e| embed_err(e.to_string()))
    }
}
