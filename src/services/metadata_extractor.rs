//! Reads song metadata out of MP3 payloads.

use crate::models::metadata::ExtractedMetadata;
use id3::{ErrorKind, Tag, TagLike};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("invalid ID3 tag: {0}")]
    Tag(#[from] id3::Error),
    #[error("could not determine duration: {0}")]
    Duration(String),
}

/// Turns an audio payload into descriptive metadata. Implementations are
/// pure and must not touch the store.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedMetadata, ExtractionError>;
}

/// ID3 tag fields plus a duration computed from the MPEG frame stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mp3MetadataExtractor;

impl MetadataExtractor for Mp3MetadataExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedMetadata, ExtractionError> {
        let tag = match Tag::read_from2(Cursor::new(bytes)) {
            Ok(tag) => Some(tag),
            Err(err) if matches!(err.kind, ErrorKind::NoTag) => None,
            Err(err) => return Err(err.into()),
        };

        let duration = mp3_duration::from_read(&mut Cursor::new(bytes))
            .map_err(|err| ExtractionError::Duration(err.to_string()))?;
        if duration.is_zero() {
            return Err(ExtractionError::Duration("no MPEG audio frames".into()));
        }

        let text = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        Ok(ExtractedMetadata {
            name: tag.as_ref().and_then(|t| text(t.title())),
            artist: tag.as_ref().and_then(|t| text(t.artist())),
            album: tag.as_ref().and_then(|t| text(t.album())),
            duration_secs: duration.as_secs_f64(),
            year: tag.as_ref().and_then(|t| t.year()).map(|y| y.to_string()),
        })
    }
}
