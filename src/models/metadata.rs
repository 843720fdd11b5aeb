//! Song metadata as read from an audio file and as registered remotely.

use serde::{Deserialize, Serialize};

/// Descriptive fields read out of an audio payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetadata {
    pub name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Playback length in seconds.
    pub duration_secs: f64,
    pub year: Option<String>,
}

/// Record sent to the song service for a stored resource.
///
/// Lives only as a request payload; the song service owns it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// String form of the local resource id.
    pub id: String,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// `MM:SS`
    pub duration: String,
    pub year: Option<String>,
}

impl MetadataRecord {
    /// Bind extracted metadata to the id assigned by the local store.
    pub fn new(resource_id: i64, metadata: ExtractedMetadata) -> Self {
        Self {
            id: resource_id.to_string(),
            name: metadata.name,
            artist: metadata.artist,
            album: metadata.album,
            duration: format_duration(metadata.duration_secs),
            year: metadata.year,
        }
    }
}

/// Format a length in seconds as `MM:SS`.
///
/// Fractional seconds are truncated. Minutes are not wrapped into hours, so
/// anything past an hour keeps counting (`61:40`). Negative and NaN inputs
/// format as `00:00`.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}
