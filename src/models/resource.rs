//! Represents an uploaded audio file stored in the local database.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// MIME type of every stored resource.
pub const RESOURCE_CONTENT_TYPE: &str = "audio/mpeg";

/// A stored audio file.
///
/// Rows are only ever inserted with their complete payload and never updated,
/// so a visible row always carries the full binary.
#[derive(Clone, FromRow)]
pub struct Resource {
    /// Store-assigned identifier, shared with the song service record.
    pub id: i64,

    /// Raw audio bytes as uploaded.
    pub data: Vec<u8>,

    /// When the resource was committed.
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// Hex MD5 of the payload, used as the HTTP entity tag.
    pub fn etag(&self) -> String {
        format!("{:x}", md5::compute(&self.data))
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("size_bytes", &self.data.len())
            .field("created_at", &self.created_at)
            .finish()
    }
}
