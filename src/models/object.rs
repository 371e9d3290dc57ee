//! Represents an uploaded artifact stored as a BLOB row.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Metadata of a single stored artifact.
///
/// This is the projection returned by listings and uploads; it never carries
/// the payload bytes. Use [`StoredPayload`] when the content is needed.
#[derive(Serialize, Clone, FromRow, Debug, PartialEq)]
pub struct StoredObject {
    /// Opaque identifier (hyphenated v4 UUID), primary key.
    pub id: String,

    /// Display filename supplied by the client or a generated placeholder.
    pub name: String,

    /// Byte length of the payload, computed at upload time.
    pub size: i64,

    /// MIME type served back on fetch.
    #[serde(rename = "type")]
    pub content_type: String,

    /// When the artifact was stored.
    pub created_at: DateTime<Utc>,

    /// Equal to `created_at`; no operation updates it.
    pub updated_at: DateTime<Utc>,
}

/// A stored artifact together with its raw bytes.
#[derive(Clone, FromRow, Debug)]
pub struct StoredPayload {
    #[sqlx(flatten)]
    pub meta: StoredObject,

    pub payload: Vec<u8>,
}

/// A validated artifact ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewObject {
    pub id: String,
    pub name: String,
    pub payload: Bytes,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

impl NewObject {
    pub fn size(&self) -> i64 {
        self.payload.len() as i64
    }
}
