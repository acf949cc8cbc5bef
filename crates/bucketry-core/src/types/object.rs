//! Object snapshots and creation requests.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Content type assigned when a writer does not specify one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Longest object name, in bytes, a backend is required to accept.
pub const MAX_OBJECT_NAME_LEN: usize = 1024;

/// An immutable snapshot of one stored object.
///
/// Names order byte-wise: `str`'s `Ord` compares the UTF-8 encoding, so a
/// multi-byte character sorts by its raw bytes, after every ASCII byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    /// Key of the object, unique within its bucket.
    pub name: String,
    /// Bucket holding the object.
    pub bucket: String,
    /// Payload length in bytes.
    pub size: u64,
    /// MIME type of the payload.
    pub content_type: String,
    /// Content-Language metadata, if set.
    #[serde(default)]
    pub content_language: Option<String>,
    /// Cache-Control metadata, if set.
    #[serde(default)]
    pub cache_control: Option<String>,
    /// Snapshot identifier, increasing with every write to any name.
    pub generation: i64,
    /// Time the snapshot was written, when the backend reports it.
    #[serde(default)]
    pub updated: Option<Timestamp>,
}

/// Attributes of an object about to be written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateObjectRequest {
    /// Key of the new object; an existing object of that name is replaced.
    pub name: String,
    /// MIME type; [`DEFAULT_CONTENT_TYPE`] when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Content-Language metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    /// Cache-Control metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
}

impl CreateObjectRequest {
    /// Creates a request for `name` with no metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the Content-Language metadata.
    pub fn with_content_language(mut self, content_language: impl Into<String>) -> Self {
        self.content_language = Some(content_language.into());
        self
    }

    /// Sets the Cache-Control metadata.
    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = Some(cache_control.into());
        self
    }

    /// Returns the content type, falling back to [`DEFAULT_CONTENT_TYPE`].
    pub fn effective_content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// Rejects names no backend accepts: empty, longer than
    /// [`MAX_OBJECT_NAME_LEN`] bytes, or containing a line break.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_input().with_message("object name must not be empty"));
        }

        if self.name.len() > MAX_OBJECT_NAME_LEN {
            return Err(Error::invalid_input().with_message(format!(
                "object name is {} bytes, the limit is {MAX_OBJECT_NAME_LEN}",
                self.name.len()
            )));
        }

        if self.name.contains(['\r', '\n']) {
            return Err(Error::invalid_input().with_message("object name must not contain CR or LF"));
        }

        Ok(())
    }
}
