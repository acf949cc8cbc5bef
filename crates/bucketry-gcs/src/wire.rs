//! JSON resources exchanged with the Cloud Storage JSON API.
//!
//! The service encodes 64-bit integers (`size`, `generation`) as decimal
//! strings; conversion to [`Object`] parses them and rejects anything else as
//! a protocol violation.

use bucketry_core::types::{DEFAULT_CONTENT_TYPE, Object};
use bucketry_core::{Error, Result};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// An object resource, as returned by `objects.get`, `objects.list` and
/// `objects.insert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectResource {
    /// Object name.
    pub name: String,
    /// Bucket holding the object.
    pub bucket: String,
    /// Payload length as a decimal string.
    pub size: String,
    /// Generation as a decimal string.
    pub generation: String,
    /// MIME type of the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Content-Language metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    /// Cache-Control metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
}

impl ObjectResource {
    /// Converts the resource into an [`Object`].
    pub fn into_object(self) -> Result<Object> {
        let size = parse_int(&self.name, "size", &self.size)?;
        let generation = parse_int(&self.name, "generation", &self.generation)?;

        Ok(Object {
            name: self.name,
            bucket: self.bucket,
            size,
            content_type: self
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned()),
            content_language: self.content_language,
            cache_control: self.cache_control,
            generation,
            updated: self.updated,
        })
    }
}

impl From<&Object> for ObjectResource {
    fn from(object: &Object) -> Self {
        Self {
            name: object.name.clone(),
            bucket: object.bucket.clone(),
            size: object.size.to_string(),
            generation: object.generation.to_string(),
            content_type: Some(object.content_type.clone()),
            content_language: object.content_language.clone(),
            cache_control: object.cache_control.clone(),
            updated: object.updated,
        }
    }
}

fn parse_int<T: std::str::FromStr>(name: &str, field: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        Error::protocol_violation()
            .with_message(format!("object {name:?} has non-numeric {field} {value:?}"))
    })
}

/// Response body of `objects.list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectList {
    /// Matching objects; omitted by the service when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ObjectResource>,
    /// Common prefixes; omitted by the service when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefixes: Vec<String>,
    /// Continuation token; absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Metadata part of a multipart `objects.insert` upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertMetadata {
    /// Name of the new object.
    pub name: String,
    /// MIME type of the payload.
    pub content_type: String,
    /// Content-Language metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    /// Cache-Control metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
}

/// Error envelope returned with non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorBody,
}

/// Details of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP status code.
    pub code: u16,
    /// Human-readable description.
    pub message: String,
    /// Individual failures behind the error.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorDetail>,
}

/// One entry of [`ErrorBody::errors`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable reason, such as `notFound`.
    #[serde(default)]
    pub reason: String,
    /// Human-readable description.
    #[serde(default)]
    pub message: String,
}

/// Message the service sends with a 404 for a bucket that does not exist.
pub const BUCKET_NOT_FOUND_MESSAGE: &str = "The specified bucket does not exist.";

impl ErrorResponse {
    /// Builds an envelope for `code`.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                errors: Vec::new(),
            },
        }
    }
}

impl ErrorBody {
    /// Whether the error reports the bucket itself as missing, as opposed to
    /// an object inside it.
    pub fn is_missing_bucket(&self) -> bool {
        let mentions_bucket = |message: &str| message.contains("bucket does not exist");
        mentions_bucket(&self.message)
            || self.errors.iter().any(|detail| mentions_bucket(&detail.message))
    }
}
