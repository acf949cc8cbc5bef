#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for Cloud Storage requests.
pub const TRACING_TARGET: &str = "bucketry_gcs";

mod auth;
mod bucket;
mod config;
mod error;
pub mod wire;

pub use auth::{Authorizer, BearerToken, NoAuth};
pub use bucket::GcsBucket;
pub use config::{DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT, GcsConfig};

#[doc(hidden)]
pub mod prelude;
