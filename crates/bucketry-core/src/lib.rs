#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for listing operations.
pub const TRACING_TARGET_LIST: &str = "bucketry_core::list";

/// Tracing target for bulk operations.
pub const TRACING_TARGET_OPS: &str = "bucketry_core::ops";

mod bucket;
mod error;

/// Paginated listing assembly.
pub mod list;
/// Bulk and convenience operations over any [`Bucket`].
pub mod ops;
/// Object, query and page model.
pub mod types;

pub use bucket::{Bucket, ObjectWriter, WriteBuffer};
pub use error::{BoxedError, Error, ErrorKind, Result};

#[doc(hidden)]
pub mod prelude;
