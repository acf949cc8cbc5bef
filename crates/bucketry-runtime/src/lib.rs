#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for bundle lifecycle events.
pub const TRACING_TARGET: &str = "bucketry_runtime::bundle";

mod bundle;

pub use bundle::{Bundle, BundleState};
pub use tokio_util::sync::CancellationToken;

#[doc(hidden)]
pub mod prelude;
