//! Convenience re-exports.

pub use crate::bundle::{Bundle, BundleState};
pub use tokio_util::sync::CancellationToken;
