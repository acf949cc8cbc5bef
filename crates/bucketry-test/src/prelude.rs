//! Convenient re-exports for common use.

pub use crate::bucket_conformance_tests;
pub use crate::mem::MemBucket;
