//! Convenient re-exports for common use.

pub use crate::auth::{Authorizer, BearerToken, NoAuth};
pub use crate::bucket::GcsBucket;
pub use crate::config::GcsConfig;
