//! Operations composed from the [`Bucket`](crate::Bucket) primitives.
//!
//! [`delete_all_objects`] is the bulk path: a lister task feeds object names
//! through a bounded channel to a pool of delete workers, all registered in
//! one [`Bundle`](bucketry_runtime::Bundle). The rest are small helpers
//! used by tests and the command-line front end.

mod delete_all;
mod objects;

pub use delete_all::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_PARALLELISM, DeleteAllOptions, DeleteSummary,
    MissingObjectPolicy, delete_all_objects,
};
pub use objects::{create_empty_objects, create_object, list_prefix};
