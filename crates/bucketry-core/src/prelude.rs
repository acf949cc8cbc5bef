//! Convenient re-exports for common use.

pub use crate::bucket::{Bucket, ObjectWriter, WriteBuffer};
pub use crate::error::{BoxedError, Error, ErrorKind, Result};
pub use crate::list::{Paginator, list_all};
pub use crate::ops::{
    DeleteAllOptions, DeleteSummary, MissingObjectPolicy, create_empty_objects, create_object,
    delete_all_objects, list_prefix,
};
pub use crate::types::{CreateObjectRequest, Cursor, Listing, Object, Page, Query};
