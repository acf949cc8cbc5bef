//! Immutable value types describing objects, listing requests and pages.

mod object;
mod page;
mod query;

pub use object::{CreateObjectRequest, DEFAULT_CONTENT_TYPE, MAX_OBJECT_NAME_LEN, Object};
pub use page::{Listing, Page};
pub use query::{Cursor, Entry, Query};
