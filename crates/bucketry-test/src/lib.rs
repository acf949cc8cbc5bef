#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod conformance;
mod mem;

pub use mem::{DEFAULT_PAGE_SIZE, MemBucket};

#[doc(hidden)]
pub mod prelude;
