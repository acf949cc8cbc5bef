//! Single listing responses and assembled listings.

use serde::{Deserialize, Serialize};

use super::{Cursor, Object};

/// One backend response to a single listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Matching objects, in backend order.
    #[serde(default)]
    pub objects: Vec<Object>,
    /// Common prefixes folded by the delimiter, in backend order.
    #[serde(default)]
    pub prefixes: Vec<String>,
    /// Cursor for the following page; `None` ends the listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Cursor>,
}

impl Page {
    /// Whether this is the final page of its listing.
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }

    /// Whether the page carries neither objects nor prefixes.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.prefixes.is_empty()
    }
}

/// The complete answer to a query, assembled page by page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Every object of every page, in concatenation order.
    pub objects: Vec<Object>,
    /// Every common prefix of every page, in concatenation order.
    pub prefixes: Vec<String>,
}

impl Listing {
    /// Appends a page, preserving its order.
    pub fn extend(&mut self, page: Page) {
        self.objects.extend(page.objects);
        self.prefixes.extend(page.prefixes);
    }

    /// Names of all listed objects.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|object| object.name.as_str())
    }

    /// Whether nothing was listed.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.prefixes.is_empty()
    }
}
