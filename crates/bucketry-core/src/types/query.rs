//! Listing requests and the prefix/delimiter grouping contract.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Opaque continuation token linking consecutive pages of one listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wraps a backend-issued token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the cursor, returning the raw token.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for Cursor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// How a single name is reported by a listing for a given [`Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry<'a> {
    /// The name is reported individually.
    Object,
    /// The name is folded into this common prefix.
    Prefix(&'a str),
}

/// A listing request: filters plus an optional continuation cursor.
///
/// Queries are never mutated to continue a listing; use
/// [`continue_from`](Self::continue_from) to derive the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Only names starting with this string match.
    #[serde(default)]
    pub prefix: String,
    /// Separator folding matching names into common prefixes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    /// Continuation token; `None` asks for the first page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    /// Upper bound on entries per page; the backend may return fewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
}

impl Query {
    /// A query matching every name, first page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the listing to names starting with `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Groups names by `delimiter`. An empty delimiter disables grouping.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        let delimiter = delimiter.into();
        self.delimiter = (!delimiter.is_empty()).then_some(delimiter);
        self
    }

    /// Caps the number of entries per page.
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Starts the listing at `cursor` instead of the first page.
    pub fn with_cursor(mut self, cursor: impl Into<Cursor>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Derives the query for the page after the one that returned `cursor`.
    pub fn continue_from(&self, cursor: Cursor) -> Self {
        Self {
            cursor: Some(cursor),
            ..self.clone()
        }
    }

    /// Whether this query asks for the first page.
    pub fn is_first_page(&self) -> bool {
        self.cursor.is_none()
    }

    /// Returns the delimiter, treating an empty one as absent.
    pub fn effective_delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref().filter(|d| !d.is_empty())
    }

    /// Classifies `name` under this query's prefix and delimiter.
    ///
    /// Returns `None` when `name` does not start with the prefix. Otherwise
    /// the first occurrence of the delimiter after the prefix decides: none
    /// means [`Entry::Object`], one at `p` folds the name into
    /// `name[..p + delimiter.len()]`.
    pub fn classify<'a>(&self, name: &'a str) -> Option<Entry<'a>> {
        let rest = name.strip_prefix(self.prefix.as_str())?;

        let Some(delimiter) = self.effective_delimiter() else {
            return Some(Entry::Object);
        };

        match rest.find(delimiter) {
            Some(at) => {
                let end = self.prefix.len() + at + delimiter.len();
                Some(Entry::Prefix(&name[..end]))
            }
            None => Some(Entry::Object),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_from_keeps_filters() {
        let query = Query::new()
            .with_prefix("logs/")
            .with_delimiter("/")
            .with_max_results(5);
        let next = query.continue_from(Cursor::new("t1"));

        assert!(query.is_first_page());
        assert_eq!(next.prefix, "logs/");
        assert_eq!(next.effective_delimiter(), Some("/"));
        assert_eq!(next.max_results, Some(5));
        assert_eq!(next.cursor.as_ref().map(Cursor::as_str), Some("t1"));
    }

    #[test]
    fn empty_delimiter_is_no_delimiter() {
        let query = Query::new().with_delimiter("");
        assert_eq!(query.delimiter, None);
        assert_eq!(query.classify("a/b"), Some(Entry::Object));
    }

    #[test]
    fn classify_without_delimiter() {
        let query = Query::new().with_prefix("b");
        assert_eq!(query.classify("b!foo"), Some(Entry::Object));
        assert_eq!(query.classify("b"), Some(Entry::Object));
        assert_eq!(query.classify("a"), None);
    }

    #[test]
    fn classify_folds_at_first_delimiter_after_prefix() {
        let query = Query::new().with_delimiter("!");
        assert_eq!(query.classify("a"), Some(Entry::Object));
        assert_eq!(query.classify("b!foo"), Some(Entry::Prefix("b!")));
        assert_eq!(query.classify("b!baz!qux"), Some(Entry::Prefix("b!")));
        assert_eq!(query.classify("c!"), Some(Entry::Prefix("c!")));

        let query = Query::new().with_prefix("b!").with_delimiter("!");
        assert_eq!(query.classify("b!foo"), Some(Entry::Object));
        assert_eq!(query.classify("b!baz!qux"), Some(Entry::Prefix("b!baz!")));
    }

    #[test]
    fn classify_delimiter_inside_prefix_is_ignored() {
        let query = Query::new().with_prefix("a!b").with_delimiter("!");
        assert_eq!(query.classify("a!bc"), Some(Entry::Object));
        assert_eq!(query.classify("a!b!"), Some(Entry::Prefix("a!b!")));
    }

    #[test]
    fn classify_multi_byte_delimiter() {
        let query = Query::new().with_delimiter("\u{2603}");
        assert_eq!(
            query.classify("x\u{2603}y"),
            Some(Entry::Prefix("x\u{2603}"))
        );
    }
}
