//! Assembly of complete listings from single pages.

use std::collections::HashSet;

use futures::Stream;

use crate::types::{Cursor, Listing, Page, Query};
use crate::{Bucket, Error, Result, TRACING_TARGET_LIST};

/// Walks one logical listing page by page.
///
/// Each call to [`next_page`](Self::next_page) issues exactly one
/// [`Bucket::list_page`] request. A failed request leaves the paginator where
/// it was, so calling `next_page` again retries the same page. A backend
/// that hands back a cursor already used for this listing is reported as a
/// [`ProtocolViolation`](crate::ErrorKind::ProtocolViolation) and ends the
/// walk.
pub struct Paginator<'a> {
    bucket: &'a dyn Bucket,
    query: Query,
    seen: HashSet<Cursor>,
    pages: usize,
    done: bool,
}

impl<'a> Paginator<'a> {
    /// Starts a listing at `query`, which may already carry a cursor.
    pub fn new(bucket: &'a dyn Bucket, query: Query) -> Self {
        let seen = query.cursor.iter().cloned().collect();
        Self {
            bucket,
            query,
            seen,
            pages: 0,
            done: false,
        }
    }

    /// The query the next request will carry.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Pages received so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Whether the last page has been received.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetches the next page, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.done {
            return Ok(None);
        }

        let page = self.bucket.list_page(&self.query).await?;
        self.pages += 1;

        tracing::trace!(
            target: TRACING_TARGET_LIST,
            bucket = self.bucket.name(),
            page = self.pages,
            objects = page.objects.len(),
            prefixes = page.prefixes.len(),
            last = page.is_last(),
            "Received listing page"
        );

        match &page.next {
            None => self.done = true,
            Some(next) if !self.seen.insert(next.clone()) => {
                self.done = true;
                tracing::warn!(
                    target: TRACING_TARGET_LIST,
                    bucket = self.bucket.name(),
                    cursor = %next,
                    page = self.pages,
                    "Backend repeated a listing cursor"
                );
                return Err(Error::protocol_violation().with_message(format!(
                    "listing cursor {:?} did not advance after {} pages",
                    next.as_str(),
                    self.pages
                )));
            }
            Some(next) => self.query = self.query.continue_from(next.clone()),
        }

        Ok(Some(page))
    }

    /// Turns the paginator into a lazy stream of pages.
    ///
    /// The stream ends after the last page or after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Page>> + Send + 'a {
        futures::stream::try_unfold(self, |mut paginator| async move {
            let page = paginator.next_page().await?;
            Ok::<_, Error>(page.map(|page| (page, paginator)))
        })
    }
}

/// Lists every page of `query` and concatenates them in the order received.
#[tracing::instrument(
    name = "list.all",
    skip_all,
    fields(bucket = bucket.name(), prefix = %query.prefix, delimiter = ?query.delimiter)
)]
pub async fn list_all(bucket: &dyn Bucket, query: Query) -> Result<Listing> {
    let mut paginator = Paginator::new(bucket, query);
    let mut listing = Listing::default();

    while let Some(page) = paginator.next_page().await? {
        listing.extend(page);
    }

    tracing::debug!(
        target: TRACING_TARGET_LIST,
        pages = paginator.pages(),
        objects = listing.objects.len(),
        prefixes = listing.prefixes.len(),
        "Listing complete"
    );

    Ok(listing)
}
