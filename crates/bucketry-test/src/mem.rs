//! In-memory bucket with exact listing semantics.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bucketry_core::types::{CreateObjectRequest, Cursor, Entry, Object, Page, Query};
use bucketry_core::{Bucket, Error, ObjectWriter, Result, WriteBuffer};
use bytes::Bytes;
use jiff::Timestamp;

/// Entries per page when neither the bucket nor the query asks for fewer.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

const OBJECT_CURSOR: &str = "o:";
const PREFIX_CURSOR: &str = "p:";

struct Stored {
    object: Object,
    data: Bytes,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Stored>,
    generation: i64,
}

struct Inner {
    name: String,
    page_size: usize,
    max_object_size: Option<usize>,
    state: RwLock<State>,
}

/// A [`Bucket`] held entirely in memory.
///
/// Listing follows the prefix/delimiter contract exactly, pages hold at most
/// `page_size` entries (objects and prefixes together), and cursors are
/// opaque strings that stay valid while the bucket is mutated. Cloning
/// shares the contents.
#[derive(Clone)]
pub struct MemBucket {
    inner: Arc<Inner>,
}

impl MemBucket {
    /// Creates an empty bucket called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let inner = Inner {
            name: name.into(),
            page_size: DEFAULT_PAGE_SIZE,
            max_object_size: None,
            state: RwLock::default(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Caps every page at `page_size` entries.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero or the bucket has already been cloned.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        assert!(page_size > 0, "page size must be positive");
        self.inner_mut().page_size = page_size;
        self
    }

    /// Makes writes that grow an object past `limit` bytes fail.
    ///
    /// # Panics
    ///
    /// Panics if the bucket has already been cloned.
    pub fn with_max_object_size(mut self, limit: usize) -> Self {
        self.inner_mut().max_object_size = Some(limit);
        self
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.read().objects.len()
    }

    /// Whether the bucket holds no objects.
    pub fn is_empty(&self) -> bool {
        self.read().objects.is_empty()
    }

    /// Every stored name, byte-ordered.
    pub fn names(&self) -> Vec<String> {
        self.read().objects.keys().cloned().collect()
    }

    /// Payload of `name`, if stored.
    pub fn contents(&self, name: &str) -> Option<Bytes> {
        self.read().objects.get(name).map(|stored| stored.data.clone())
    }

    fn inner_mut(&mut self) -> &mut Inner {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner,
            None => panic!("MemBucket configured after being shared"),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, request: CreateObjectRequest, data: Bytes) -> Object {
        let mut state = self.write();
        state.generation += 1;

        let object = Object {
            name: request.name.clone(),
            bucket: self.inner.name.clone(),
            size: data.len() as u64,
            content_type: request.effective_content_type().to_owned(),
            content_language: request.content_language,
            cache_control: request.cache_control,
            generation: state.generation,
            updated: Some(Timestamp::now()),
        };
        let stored = Stored {
            object: object.clone(),
            data,
        };
        state.objects.insert(request.name, stored);
        object
    }

    fn page(&self, query: &Query) -> Result<Page> {
        let limit = match query.max_results {
            Some(max) if max > 0 => self.inner.page_size.min(max as usize),
            _ => self.inner.page_size,
        };

        let (start, mut folded) = match &query.cursor {
            None => (Bound::Included(query.prefix.as_str()), None),
            Some(cursor) => decode_cursor(cursor, query)?,
        };

        let state = self.read();
        let mut page = Page::default();
        let mut emitted = 0;
        let mut last = None;

        for (name, stored) in state.objects.range::<str, _>((start, Bound::Unbounded)) {
            if let Some(prefix) = folded {
                if name.starts_with(prefix) {
                    continue;
                }
            }

            // Names sharing the query prefix are contiguous.
            let Some(entry) = query.classify(name) else {
                break;
            };

            if emitted == limit {
                page.next = last;
                break;
            }
            emitted += 1;

            match entry {
                Entry::Object => {
                    page.objects.push(stored.object.clone());
                    last = Some(Cursor::new(format!("{OBJECT_CURSOR}{name}")));
                }
                Entry::Prefix(prefix) => {
                    page.prefixes.push(prefix.to_owned());
                    last = Some(Cursor::new(format!("{PREFIX_CURSOR}{prefix}")));
                    folded = Some(prefix);
                }
            }
        }

        Ok(page)
    }
}

/// Where a listing resumes, and the common prefix it must keep skipping.
fn decode_cursor<'a>(cursor: &'a Cursor, query: &Query) -> Result<(Bound<&'a str>, Option<&'a str>)> {
    let token = cursor.as_str();
    let (at, folded) = if let Some(name) = token.strip_prefix(OBJECT_CURSOR) {
        (name, None)
    } else if let Some(prefix) = token.strip_prefix(PREFIX_CURSOR) {
        (prefix, Some(prefix))
    } else {
        return Err(invalid_cursor(cursor));
    };

    if !at.starts_with(query.prefix.as_str()) {
        return Err(invalid_cursor(cursor));
    }

    match folded {
        Some(_) => Ok((Bound::Included(at), folded)),
        None => Ok((Bound::Excluded(at), None)),
    }
}

fn invalid_cursor(cursor: &Cursor) -> Error {
    Error::service().with_message(format!("invalid page token {:?}", cursor.as_str()))
}

fn missing(bucket: &str, name: &str) -> Error {
    Error::not_found().with_message(format!("object {name:?} not found in bucket {bucket:?}"))
}

#[async_trait]
impl Bucket for MemBucket {
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn list_page(&self, query: &Query) -> Result<Page> {
        self.page(query)
    }

    async fn create_writer(&self, request: CreateObjectRequest) -> Result<Box<dyn ObjectWriter>> {
        request.validate()?;
        Ok(Box::new(MemWriter {
            bucket: self.clone(),
            buffer: WriteBuffer::new(request),
        }))
    }

    async fn stat_object(&self, name: &str) -> Result<Object> {
        self.read()
            .objects
            .get(name)
            .map(|stored| stored.object.clone())
            .ok_or_else(|| missing(&self.inner.name, name))
    }

    async fn delete_object(&self, name: &str) -> Result<()> {
        match self.write().objects.remove(name) {
            Some(_) => Ok(()),
            None => Err(missing(&self.inner.name, name)),
        }
    }
}

impl std::fmt::Debug for MemBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemBucket")
            .field("name", &self.inner.name)
            .field("page_size", &self.inner.page_size)
            .field("objects", &self.len())
            .finish()
    }
}

struct MemWriter {
    bucket: MemBucket,
    buffer: WriteBuffer,
}

#[async_trait]
impl ObjectWriter for MemWriter {
    async fn write(&mut self, data: Bytes) -> Result<()> {
        if let Some(limit) = self.bucket.inner.max_object_size {
            if self.buffer.len() + data.len() > limit {
                let err = Error::service()
                    .with_message(format!("object exceeds the {limit} byte limit"));
                self.buffer.fail(&err);
                return Err(err);
            }
        }
        self.buffer.append(&data)
    }

    async fn close(&mut self) -> Result<Object> {
        let (request, data) = self.buffer.take()?;
        Ok(self.bucket.publish(request, data))
    }
}

#[cfg(test)]
mod tests {
    use bucketry_core::ErrorKind;

    use super::*;

    async fn put(bucket: &MemBucket, names: &[&str]) {
        for name in names {
            let mut writer = bucket
                .create_writer(CreateObjectRequest::new(*name))
                .await
                .unwrap();
            writer.close().await.unwrap();
        }
    }

    fn names(page: &Page) -> Vec<&str> {
        page.objects.iter().map(|o| o.name.as_str()).collect()
    }

    #[tokio::test]
    async fn pages_are_cut_with_lookahead() {
        let bucket = MemBucket::new("mem").with_page_size(2);
        put(&bucket, &["a", "b", "c", "d"]).await;

        let first = bucket.list_page(&Query::new()).await.unwrap();
        assert_eq!(names(&first), ["a", "b"]);
        let next = first.next.clone().unwrap();

        let second = bucket.list_page(&Query::new().with_cursor(next)).await.unwrap();
        assert_eq!(names(&second), ["c", "d"]);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn query_limit_below_page_size_wins() {
        let bucket = MemBucket::new("mem");
        put(&bucket, &["a", "b", "c"]).await;

        let page = bucket
            .list_page(&Query::new().with_max_results(1))
            .await
            .unwrap();
        assert_eq!(names(&page), ["a"]);
        assert!(page.next.is_some());
    }

    #[tokio::test]
    async fn prefix_cursor_skips_folded_names() {
        let bucket = MemBucket::new("mem").with_page_size(1);
        put(&bucket, &["a", "b!1", "b!2", "b!3", "c"]).await;

        let query = Query::new().with_delimiter("!");
        let first = bucket.list_page(&query).await.unwrap();
        assert_eq!(names(&first), ["a"]);

        let second = bucket
            .list_page(&query.continue_from(first.next.unwrap()))
            .await
            .unwrap();
        assert_eq!(second.prefixes, ["b!"]);

        let third = bucket
            .list_page(&query.continue_from(second.next.unwrap()))
            .await
            .unwrap();
        assert_eq!(names(&third), ["c"]);
        assert!(third.is_last());
    }

    #[tokio::test]
    async fn cursor_survives_deletion_of_its_object() {
        let bucket = MemBucket::new("mem").with_page_size(1);
        put(&bucket, &["a", "b"]).await;

        let first = bucket.list_page(&Query::new()).await.unwrap();
        bucket.delete_object("a").await.unwrap();

        let second = bucket
            .list_page(&Query::new().with_cursor(first.next.unwrap()))
            .await
            .unwrap();
        assert_eq!(names(&second), ["b"]);
    }

    #[tokio::test]
    async fn garbage_cursor_is_rejected() {
        let bucket = MemBucket::new("mem");
        let err = bucket
            .list_page(&Query::new().with_cursor("nonsense"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Service);

        let err = bucket
            .list_page(&Query::new().with_prefix("x").with_cursor("o:a"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Service);
    }

    #[tokio::test]
    async fn oversized_write_poisons_writer() {
        let bucket = MemBucket::new("mem").with_max_object_size(4);
        let mut writer = bucket
            .create_writer(CreateObjectRequest::new("big"))
            .await
            .unwrap();

        writer.write(Bytes::from_static(b"abc")).await.unwrap();
        assert!(writer.write(Bytes::from_static(b"de")).await.is_err());

        let err = writer.close().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Service);
        assert!(bucket.is_empty());
    }

    #[tokio::test]
    async fn generations_increase_across_names() {
        let bucket = MemBucket::new("mem");
        put(&bucket, &["a", "b", "a"]).await;

        let a = bucket.stat_object("a").await.unwrap();
        let b = bucket.stat_object("b").await.unwrap();
        assert!(a.generation > b.generation);
        assert_eq!(bucket.names(), ["a", "b"]);
    }
}
