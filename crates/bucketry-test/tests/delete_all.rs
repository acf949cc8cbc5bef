//! Bulk delete against the in-memory bucket, with injected faults.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bucketry_core::ops::{DeleteAllOptions, DeleteSummary, MissingObjectPolicy, delete_all_objects};
use bucketry_core::types::{CreateObjectRequest, Object, Page, Query};
use bucketry_core::{Bucket, Error, ErrorKind, ObjectWriter, Result};
use bucketry_runtime::CancellationToken;
use bucketry_test::MemBucket;

/// Wraps a [`MemBucket`] and misbehaves on selected deletes.
#[derive(Default)]
struct FaultyBucket {
    inner: Option<MemBucket>,
    vanish: HashSet<String>,
    fail_on: Option<String>,
    delay: Option<Duration>,
}

impl FaultyBucket {
    fn new(inner: &MemBucket) -> Self {
        Self {
            inner: Some(inner.clone()),
            ..Default::default()
        }
    }

    fn vanishing(mut self, name: &str) -> Self {
        self.vanish.insert(name.to_owned());
        self
    }

    fn failing_on(mut self, name: &str) -> Self {
        self.fail_on = Some(name.to_owned());
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn inner(&self) -> &MemBucket {
        self.inner.as_ref().unwrap()
    }
}

#[async_trait]
impl Bucket for FaultyBucket {
    fn name(&self) -> &str {
        self.inner().name()
    }

    async fn list_page(&self, query: &Query) -> Result<Page> {
        self.inner().list_page(query).await
    }

    async fn create_writer(&self, request: CreateObjectRequest) -> Result<Box<dyn ObjectWriter>> {
        self.inner().create_writer(request).await
    }

    async fn stat_object(&self, name: &str) -> Result<Object> {
        self.inner().stat_object(name).await
    }

    async fn delete_object(&self, name: &str) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on.as_deref() == Some(name) {
            return Err(Error::service().with_message("injected failure"));
        }
        if self.vanish.contains(name) {
            // Someone else got there first.
            let _ = self.inner().delete_object(name).await;
        }
        self.inner().delete_object(name).await
    }
}

async fn filled(count: usize) -> MemBucket {
    let bucket = MemBucket::new("bulk").with_page_size(50);
    let names = (0..count).map(|i| format!("obj-{i:04}"));
    bucketry_core::ops::create_empty_objects(&bucket, names)
        .await
        .unwrap();
    bucket
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deletes_a_thousand_objects_with_ten_workers() {
    let bucket = filled(1000).await;
    let options = DeleteAllOptions::default().with_parallelism(10);

    let summary = delete_all_objects(Arc::new(bucket.clone()), options, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.listed, 1000);
    assert_eq!(summary.deleted, 1000);
    assert_eq!(summary.missing, 0);
    assert!(bucket.is_empty());

    let page = bucket.list_page(&Query::new()).await.unwrap();
    assert!(page.is_empty() && page.is_last());
}

#[tokio::test]
async fn empty_bucket_is_zero_work() {
    let bucket = MemBucket::new("empty");
    let summary = delete_all_objects(
        Arc::new(bucket),
        DeleteAllOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(summary, DeleteSummary::default());
}

#[tokio::test]
async fn rerun_after_success_is_zero_work() {
    let bucket = filled(30).await;
    let token = CancellationToken::new();

    let first = delete_all_objects(Arc::new(bucket.clone()), DeleteAllOptions::default(), &token)
        .await
        .unwrap();
    assert_eq!(first.deleted, 30);

    let second = delete_all_objects(Arc::new(bucket), DeleteAllOptions::default(), &token)
        .await
        .unwrap();
    assert_eq!(second, DeleteSummary::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn missing_object_fails_by_default() {
    let bucket = filled(100).await;
    let faulty = FaultyBucket::new(&bucket).vanishing("obj-0042");

    let err = delete_all_objects(
        Arc::new(faulty),
        DeleteAllOptions::default().with_parallelism(4),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn missing_object_can_be_ignored() {
    let bucket = filled(100).await;
    let faulty = FaultyBucket::new(&bucket)
        .vanishing("obj-0042")
        .vanishing("obj-0077");
    let options = DeleteAllOptions::default()
        .with_parallelism(4)
        .with_missing(MissingObjectPolicy::Ignore);

    let summary = delete_all_objects(Arc::new(faulty), options, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.listed, 100);
    assert_eq!(summary.deleted, 98);
    assert_eq!(summary.missing, 2);
    assert!(bucket.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn first_worker_error_stops_the_lister() {
    let bucket = filled(1000).await;
    let faulty = FaultyBucket::new(&bucket).failing_on("obj-0005");
    let options = DeleteAllOptions::default()
        .with_parallelism(2)
        .with_channel_capacity(1);
    let token = CancellationToken::new();

    let err = delete_all_objects(Arc::new(faulty), options, &token)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Service);
    assert!(err.to_string().contains("injected failure"));
    assert!(bucket.len() > 900, "{} objects left", bucket.len());
    assert!(!token.is_cancelled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn external_cancellation_reports_cancelled() {
    let bucket = filled(200).await;
    let faulty = FaultyBucket::new(&bucket).slow(Duration::from_millis(5));
    let options = DeleteAllOptions::default().with_parallelism(2);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let err = delete_all_objects(Arc::new(faulty), options, &token)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!bucket.is_empty());
}

#[tokio::test]
async fn cancelled_before_start_deletes_nothing() {
    let bucket = filled(10).await;
    let token = CancellationToken::new();
    token.cancel();

    let err = delete_all_objects(Arc::new(bucket.clone()), DeleteAllOptions::default(), &token)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(bucket.len(), 10);
}

#[tokio::test]
async fn invalid_options_are_rejected_up_front() {
    let bucket = filled(3).await;
    let options = DeleteAllOptions::default().with_parallelism(0);

    let err = delete_all_objects(Arc::new(bucket.clone()), options, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(bucket.len(), 3);
}
