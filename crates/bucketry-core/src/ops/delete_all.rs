//! Bulk deletion fanned out over a worker pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_channel::{Receiver, Sender};
use bucketry_runtime::{Bundle, CancellationToken};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::list::Paginator;
use crate::types::Query;
use crate::{Bucket, Error, Result, TRACING_TARGET_OPS};

/// Delete workers started when the caller does not choose.
pub const DEFAULT_PARALLELISM: usize = 16;

/// Names buffered between the lister and the workers by default.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// What a delete worker does when an object vanished before it got to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MissingObjectPolicy {
    /// Fail the whole operation with the `NotFound` error.
    #[default]
    Fail,
    /// Count the object as already deleted and continue.
    Ignore,
}

/// Tuning for [`delete_all_objects`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteAllOptions {
    /// Only objects whose name starts with this are deleted.
    pub prefix: String,
    /// Number of concurrent delete workers.
    pub parallelism: usize,
    /// Capacity of the channel between the lister and the workers.
    pub channel_capacity: usize,
    /// Handling of objects that disappear mid-operation.
    pub missing: MissingObjectPolicy,
    /// Page size requested from the backend while listing.
    pub page_size: Option<u32>,
}

impl Default for DeleteAllOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            parallelism: DEFAULT_PARALLELISM,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            missing: MissingObjectPolicy::default(),
            page_size: None,
        }
    }
}

impl DeleteAllOptions {
    /// Restricts deletion to names under `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the number of delete workers.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Sets the lister-to-worker channel capacity.
    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    /// Sets the policy for objects that are already gone.
    pub fn with_missing(mut self, missing: MissingObjectPolicy) -> Self {
        self.missing = missing;
        self
    }

    /// Sets the listing page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Rejects option sets the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(Error::invalid_input().with_message("parallelism must be at least 1"));
        }
        if self.channel_capacity == 0 {
            return Err(Error::invalid_input().with_message("channel capacity must be at least 1"));
        }
        if self.page_size == Some(0) {
            return Err(Error::invalid_input().with_message("page size must be at least 1"));
        }
        Ok(())
    }

    fn query(&self) -> Query {
        let query = Query::new().with_prefix(self.prefix.as_str());
        match self.page_size {
            Some(page_size) => query.with_max_results(page_size),
            None => query,
        }
    }
}

/// Work done by a [`delete_all_objects`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSummary {
    /// Names handed to the workers.
    pub listed: u64,
    /// Objects this run removed.
    pub deleted: u64,
    /// Objects already gone when their worker reached them.
    pub missing: u64,
}

#[derive(Default)]
struct Counters {
    listed: AtomicU64,
    deleted: AtomicU64,
    missing: AtomicU64,
}

impl Counters {
    fn summary(&self) -> DeleteSummary {
        DeleteSummary {
            listed: self.listed.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
        }
    }
}

/// Closes the channel when the lister exits, however it exits.
struct CloseOnDrop<T>(Sender<T>);

impl<T> Drop for CloseOnDrop<T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Deletes every object under `options.prefix`.
///
/// One lister task pages through the bucket and pushes names into a bounded
/// channel; `options.parallelism` workers drain it. The first failure, or
/// cancellation of `token`, stops every task, and the call returns only once
/// all of them have exited. Objects deleted before a failure stay deleted.
///
/// A run interrupted through `token` always returns a `Cancelled` error, never
/// a partial success.
#[tracing::instrument(
    name = "ops.delete_all",
    skip_all,
    fields(bucket = bucket.name(), prefix = %options.prefix, workers = options.parallelism)
)]
pub async fn delete_all_objects(
    bucket: Arc<dyn Bucket>,
    options: DeleteAllOptions,
    token: &CancellationToken,
) -> Result<DeleteSummary> {
    options.validate()?;

    let (sender, receiver) = async_channel::bounded::<String>(options.channel_capacity);
    let counters = Arc::new(Counters::default());
    let bundle = Bundle::<Error>::new(token);

    tracing::debug!(target: TRACING_TARGET_OPS, "Starting bulk delete");

    let lister = List {
        bucket: Arc::clone(&bucket),
        query: options.query(),
        sender: CloseOnDrop(sender),
        counters: Arc::clone(&counters),
    };
    bundle.add(move |token| lister.run(token));

    for worker in 0..options.parallelism {
        let deleter = Delete {
            worker,
            bucket: Arc::clone(&bucket),
            receiver: receiver.clone(),
            missing: options.missing,
            counters: Arc::clone(&counters),
        };
        bundle.add(move |token| deleter.run(token));
    }
    drop(receiver);

    let outcome = bundle.join().await;
    let summary = counters.summary();

    match outcome {
        Ok(()) if token.is_cancelled() => Err(Error::cancelled().with_message(format!(
            "bulk delete cancelled after {} objects",
            summary.deleted
        ))),
        Ok(()) => {
            tracing::info!(
                target: TRACING_TARGET_OPS,
                listed = summary.listed,
                deleted = summary.deleted,
                missing = summary.missing,
                "Bulk delete complete"
            );
            Ok(summary)
        }
        Err(err) => {
            tracing::warn!(
                target: TRACING_TARGET_OPS,
                error = %err,
                deleted = summary.deleted,
                "Bulk delete failed"
            );
            Err(err)
        }
    }
}

struct List {
    bucket: Arc<dyn Bucket>,
    query: Query,
    sender: CloseOnDrop<String>,
    counters: Arc<Counters>,
}

impl List {
    async fn run(self, token: CancellationToken) -> Result<()> {
        let mut paginator = Paginator::new(self.bucket.as_ref(), self.query);

        loop {
            let page = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Error::cancelled()),
                page = paginator.next_page() => page?,
            };
            let Some(page) = page else {
                break;
            };

            for object in page.objects {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(Error::cancelled()),
                    sent = self.sender.0.send(object.name) => {
                        if sent.is_err() {
                            return Err(Error::cancelled().with_message("delete workers stopped"));
                        }
                    }
                }
                self.counters.listed.fetch_add(1, Ordering::Relaxed);
            }
        }

        tracing::debug!(
            target: TRACING_TARGET_OPS,
            pages = paginator.pages(),
            listed = self.counters.listed.load(Ordering::Relaxed),
            "Lister finished"
        );
        Ok(())
    }
}

struct Delete {
    worker: usize,
    bucket: Arc<dyn Bucket>,
    receiver: Receiver<String>,
    missing: MissingObjectPolicy,
    counters: Arc<Counters>,
}

impl Delete {
    async fn run(self, token: CancellationToken) -> Result<()> {
        loop {
            let name = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Error::cancelled()),
                name = self.receiver.recv() => match name {
                    Ok(name) => name,
                    Err(_) => break,
                },
            };

            let deleted = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Error::cancelled()),
                deleted = self.bucket.delete_object(&name) => deleted,
            };

            match deleted {
                Ok(()) => {
                    self.counters.deleted.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) if err.is_not_found() && self.missing == MissingObjectPolicy::Ignore => {
                    tracing::debug!(
                        target: TRACING_TARGET_OPS,
                        worker = self.worker,
                        object = %name,
                        "Object already gone"
                    );
                    self.counters.missing.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    tracing::debug!(
                        target: TRACING_TARGET_OPS,
                        worker = self.worker,
                        object = %name,
                        error = %err,
                        "Delete failed"
                    );
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}
