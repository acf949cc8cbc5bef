//! Single-call helpers over the writer and listing primitives.

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};

use super::DEFAULT_PARALLELISM;
use crate::list::list_all;
use crate::types::{CreateObjectRequest, Object, Query};
use crate::{Bucket, Error, Result, TRACING_TARGET_OPS};

/// Writes `contents` as a new snapshot of `request.name` and publishes it.
pub async fn create_object(
    bucket: &dyn Bucket,
    request: CreateObjectRequest,
    contents: impl Into<Bytes>,
) -> Result<Object> {
    request.validate()?;
    let contents = contents.into();

    let mut writer = bucket.create_writer(request).await?;
    if !contents.is_empty() {
        writer.write(contents).await?;
    }
    writer.close().await
}

/// Creates a zero-length object for each of `names`.
///
/// Objects are written concurrently; the first failure stops the batch and
/// objects already published are kept.
pub async fn create_empty_objects<I>(bucket: &dyn Bucket, names: I) -> Result<usize>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let requests: Vec<_> = names
        .into_iter()
        .map(CreateObjectRequest::new)
        .collect();
    let count = requests.len();

    futures::stream::iter(requests)
        .map(Ok::<_, Error>)
        .try_for_each_concurrent(DEFAULT_PARALLELISM, |request| async move {
            create_object(bucket, request, Bytes::new()).await.map(drop)
        })
        .await?;

    tracing::debug!(
        target: TRACING_TARGET_OPS,
        bucket = bucket.name(),
        count,
        "Created empty objects"
    );
    Ok(count)
}

/// Returns the names of every object starting with `prefix`, byte-ordered
/// as the backend lists them.
pub async fn list_prefix(bucket: &dyn Bucket, prefix: &str) -> Result<Vec<String>> {
    let listing = list_all(bucket, Query::new().with_prefix(prefix)).await?;
    Ok(listing.objects.into_iter().map(|object| object.name).collect())
}
