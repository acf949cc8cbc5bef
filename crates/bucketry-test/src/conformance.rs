//! Behaviour every [`Bucket`] backend must share.
//!
//! Each check expects an empty bucket and deletes what it created before
//! returning, so the checks can run one after another against a real bucket
//! as well as in parallel against fresh fakes. Failures panic.

use std::sync::Arc;

use bucketry_core::list::list_all;
use bucketry_core::ops::{
    DeleteAllOptions, create_empty_objects, create_object, delete_all_objects, list_prefix,
};
use bucketry_core::types::{CreateObjectRequest, DEFAULT_CONTENT_TYPE, Query};
use bucketry_core::{Bucket, ErrorKind};
use bucketry_runtime::CancellationToken;
use bytes::Bytes;

/// Names used by the delimiter scenario.
pub const DELIMITER_NAMES: &[&str] = &[
    "a",
    "b!foo",
    "b!bar",
    "b!baz!qux",
    "c!",
    "d!taco",
    "d!burrito",
    "e",
];

/// Names used by the byte-ordering scenario.
///
/// Names are UTF-8, so a raw `0xFF` byte cannot appear; `"a\u{ff}"` stands in
/// for it and encodes as `61 C3 BF`, which still sorts after `"a"` and before
/// `"b"` byte-wise.
pub const BYTE_ORDER_NAMES: &[&str] = &["a", "a\u{ff}", "b", "b\u{0}", "b\u{1}", "b\u{2603}", "c"];

/// Runs every check in sequence.
pub async fn run_all(bucket: Arc<dyn Bucket>) {
    empty_listing(bucket.clone()).await;
    delimiter_grouping(bucket.clone()).await;
    byte_order_prefix(bucket.clone()).await;
    pagination_is_complete(bucket.clone()).await;
    delete_missing_is_not_found(bucket.clone()).await;
    writer_publishes_on_close(bucket.clone()).await;
    dropped_writer_publishes_nothing(bucket.clone()).await;
    overwrite_replaces_snapshot(bucket.clone()).await;
    metadata_round_trips(bucket.clone()).await;
    bulk_delete_empties_bucket(bucket.clone()).await;
    bulk_delete_respects_prefix(bucket).await;
}

/// Deletes every object in the bucket.
pub async fn clear(bucket: Arc<dyn Bucket>) {
    delete_all_objects(bucket, DeleteAllOptions::default(), &CancellationToken::new())
        .await
        .expect("clear bucket");
}

/// An empty bucket lists as one empty, final page.
pub async fn empty_listing(bucket: Arc<dyn Bucket>) {
    let page = bucket.list_page(&Query::new()).await.expect("list empty bucket");
    assert!(page.objects.is_empty(), "objects: {:?}", page.objects);
    assert!(page.prefixes.is_empty(), "prefixes: {:?}", page.prefixes);
    assert!(page.next.is_none(), "next: {:?}", page.next);

    let page = bucket
        .list_page(&Query::new().with_prefix("x").with_delimiter("/"))
        .await
        .expect("list empty bucket with delimiter");
    assert!(page.is_empty() && page.is_last());
}

/// Delimiters fold names at their first occurrence after the prefix.
pub async fn delimiter_grouping(bucket: Arc<dyn Bucket>) {
    create_empty_objects(bucket.as_ref(), DELIMITER_NAMES.iter().copied())
        .await
        .expect("create objects");

    let listing = list_all(bucket.as_ref(), Query::new().with_delimiter("!"))
        .await
        .expect("list with delimiter");
    let names: Vec<_> = listing.names().collect();
    assert_eq!(names, ["a", "e"]);
    assert_eq!(listing.prefixes, ["b!", "c!", "d!"]);

    let listing = list_all(bucket.as_ref(), Query::new().with_prefix("b!").with_delimiter("!"))
        .await
        .expect("list nested prefix");
    let names: Vec<_> = listing.names().collect();
    assert_eq!(names, ["b!bar", "b!foo"]);
    assert_eq!(listing.prefixes, ["b!baz!"]);

    let listing = list_all(bucket.as_ref(), Query::new().with_prefix("d!"))
        .await
        .expect("list without delimiter");
    let names: Vec<_> = listing.names().collect();
    assert_eq!(names, ["d!burrito", "d!taco"]);
    assert!(listing.prefixes.is_empty());

    clear(bucket).await;
}

/// Prefix matching and ordering compare raw bytes.
pub async fn byte_order_prefix(bucket: Arc<dyn Bucket>) {
    create_empty_objects(bucket.as_ref(), BYTE_ORDER_NAMES.iter().copied())
        .await
        .expect("create objects");

    let names = list_prefix(bucket.as_ref(), "b").await.expect("list prefix");
    assert_eq!(names, ["b", "b\u{0}", "b\u{1}", "b\u{2603}"]);

    let names = list_prefix(bucket.as_ref(), "").await.expect("list everything");
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert_eq!(names.len(), BYTE_ORDER_NAMES.len());

    clear(bucket).await;
}

/// Concatenated pages equal a single listing, whatever the page size.
pub async fn pagination_is_complete(bucket: Arc<dyn Bucket>) {
    let flat: Vec<String> = (0..25).map(|i| format!("obj-{i:02}")).collect();
    let nested: Vec<String> = (0..5)
        .flat_map(|d| (0..3).map(move |i| format!("dir-{d}/{i}")))
        .collect();
    create_empty_objects(bucket.as_ref(), flat.iter().chain(&nested).cloned())
        .await
        .expect("create objects");

    for page_size in [1, 2, 7, 25, 100] {
        let query = Query::new().with_prefix("obj-").with_max_results(page_size);
        let listing = list_all(bucket.as_ref(), query).await.expect("paged listing");
        let names: Vec<_> = listing.names().collect();
        assert_eq!(names, flat, "page size {page_size}");

        let query = Query::new().with_delimiter("/").with_max_results(page_size);
        let listing = list_all(bucket.as_ref(), query).await.expect("paged grouping");
        let expected: Vec<String> = (0..5).map(|d| format!("dir-{d}/")).collect();
        assert_eq!(listing.prefixes, expected, "page size {page_size}");
        assert_eq!(listing.objects.len(), flat.len(), "page size {page_size}");
    }

    clear(bucket).await;
}

/// Deleting or statting an absent object reports `NotFound`.
pub async fn delete_missing_is_not_found(bucket: Arc<dyn Bucket>) {
    let err = bucket.delete_object("missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");

    let err = bucket.stat_object("missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");

    create_object(bucket.as_ref(), CreateObjectRequest::new("present"), Bytes::new())
        .await
        .expect("create object");
    bucket.delete_object("present").await.expect("delete present");

    let err = bucket.delete_object("present").await.unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

/// Written data is invisible until the writer closes.
pub async fn writer_publishes_on_close(bucket: Arc<dyn Bucket>) {
    let mut writer = bucket
        .create_writer(CreateObjectRequest::new("pending"))
        .await
        .expect("create writer");
    writer
        .write(Bytes::from_static(b"hello "))
        .await
        .expect("first write");
    writer
        .write(Bytes::from_static(b"world"))
        .await
        .expect("second write");

    assert!(list_prefix(bucket.as_ref(), "pending").await.unwrap().is_empty());
    assert!(bucket.stat_object("pending").await.unwrap_err().is_not_found());

    let object = writer.close().await.expect("close writer");
    assert_eq!(object.name, "pending");
    assert_eq!(object.bucket, bucket.name());
    assert_eq!(object.size, 11);
    assert_eq!(object.content_type, DEFAULT_CONTENT_TYPE);

    let names = list_prefix(bucket.as_ref(), "").await.expect("list");
    assert_eq!(names, ["pending"]);

    let err = writer.close().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    clear(bucket).await;
}

/// A writer dropped before `close` leaves no trace.
pub async fn dropped_writer_publishes_nothing(bucket: Arc<dyn Bucket>) {
    let mut writer = bucket
        .create_writer(CreateObjectRequest::new("abandoned"))
        .await
        .expect("create writer");
    writer
        .write(Bytes::from_static(b"partial"))
        .await
        .expect("write");
    drop(writer);

    let page = bucket.list_page(&Query::new()).await.expect("list");
    assert!(page.is_empty());
}

/// Writing an existing name replaces its snapshot.
pub async fn overwrite_replaces_snapshot(bucket: Arc<dyn Bucket>) {
    let first = create_object(bucket.as_ref(), CreateObjectRequest::new("a"), "1")
        .await
        .expect("first write");
    let second = create_object(bucket.as_ref(), CreateObjectRequest::new("a"), "22")
        .await
        .expect("second write");
    assert!(second.generation > first.generation);

    let stat = bucket.stat_object("a").await.expect("stat");
    assert_eq!(stat.size, 2);
    assert_eq!(stat.generation, second.generation);

    let names = list_prefix(bucket.as_ref(), "").await.expect("list");
    assert_eq!(names, ["a"]);

    clear(bucket).await;
}

/// Content metadata set at creation is reported back.
pub async fn metadata_round_trips(bucket: Arc<dyn Bucket>) {
    let request = CreateObjectRequest::new("page.html")
        .with_content_type("text/html")
        .with_content_language("fr")
        .with_cache_control("no-cache");
    create_object(bucket.as_ref(), request, "<p>bonjour</p>")
        .await
        .expect("create object");

    let object = bucket.stat_object("page.html").await.expect("stat");
    assert_eq!(object.content_type, "text/html");
    assert_eq!(object.content_language.as_deref(), Some("fr"));
    assert_eq!(object.cache_control.as_deref(), Some("no-cache"));
    assert_eq!(object.size, 14);

    let listing = list_all(bucket.as_ref(), Query::new()).await.expect("list");
    assert_eq!(listing.objects, [object]);

    clear(bucket).await;
}

/// Bulk delete removes everything through several pages and workers.
pub async fn bulk_delete_empties_bucket(bucket: Arc<dyn Bucket>) {
    let names: Vec<String> = (0..120).map(|i| format!("bulk/{i:03}")).collect();
    create_empty_objects(bucket.as_ref(), names).await.expect("create objects");

    let options = DeleteAllOptions::default()
        .with_parallelism(10)
        .with_page_size(7);
    let summary = delete_all_objects(bucket.clone(), options, &CancellationToken::new())
        .await
        .expect("bulk delete");
    assert_eq!(summary.listed, 120);
    assert_eq!(summary.deleted, 120);

    let page = bucket.list_page(&Query::new()).await.expect("list");
    assert!(page.is_empty());
}

/// Bulk delete leaves names outside its prefix alone.
pub async fn bulk_delete_respects_prefix(bucket: Arc<dyn Bucket>) {
    create_empty_objects(bucket.as_ref(), ["keep/1", "tmp/1", "tmp/2", "tmpx"])
        .await
        .expect("create objects");

    let options = DeleteAllOptions::default().with_prefix("tmp/");
    let summary = delete_all_objects(bucket.clone(), options, &CancellationToken::new())
        .await
        .expect("bulk delete");
    assert_eq!(summary.deleted, 2);

    let names = list_prefix(bucket.as_ref(), "").await.expect("list");
    assert_eq!(names, ["keep/1", "tmpx"]);

    clear(bucket).await;
}

/// Expands every conformance check into a `#[tokio::test]`.
///
/// `$fresh` names an async function returning an empty `Arc<dyn Bucket>`;
/// it is called once per test. The invoking crate needs `tokio` with the
/// `macros` and `rt-multi-thread` features.
#[macro_export]
macro_rules! bucket_conformance_tests {
    ($fresh:path) => {
        $crate::bucket_conformance_tests!(@tests $fresh;
            empty_listing,
            delimiter_grouping,
            byte_order_prefix,
            pagination_is_complete,
            delete_missing_is_not_found,
            writer_publishes_on_close,
            dropped_writer_publishes_nothing,
            overwrite_replaces_snapshot,
            metadata_round_trips,
            bulk_delete_empties_bucket,
            bulk_delete_respects_prefix,
        );
    };
    (@tests $fresh:path; $($check:ident),* $(,)?) => {
        mod bucket_conformance {
            #[allow(unused_imports)]
            use super::*;

            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
                async fn $check() {
                    let bucket = $fresh().await;
                    $crate::conformance::$check(bucket).await;
                }
            )*
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_order_names_are_sorted_bytewise() {
        assert_eq!("a\u{ff}".as_bytes(), [0x61, 0xC3, 0xBF]);

        let mut sorted = BYTE_ORDER_NAMES.to_vec();
        sorted.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
        assert_eq!(sorted, BYTE_ORDER_NAMES);
    }
}
