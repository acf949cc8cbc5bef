//! Execution of the parsed subcommands.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use bucketry_core::list::Paginator;
use bucketry_core::ops::{DeleteAllOptions, delete_all_objects};
use bucketry_core::types::{CreateObjectRequest, Object, Page, Query};
use bucketry_core::{Bucket, Error};
use bucketry_gcs::GcsBucket;
use bucketry_runtime::CancellationToken;
use bytes::BytesMut;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::TRACING_TARGET_COMMAND;
use crate::config::{Command, DeleteAllArgs, ListArgs, PutArgs};

/// Read size for uploads: 256 KiB.
const UPLOAD_CHUNK: usize = 256 * 1024;

/// Runs `command` against `bucket` until it finishes or `token` is cancelled.
pub async fn execute(
    command: Command,
    bucket: GcsBucket,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    match command {
        Command::Ls(args) => list(&bucket, args, token).await,
        Command::Stat { name } => {
            let object = until_cancelled(token, bucket.stat_object(&name))
                .await
                .with_context(|| format!("cannot stat {name:?}"))?;
            println!("{}", serde_json::to_string_pretty(&object)?);
            Ok(())
        }
        Command::Put(args) => put(&bucket, args, token).await,
        Command::Rm {
            name,
            ignore_missing,
        } => match until_cancelled(token, bucket.delete_object(&name)).await {
            Ok(()) => Ok(()),
            Err(err) if ignore_missing && err.is_not_found() => {
                tracing::info!(
                    target: TRACING_TARGET_COMMAND,
                    object = %name,
                    "Object already absent"
                );
                Ok(())
            }
            Err(err) => Err(err).with_context(|| format!("cannot delete {name:?}")),
        },
        Command::RmAll(args) => delete_all(bucket, args, token).await,
    }
}

/// Races `future` against `token`.
async fn until_cancelled<T>(
    token: &CancellationToken,
    future: impl Future<Output = bucketry_core::Result<T>>,
) -> bucketry_core::Result<T> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Error::cancelled()),
        result = future => result,
    }
}

/// Prints pages as they arrive rather than assembling the whole listing.
async fn list(bucket: &GcsBucket, args: ListArgs, token: &CancellationToken) -> anyhow::Result<()> {
    let mut query = Query::new().with_prefix(args.prefix);
    if let Some(delimiter) = args.delimiter {
        query = query.with_delimiter(delimiter);
    }
    if let Some(page_size) = args.page_size {
        query = query.with_max_results(page_size);
    }

    let mut paginator = Paginator::new(bucket, query);
    while let Some(page) = until_cancelled(token, paginator.next_page())
        .await
        .with_context(|| format!("listing failed after {} pages", paginator.pages()))?
    {
        let mut stdout = std::io::stdout().lock();
        if args.json {
            serde_json::to_writer(&mut stdout, &page)?;
            writeln!(stdout)?;
        } else {
            write_page(&mut stdout, &page)?;
        }
    }

    tracing::debug!(
        target: TRACING_TARGET_COMMAND,
        pages = paginator.pages(),
        "Listing complete"
    );
    Ok(())
}

fn write_page(out: &mut impl Write, page: &Page) -> std::io::Result<()> {
    for prefix in &page.prefixes {
        writeln!(out, "{:>12}  {:<25}  {prefix}", "PRE", "")?;
    }
    for object in &page.objects {
        write_object(out, object)?;
    }
    Ok(())
}

fn write_object(out: &mut impl Write, object: &Object) -> std::io::Result<()> {
    let updated = object
        .updated
        .map(|ts| ts.to_string())
        .unwrap_or_else(|| "-".to_owned());
    writeln!(out, "{:>12}  {updated:<25}  {}", object.size, object.name)
}

/// Streams a local file into a writer; a cancelled upload publishes nothing.
async fn put(bucket: &GcsBucket, args: PutArgs, token: &CancellationToken) -> anyhow::Result<()> {
    let mut file = File::open(&args.path)
        .await
        .with_context(|| format!("cannot open {}", args.path.display()))?;

    let mut request = CreateObjectRequest::new(&args.name);
    request.content_type = args.content_type;
    request.cache_control = args.cache_control;
    request.content_language = args.content_language;

    let mut writer = bucket.create_writer(request).await?;
    let mut chunk = BytesMut::with_capacity(UPLOAD_CHUNK);
    loop {
        chunk.reserve(UPLOAD_CHUNK);
        let read = file
            .read_buf(&mut chunk)
            .await
            .with_context(|| format!("cannot read {}", args.path.display()))?;
        if read == 0 {
            break;
        }
        until_cancelled(token, writer.write(chunk.split().freeze())).await?;
    }

    let object = until_cancelled(token, writer.close())
        .await
        .with_context(|| format!("cannot upload {:?}", args.name))?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        object = %object.name,
        size = object.size,
        generation = object.generation,
        "Uploaded object"
    );
    let mut stdout = std::io::stdout().lock();
    write_object(&mut stdout, &object)?;
    Ok(())
}

async fn delete_all(
    bucket: GcsBucket,
    args: DeleteAllArgs,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    let mut options = DeleteAllOptions::default()
        .with_prefix(args.prefix.as_str())
        .with_parallelism(args.workers)
        .with_channel_capacity(args.channel_capacity)
        .with_missing(args.missing_policy());
    if let Some(page_size) = args.page_size {
        options = options.with_page_size(page_size);
    }

    let summary = delete_all_objects(Arc::new(bucket), options, token)
        .await
        .with_context(|| format!("bulk delete under {:?} failed", args.prefix))?;

    println!(
        "deleted {} objects ({} listed, {} already missing)",
        summary.deleted, summary.listed, summary.missing
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(name: &str, size: u64) -> Object {
        Object {
            name: name.to_owned(),
            bucket: "photos".to_owned(),
            size,
            content_type: "text/plain".to_owned(),
            content_language: None,
            cache_control: None,
            generation: 1,
            updated: None,
        }
    }

    #[test]
    fn page_lines_put_prefixes_first() {
        let page = Page {
            objects: vec![object("a/1", 42)],
            prefixes: vec!["a/b/".to_owned()],
            next: None,
        };

        let mut out = Vec::new();
        write_page(&mut out, &page).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].trim_start().starts_with("PRE"));
        assert!(lines[0].ends_with("a/b/"));
        assert!(lines[1].trim_start().starts_with("42"));
        assert!(lines[1].ends_with("a/1"));
    }

    #[tokio::test]
    async fn cancelled_token_wins_the_race() {
        let token = CancellationToken::new();
        token.cancel();

        let err = until_cancelled(&token, async { Ok(1) })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
