//! A fake of the Cloud Storage JSON API backed by a `MemBucket`.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{Path, Query as Params, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bucketry_core::types::{CreateObjectRequest, Cursor, Query};
use bucketry_core::{Bucket, Error, ErrorKind};
use bucketry_gcs::wire::{
    BUCKET_NOT_FOUND_MESSAGE, ErrorResponse, InsertMetadata, ObjectList, ObjectResource,
};
use bucketry_gcs::{GcsBucket, GcsConfig};
use bucketry_test::MemBucket;
use serde::Deserialize;
use tokio::net::TcpListener;

#[derive(Clone)]
struct FakeState {
    mem: MemBucket,
    token: Option<String>,
}

/// A running fake server.
pub struct FakeGcs {
    pub addr: SocketAddr,
    pub mem: MemBucket,
}

impl FakeGcs {
    /// Serves `mem` without authentication.
    pub async fn spawn(mem: MemBucket) -> Self {
        Self::spawn_with_token(mem, None).await
    }

    /// Serves `mem`, requiring `Authorization: Bearer <token>` if set.
    pub async fn spawn_with_token(mem: MemBucket, token: Option<&str>) -> Self {
        let state = FakeState {
            mem: mem.clone(),
            token: token.map(str::to_owned),
        };
        let addr = serve(router(state)).await;
        Self { addr, mem }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> GcsConfig {
        GcsConfig::new(self.mem.name()).with_endpoint(self.endpoint())
    }

    pub fn client(&self) -> GcsBucket {
        GcsBucket::new(&self.config()).unwrap()
    }
}

/// Serves `router` on an ephemeral local port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

fn router(state: FakeState) -> Router {
    Router::new()
        .route("/storage/v1/b/{bucket}/o", get(list))
        .route("/storage/v1/b/{bucket}/o/{*name}", get(stat).delete(delete))
        .route("/upload/storage/v1/b/{bucket}/o", post(upload))
        .with_state(state)
}

/// JSON error envelope with `status`.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorResponse::new(status.as_u16(), message);
    (status, Json(body)).into_response()
}

fn from_error(err: &Error) -> Response {
    let status = match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidInput | ErrorKind::Service => StatusCode::BAD_REQUEST,
        ErrorKind::Auth => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

impl FakeState {
    fn check(&self, headers: &HeaderMap, bucket: &str) -> Result<(), Response> {
        if let Some(token) = &self.token {
            let expected = format!("Bearer {token}");
            let given = headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok());
            if given != Some(expected.as_str()) {
                return Err(error_response(StatusCode::UNAUTHORIZED, "Invalid Credentials"));
            }
        }
        if bucket != self.mem.name() {
            return Err(error_response(StatusCode::NOT_FOUND, BUCKET_NOT_FOUND_MESSAGE));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    prefix: Option<String>,
    delimiter: Option<String>,
    page_token: Option<String>,
    max_results: Option<u32>,
}

async fn list(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path(bucket): Path<String>,
    Params(params): Params<ListParams>,
) -> Response {
    if let Err(response) = state.check(&headers, &bucket) {
        return response;
    }

    let mut query = Query::new().with_prefix(params.prefix.unwrap_or_default());
    if let Some(delimiter) = params.delimiter {
        query = query.with_delimiter(delimiter);
    }
    if let Some(token) = params.page_token {
        query = query.with_cursor(token);
    }
    if let Some(max) = params.max_results {
        query = query.with_max_results(max);
    }

    match state.mem.list_page(&query).await {
        Ok(page) => Json(ObjectList {
            items: page.objects.iter().map(ObjectResource::from).collect(),
            prefixes: page.prefixes,
            next_page_token: page.next.map(Cursor::into_inner),
        })
        .into_response(),
        Err(err) => from_error(&err),
    }
}

async fn stat(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path((bucket, name)): Path<(String, String)>,
) -> Response {
    if let Err(response) = state.check(&headers, &bucket) {
        return response;
    }

    match state.mem.stat_object(&name).await {
        Ok(object) => Json(ObjectResource::from(&object)).into_response(),
        Err(err) => from_error(&err),
    }
}

async fn delete(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path((bucket, name)): Path<(String, String)>,
) -> Response {
    if let Err(response) = state.check(&headers, &bucket) {
        return response;
    }

    match state.mem.delete_object(&name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => from_error(&err),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadParams {
    upload_type: String,
}

async fn upload(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path(bucket): Path<String>,
    Params(params): Params<UploadParams>,
    body: Bytes,
) -> Response {
    if let Err(response) = state.check(&headers, &bucket) {
        return response;
    }
    if params.upload_type != "multipart" {
        return error_response(StatusCode::BAD_REQUEST, "unsupported uploadType");
    }

    let boundary = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("multipart/related; boundary="))
        .map(str::to_owned);
    let Some(boundary) = boundary else {
        return error_response(StatusCode::BAD_REQUEST, "expected multipart/related");
    };
    let Some((metadata, data)) = parse_multipart(&body, &boundary) else {
        return error_response(StatusCode::BAD_REQUEST, "malformed multipart body");
    };

    let request = CreateObjectRequest {
        name: metadata.name,
        content_type: Some(metadata.content_type),
        content_language: metadata.content_language,
        cache_control: metadata.cache_control,
    };

    let result = async {
        let mut writer = state.mem.create_writer(request).await?;
        writer.write(Bytes::copy_from_slice(data)).await?;
        writer.close().await
    };
    match result.await {
        Ok(object) => Json(ObjectResource::from(&object)).into_response(),
        Err(err) => from_error(&err),
    }
}

fn parse_multipart<'a>(body: &'a [u8], boundary: &str) -> Option<(InsertMetadata, &'a [u8])> {
    let opening = format!("--{boundary}\r\n");
    let separator = format!("\r\n--{boundary}\r\n");
    let closing = format!("\r\n--{boundary}--\r\n");

    let rest = body.strip_prefix(opening.as_bytes())?;
    let rest = rest.strip_suffix(closing.as_bytes())?;

    let split = find(rest, separator.as_bytes())?;
    let (metadata_part, media_part) = (&rest[..split], &rest[split + separator.len()..]);

    let metadata = &metadata_part[find(metadata_part, b"\r\n\r\n")? + 4..];
    let media = &media_part[find(media_part, b"\r\n\r\n")? + 4..];

    let metadata = serde_json::from_slice(metadata).ok()?;
    Some((metadata, media))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
