//! The Cloud Storage [`Bucket`] implementation.

use std::sync::Arc;

use async_trait::async_trait;
use bucketry_core::types::{CreateObjectRequest, Cursor, Object, Page, Query};
use bucketry_core::{Bucket, Error, ObjectWriter, Result, WriteBuffer};
use bytes::{BufMut, Bytes, BytesMut};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::TRACING_TARGET;
use crate::auth::{Authorizer, BearerToken, NoAuth};
use crate::config::GcsConfig;
use crate::error::{Missing, check, from_reqwest};
use crate::wire::{InsertMetadata, ObjectList, ObjectResource};

struct Inner {
    http: Client,
    bucket: String,
    objects_url: Url,
    upload_url: Url,
    page_size: Option<u32>,
    auth: Arc<dyn Authorizer>,
}

/// A bucket reached through the Cloud Storage JSON API.
///
/// Cheap to clone; clones share one connection pool.
///
/// # Examples
///
/// ```rust,ignore
/// use bucketry_core::prelude::*;
/// use bucketry_gcs::{GcsBucket, GcsConfig};
///
/// let bucket = GcsBucket::new(&GcsConfig::new("photos").with_access_token(token))?;
/// let names = list_prefix(&bucket, "2024/").await?;
/// ```
#[derive(Clone)]
pub struct GcsBucket {
    inner: Arc<Inner>,
}

impl GcsBucket {
    /// Creates a client from `config`, authorizing with its access token if
    /// one is set.
    pub fn new(config: &GcsConfig) -> Result<Self> {
        let auth: Arc<dyn Authorizer> = match &config.access_token {
            Some(token) => Arc::new(BearerToken::new(token.as_str())),
            None => Arc::new(NoAuth),
        };
        Self::with_authorizer(config, auth)
    }

    /// Creates a client from `config` that authorizes requests with `auth`.
    pub fn with_authorizer(config: &GcsConfig, auth: Arc<dyn Authorizer>) -> Result<Self> {
        config.validate()?;

        let endpoint = config.endpoint_url()?;
        let bucket = config.bucket.as_str();
        let objects_url = endpoint_join(&endpoint, &["storage", "v1", "b", bucket, "o"]);
        let upload_url = endpoint_join(&endpoint, &["upload", "storage", "v1", "b", bucket, "o"]);

        let http = Client::builder()
            .timeout(config.effective_request_timeout())
            .user_agent(config.effective_user_agent())
            .build()
            .map_err(|e| {
                Error::invalid_input()
                    .with_message("cannot build HTTP client")
                    .with_source(e)
            })?;

        tracing::debug!(
            target: TRACING_TARGET,
            bucket = %config.bucket,
            endpoint = %endpoint,
            auth = ?auth,
            "Created Cloud Storage client"
        );

        let inner = Inner {
            http,
            bucket: config.bucket.clone(),
            objects_url,
            upload_url,
            page_size: config.page_size,
            auth,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    fn object_url(&self, name: &str) -> Url {
        let mut url = self.inner.objects_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(name);
        }
        url
    }

    async fn send(&self, request: RequestBuilder, missing: Missing) -> Result<Response> {
        let request = self.inner.auth.authorize(request).await?;
        let response = request.send().await.map_err(from_reqwest)?;
        check(response, missing).await
    }

    async fn send_json<T>(&self, request: RequestBuilder, missing: Missing) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request, missing).await?;
        response.json().await.map_err(from_reqwest)
    }

    async fn insert(&self, request: CreateObjectRequest, data: Bytes) -> Result<Object> {
        let boundary = format!("bucketry-{}", uuid::Uuid::new_v4().simple());
        let metadata = InsertMetadata {
            content_type: request.effective_content_type().to_owned(),
            name: request.name,
            content_language: request.content_language,
            cache_control: request.cache_control,
        };
        let body = multipart_body(&boundary, &metadata, &data)?;

        tracing::debug!(
            target: TRACING_TARGET,
            bucket = %self.inner.bucket,
            object = %metadata.name,
            size = data.len(),
            "Uploading object"
        );

        let http = self
            .inner
            .http
            .post(self.inner.upload_url.clone())
            .query(&[("uploadType", "multipart")])
            .header(CONTENT_TYPE, format!("multipart/related; boundary={boundary}"))
            .body(body);

        let resource: ObjectResource = self.send_json(http, Missing::Bucket).await?;
        resource.into_object()
    }
}

impl std::fmt::Debug for GcsBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsBucket")
            .field("bucket", &self.inner.bucket)
            .field("objects_url", &self.inner.objects_url.as_str())
            .field("auth", &self.inner.auth)
            .finish_non_exhaustive()
    }
}

fn endpoint_join(endpoint: &Url, segments: &[&str]) -> Url {
    let mut url = endpoint.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Encodes a `multipart/related` body: JSON metadata, then the payload.
fn multipart_body(boundary: &str, metadata: &InsertMetadata, data: &[u8]) -> Result<Bytes> {
    let metadata = serde_json::to_vec(metadata).map_err(|e| {
        Error::invalid_input()
            .with_message("cannot encode object metadata")
            .with_source(e)
    })?;

    let mut body = BytesMut::with_capacity(metadata.len() + data.len() + 256);
    body.put_slice(format!("--{boundary}\r\n").as_bytes());
    body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.put_slice(&metadata);
    body.put_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.put_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.put_slice(data);
    body.put_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Ok(body.freeze())
}

#[async_trait]
impl Bucket for GcsBucket {
    fn name(&self) -> &str {
        &self.inner.bucket
    }

    #[tracing::instrument(
        name = "gcs.list_page",
        skip_all,
        fields(bucket = %self.inner.bucket, prefix = %query.prefix, first = query.is_first_page())
    )]
    async fn list_page(&self, query: &Query) -> Result<Page> {
        let mut params: Vec<(&str, String)> = Vec::with_capacity(4);
        if !query.prefix.is_empty() {
            params.push(("prefix", query.prefix.clone()));
        }
        if let Some(delimiter) = query.effective_delimiter() {
            params.push(("delimiter", delimiter.to_owned()));
        }
        if let Some(cursor) = &query.cursor {
            params.push(("pageToken", cursor.as_str().to_owned()));
        }
        if let Some(max) = query.max_results.or(self.inner.page_size) {
            params.push(("maxResults", max.to_string()));
        }

        let request = self
            .inner
            .http
            .get(self.inner.objects_url.clone())
            .query(&params);
        let list: ObjectList = self.send_json(request, Missing::Bucket).await?;

        let objects = list
            .items
            .into_iter()
            .map(ObjectResource::into_object)
            .collect::<Result<Vec<_>>>()?;
        let next = list
            .next_page_token
            .filter(|token| !token.is_empty())
            .map(Cursor::new);

        tracing::trace!(
            target: TRACING_TARGET,
            objects = objects.len(),
            prefixes = list.prefixes.len(),
            more = next.is_some(),
            "Listed page"
        );

        Ok(Page {
            objects,
            prefixes: list.prefixes,
            next,
        })
    }

    async fn create_writer(&self, request: CreateObjectRequest) -> Result<Box<dyn ObjectWriter>> {
        request.validate()?;
        Ok(Box::new(GcsWriter {
            bucket: self.clone(),
            buffer: WriteBuffer::new(request),
        }))
    }

    #[tracing::instrument(name = "gcs.stat_object", skip(self), fields(bucket = %self.inner.bucket))]
    async fn stat_object(&self, name: &str) -> Result<Object> {
        let request = self.inner.http.get(self.object_url(name));
        let resource: ObjectResource = self.send_json(request, Missing::Object).await?;
        resource.into_object()
    }

    #[tracing::instrument(name = "gcs.delete_object", skip(self), fields(bucket = %self.inner.bucket))]
    async fn delete_object(&self, name: &str) -> Result<()> {
        let request = self.inner.http.delete(self.object_url(name));
        self.send(request, Missing::Object).await?;
        Ok(())
    }
}

/// Buffers a payload and uploads it in one request on close.
struct GcsWriter {
    bucket: GcsBucket,
    buffer: WriteBuffer,
}

#[async_trait]
impl ObjectWriter for GcsWriter {
    async fn write(&mut self, data: Bytes) -> Result<()> {
        self.buffer.append(&data)
    }

    async fn close(&mut self) -> Result<Object> {
        let (request, data) = self.buffer.take()?;
        self.bucket.insert(request, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(endpoint: &str) -> GcsBucket {
        GcsBucket::new(&GcsConfig::new("photos").with_endpoint(endpoint)).unwrap()
    }

    #[test]
    fn urls_follow_json_api_layout() {
        let bucket = bucket("https://storage.googleapis.com");
        assert_eq!(
            bucket.inner.objects_url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/photos/o"
        );
        assert_eq!(
            bucket.inner.upload_url.as_str(),
            "https://storage.googleapis.com/upload/storage/v1/b/photos/o"
        );
    }

    #[test]
    fn endpoint_path_is_kept() {
        let bucket = bucket("http://127.0.0.1:4443/gcs/");
        assert_eq!(
            bucket.inner.objects_url.as_str(),
            "http://127.0.0.1:4443/gcs/storage/v1/b/photos/o"
        );
    }

    #[test]
    fn object_names_are_one_path_segment() {
        let bucket = bucket("https://storage.googleapis.com");
        let url = bucket.object_url("logs/2024 01?.txt");
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/photos/o/logs%2F2024%2001%3F.txt"
        );
    }

    #[test]
    fn multipart_body_layout() {
        let metadata = InsertMetadata {
            name: "a".to_owned(),
            content_type: "text/plain".to_owned(),
            content_language: None,
            cache_control: None,
        };
        let body = multipart_body("xyz", &metadata, b"hi").unwrap();
        let expected = concat!(
            "--xyz\r\n",
            "Content-Type: application/json; charset=UTF-8\r\n\r\n",
            r#"{"name":"a","contentType":"text/plain"}"#,
            "\r\n--xyz\r\n",
            "Content-Type: application/octet-stream\r\n\r\n",
            "hi",
            "\r\n--xyz--\r\n",
        );
        assert_eq!(&body[..], expected.as_bytes());
    }

    #[test]
    fn debug_redacts_token() {
        let config = GcsConfig::new("photos").with_access_token("ya29.secret");
        let bucket = GcsBucket::new(&config).unwrap();
        assert!(!format!("{bucket:?}").contains("ya29"));
    }
}
