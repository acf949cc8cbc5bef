//! Connection settings for a Cloud Storage bucket.

use std::time::Duration;

use bucketry_core::{Error, Result};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use url::Url;

/// Public Cloud Storage endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Default timeout for a single request: 30 seconds.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`GcsBucket`](crate::GcsBucket).
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[serde(rename_all = "camelCase")]
pub struct GcsConfig {
    /// Name of the bucket to operate on
    #[cfg_attr(feature = "config", arg(long = "gcs-bucket", env = "GCS_BUCKET"))]
    pub bucket: String,

    /// Base URL of the storage service (override for emulators)
    #[cfg_attr(
        feature = "config",
        arg(long = "gcs-endpoint", env = "GCS_ENDPOINT", default_value = DEFAULT_ENDPOINT)
    )]
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// OAuth 2.0 access token sent as a bearer token
    #[cfg_attr(
        feature = "config",
        arg(long = "gcs-access-token", env = "GCS_ACCESS_TOKEN", hide_env_values = true)
    )]
    #[serde(default)]
    pub access_token: Option<String>,

    /// Per-request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "gcs-request-timeout", env = "GCS_REQUEST_TIMEOUT_SECS")
    )]
    #[serde(default)]
    pub request_timeout: Option<u64>,

    /// User-Agent header sent with every request
    #[cfg_attr(feature = "config", arg(long = "gcs-user-agent", env = "GCS_USER_AGENT"))]
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Entries requested per listing page when a query sets no limit
    #[cfg_attr(feature = "config", arg(long = "gcs-page-size", env = "GCS_PAGE_SIZE"))]
    #[serde(default)]
    pub page_size: Option<u32>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_owned()
}

impl GcsConfig {
    /// Creates a configuration for `bucket` on the public endpoint, without
    /// credentials.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            endpoint: default_endpoint(),
            access_token: None,
            request_timeout: None,
            user_agent: None,
            page_size: None,
        }
    }

    /// Sets the service base URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout.as_secs().max(1));
        self
    }

    /// Sets the User-Agent header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the default listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Returns the request timeout, using the default if unset or zero.
    pub fn effective_request_timeout(&self) -> Duration {
        match self.request_timeout {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Returns the User-Agent, using the default if unset or empty.
    pub fn effective_user_agent(&self) -> String {
        match self.user_agent.as_deref() {
            Some(user_agent) if !user_agent.is_empty() => user_agent.to_owned(),
            _ => format!("bucketry/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Parses the endpoint.
    pub fn endpoint_url(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            Error::invalid_input()
                .with_message(format!("invalid endpoint {:?}", self.endpoint))
                .with_source(e)
        })?;

        match url.scheme() {
            "http" | "https" if !url.cannot_be_a_base() => Ok(url),
            _ => Err(Error::invalid_input()
                .with_message(format!("endpoint {:?} is not an http(s) URL", self.endpoint))),
        }
    }

    /// Checks the configuration before any request is made.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(Error::invalid_input().with_message("bucket name must not be empty"));
        }
        if self.bucket.contains('/') {
            return Err(Error::invalid_input().with_message("bucket name must not contain '/'"));
        }
        if self.page_size == Some(0) {
            return Err(Error::invalid_input().with_message("page size must be at least 1"));
        }
        if self.access_token.as_deref() == Some("") {
            return Err(Error::invalid_input().with_message("access token must not be empty"));
        }
        self.endpoint_url().map(drop)
    }
}

impl std::fmt::Debug for GcsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsConfig")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("page_size", &self.page_size)
            .finish()
    }
}
