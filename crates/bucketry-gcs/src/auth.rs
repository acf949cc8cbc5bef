//! Request authorization.

use std::fmt;

use bucketry_core::Result;
use reqwest::RequestBuilder;

/// Attaches credentials to outgoing requests.
///
/// Implementations may refresh credentials lazily; errors are reported as
/// `Auth` and abort the request before it is sent.
#[async_trait::async_trait]
pub trait Authorizer: fmt::Debug + Send + Sync {
    /// Returns `request` with credentials applied.
    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder>;
}

/// Sends requests unauthenticated, for emulators and public buckets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait::async_trait]
impl Authorizer for NoAuth {
    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(request)
    }
}

/// Sends a fixed OAuth 2.0 access token.
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wraps an already-acquired access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

#[async_trait::async_trait]
impl Authorizer for BearerToken {
    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(request.bearer_auth(&self.0))
    }
}
