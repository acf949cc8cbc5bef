//! Mapping of HTTP failures onto the bucket error taxonomy.

use bucketry_core::Error;
use reqwest::{Response, StatusCode};

use crate::wire::ErrorResponse;

/// What a 404 means for the request that received it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Missing {
    /// The addressed object does not exist.
    Object,
    /// The bucket itself does not exist.
    Bucket,
}

/// Classifies a failure to obtain or read a response.
pub(crate) fn from_reqwest(err: reqwest::Error) -> Error {
    if err.is_decode() {
        Error::protocol_violation()
            .with_message("malformed response body")
            .with_source(err)
    } else if err.is_timeout() {
        Error::transport()
            .with_message("request timed out")
            .with_source(err)
    } else if err.is_connect() {
        Error::transport()
            .with_message("connection failed")
            .with_source(err)
    } else if err.is_builder() {
        Error::invalid_input()
            .with_message(err.to_string())
            .with_source(err)
    } else {
        Error::transport().with_message(err.to_string()).with_source(err)
    }
}

/// Passes successful responses through and converts the rest into errors.
///
/// A 404 for an object request is only `NotFound` when the object is what is
/// missing; a missing bucket stays a service error.
pub(crate) async fn check(response: Response, missing: Missing) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            return Err(from_status(status, missing)
                .with_message(format!("{}: <unreadable body>", status.as_u16()))
                .with_source(err));
        }
    };

    let (message, missing) = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(envelope) if envelope.error.is_missing_bucket() => {
            (envelope.error.message, Missing::Bucket)
        }
        Ok(envelope) => (envelope.error.message, missing),
        Err(_) if body.is_empty() => (status.to_string(), missing),
        Err(_) => (body.chars().take(512).collect(), missing),
    };

    Err(from_status(status, missing).with_message(format!("{}: {message}", status.as_u16())))
}

fn from_status(status: StatusCode, missing: Missing) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::auth(),
        StatusCode::NOT_FOUND if missing == Missing::Object => Error::not_found(),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            Error::service().with_retryable(true)
        }
        status if status.is_server_error() => Error::service().with_retryable(true),
        _ => Error::service(),
    }
}
