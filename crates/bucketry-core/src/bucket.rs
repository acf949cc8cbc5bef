//! The bucket client contract implemented by every backend.

use bytes::{Bytes, BytesMut};

use crate::{Error, ErrorKind, Result};
use crate::types::{CreateObjectRequest, Object, Page, Query};

/// Bucket-scoped operations against one remote bucket.
///
/// Implementations issue exactly one request per call and never retry;
/// retry policy belongs to the caller. Dropping a returned future abandons
/// the request.
#[async_trait::async_trait]
pub trait Bucket: Send + Sync {
    /// Bucket identifier; fixed for the lifetime of the client.
    fn name(&self) -> &str;

    /// Lists the single page of results described by `query`.
    async fn list_page(&self, query: &Query) -> Result<Page>;

    /// Opens a writer for a new snapshot of `request.name`.
    ///
    /// Nothing becomes visible until [`ObjectWriter::close`] succeeds.
    async fn create_writer(&self, request: CreateObjectRequest) -> Result<Box<dyn ObjectWriter>>;

    /// Returns the current snapshot of `name`, or a `NotFound` error.
    async fn stat_object(&self, name: &str) -> Result<Object>;

    /// Removes `name`, or fails with a `NotFound` error if it is absent.
    async fn delete_object(&self, name: &str) -> Result<()>;
}

/// A sequential write stream producing one object snapshot.
#[async_trait::async_trait]
pub trait ObjectWriter: Send {
    /// Appends `data` to the pending object.
    ///
    /// After an error every later call, `close` included, fails and the
    /// object is never published.
    async fn write(&mut self, data: Bytes) -> Result<()>;

    /// Atomically publishes the object and returns its snapshot.
    ///
    /// A writer can be closed once; further calls fail with `InvalidInput`.
    async fn close(&mut self) -> Result<Object>;
}

#[derive(Debug)]
enum WriteState {
    Open,
    Failed(ErrorKind, Option<String>),
    Closed,
}

/// Payload buffer for writers that publish the whole object on close.
///
/// Tracks the writer lifecycle so every backend enforces the same rules: a
/// failed write poisons the buffer, and a buffer can be taken only once.
#[derive(Debug)]
pub struct WriteBuffer {
    request: CreateObjectRequest,
    data: BytesMut,
    state: WriteState,
}

impl WriteBuffer {
    /// Creates an empty buffer for `request`.
    pub fn new(request: CreateObjectRequest) -> Self {
        Self {
            request,
            data: BytesMut::new(),
            state: WriteState::Open,
        }
    }

    /// Attributes of the pending object.
    pub fn request(&self) -> &CreateObjectRequest {
        &self.request
    }

    /// Bytes buffered so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends `data` if the buffer is still open.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.check_open()?;
        self.data.extend_from_slice(data);
        Ok(())
    }

    /// Poisons the buffer with `err`; later calls replay its kind and message.
    pub fn fail(&mut self, err: &Error) {
        if matches!(self.state, WriteState::Open) {
            self.state = WriteState::Failed(err.kind(), err.message.clone());
        }
    }

    /// Hands out the payload for publishing and closes the buffer.
    pub fn take(&mut self) -> Result<(CreateObjectRequest, Bytes)> {
        self.check_open()?;
        self.state = WriteState::Closed;
        let data = std::mem::take(&mut self.data).freeze();
        Ok((self.request.clone(), data))
    }

    fn check_open(&self) -> Result<()> {
        match &self.state {
            WriteState::Open => Ok(()),
            WriteState::Failed(kind, message) => {
                let err = Error::new(*kind);
                Err(match message {
                    Some(message) => err.with_message(format!("earlier write failed: {message}")),
                    None => err.with_message("earlier write failed"),
                })
            }
            WriteState::Closed => Err(Error::invalid_input().with_message("writer already closed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_hands_out_payload_once() {
        let mut buffer = WriteBuffer::new(CreateObjectRequest::new("a"));
        buffer.append(b"hello ").unwrap();
        buffer.append(b"world").unwrap();
        assert_eq!(buffer.len(), 11);

        let (request, data) = buffer.take().unwrap();
        assert_eq!(request.name, "a");
        assert_eq!(&data[..], b"hello world");

        let err = buffer.take().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(buffer.append(b"late").is_err());
    }

    #[test]
    fn failed_buffer_refuses_to_publish() {
        let mut buffer = WriteBuffer::new(CreateObjectRequest::new("a"));
        buffer.append(b"partial").unwrap();
        buffer.fail(&Error::transport().with_message("connection reset"));

        let err = buffer.append(b"more").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err = buffer.take().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("connection reset"));
    }
}
