//! HTTP client trait abstraction.
//!
//! The consumer only ever issues one kind of request: a streaming GET whose
//! status, headers and body all matter to the resume protocol. This module
//! describes that request so the engine can run against reqwest in
//! production and against scripted responses in tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use thiserror::Error;

/// HTTP headers represented as a key-value map.
pub type Headers = HashMap<String, String>;

/// Incrementally received response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

/// Response to a streaming request, with the body still unread.
pub struct StreamResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Response body, read lazily
    pub body: ByteStream,
}

impl StreamResponse {
    /// Create a new streaming response.
    pub fn new(status: u16, headers: Headers, body: ByteStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Look up a header value, ignoring the case of the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Drain the body into a string.
    ///
    /// Only meant for error responses, which are short. Read errors truncate
    /// the text instead of failing.
    pub async fn text(mut self) -> String {
        let mut buf = Vec::new();
        while let Some(chunk) = self.body.next().await {
            match chunk {
                Ok(bytes) => buf.extend_from_slice(&bytes),
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// HTTP client errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// Request timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
    /// Reading the body failed
    #[error("IO error: {0}")]
    Io(String),
    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Other error
    #[error("HTTP error: {0}")]
    Other(String),
}

/// Trait for the streaming HTTP transport.
///
/// Unlike a plain GET, every response is handed back whatever its status:
/// the caller inspects status and headers before deciding whether the body
/// is an event stream or an error message.
///
/// # Example
///
/// ```ignore
/// use oplogc::traits::{Headers, HttpClient};
///
/// async fn status<C: HttpClient>(client: &C) -> Result<u16, HttpError> {
///     let response = client.get_stream("http://oplog.local/", &Headers::new()).await?;
///     Ok(response.status)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET request and return as soon as the response head arrives.
    async fn get_stream(&self, url: &str, headers: &Headers) -> Result<StreamResponse, HttpError>;
}
