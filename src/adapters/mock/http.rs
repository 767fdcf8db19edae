//! Mock HTTP client for testing.
//!
//! Serves scripted streaming responses, one per request, and records every
//! request so tests can inspect the resume headers the consumer sent.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::watch;

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, StreamResponse};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
}

impl RecordedRequest {
    /// Look up a request header, ignoring the case of the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Answer with a status, headers and a body made of the given chunks.
    /// With `hold_open` the body stays pending after the last chunk instead
    /// of ending, like a live event stream.
    Stream {
        status: u16,
        headers: Headers,
        chunks: Vec<Bytes>,
        hold_open: bool,
    },
    /// Fail the request without a response
    Error(HttpError),
}

impl MockResponse {
    /// 200 response whose body ends after `body`.
    pub fn events(body: &str) -> Self {
        MockResponse::Stream {
            status: 200,
            headers: Headers::new(),
            chunks: vec![Bytes::from(body.to_string())],
            hold_open: false,
        }
    }

    /// 200 response whose body stays open after `body`.
    pub fn live(body: &str) -> Self {
        MockResponse::Stream {
            status: 200,
            headers: Headers::new(),
            chunks: vec![Bytes::from(body.to_string())],
            hold_open: true,
        }
    }

    /// Response with the given status and a plain body.
    pub fn status(status: u16, body: &str) -> Self {
        MockResponse::Stream {
            status,
            headers: Headers::new(),
            chunks: vec![Bytes::from(body.to_string())],
            hold_open: false,
        }
    }

    /// Add a response header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let MockResponse::Stream { headers, .. } = &mut self {
            headers.insert(name.to_string(), value.to_string());
        }
        self
    }
}

/// Body stream that keeps count of the bodies still held by the consumer.
struct TrackedBody {
    inner: ByteStream,
    open: Arc<AtomicUsize>,
}

impl Stream for TrackedBody {
    type Item = Result<Bytes, HttpError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock HTTP client for testing.
///
/// Scripted responses are served in order, one per request. Once the script
/// is exhausted the default response is used for every further request.
///
/// # Example
///
/// ```ignore
/// use oplogc::adapters::mock::{MockHttpClient, MockResponse};
///
/// let client = MockHttpClient::new();
/// client.push_response(MockResponse::status(403, "forbidden"));
/// client.push_response(MockResponse::live("id: 1\nevent: live\n\n"));
///
/// // ... run a consumer against it ...
///
/// let requests = client.get_requests();
/// assert_eq!(requests[1].header("Last-Event-ID"), None);
/// ```
#[derive(Debug, Clone)]
pub struct MockHttpClient {
    /// Scripted responses, served first to last
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Response once the script is exhausted
    default_response: Arc<Mutex<Option<MockResponse>>>,
    /// Recorded requests for verification
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    /// Number of requests received so far
    request_count: Arc<watch::Sender<usize>>,
    /// Response bodies not dropped yet
    open_bodies: Arc<AtomicUsize>,
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        let (request_count, _) = watch::channel(0);
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            default_response: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
            request_count: Arc::new(request_count),
            open_bodies: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue a response for the next unanswered request.
    pub fn push_response(&self, response: MockResponse) {
        self.responses.lock().push_back(response);
    }

    /// Set the response used once the queue is empty.
    pub fn set_default_response(&self, response: MockResponse) {
        *self.default_response.lock() = Some(response);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Number of response bodies still held by the client side.
    pub fn open_bodies(&self) -> usize {
        self.open_bodies.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` requests were received.
    pub async fn wait_for_requests(&self, count: usize) {
        let mut rx = self.request_count.subscribe();
        // The sender is owned by self
        let _ = rx.wait_for(|received| *received >= count).await;
    }

    fn next_response(&self) -> Option<MockResponse> {
        if let Some(response) = self.responses.lock().pop_front() {
            return Some(response);
        }
        self.default_response.lock().clone()
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get_stream(&self, url: &str, headers: &Headers) -> Result<StreamResponse, HttpError> {
        self.requests.lock().push(RecordedRequest {
            url: url.to_string(),
            headers: headers.clone(),
        });
        self.request_count.send_modify(|count| *count += 1);

        match self.next_response() {
            Some(MockResponse::Stream {
                status,
                headers,
                chunks,
                hold_open,
            }) => {
                let chunks = futures::stream::iter(chunks.into_iter().map(Ok::<Bytes, HttpError>));
                let inner: ByteStream = if hold_open {
                    Box::pin(futures::StreamExt::chain(chunks, futures::stream::pending()))
                } else {
                    Box::pin(chunks)
                };
                self.open_bodies.fetch_add(1, Ordering::SeqCst);
                let body = TrackedBody {
                    inner,
                    open: Arc::clone(&self.open_bodies),
                };
                Ok(StreamResponse::new(status, headers, Box::pin(body)))
            }
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}
