//! HTTP client abstraction for talking to the statistics service and signed upload URLs.
//!
//! This module defines the `HttpClient` trait to abstract HTTP request execution,
//! enabling testability with mock implementations.

use crate::config::TransportConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// HTTP methods used by the upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpBody {
    Empty,
    /// Serialized JSON, sent with `Content-Type: application/json`
    Json(String),
    /// Raw bytes with their media type
    Binary { content_type: String, bytes: Vec<u8> },
}

impl HttpBody {
    pub fn len(&self) -> usize {
        match self {
            HttpBody::Empty => 0,
            HttpBody::Json(body) => body.len(),
            HttpBody::Binary { bytes, .. } => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single HTTP request to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL, including any query string
    pub url: String,
    /// Extra headers, in insertion order
    pub headers: Vec<(String, String)>,
    pub body: HttpBody,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: HttpBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add an `Authorization: Bearer {token}` header.
    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn json(mut self, body: String) -> Self {
        self.body = HttpBody::Json(body);
        self
    }

    pub fn binary(mut self, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.body = HttpBody::Binary {
            content_type: content_type.into(),
            bytes,
        };
        self
    }

    /// Look up a header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Response from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as a string
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for executing HTTP requests.
///
/// This abstraction allows for different implementations (production vs. testing)
/// and makes the upload logic testable without making real HTTP calls.
/// Implementations must be safe to share across concurrently running upload workers.
///
/// # Example
/// ```ignore
/// let client = ReqwestHttpClient::new(&TransportConfig::default())?;
/// let response = client.execute(&HttpRequest::get(url).bearer("token")).await?;
/// println!("Status: {}, Body: {}", response.status, response.body);
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync + Clone {
    /// Execute an HTTP request.
    ///
    /// A non-2xx status is not an error at this level; callers inspect
    /// [`HttpResponse::status`].
    ///
    /// # Errors
    /// Returns an error if:
    /// - The request fails due to network issues
    /// - The request times out
    /// - The URL is invalid
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production HTTP client using reqwest.
///
/// Wraps one pooled `reqwest::Client`; clones share the connection pool.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    config: TransportConfig,
}

impl ReqwestHttpClient {
    /// Build a client enforcing the connect/read/write timeouts in `config`.
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        };

        tracing::debug!(
            timeout_ms = self.config.request_timeout().as_millis() as u64,
            body_len = request.body.len(),
            "Executing HTTP request"
        );

        let mut req = self
            .client
            .request(method, &request.url)
            .timeout(self.config.request_timeout());

        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        req = match &request.body {
            HttpBody::Empty => req,
            HttpBody::Json(body) => {
                if request.header_value("Content-Type").is_none() {
                    req = req.header("Content-Type", "application/json");
                }
                req.body(body.clone())
            }
            HttpBody::Binary {
                content_type,
                bytes,
            } => req.header("Content-Type", content_type.as_str()).body(bytes.clone()),
        };

        let response = req.send().await.map_err(|e| {
            tracing::error!(error = %e, "HTTP request failed");
            e
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(
            status = status,
            response_len = body.len(),
            "HTTP request completed"
        );

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Mock HTTP client for testing.
///
/// Responses are keyed by `"{METHOD} {path}"` or, more specifically, by
/// `"{METHOD} {path}?{query}"`. A query-specific key wins over the plain path key, so a
/// test can single out one package on the signed-URL route.
///
/// # Example
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.add_response("POST /app-info/create", Ok(HttpResponse::new(200, "{}")));
/// mock.add_response(
///     "GET /app-icon/generate-upload-url?packageName=com.example.two",
///     Ok(HttpResponse::new(500, "")),
/// );
/// ```
#[derive(Clone)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, Vec<MockResponse>>>>,
    fallbacks: Arc<Mutex<HashMap<String, HttpResponse>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    latency: Arc<Mutex<Option<Duration>>>,
}

/// A mock response that can optionally wait for a trigger before completing.
enum MockResponse {
    /// Immediate response
    Immediate(Result<HttpResponse>),
    /// Response that waits for a trigger signal before completing
    Triggered {
        response: Result<HttpResponse>,
        trigger: oneshot::Receiver<()>,
    },
}

/// Record of a call made to the mock HTTP client.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub method: HttpMethod,
    pub url: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: HttpBody,
}

impl MockCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parse a JSON request body.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        match &self.body {
            HttpBody::Json(body) => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}

impl MockHttpClient {
    /// Create a new mock HTTP client.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            fallbacks: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            latency: Arc::new(Mutex::new(None)),
        }
    }

    /// Add a predetermined response for a key.
    ///
    /// Multiple responses can be added for the same key - they will be returned in FIFO
    /// order. Once a key's queue is drained, any response set with
    /// [`MockHttpClient::set_default_response`] is used.
    pub fn add_response(&self, key: &str, response: Result<HttpResponse>) {
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(MockResponse::Immediate(response));
    }

    /// Respond to every call on `key` with `response` once its queue is empty.
    pub fn set_default_response(&self, key: &str, response: HttpResponse) {
        self.fallbacks.lock().insert(key.to_string(), response);
    }

    /// Add a response that will wait for a manual trigger before completing.
    ///
    /// Returns a sender that when triggered (by sending `()` or dropping) will
    /// cause the HTTP request to complete with the given response.
    pub fn add_response_with_trigger(
        &self,
        key: &str,
        response: Result<HttpResponse>,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(MockResponse::Triggered {
                response,
                trigger: rx,
            });
        tx
    }

    /// Delay every call by `latency` before it resolves.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Get all calls that have been made to this mock client.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Calls made with `method` on `path` (query ignored).
    pub fn calls_for(&self, method: HttpMethod, path: &str) -> Vec<MockCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .cloned()
            .collect()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Get the number of requests currently in-flight (executing).
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously executing requests observed so far.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, method: HttpMethod, path: &str, query: Option<&str>) -> Option<MockResponse> {
        let plain_key = format!("{} {}", method, path);
        let mut keys = Vec::with_capacity(2);
        if let Some(query) = query {
            keys.push(format!("{}?{}", plain_key, query));
        }
        keys.push(plain_key);

        {
            let mut responses = self.responses.lock();
            for key in &keys {
                if let Some(queue) = responses.get_mut(key)
                    && !queue.is_empty()
                {
                    return Some(queue.remove(0));
                }
            }
        }

        let fallbacks = self.fallbacks.lock();
        keys.iter()
            .find_map(|key| fallbacks.get(key))
            .map(|response| MockResponse::Immediate(Ok(response.clone())))
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        // Increment in-flight counter
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        // Guard to ensure we decrement even if cancelled/panicked
        let _guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
        };

        let (path, query) = match reqwest::Url::parse(&request.url) {
            Ok(url) => (url.path().to_string(), url.query().map(str::to_string)),
            Err(_) => (request.url.clone(), None),
        };

        self.calls.lock().push(MockCall {
            method: request.method,
            url: request.url.clone(),
            path: path.clone(),
            query: query.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        });

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match self.next_response(request.method, &path, query.as_deref()) {
            Some(MockResponse::Immediate(response)) => response,
            Some(MockResponse::Triggered { response, trigger }) => {
                // Wait for trigger (ignore the result - we proceed either way)
                let _ = trigger.await;
                response
            }
            None => Err(crate::error::VolleyError::Other(anyhow::anyhow!(
                "No mock response configured for {} {}",
                request.method,
                path
            ))),
        }
    }
}

/// Guard that decrements the in-flight counter when dropped.
/// This ensures the counter is decremented even if the task is cancelled or panics.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
