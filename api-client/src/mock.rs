//! An in-memory transport for testing API clients.
//!
//! Responses are registered by request path. Every request that passes
//! through the mock is recorded, body included, so tests can assert on what
//! a client actually sent.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::response;
use http_body_util::BodyExt as _;
use parking_lot::Mutex;

use crate::BoxFuture;

/// A canned response for a single path.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: http::StatusCode,
    headers: http::HeaderMap,
    body: Bytes,
}

impl MockResponse {
    /// Create a canned response.
    pub fn new(status: http::StatusCode, headers: http::HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

/// A request as seen by the mock transport.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: http::Method,
    /// Full request URI
    pub uri: http::Uri,
    /// Request headers, after authentication was applied
    pub headers: http::HeaderMap,
    /// Collected request body
    pub body: Bytes,
}

impl RecordedRequest {
    /// A header value as a string, if present and valid.
    pub fn header<K: http::header::AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The request body as text.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Form fields from an `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> HashMap<String, String> {
        serde_urlencoded::from_bytes(&self.body).unwrap_or_default()
    }

    /// A decoded query parameter.
    pub fn query_value(&self, key: &str) -> Option<String> {
        let query = self.uri.query()?;
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let k = percent_encoding::percent_decode_str(k).decode_utf8_lossy();
            (k == key).then(|| {
                percent_encoding::percent_decode_str(v)
                    .decode_utf8_lossy()
                    .into_owned()
            })
        })
    }
}

/// A `tower::Service` which answers from canned responses.
///
/// Clones share responses and recorded requests.
#[derive(Debug, Default, Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    /// An empty mock. Requests to unregistered paths panic.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for `path`.
    pub fn add(
        &self,
        path: &str,
        status: http::StatusCode,
        headers: http::HeaderMap,
        body: impl Into<Bytes>,
    ) {
        let response = MockResponse::new(status, headers, body);
        self.responses.lock().insert(path.to_owned(), response);
    }

    /// Register a JSON response for `path`.
    pub fn add_json(&self, path: &str, status: http::StatusCode, body: &str) {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        self.add(path, status, headers, Bytes::copy_from_slice(body.as_bytes()));
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

impl tower::Service<http::Request<hyperdriver::Body>> for MockService {
    type Response = http::Response<hyperdriver::Body>;
    type Error = hyperdriver::client::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<hyperdriver::Body>) -> Self::Future {
        let path = req.uri().path().to_owned();
        let response = self
            .responses
            .lock()
            .get(&path)
            .cloned()
            .unwrap_or_else(|| panic!("No response configured for path: {path}"));
        let requests = self.requests.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = body
                .collect()
                .await
                .map(|collected| collected.to_bytes())
                .unwrap_or_default();

            requests.lock().push(RecordedRequest {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            });

            let mut builder = response::Builder::new()
                .status(response.status)
                .version(http::Version::HTTP_11);

            for (key, value) in response.headers.iter() {
                builder = builder.header(key, value);
            }

            Ok(builder
                .body(hyperdriver::Body::from(response.body))
                .expect("mock response is valid"))
        })
    }
}
