//! Request construction for API clients.

use std::time::Duration;

use bytes::Bytes;
use http::Uri;
use serde::Serialize;

use crate::uri::UriExtension as _;
use crate::{response::ApiResponse, ApiClient, Authentication, Error};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A request under construction, bound to the client which will send it.
#[derive(Debug)]
pub struct RequestBuilder<A> {
    req: http::request::Builder,
    uri: Uri,
    client: ApiClient<A>,
    body: Option<hyperdriver::Body>,
    timeout: Option<Duration>,
}

impl<A> RequestBuilder<A> {
    /// Start a request with `method` against `uri`.
    pub fn new(client: ApiClient<A>, uri: Uri, method: http::Method) -> Self {
        Self {
            req: http::Request::builder().method(method),
            uri,
            client,
            body: None,
            timeout: None,
        }
    }

    /// Append query parameters to the request URI.
    ///
    /// Keys and values are percent-encoded with spaces as `%20`, which OData
    /// services require for `$filter` expressions.
    pub fn query<K, V>(mut self, pairs: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            self.uri = self.uri.append_query(key.as_ref(), value.as_ref());
        }
        self
    }

    /// Send `form` as an `application/x-www-form-urlencoded` body.
    pub fn form<T: Serialize + ?Sized>(mut self, form: &T) -> Result<Self, Error> {
        let encoded = serde_urlencoded::to_string(form)?;
        self.req = self
            .req
            .header(http::header::CONTENT_TYPE, FORM_CONTENT_TYPE);
        self.body = Some(hyperdriver::Body::from(Bytes::from(encoded)));
        Ok(self)
    }

    /// Fail the request if no response arrives within `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send the request.
    pub async fn send(self) -> Result<ApiResponse, Error>
    where
        A: Authentication,
    {
        let req = self
            .req
            .uri(self.uri)
            .body(self.body.unwrap_or_else(hyperdriver::Body::empty))?;

        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.client.execute(req))
                .await
                .map_err(|_| Error::Timeout(timeout))?,
            None => self.client.execute(req).await,
        }
    }
}
