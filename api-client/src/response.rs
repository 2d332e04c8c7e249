//! Response types for working with HTTP responses.

use http_body_util::BodyExt as _;
use hyperdriver::Body;
use serde::de::DeserializeOwned;

use crate::error::{Error, HttpResponseError};

/// Wrapper around an HTTP response that provides additional methods for working with the response.
#[derive(Debug)]
pub struct ApiResponse {
    response: http::response::Parts,
    body: Body,
}

impl ApiResponse {
    /// Create a new `ApiResponse` instance.
    pub fn new(response: http::Response<Body>) -> Self {
        let (response, body) = response.into_parts();

        Self { response, body }
    }

    /// Get the status code of the response.
    pub fn status(&self) -> http::StatusCode {
        self.response.status
    }

    /// Collect the response body.
    pub async fn bytes(self) -> Result<bytes::Bytes, Error> {
        let collected = self
            .body
            .collect()
            .await
            .map_err(|err| Error::ResponseBody(err.into()))?;
        Ok(collected.to_bytes())
    }

    /// Collect the response body as UTF-8 text.
    pub async fn text(self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|err| Error::ResponseBody(err.into()))
    }

    /// Collect the body and deserialize it as JSON.
    pub async fn json<T>(self) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Convert the response into an `HttpResponseError`, consuming the body.
    pub async fn into_error(self) -> HttpResponseError {
        HttpResponseError::from_response(self).await
    }

    /// Convert the response into an `HttpResponseError` if the status is not a success status.
    pub async fn error_for_status(self) -> Result<Self, HttpResponseError> {
        if self.status().is_success() {
            Ok(self)
        } else {
            Err(self.into_error().await)
        }
    }

    /// Check the status, then deserialize the JSON body.
    pub async fn deserialize<T>(self) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let response = self.error_for_status().await?;
        response.json().await
    }
}
