//! Error types for API Clients
use std::fmt;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::response::ApiResponse;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error occured while sending or recieving an HTTP request
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be assembled
    #[error("Building request: {0}")]
    Build(#[from] http::Error),

    /// Query or form parameters could not be encoded
    #[error("Encoding request parameters: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),

    /// An error occured while sending the request
    #[error("Sending request: {0}")]
    Request(#[from] hyperdriver::client::Error),

    /// No response arrived before the request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// An error occured while recieving the response body
    #[error("Error reading response body: {0}")]
    ResponseBody(#[source] BoxError),

    /// The response body was not the expected JSON
    #[error("Decoding response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// An HTTP response error occured
    #[error(transparent)]
    Response(#[from] HttpResponseError),
}

/// A server returned an error response
#[derive(Debug, Clone)]
pub struct HttpResponseError {
    /// The HTTP status code of the response
    pub status: StatusCode,

    /// The message body of the response, verbatim
    pub message: String,
}

impl HttpResponseError {
    /// Create a new HTTP response error from a response
    pub async fn from_response(response: ApiResponse) -> Self {
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|err| format!("Failed to read response body: {}", err));

        Self { status, message }
    }
}

impl fmt::Display for HttpResponseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HTTP {} response: {}", self.status, self.message)
    }
}

impl std::error::Error for HttpResponseError {}
