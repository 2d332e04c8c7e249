//! Microsoft Graph directory queries.
//!
//! Only what onboarding needs: checking that a security group exists before
//! anything is granted to it.

use api_client::{ApiClient, Authentication, Secret};
use http::StatusCode;
use thiserror::Error;

mod models;

pub use self::models::{GroupQuery, GroupRecord, ValidationResult};
use self::models::GroupList;

/// Microsoft Graph v1.0 in the public cloud.
pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Bearer token plus the JSON content type Graph expects on every call.
#[derive(Debug, Clone)]
pub struct GraphAuthentication {
    token: Secret,
}

impl GraphAuthentication {
    /// Authenticate with a Graph access token.
    pub fn new<S: Into<Secret>>(token: S) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authentication for GraphAuthentication {
    fn authenticate<B>(&self, mut req: http::Request<B>) -> http::Request<B> {
        let hdrs = req.headers_mut();

        hdrs.insert(
            http::header::CONTENT_TYPE,
            http::header::HeaderValue::from_static("application/json"),
        );

        let value = self
            .token
            .bearer()
            .expect("authorization should be a valid http header value");
        hdrs.insert(http::header::AUTHORIZATION, value);

        req
    }
}

/// Error when querying the directory
#[derive(Debug, Error)]
pub enum GraphError {
    /// The request failed before a response arrived, or the body was unreadable.
    #[error(transparent)]
    Request(#[from] api_client::Error),

    /// Graph answered with a non-success status.
    #[error("Directory query failed: {status} {body}")]
    Response {
        /// The HTTP status code
        status: StatusCode,
        /// The response body, verbatim
        body: String,
    },
}

/// Quote a string literal for an OData `$filter` expression.
fn odata_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A Microsoft Graph client authenticated as an application.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: ApiClient<GraphAuthentication>,
}

impl GraphClient {
    /// Create a client for the Graph API at `base` using `token`.
    pub fn new<S: Into<Secret>>(base: http::Uri, token: S) -> Self {
        Self::from_api_client(ApiClient::new(base, GraphAuthentication::new(token)))
    }

    /// Use an existing API client rooted at the Graph API version.
    pub fn from_api_client(client: ApiClient<GraphAuthentication>) -> Self {
        Self { client }
    }

    /// Look up a group by exact display name.
    ///
    /// Only the first page of results is read. When several groups share the
    /// name, the first one Graph returns wins.
    #[tracing::instrument(skip(self), fields(group = %query.name()))]
    pub async fn validate_group(&self, query: &GroupQuery) -> Result<ValidationResult, GraphError> {
        let filter = format!("displayName eq {}", odata_string(query.name()));
        tracing::trace!("Searching for groups with filter: {filter}");

        let response = self
            .client
            .get("groups")
            .query(&[("$filter", filter.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(%status, "Error response from Microsoft Graph");
            let body = response.text().await?;
            return Err(GraphError::Response { status, body });
        }

        let groups: GroupList = response.json().await?;
        tracing::debug!("Found {} groups", groups.value.len());

        Ok(ValidationResult::from_matches(groups.value))
    }
}
