use std::time::Duration;

use api_client::{ApiClient, Authentication};
use async_trait::async_trait;
use http::StatusCode;

use crate::confidential::parse_token_response;
use crate::{
    lookup_nonempty, scope_to_resource, AccessToken, CredentialError, Lookup, TokenCredential,
    TokenError, CLIENT_ID,
};

const NAME: &str = "ManagedIdentityCredential";
const IMDS_BASE: &str = "http://169.254.169.254";
const IMDS_TOKEN_PATH: &str = "metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";

/// How long to wait for the metadata service before assuming there isn't one.
const IMDS_TIMEOUT: Duration = Duration::from_secs(1);

/// IMDS only answers requests carrying `Metadata: true`.
#[derive(Debug, Clone, Default)]
pub struct ImdsAuthentication;

impl Authentication for ImdsAuthentication {
    fn authenticate<B>(&self, mut req: http::Request<B>) -> http::Request<B> {
        req.headers_mut().insert(
            http::header::HeaderName::from_static("metadata"),
            http::HeaderValue::from_static("true"),
        );
        req
    }
}

/// The identity assigned to the Azure VM, container or runner this process lives on,
/// via the Instance Metadata Service.
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    client: ApiClient<ImdsAuthentication>,
    client_id: Option<String>,
    timeout: Duration,
}

impl ManagedIdentityCredential {
    /// Use the system-assigned identity, or the user-assigned identity named by `client_id`.
    pub fn new(client_id: Option<String>) -> Self {
        Self::from_api_client(
            ApiClient::new(http::Uri::from_static(IMDS_BASE), ImdsAuthentication),
            client_id,
        )
    }

    /// Configure from `lookup`; `AZURE_CLIENT_ID` selects a user-assigned identity.
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self::new(lookup_nonempty(lookup, CLIENT_ID))
    }

    /// Talk to IMDS through an existing API client rooted at the metadata endpoint.
    pub fn from_api_client(client: ApiClient<ImdsAuthentication>, client_id: Option<String>) -> Self {
        Self {
            client,
            client_id,
            timeout: IMDS_TIMEOUT,
        }
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    #[tracing::instrument(skip(self))]
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let [scope] = scopes else {
            return Err(CredentialError::unavailable(
                NAME,
                format!("exactly one scope is supported, got {}", scopes.len()),
            ));
        };

        let mut query = vec![
            ("api-version", IMDS_API_VERSION),
            ("resource", scope_to_resource(scope)),
        ];
        if let Some(client_id) = self.client_id.as_deref() {
            query.push(("client_id", client_id));
        }

        let response = match self
            .client
            .get(IMDS_TOKEN_PATH)
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(api_client::Error::Timeout(_) | api_client::Error::Request(_)) => {
                return Err(CredentialError::unavailable(
                    NAME,
                    "no instance metadata endpoint responded",
                ))
            }
            Err(err) => {
                return Err(CredentialError::Token {
                    credential: NAME,
                    source: err.into(),
                })
            }
        };

        let status = response.status();
        let body = response.text().await.map_err(|err| CredentialError::Token {
            credential: NAME,
            source: TokenError::from(err),
        })?;

        // IMDS answers 400 when no identity is assigned to this host.
        if status == StatusCode::BAD_REQUEST {
            return Err(CredentialError::unavailable(
                NAME,
                format!("no managed identity is assigned: {body}"),
            ));
        }

        parse_token_response(status, body).map_err(|source| CredentialError::Token {
            credential: NAME,
            source,
        })
    }
}
