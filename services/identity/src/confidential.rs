use api_client::{ApiClient, Secret};
use chrono::Utc;
use http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::AccessToken;

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Lifetime assumed when a token response omits `expires_in`.
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Failure to obtain a token from a token endpoint.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The request could not be sent or its response not read
    #[error(transparent)]
    Request(#[from] api_client::Error),

    /// The endpoint answered without a usable access token
    #[error("Token acquisition failed ({status}): {body}")]
    NoAccessToken {
        /// HTTP status of the token response
        status: StatusCode,
        /// The raw token response
        body: String,
    },
}

/// Token lifetimes arrive as numbers from Entra ID and as strings from IMDS.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn as_secs(&self) -> Option<i64> {
        match self {
            Seconds::Number(n) => Some(*n),
            Seconds::Text(s) => s.parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<Secret>,
    expires_in: Option<Seconds>,
}

/// Turn a token endpoint response into an [AccessToken], or explain why not.
pub(crate) fn parse_token_response(status: StatusCode, body: String) -> Result<AccessToken, TokenError> {
    let parsed = if status.is_success() {
        serde_json::from_str::<TokenResponse>(&body).ok()
    } else {
        None
    };

    match parsed {
        Some(TokenResponse {
            access_token: Some(token),
            expires_in,
        }) if !token.is_empty() => {
            let lifetime = expires_in
                .as_ref()
                .and_then(Seconds::as_secs)
                .unwrap_or(DEFAULT_EXPIRES_IN);
            Ok(AccessToken::new(
                token,
                Utc::now() + chrono::Duration::seconds(lifetime),
            ))
        }
        _ => Err(TokenError::NoAccessToken { status, body }),
    }
}

/// How a confidential client proves its identity to the token endpoint.
#[derive(Debug, Clone)]
pub enum ClientCredential {
    /// A client secret, e.g. one stored in Key Vault
    Secret(Secret),

    /// A signed JWT from a federated identity provider
    Assertion(Secret),
}

/// A confidential client application registered in Entra ID.
///
/// Equivalent to an OAuth2 client which holds its own credential and asks
/// for tokens on its own behalf.
#[derive(Debug, Clone)]
pub struct ConfidentialClient {
    client: ApiClient<()>,
    tenant_id: String,
    client_id: String,
    credential: ClientCredential,
}

impl ConfidentialClient {
    /// Create a client talking to `authority_host` (normally [crate::AUTHORITY_HOST]).
    pub fn new(
        authority_host: http::Uri,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        credential: ClientCredential,
    ) -> Self {
        Self::from_api_client(
            ApiClient::new(authority_host, ()),
            tenant_id,
            client_id,
            credential,
        )
    }

    /// Create a client on top of an existing API client rooted at the authority host.
    pub fn from_api_client(
        client: ApiClient<()>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        credential: ClientCredential,
    ) -> Self {
        Self {
            client,
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            credential,
        }
    }

    /// Acquire a token for the application itself with the client-credentials grant.
    #[tracing::instrument(skip(self), fields(tenant = %self.tenant_id, client_id = %self.client_id))]
    pub async fn acquire_token_for_client(&self, scopes: &[&str]) -> Result<AccessToken, TokenError> {
        let scope = scopes.join(" ");
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("scope", scope.as_str()),
        ];

        match &self.credential {
            ClientCredential::Secret(secret) => form.push(("client_secret", secret.revealed())),
            ClientCredential::Assertion(assertion) => {
                form.push(("client_assertion_type", CLIENT_ASSERTION_TYPE));
                form.push(("client_assertion", assertion.revealed()));
            }
        }

        let response = self
            .client
            .post(&format!("{}/oauth2/v2.0/token", self.tenant_id))
            .form(&form)?
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let token = parse_token_response(status, body)?;

        tracing::debug!(expires_on = %token.expires_on, "acquired token");
        Ok(token)
    }
}
