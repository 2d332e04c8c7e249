//! Read secrets from Azure Key Vault.
//!
//! Only the data-plane `get secret` operation is implemented. Access is
//! authorized with a bearer token from any [`TokenCredential`], which needs
//! the `Key Vault Secrets User` role (or an access policy granting `get`).

use std::sync::Arc;

use api_client::{ApiClient, BearerAuth, Secret};
use azure_identity::{CredentialError, TokenCredential, KEYVAULT_SCOPE};
use http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

mod models;

pub use self::models::{KeyVaultSecret, SecretAttributes};

const API_VERSION: &str = "7.4";
const VAULT_DOMAIN: &str = "vault.azure.net";

/// Errors while reading a secret from Key Vault
#[derive(Debug, Error)]
pub enum KeyVaultError {
    /// A token for Key Vault could not be obtained
    #[error("Authenticating to Key Vault: {0}")]
    Credential(#[from] CredentialError),

    /// The vault or secret name isn't one Key Vault would accept
    #[error("Invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        /// "vault" or "secret"
        kind: &'static str,
        /// The rejected name
        name: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// An API request encountered an error.
    #[error(transparent)]
    Request(#[from] api_client::Error),

    /// Key Vault returned a structured error.
    #[error("Key Vault error {status} {code}: {message}")]
    Service {
        /// The HTTP status code
        status: StatusCode,
        /// Key Vault's error code, e.g. `SecretNotFound`
        code: String,
        /// Key Vault's error message
        message: String,
    },

    /// Key Vault returned an error that isn't in its usual format.
    #[error("Response error: {status} {body}")]
    Response {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        body: String,
    },

    /// The secret exists but has no value.
    #[error("Secret {0} has no value")]
    Empty(String),

    /// The secret exists but is disabled.
    #[error("Secret {0} is disabled")]
    Disabled(String),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl KeyVaultError {
    fn from_body(status: StatusCode, body: String) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => KeyVaultError::Service {
                status,
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => KeyVaultError::Response { status, body },
        }
    }

    /// True when the vault reported that the secret does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            KeyVaultError::Service { status, code, .. } => {
                *status == StatusCode::NOT_FOUND || code == "SecretNotFound"
            }
            KeyVaultError::Response { status, .. } => *status == StatusCode::NOT_FOUND,
            _ => false,
        }
    }
}

fn check_name(kind: &'static str, name: &str, max: usize) -> Result<(), KeyVaultError> {
    let invalid = |reason| KeyVaultError::InvalidName {
        kind,
        name: name.to_owned(),
        reason,
    };

    if name.is_empty() || name.len() > max {
        return Err(invalid("wrong length"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid("only letters, digits and hyphens are allowed"));
    }
    Ok(())
}

/// Vault names are 3 to 24 characters, start with a letter, end with a letter
/// or digit, and never contain two hyphens in a row.
fn check_vault_name(name: &str) -> Result<(), KeyVaultError> {
    check_name("vault", name, 24)?;

    let invalid = |reason| KeyVaultError::InvalidName {
        kind: "vault",
        name: name.to_owned(),
        reason,
    };

    if name.len() < 3 {
        return Err(invalid("wrong length"));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(invalid("must start with a letter"));
    }
    if name.ends_with('-') {
        return Err(invalid("must not end with a hyphen"));
    }
    if name.contains("--") {
        return Err(invalid("consecutive hyphens are not allowed"));
    }
    Ok(())
}

/// The data-plane URL of a vault, e.g. `https://group-onboarding-kv.vault.azure.net`.
pub fn vault_url(name: &str) -> Result<http::Uri, KeyVaultError> {
    check_vault_name(name)?;
    Ok(format!("https://{name}.{VAULT_DOMAIN}")
        .parse()
        .expect("validated vault name makes a valid URI"))
}

/// A client for one Key Vault.
#[derive(Debug, Clone)]
pub struct KeyVaultClient {
    client: ApiClient<Option<BearerAuth>>,
    credential: Arc<dyn TokenCredential>,
}

impl KeyVaultClient {
    /// Create a client for the vault at `vault_url`.
    pub fn new(vault_url: http::Uri, credential: Arc<dyn TokenCredential>) -> Self {
        Self::from_api_client(ApiClient::new(vault_url, None), credential)
    }

    /// Create a client for the vault named `name` in the public cloud.
    pub fn for_vault(name: &str, credential: Arc<dyn TokenCredential>) -> Result<Self, KeyVaultError> {
        Ok(Self::new(vault_url(name)?, credential))
    }

    /// Use an existing API client rooted at the vault URL.
    pub fn from_api_client(
        client: ApiClient<Option<BearerAuth>>,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        Self { client, credential }
    }

    /// The vault this client reads from.
    pub fn vault_url(&self) -> http::Uri {
        self.client.base()
    }

    /// Get the latest version of a secret.
    #[tracing::instrument(skip(self), fields(vault = %self.client.base()))]
    pub async fn get_secret(&self, name: &str) -> Result<KeyVaultSecret, KeyVaultError> {
        check_name("secret", name, 127)?;

        let token = self.credential.get_token(&[KEYVAULT_SCOPE]).await?;
        self.client.refresh_auth(Some(BearerAuth::new(token.token)));

        let response = self
            .client
            .get(&format!("secrets/{name}"))
            .query(&[("api-version", API_VERSION)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(%status, "Error response from Key Vault");
            let body = response.text().await?;
            return Err(KeyVaultError::from_body(status, body));
        }

        let secret: KeyVaultSecret = response.json().await?;
        if !secret.attributes.enabled {
            return Err(KeyVaultError::Disabled(name.to_owned()));
        }
        if secret.value.as_ref().map_or(true, Secret::is_empty) {
            return Err(KeyVaultError::Empty(name.to_owned()));
        }

        tracing::debug!(id = %secret.id, "retrieved secret");
        Ok(secret)
    }

    /// Get the value of a secret.
    pub async fn get_secret_value(&self, name: &str) -> Result<Secret, KeyVaultError> {
        let secret = self.get_secret(name).await?;
        secret
            .value
            .ok_or_else(|| KeyVaultError::Empty(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use api_client::mock::MockService;
    use async_trait::async_trait;
    use azure_identity::AccessToken;
    use chrono::Utc;
    use indoc::indoc;

    use super::*;

    #[derive(Debug)]
    struct StaticCredential(Option<&'static str>);

    #[async_trait]
    impl TokenCredential for StaticCredential {
        fn name(&self) -> &'static str {
            "StaticCredential"
        }

        async fn get_token(
            &self,
            scopes: &[&str],
        ) -> Result<azure_identity::AccessToken, CredentialError> {
            assert_eq!(scopes, [KEYVAULT_SCOPE]);
            match self.0 {
                Some(token) => Ok(AccessToken::new(
                    token,
                    Utc::now() + chrono::Duration::hours(1),
                )),
                None => Err(CredentialError::Exhausted(vec!["nothing".into()])),
            }
        }
    }

    fn client(mock: &MockService, token: Option<&'static str>) -> KeyVaultClient {
        KeyVaultClient::from_api_client(
            ApiClient::new_with_inner_service(
                vault_url("group-onboarding-kv").unwrap(),
                None,
                mock.clone(),
            ),
            Arc::new(StaticCredential(token)),
        )
    }

    #[tokio::test]
    async fn reads_secret_value() {
        let mock = MockService::new();
        mock.add_json(
            "/secrets/spna-client-secret",
            StatusCode::OK,
            indoc! {r#"
                {
                  "value": "client-secret-value",
                  "id": "https://group-onboarding-kv.vault.azure.net/secrets/spna-client-secret/4387e9f3d6e14c459867679a90fd0f79",
                  "attributes": {
                    "enabled": true,
                    "created": 1493938410,
                    "updated": 1493938410,
                    "recoveryLevel": "Recoverable+Purgeable"
                  }
                }
            "#},
        );

        let value = client(&mock, Some("kv-token"))
            .get_secret_value("spna-client-secret")
            .await
            .unwrap();
        assert_eq!(value.revealed(), "client-secret-value");

        let request = &mock.requests()[0];
        assert_eq!(request.method, http::Method::GET);
        assert_eq!(request.header(http::header::AUTHORIZATION), Some("Bearer kv-token"));
        assert_eq!(request.query_value("api-version").as_deref(), Some(API_VERSION));
        assert_eq!(
            request.uri.host(),
            Some("group-onboarding-kv.vault.azure.net")
        );
    }

    #[tokio::test]
    async fn missing_secret_is_service_error() {
        let mock = MockService::new();
        mock.add_json(
            "/secrets/absent",
            StatusCode::NOT_FOUND,
            r#"{"error":{"code":"SecretNotFound","message":"A secret with (name/id) absent was not found in this key vault."}}"#,
        );

        let err = client(&mock, Some("kv-token"))
            .get_secret("absent")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        match err {
            KeyVaultError::Service { code, .. } => assert_eq!(code, "SecretNotFound"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unstructured_error_keeps_body() {
        let mock = MockService::new();
        mock.add("/secrets/name", StatusCode::BAD_GATEWAY, http::HeaderMap::new(), "upstream");

        let err = client(&mock, Some("kv-token"))
            .get_secret("name")
            .await
            .unwrap_err();
        match err {
            KeyVaultError::Response { status, body } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body, "upstream");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn credential_failure_sends_nothing() {
        let mock = MockService::new();

        let err = client(&mock, None).get_secret("name").await.unwrap_err();
        assert!(matches!(err, KeyVaultError::Credential(_)));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_value_is_an_error() {
        let mock = MockService::new();
        mock.add_json(
            "/secrets/blank",
            StatusCode::OK,
            r#"{"value":"","id":"https://group-onboarding-kv.vault.azure.net/secrets/blank/1","attributes":{"enabled":true}}"#,
        );

        let err = client(&mock, Some("kv-token"))
            .get_secret("blank")
            .await
            .unwrap_err();
        assert!(matches!(err, KeyVaultError::Empty(_)));
    }

    #[tokio::test]
    async fn disabled_secret_is_an_error() {
        let mock = MockService::new();
        mock.add_json(
            "/secrets/retired",
            StatusCode::OK,
            r#"{"value":"old","id":"https://group-onboarding-kv.vault.azure.net/secrets/retired/2","attributes":{"enabled":false}}"#,
        );

        let err = client(&mock, Some("kv-token"))
            .get_secret("retired")
            .await
            .unwrap_err();
        assert!(matches!(err, KeyVaultError::Disabled(_)));
    }

    static_assertions::assert_impl_all!(KeyVaultClient: Send, Sync);
    static_assertions::assert_impl_all!(KeyVaultError: Send, Sync);

    #[test]
    fn names_are_validated() {
        assert!(vault_url("group-onboarding-kv").is_ok());
        assert!(vault_url("").is_err());
        assert!(vault_url("a-vault-name-that-is-far-too-long").is_err());
        assert!(vault_url("bad.name").is_err());
        assert!(vault_url("kv1").is_ok());
        assert!(vault_url("a").is_err());
        assert!(vault_url("-kv-").is_err());
        assert!(vault_url("1vault").is_err());
        assert!(vault_url("vault-").is_err());
        assert!(vault_url("my--vault").is_err());
        assert!(check_name("secret", "spna client secret", 127).is_err());
    }
}
