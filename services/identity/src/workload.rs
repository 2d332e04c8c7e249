use api_client::Secret;
use async_trait::async_trait;
use camino::Utf8PathBuf;

use crate::{
    lookup_nonempty, AccessToken, ClientCredential, ConfidentialClient, CredentialError, Lookup,
    TokenCredential, CLIENT_ID, FEDERATED_TOKEN_FILE, TENANT_ID,
};

const NAME: &str = "WorkloadIdentityCredential";

#[derive(Debug, Clone)]
struct Federation {
    authority_host: http::Uri,
    tenant_id: String,
    client_id: String,
    token_file: Utf8PathBuf,
}

/// Workload identity federation: a CI system or cluster writes a signed OIDC
/// token to `AZURE_FEDERATED_TOKEN_FILE`, which is exchanged for an Entra ID token.
///
/// The file is re-read on every request since the issuer rotates it.
#[derive(Debug, Clone)]
pub struct WorkloadIdentityCredential {
    federation: Result<Federation, String>,
}

impl WorkloadIdentityCredential {
    /// Configure from `lookup`.
    pub fn from_lookup(authority_host: &http::Uri, lookup: Lookup<'_>) -> Self {
        let federation = match (
            lookup_nonempty(lookup, TENANT_ID),
            lookup_nonempty(lookup, CLIENT_ID),
            lookup_nonempty(lookup, FEDERATED_TOKEN_FILE),
        ) {
            (Some(tenant_id), Some(client_id), Some(token_file)) => Ok(Federation {
                authority_host: authority_host.clone(),
                tenant_id,
                client_id,
                token_file: token_file.into(),
            }),
            (_, _, None) => Err(format!("{FEDERATED_TOKEN_FILE} is not set")),
            (None, _, _) => Err(format!("{TENANT_ID} is not set")),
            (_, None, _) => Err(format!("{CLIENT_ID} is not set")),
        };

        Self { federation }
    }
}

#[async_trait]
impl TokenCredential for WorkloadIdentityCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let federation = self
            .federation
            .as_ref()
            .map_err(|reason| CredentialError::unavailable(NAME, reason.clone()))?;

        let assertion = tokio::fs::read_to_string(&federation.token_file)
            .await
            .map_err(|source| CredentialError::Io {
                credential: NAME,
                path: federation.token_file.to_string(),
                source,
            })?;

        let client = ConfidentialClient::new(
            federation.authority_host.clone(),
            federation.tenant_id.clone(),
            federation.client_id.clone(),
            ClientCredential::Assertion(Secret::from(assertion.trim().to_owned())),
        );

        client
            .acquire_token_for_client(scopes)
            .await
            .map_err(|source| CredentialError::Token {
                credential: NAME,
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::vars;

    #[tokio::test]
    async fn unavailable_without_token_file() {
        let lookup = vars(&[(TENANT_ID, "contoso"), (CLIENT_ID, "app")]);
        let credential = WorkloadIdentityCredential::from_lookup(
            &crate::AUTHORITY_HOST.parse().unwrap(),
            &lookup,
        );

        let err = credential.get_token(&[crate::KEYVAULT_SCOPE]).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn unreadable_token_file_is_not_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing-token");
        let lookup = vars(&[
            (TENANT_ID, "contoso"),
            (CLIENT_ID, "app"),
            (FEDERATED_TOKEN_FILE, missing.to_str().unwrap()),
        ]);
        let credential = WorkloadIdentityCredential::from_lookup(
            &crate::AUTHORITY_HOST.parse().unwrap(),
            &lookup,
        );

        let err = credential.get_token(&[crate::KEYVAULT_SCOPE]).await.unwrap_err();
        assert!(matches!(err, CredentialError::Io { .. }));
    }
}
