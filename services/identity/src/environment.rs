use api_client::Secret;
use async_trait::async_trait;

use crate::{
    lookup_nonempty, AccessToken, ClientCredential, ConfidentialClient, CredentialError, Lookup,
    TokenCredential, CLIENT_ID, CLIENT_SECRET, TENANT_ID,
};

const NAME: &str = "EnvironmentCredential";

/// A service principal described by `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`.
#[derive(Debug, Clone)]
pub struct EnvironmentCredential {
    client: Result<ConfidentialClient, String>,
}

impl EnvironmentCredential {
    /// Configure from `lookup`. Missing variables make the credential unavailable, not an error.
    pub fn from_lookup(authority_host: &http::Uri, lookup: Lookup<'_>) -> Self {
        let client = match (
            lookup_nonempty(lookup, TENANT_ID),
            lookup_nonempty(lookup, CLIENT_ID),
            lookup_nonempty(lookup, CLIENT_SECRET),
        ) {
            (Some(tenant), Some(client_id), Some(secret)) => Ok(ConfidentialClient::new(
                authority_host.clone(),
                tenant,
                client_id,
                ClientCredential::Secret(Secret::from(secret)),
            )),
            (None, _, _) => Err(format!("{TENANT_ID} is not set")),
            (_, None, _) => Err(format!("{CLIENT_ID} is not set")),
            (_, _, None) => Err(format!("{CLIENT_SECRET} is not set")),
        };

        Self { client }
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let client = self
            .client
            .as_ref()
            .map_err(|reason| CredentialError::unavailable(NAME, reason.clone()))?;

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
    async fn unavailable_without_secret() {
        let lookup = vars(&[(TENANT_ID, "contoso"), (CLIENT_ID, "app")]);
        let credential =
            EnvironmentCredential::from_lookup(&crate::AUTHORITY_HOST.parse().unwrap(), &lookup);

        let err = credential.get_token(&[crate::KEYVAULT_SCOPE]).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains(CLIENT_SECRET));
    }

    #[tokio::test]
    async fn unavailable_without_tenant() {
        let lookup = vars(&[(CLIENT_ID, "app"), (CLIENT_SECRET, "s")]);
        let credential =
            EnvironmentCredential::from_lookup(&crate::AUTHORITY_HOST.parse().unwrap(), &lookup);

        let err = credential.get_token(&[crate::KEYVAULT_SCOPE]).await.unwrap_err();
        assert!(err.to_string().contains(TENANT_ID));
    }
}
