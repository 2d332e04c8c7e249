use async_trait::async_trait;

use crate::{
    lookup_nonempty, AccessToken, AzureCliCredential, CredentialError, EnvironmentCredential,
    Lookup, ManagedIdentityCredential, TokenCredential, WorkloadIdentityCredential,
    TENANT_ID,
};

/// Tries a sequence of credentials and uses the first one that works.
///
/// Credentials which aren't configured here are skipped. A credential that is
/// configured but fails ends the search with its error.
#[derive(Debug)]
pub struct DefaultCredential {
    sources: Vec<Box<dyn TokenCredential>>,
}

impl DefaultCredential {
    /// Chain explicit credentials, tried in order.
    pub fn new(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    /// The standard chain, signing in against `authority_host`.
    pub fn with_authority(authority_host: &http::Uri, lookup: Lookup<'_>) -> Self {
        let cli = match lookup_nonempty(lookup, TENANT_ID) {
            Some(tenant) => AzureCliCredential::with_tenant(tenant),
            None => AzureCliCredential::new(),
        };

        Self::new(vec![
            Box::new(EnvironmentCredential::from_lookup(authority_host, lookup)),
            Box::new(WorkloadIdentityCredential::from_lookup(
                authority_host,
                lookup,
            )),
            Box::new(ManagedIdentityCredential::from_lookup(lookup)),
            Box::new(cli),
        ])
    }
}

#[async_trait]
impl TokenCredential for DefaultCredential {
    fn name(&self) -> &'static str {
        "DefaultCredential"
    }

    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let mut reasons = Vec::new();

        for source in &self.sources {
            match source.get_token(scopes).await {
                Ok(token) => {
                    tracing::info!(credential = source.name(), "authenticated");
                    return Ok(token);
                }
                Err(err) if err.is_unavailable() => {
                    tracing::debug!(credential = source.name(), "{err}");
                    reasons.push(err.to_string());
                }
                Err(err) => {
                    tracing::error!(credential = source.name(), "{err}");
                    return Err(err);
                }
            }
        }

        Err(CredentialError::Exhausted(reasons))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;

    #[derive(Debug)]
    enum Behaviour {
        Unavailable,
        Fail,
        Token(&'static str),
    }

    #[derive(Debug)]
    struct Fake {
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
    }

    impl Fake {
        fn boxed(behaviour: Behaviour, calls: &Arc<AtomicUsize>) -> Box<dyn TokenCredential> {
            Box::new(Fake {
                behaviour,
                calls: calls.clone(),
            })
        }
    }

    #[async_trait]
    impl TokenCredential for Fake {
        fn name(&self) -> &'static str {
            "Fake"
        }

        async fn get_token(&self, _scopes: &[&str]) -> Result<AccessToken, CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Unavailable => Err(CredentialError::unavailable("Fake", "not here")),
                Behaviour::Fail => Err(CredentialError::Cli("boom".into())),
                Behaviour::Token(token) => {
                    Ok(AccessToken::new(token, Utc::now() + chrono::Duration::hours(1)))
                }
            }
        }
    }

    #[tokio::test]
    async fn skips_unavailable_sources() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = DefaultCredential::new(vec![
            Fake::boxed(Behaviour::Unavailable, &calls),
            Fake::boxed(Behaviour::Token("second"), &calls),
            Fake::boxed(Behaviour::Token("third"), &calls),
        ]);

        let token = chain.get_token(&[crate::KEYVAULT_SCOPE]).await.unwrap();
        assert_eq!(token.token.revealed(), "second");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stops_at_first_real_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = DefaultCredential::new(vec![
            Fake::boxed(Behaviour::Fail, &calls),
            Fake::boxed(Behaviour::Token("never"), &calls),
        ]);

        let err = chain.get_token(&[crate::KEYVAULT_SCOPE]).await.unwrap_err();
        assert!(matches!(err, CredentialError::Cli(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_when_nothing_available() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = DefaultCredential::new(vec![
            Fake::boxed(Behaviour::Unavailable, &calls),
            Fake::boxed(Behaviour::Unavailable, &calls),
        ]);

        let err = chain.get_token(&[crate::KEYVAULT_SCOPE]).await.unwrap_err();
        match err {
            CredentialError::Exhausted(reasons) => assert_eq!(reasons.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
