//! Entra ID token acquisition.
//!
//! Two halves:
//! - [`ConfidentialClient`] exchanges an application's client secret (or a
//!   federated assertion) for an access token with the client-credentials grant.
//! - [`DefaultCredential`] finds whatever ambient identity the process runs
//!   under (environment, workload identity, managed identity, Azure CLI) and
//!   uses it to get tokens for Azure resources such as Key Vault.

use std::fmt;

use api_client::Secret;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod azure_cli;
mod confidential;
mod default;
mod environment;
mod managed_identity;
mod workload;

pub use self::azure_cli::AzureCliCredential;
pub use self::confidential::{ClientCredential, ConfidentialClient, TokenError};
pub use self::default::DefaultCredential;
pub use self::environment::EnvironmentCredential;
pub use self::managed_identity::{ImdsAuthentication, ManagedIdentityCredential};
pub use self::workload::WorkloadIdentityCredential;

/// Public cloud Entra ID authority.
pub const AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Scope for Microsoft Graph application permissions.
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Scope for Azure Key Vault data-plane access.
pub const KEYVAULT_SCOPE: &str = "https://vault.azure.net/.default";

const TENANT_ID: &str = "AZURE_TENANT_ID";
const CLIENT_ID: &str = "AZURE_CLIENT_ID";
const CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
const FEDERATED_TOKEN_FILE: &str = "AZURE_FEDERATED_TOKEN_FILE";

/// Reads a configuration value by name. `std::env::var` in production.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Look up a process environment variable.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Look up a variable, treating an empty value as absent.
pub(crate) fn lookup_nonempty(lookup: Lookup<'_>, name: &str) -> Option<String> {
    lookup(name).filter(|value| !value.trim().is_empty())
}

/// A short-lived bearer token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The token itself
    pub token: Secret,

    /// When the token stops being accepted
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    /// Create a token expiring at `expires_on`.
    pub fn new<S: Into<Secret>>(token: S, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// True once the expiry time has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_on <= Utc::now()
    }
}

/// Convert a `.default` scope into the resource identifier used by v1 endpoints.
///
/// ```rust
/// assert_eq!(
///     azure_identity::scope_to_resource("https://vault.azure.net/.default"),
///     "https://vault.azure.net"
/// );
/// ```
pub fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

/// Errors from an ambient credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// This credential isn't configured in the current environment
    #[error("{credential} unavailable: {reason}")]
    Unavailable {
        /// Which credential
        credential: &'static str,
        /// Why it can't be used
        reason: String,
    },

    /// The credential is configured, but the token request failed
    #[error("{credential} authentication failed: {source}")]
    Token {
        /// Which credential
        credential: &'static str,
        /// The token endpoint failure
        #[source]
        source: TokenError,
    },

    /// A local file the credential depends on couldn't be read
    #[error("{credential} could not read {path}: {source}")]
    Io {
        /// Which credential
        credential: &'static str,
        /// The file in question
        path: String,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// The Azure CLI ran but its output was unusable
    #[error("Azure CLI: {0}")]
    Cli(String),

    /// None of the chained credentials could be used
    #[error("no credential was available:\n{}", .0.join("\n"))]
    Exhausted(Vec<String>),
}

impl CredentialError {
    pub(crate) fn unavailable(credential: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            credential,
            reason: reason.into(),
        }
    }

    /// True when the next credential in a chain should be tried.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Something which can produce access tokens for Azure resources.
#[async_trait]
pub trait TokenCredential: fmt::Debug + Send + Sync {
    /// A short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Get a token for `scopes`.
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;

    /// A lookup backed by a fixed set of variables.
    pub(crate) fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }
}
