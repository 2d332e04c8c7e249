//! Process configuration, read once from the environment.
//!
//! Every value is read through a lookup function so tests never touch the
//! real process environment.

use api_client::uri::{IntoUri as _, ParseUriError};
use azure_identity::Lookup;
use http::Uri;
use thiserror::Error;

pub(crate) const TENANT_ID: &str = "AZURE_TENANT_ID";
pub(crate) const CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub(crate) const KEYVAULT_NAME: &str = "KEYVAULT_NAME";
pub(crate) const GROUP_NAME: &str = "ENTRA_GROUP_NAME";
pub(crate) const SECRET_NAME: &str = "KEYVAULT_SECRET_NAME";
pub(crate) const AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";
pub(crate) const GRAPH_API_BASE: &str = "GRAPH_API_BASE";

/// Name of the Key Vault secret holding the service principal's client secret.
pub const DEFAULT_SECRET_NAME: &str = "spna-client-secret";

/// A required setting is absent or unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The variable is not set at all
    #[error("Environment variable {0} not found!")]
    Missing(&'static str),

    /// The variable is set to an empty string
    #[error("Environment variable {0} is empty!")]
    Empty(&'static str),

    /// The variable should be a URL but isn't
    #[error("Environment variable {var} not a URL: {source}")]
    InvalidUrl {
        /// The variable
        var: &'static str,
        /// Why it didn't parse
        #[source]
        source: ParseUriError,
    },
}

fn required(lookup: Lookup<'_>, var: &'static str) -> Result<String, ConfigError> {
    let value = lookup(var).ok_or(ConfigError::Missing(var))?;

    if value.trim().is_empty() {
        return Err(ConfigError::Empty(var));
    }

    Ok(value)
}

/// Like [`required`], but whitespace is kept as a value. Only an empty string counts as empty.
fn present(lookup: Lookup<'_>, var: &'static str) -> Result<String, ConfigError> {
    let value = lookup(var).ok_or(ConfigError::Missing(var))?;

    if value.is_empty() {
        return Err(ConfigError::Empty(var));
    }

    Ok(value)
}

fn optional(lookup: Lookup<'_>, var: &'static str) -> Option<String> {
    lookup(var).filter(|value| !value.trim().is_empty())
}

fn url_or(lookup: Lookup<'_>, var: &'static str, default: &str) -> Result<Uri, ConfigError> {
    optional(lookup, var)
        .as_deref()
        .unwrap_or(default)
        .into_uri()
        .map_err(|source| ConfigError::InvalidUrl { var, source })
}

/// The Entra ID authority, `AZURE_AUTHORITY_HOST` or the public cloud.
pub fn authority_host(lookup: Lookup<'_>) -> Result<Uri, ConfigError> {
    url_or(lookup, AUTHORITY_HOST, azure_identity::AUTHORITY_HOST)
}

/// Where the client secret lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretConfig {
    /// Key Vault name, not URL
    pub keyvault_name: String,

    /// Secret name within the vault
    pub secret_name: String,
}

impl SecretConfig {
    /// Read `KEYVAULT_NAME` (required) and `KEYVAULT_SECRET_NAME`.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            keyvault_name: required(lookup, KEYVAULT_NAME)?,
            secret_name: optional(lookup, SECRET_NAME)
                .unwrap_or_else(|| DEFAULT_SECRET_NAME.to_owned()),
        })
    }
}

/// The service principal which asks for a Graph token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    /// Directory (tenant) id
    pub tenant_id: String,

    /// Application (client) id
    pub client_id: String,

    /// Entra ID authority, e.g. `https://login.microsoftonline.com`
    pub authority_host: Uri,

    /// Where its client secret lives
    pub secret: SecretConfig,
}

impl TokenConfig {
    /// Read `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and the secret settings.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            tenant_id: required(lookup, TENANT_ID)?,
            client_id: required(lookup, CLIENT_ID)?,
            secret: SecretConfig::from_lookup(lookup)?,
            authority_host: authority_host(lookup)?,
        })
    }
}

/// Everything the group validation run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Token settings
    pub token: TokenConfig,

    /// Display name of the group, as supplied
    pub group_name: String,

    /// Microsoft Graph base, including the API version
    pub graph_base: Uri,
}

impl Config {
    /// Read the full configuration. Fails on the first missing value.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            token: TokenConfig::from_lookup(lookup)?,
            group_name: present(lookup, GROUP_NAME)?,
            graph_base: url_or(lookup, GRAPH_API_BASE, graph::GRAPH_API_BASE)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use super::*;

    pub(crate) fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    pub(crate) const COMPLETE: &[(&str, &str)] = &[
        (TENANT_ID, "contoso"),
        (CLIENT_ID, "app-id"),
        (KEYVAULT_NAME, "group-onboarding-kv"),
        (GROUP_NAME, " Platform-Admins "),
    ];

    #[test]
    fn complete_configuration() {
        let config = Config::from_lookup(&vars(COMPLETE)).unwrap();

        assert_eq!(config.token.tenant_id, "contoso");
        assert_eq!(config.token.client_id, "app-id");
        assert_eq!(config.token.secret.keyvault_name, "group-onboarding-kv");
        assert_eq!(config.token.secret.secret_name, DEFAULT_SECRET_NAME);
        assert_eq!(config.group_name, " Platform-Admins ");
        assert_eq!(
            config.token.authority_host.to_string(),
            "https://login.microsoftonline.com/"
        );
        assert_eq!(
            config.graph_base.to_string(),
            "https://graph.microsoft.com/v1.0"
        );
    }

    #[test]
    fn each_required_variable_is_checked() {
        for missing in [TENANT_ID, CLIENT_ID, KEYVAULT_NAME, GROUP_NAME] {
            let pairs: Vec<_> = COMPLETE
                .iter()
                .copied()
                .filter(|(k, _)| *k != missing)
                .collect();

            match Config::from_lookup(&vars(&pairs)) {
                Err(ConfigError::Missing(var)) => assert_eq!(var, missing),
                other => panic!("expected {missing} to be missing, got {other:?}"),
            }
        }
    }

    #[test]
    fn empty_is_reported_separately() {
        let mut pairs = COMPLETE.to_vec();
        pairs.push((CLIENT_ID, ""));
        pairs.retain(|(k, v)| *k != CLIENT_ID || v.is_empty());

        assert!(matches!(
            Config::from_lookup(&vars(&pairs)),
            Err(ConfigError::Empty(CLIENT_ID))
        ));
    }

    #[test]
    fn blank_group_name_is_kept() {
        let mut pairs = COMPLETE.to_vec();
        pairs.retain(|(k, _)| *k != GROUP_NAME);
        pairs.push((GROUP_NAME, "   "));

        let config = Config::from_lookup(&vars(&pairs)).unwrap();
        assert_eq!(config.group_name, "   ");

        pairs.retain(|(k, _)| *k != GROUP_NAME);
        pairs.push((GROUP_NAME, ""));
        assert!(matches!(
            Config::from_lookup(&vars(&pairs)),
            Err(ConfigError::Empty(GROUP_NAME))
        ));
    }

    #[test]
    fn overrides() {
        let mut pairs = COMPLETE.to_vec();
        pairs.push((SECRET_NAME, "other-secret"));
        pairs.push((GRAPH_API_BASE, "https://graph.microsoft.us/v1.0"));
        pairs.push((AUTHORITY_HOST, "https://login.microsoftonline.us"));

        let config = Config::from_lookup(&vars(&pairs)).unwrap();
        assert_eq!(config.token.secret.secret_name, "other-secret");
        assert_eq!(config.graph_base.host(), Some("graph.microsoft.us"));
        assert_eq!(
            config.token.authority_host.host(),
            Some("login.microsoftonline.us")
        );
    }

    #[test]
    fn invalid_url() {
        let mut pairs = COMPLETE.to_vec();
        pairs.push((GRAPH_API_BASE, "graph"));

        assert!(matches!(
            Config::from_lookup(&vars(&pairs)),
            Err(ConfigError::InvalidUrl {
                var: GRAPH_API_BASE,
                ..
            })
        ));
    }
}
