//! Key Vault secret bundle

use api_client::Secret;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A secret as returned by `GET /secrets/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyVaultSecret {
    /// The secret value
    pub value: Option<Secret>,

    /// Versioned identifier, `https://{vault}/secrets/{name}/{version}`
    pub id: String,

    /// Content type set by whoever stored the secret
    #[serde(rename = "contentType")]
    pub content_type: Option<String>,

    /// Management attributes
    #[serde(default)]
    pub attributes: SecretAttributes,
}

impl KeyVaultSecret {
    /// The version segment of the identifier.
    pub fn version(&self) -> Option<&str> {
        let mut segments = self.id.rsplit('/');
        let version = segments.next()?;
        let _name = segments.next()?;
        (segments.next()? == "secrets").then_some(version)
    }
}

/// Management attributes of a secret.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretAttributes {
    /// Whether the secret can be read
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    /// Creation time
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created: Option<DateTime<Utc>>,

    /// Last update time
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub updated: Option<DateTime<Utc>>,

    /// Expiry time
    #[serde(default, rename = "exp", with = "chrono::serde::ts_seconds_option")]
    pub expires: Option<DateTime<Utc>>,
}

impl Default for SecretAttributes {
    fn default() -> Self {
        Self {
            enabled: true,
            created: None,
            updated: None,
            expires: None,
        }
    }
}

fn enabled_by_default() -> bool {
    true
}
