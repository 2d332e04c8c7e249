use std::io;
use std::process::Command;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone as _, Utc};
use serde::Deserialize;

use crate::{scope_to_resource, AccessToken, CredentialError, TokenCredential};

const NAME: &str = "AzureCliCredential";

#[cfg(windows)]
const AZ: &str = "az.cmd";
#[cfg(not(windows))]
const AZ: &str = "az";

/// Output of `az account get-access-token --output json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: api_client::Secret,

    /// Local time, e.g. `2024-01-01 12:00:00.000000`
    expires_on: Option<String>,

    /// Unix timestamp, only in newer CLI versions
    #[serde(rename = "expires_on")]
    expires_on_timestamp: Option<i64>,
}

fn parse_cli_output(stdout: &str) -> Result<AccessToken, CredentialError> {
    let token: CliToken = serde_json::from_str(stdout)
        .map_err(|err| CredentialError::Cli(format!("unexpected output: {err}")))?;

    let expires_on = match (token.expires_on_timestamp, token.expires_on.as_deref()) {
        (Some(timestamp), _) => DateTime::<Utc>::from_timestamp(timestamp, 0),
        (None, Some(local)) => NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).single())
            .map(|local| local.with_timezone(&Utc)),
        (None, None) => None,
    }
    .ok_or_else(|| CredentialError::Cli("token expiry missing or malformed".into()))?;

    Ok(AccessToken::new(token.access_token, expires_on))
}

/// Tokens from the signed-in Azure CLI, as on a developer machine or after `azure/login` in CI.
#[derive(Debug, Clone, Default)]
pub struct AzureCliCredential {
    tenant_id: Option<String>,
}

impl AzureCliCredential {
    /// Use the CLI's current account.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the CLI for tokens in a specific tenant.
    pub fn with_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
        }
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
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

        let mut cmd = Command::new(AZ);
        cmd.args([
            "account",
            "get-access-token",
            "--output",
            "json",
            "--resource",
            scope_to_resource(scope),
        ]);
        if let Some(tenant) = self.tenant_id.as_deref() {
            cmd.args(["--tenant", tenant]);
        }

        let output = tokio::task::spawn_blocking(move || cmd.output())
            .await
            .map_err(|err| CredentialError::Cli(format!("az task failed: {err}")))?;

        let output = match output {
            Ok(output) => output,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(CredentialError::unavailable(
                    NAME,
                    "Azure CLI not found on PATH",
                ))
            }
            Err(err) => return Err(CredentialError::Cli(format!("running az: {err}"))),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("az login") || stderr.contains("az account set") {
                return Err(CredentialError::unavailable(
                    NAME,
                    "not logged in, run 'az login'",
                ));
            }
            return Err(CredentialError::Cli(stderr.trim().to_owned()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_cli_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn parses_timestamp_output() {
        let output = indoc! {r#"
            {
              "accessToken": "cli-token",
              "expiresOn": "2030-01-01 12:00:00.000000",
              "expires_on": 1893499200,
              "subscription": "00000000-0000-0000-0000-000000000000",
              "tenant": "contoso",
              "tokenType": "Bearer"
            }
        "#};

        let token = parse_cli_output(output).unwrap();
        assert_eq!(token.token.revealed(), "cli-token");
        assert_eq!(token.expires_on.timestamp(), 1893499200);
    }

    #[test]
    fn parses_legacy_local_time() {
        let output = indoc! {r#"
            {
              "accessToken": "cli-token",
              "expiresOn": "2030-01-01 12:00:00.000000",
              "tokenType": "Bearer"
            }
        "#};

        let token = parse_cli_output(output).unwrap();
        assert!(!token.is_expired());
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_cli_output("ERROR: something").unwrap_err();
        assert!(matches!(err, CredentialError::Cli(_)));
    }
}
