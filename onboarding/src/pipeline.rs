//! The validation pipeline.
//!
//! Four stages run strictly in order, each feeding the next:
//! credentials sign in to Key Vault, Key Vault yields the client secret, the
//! client secret buys a Graph token, and the Graph token answers whether the
//! group exists. Any stage failure ends the run.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use api_client::Secret;
use async_trait::async_trait;
use azure_identity::{
    AccessToken, ClientCredential, ConfidentialClient, CredentialError, DefaultCredential,
    TokenCredential, TokenError, GRAPH_SCOPE,
};
use graph::{GraphClient, GraphError, GroupQuery, GroupRecord, ValidationResult};
use http::Uri;
use keyvault::{KeyVaultClient, KeyVaultError};
use thiserror::Error;

use crate::config::{Config, ConfigError, SecretConfig, TokenConfig};
use crate::report;

/// Supplies the identity used to read from Key Vault.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Resolve a credential. Signing in happens when the credential is first used.
    async fn resolve(&self) -> Result<Arc<dyn TokenCredential>, CredentialError>;
}

/// Reads the service principal's client secret.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the secret described by `config`, authenticating with `credential`.
    async fn fetch(
        &self,
        credential: Arc<dyn TokenCredential>,
        config: &SecretConfig,
    ) -> Result<Secret, KeyVaultError>;
}

/// Exchanges the client secret for a Microsoft Graph token.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Run the client credentials grant for `config` with `secret`.
    async fn issue(&self, config: &TokenConfig, secret: Secret) -> Result<AccessToken, TokenError>;
}

/// Answers whether a group exists.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Look up `query` in the directory at `base`.
    async fn validate(
        &self,
        base: &Uri,
        token: &AccessToken,
        query: &GroupQuery,
    ) -> Result<ValidationResult, GraphError>;
}

/// The ambient Azure identity: environment, workload identity, managed identity, then Azure CLI.
#[derive(Debug, Clone)]
pub struct AmbientCredentials {
    authority_host: Uri,
}

impl AmbientCredentials {
    /// Sign in against `authority_host`.
    pub fn new(authority_host: Uri) -> Self {
        Self { authority_host }
    }
}

#[async_trait]
impl CredentialSource for AmbientCredentials {
    async fn resolve(&self) -> Result<Arc<dyn TokenCredential>, CredentialError> {
        Ok(Arc::new(DefaultCredential::with_authority(
            &self.authority_host,
            &azure_identity::process_env,
        )))
    }
}

/// Azure Key Vault.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyVault;

#[async_trait]
impl SecretStore for KeyVault {
    async fn fetch(
        &self,
        credential: Arc<dyn TokenCredential>,
        config: &SecretConfig,
    ) -> Result<Secret, KeyVaultError> {
        KeyVaultClient::for_vault(&config.keyvault_name, credential)?
            .get_secret_value(&config.secret_name)
            .await
    }
}

/// The Entra ID token endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntraId;

#[async_trait]
impl TokenIssuer for EntraId {
    async fn issue(&self, config: &TokenConfig, secret: Secret) -> Result<AccessToken, TokenError> {
        ConfidentialClient::new(
            config.authority_host.clone(),
            &config.tenant_id,
            &config.client_id,
            ClientCredential::Secret(secret),
        )
        .acquire_token_for_client(&[GRAPH_SCOPE])
        .await
    }
}

/// Microsoft Graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrosoftGraph;

#[async_trait]
impl GroupDirectory for MicrosoftGraph {
    async fn validate(
        &self,
        base: &Uri,
        token: &AccessToken,
        query: &GroupQuery,
    ) -> Result<ValidationResult, GraphError> {
        GraphClient::new(base.clone(), token.token.clone())
            .validate_group(query)
            .await
    }
}

/// Why a run stopped early.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration is incomplete
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No usable Azure identity
    #[error("Authenticating to Azure: {0}")]
    Credential(#[from] CredentialError),

    /// Key Vault refused or failed
    #[error("Reading the client secret from Key Vault: {0}")]
    Secret(#[source] KeyVaultError),

    /// Entra ID issued no token
    #[error("Acquiring a Microsoft Graph token: {0}")]
    Token(#[from] TokenError),

    /// The group query failed
    #[error("Querying Entra ID groups: {0}")]
    Directory(#[from] GraphError),

    /// Writing results failed
    #[error("Writing output: {0}")]
    Output(#[from] std::io::Error),
}

impl From<KeyVaultError> for PipelineError {
    fn from(error: KeyVaultError) -> Self {
        match error {
            KeyVaultError::Credential(error) => PipelineError::Credential(error),
            error => PipelineError::Secret(error),
        }
    }
}

/// How a run ended, when it ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The command finished and there was nothing to judge
    Completed,

    /// The group exists
    GroupExists(GroupRecord),

    /// No group has the name
    GroupMissing,
}

impl Outcome {
    /// Numeric exit status: 0 unless the group is missing.
    pub fn code(&self) -> u8 {
        match self {
            Outcome::Completed | Outcome::GroupExists(_) => 0,
            Outcome::GroupMissing => 1,
        }
    }
}

/// Exit status when a run stopped on an error (`EX_SOFTWARE`).
///
/// Distinct from a missing group (1) and from command line usage errors (2).
pub const FAILURE_CODE: u8 = 70;

/// Numeric exit status for the result of a run.
pub fn status(result: &Result<Outcome, PipelineError>) -> u8 {
    match result {
        Ok(outcome) => outcome.code(),
        Err(_) => FAILURE_CODE,
    }
}

/// Process exit status for the result of a run.
pub fn exit_code(result: &Result<Outcome, PipelineError>) -> ExitCode {
    ExitCode::from(status(result))
}

/// The stages of a run.
pub struct Pipeline {
    credentials: Box<dyn CredentialSource>,
    secrets: Box<dyn SecretStore>,
    tokens: Box<dyn TokenIssuer>,
    directory: Box<dyn GroupDirectory>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Assemble a pipeline from explicit stages.
    pub fn new(
        credentials: impl CredentialSource + 'static,
        secrets: impl SecretStore + 'static,
        tokens: impl TokenIssuer + 'static,
        directory: impl GroupDirectory + 'static,
    ) -> Self {
        Self {
            credentials: Box::new(credentials),
            secrets: Box::new(secrets),
            tokens: Box::new(tokens),
            directory: Box::new(directory),
        }
    }

    /// The real Azure services, signing in against `authority_host`.
    pub fn azure(authority_host: Uri) -> Self {
        Self::new(
            AmbientCredentials::new(authority_host),
            KeyVault,
            EntraId,
            MicrosoftGraph,
        )
    }

    /// Stages one and two: read the client secret.
    #[tracing::instrument(skip_all, fields(vault = %config.keyvault_name, secret = %config.secret_name))]
    pub async fn fetch_client_secret(&self, config: &SecretConfig) -> Result<Secret, PipelineError> {
        let credential = self.credentials.resolve().await?;
        let secret = self.secrets.fetch(credential, config).await?;
        tracing::info!("Client secret retrieved from Key Vault");
        Ok(secret)
    }

    /// Stages one to three: read the client secret and exchange it for a Graph token.
    #[tracing::instrument(skip_all, fields(tenant = %config.tenant_id, client = %config.client_id))]
    pub async fn acquire_graph_token(&self, config: &TokenConfig) -> Result<AccessToken, PipelineError> {
        let secret = self.fetch_client_secret(&config.secret).await?;
        let token = self.tokens.issue(config, secret).await?;
        tracing::info!(expires_on = %token.expires_on, "Graph token acquired");
        Ok(token)
    }

    /// All four stages: report whether the configured group exists.
    ///
    /// A missing group is an [`Outcome`], not an error.
    pub async fn validate_group<W: Write>(
        &self,
        config: &Config,
        out: &mut W,
    ) -> Result<Outcome, PipelineError> {
        let token = self.acquire_graph_token(&config.token).await?;
        report::token_acquired(out)?;
        report::token_preview(out, &token)?;

        let query = GroupQuery::new(config.group_name.as_str());
        match self
            .directory
            .validate(&config.graph_base, &token, &query)
            .await?
        {
            ValidationResult::Found(group) => {
                report::group_found(out, &group)?;
                Ok(Outcome::GroupExists(group))
            }
            ValidationResult::NotFound => {
                tracing::warn!(group = query.name(), "Group not found");
                report::group_missing(out, &query)?;
                Ok(Outcome::GroupMissing)
            }
        }
    }
}
