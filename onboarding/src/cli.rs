use std::io::Write;

use azure_identity::Lookup;
use clap::{Parser, Subcommand};
use http::Uri;

use crate::config::{self, Config, SecretConfig, TokenConfig};
use crate::pipeline::{Outcome, Pipeline, PipelineError};
use crate::report;

/// Check that an Entra ID group exists before onboarding it.
///
/// Settings come from the environment: AZURE_TENANT_ID, AZURE_CLIENT_ID,
/// KEYVAULT_NAME, ENTRA_GROUP_NAME and optionally KEYVAULT_SECRET_NAME.
#[derive(Debug, Parser)]
#[command(name = "group-onboarding", version, about)]
pub struct Cli {
    /// More logging on stderr. RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand, `validate-group` when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What to do. Validating the group is the default.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Report whether the group exists (exit 1 when it doesn't)
    ValidateGroup {
        /// Display name, instead of ENTRA_GROUP_NAME
        #[arg(long, short)]
        group: Option<String>,
    },

    /// Read the client secret from Key Vault
    GetSecret {
        /// Vault name, instead of KEYVAULT_NAME
        #[arg(long)]
        vault: Option<String>,

        /// Secret name, instead of KEYVAULT_SECRET_NAME
        #[arg(long)]
        name: Option<String>,

        /// Print the secret value
        #[arg(long)]
        show: bool,
    },

    /// Acquire a Microsoft Graph token and show its prefix
    Token,
}

impl Cli {
    /// Default log filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Run against the real Azure services, printing results on stdout.
    pub async fn run(self) -> Result<Outcome, PipelineError> {
        let stdout = std::io::stdout();
        self.execute(&azure_identity::process_env, Pipeline::azure, &mut stdout.lock())
            .await
    }

    /// Run with settings from `lookup`. All settings are read before `build` is called.
    pub async fn execute<W, F>(
        self,
        lookup: Lookup<'_>,
        build: F,
        out: &mut W,
    ) -> Result<Outcome, PipelineError>
    where
        W: Write,
        F: FnOnce(Uri) -> Pipeline,
    {
        match self.command.unwrap_or(Command::ValidateGroup { group: None }) {
            Command::ValidateGroup { group } => {
                let overrides = [(config::GROUP_NAME, group)];
                let config = Config::from_lookup(&overridden(lookup, &overrides))?;
                let pipeline = build(config.token.authority_host.clone());
                pipeline.validate_group(&config, out).await
            }
            Command::GetSecret { vault, name, show } => {
                let overrides = [(config::KEYVAULT_NAME, vault), (config::SECRET_NAME, name)];
                let lookup = overridden(lookup, &overrides);
                let secrets = SecretConfig::from_lookup(&lookup)?;
                let pipeline = build(config::authority_host(&lookup)?);

                let secret = pipeline.fetch_client_secret(&secrets).await?;
                if show {
                    report::secret_value(out, &secret)?;
                }
                report::secret_retrieved(out, &secrets.secret_name)?;
                Ok(Outcome::Completed)
            }
            Command::Token => {
                let config = TokenConfig::from_lookup(lookup)?;
                let pipeline = build(config.authority_host.clone());

                let token = pipeline.acquire_graph_token(&config).await?;
                report::token_acquired(out)?;
                report::token_preview(out, &token)?;
                Ok(Outcome::Completed)
            }
        }
    }
}

/// Command line values win over the environment.
fn overridden<'a>(
    lookup: Lookup<'a>,
    overrides: &'a [(&'static str, Option<String>)],
) -> impl Fn(&str) -> Option<String> + 'a {
    move |name: &str| {
        overrides
            .iter()
            .find(|(var, value)| *var == name && value.is_some())
            .and_then(|(_, value)| value.clone())
            .or_else(|| lookup(name))
    }
}
