//! Group onboarding.
//!
//! Confirms that an Entra ID security group exists before anything is
//! granted to it. The service principal doing the lookup keeps its client
//! secret in Key Vault, so a run reads that secret with the ambient Azure
//! identity, exchanges it for a Microsoft Graph token, and then queries the
//! directory.

mod cli;
pub mod config;
pub mod pipeline;
mod report;

pub use self::cli::{Cli, Command};
pub use self::config::{Config, ConfigError};
pub use self::pipeline::{exit_code, Outcome, Pipeline, PipelineError};
