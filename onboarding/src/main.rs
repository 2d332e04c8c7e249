//! Entra ID group validation for onboarding pipelines.

use std::process::ExitCode;

use clap::Parser as _;
use group_onboarding::Cli;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let result = cli.run().await;
    let code = group_onboarding::exit_code(&result);

    if let Err(error) = result {
        eprintln!("Error: {:?}", eyre::Report::new(error));
    }

    code
}
