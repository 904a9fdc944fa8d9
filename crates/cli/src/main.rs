//! `orafleet` binary entrypoint: env bootstrap, tracing init, dispatch.

use std::process::ExitCode;

use clap::Parser;
use orafleet_cli::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // -v raises the default level; RUST_LOG still wins when set.
    let default_filter = match cli.verbose {
        0 => "orafleet_cli=info,orafleet_core=info",
        1 => "orafleet_cli=debug,orafleet_core=debug",
        _ => "orafleet_cli=trace,orafleet_core=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match orafleet_cli::run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e:#}");
            // Usage errors exit 2, matching clap; operational failures exit 1.
            if e.downcast_ref::<orafleet_cli::UsageError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}
