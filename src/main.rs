//! kubexec - run commands inside Kubernetes containers over the API
//!
//! This is the main entry point for the kubexec CLI.

mod cli;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Structured failure message, in the shape the module surface
            // reports: failed + msg.
            let failure = serde_json::json!({
                "failed": true,
                "msg": e.to_string(),
            });
            eprintln!("{}", failure);
            std::process::exit(e.exit_code());
        }
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbosity >= 3).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}
