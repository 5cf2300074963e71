//! agent-shim CLI binary entry point.

use agent_shim::cli::Cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = Cli::parse().run().await {
        eprintln!("Error: {e}");
        eprintln!("Hint: {:?}", e.recovery_suggestion());
        std::process::exit(1);
    }
}
