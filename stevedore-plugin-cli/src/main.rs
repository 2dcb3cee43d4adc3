//! Kubernetes plugin binary for Stevedore.
//!
//! The host launches this process, pipes the serialized plugin configuration
//! to stdin, and connects to the address announced on stdout. Everything the
//! plugin logs goes to stderr; stdout belongs to the handshake.

use clap::{Parser, Subcommand};

mod rpc;
mod run;
mod telemetry;

#[derive(Parser)]
#[command(name = "stevedore-kubernetes", about = "Kubernetes plugin for Stevedore")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the plugin and listen for client connections.
    Run {
        /// Plugin implementation key to serve.
        key: String,
    },
    /// Print the plugin metadata.
    Version,
}

#[tokio::main]
async fn main() {
    telemetry::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { key } => run::run(&key).await,
        Command::Version => run::print_version(),
    };

    if let Err(err) = result {
        tracing::error!(error = %format!("{err:#}"), "plugin exited with error");
        std::process::exit(1);
    }
}
