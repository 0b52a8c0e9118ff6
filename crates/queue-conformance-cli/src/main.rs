use queue_conformance_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!("CLI error: {}", e);
        eprintln!("queue-conformance: {}", e);

        std::process::exit(e.exit_code());
    }
}
