use clap::Parser;
use tracing_subscriber::EnvFilter;

use rov_esc_runtime::config::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    if let Err(e) = rov_esc_runtime::runtime::run(args).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
