use clap::Parser;
use tracing_subscriber::EnvFilter;

use preprint_api::serve::{self, ServeArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = ServeArgs::parse();
    serve::run(args).await
}
