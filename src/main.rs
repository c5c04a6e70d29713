use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use schoolhouse::cli::{self, Cli, Commands};
use schoolhouse::config::Environment;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Production logs are one JSON object per line
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "schoolhouse=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if production_logging() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    match cli.command {
        Commands::Init => cli::commands::init().await,
        Commands::Serve { host, port } => cli::commands::serve(host, port).await,
        Commands::Migrate => cli::commands::migrate().await,
        Commands::Admin { action } => cli::commands::admin(action).await,
        Commands::Content { action } => cli::commands::content(action).await,
    }
}

fn production_logging() -> bool {
    std::env::var("ENVIRONMENT")
        .ok()
        .and_then(|e| e.parse::<Environment>().ok())
        .or_else(|| schoolhouse::config::load_config().ok().map(|c| c.server.environment))
        .is_some_and(|e| e == Environment::Production)
}
