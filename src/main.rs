use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bracketbattle::{
    api,
    config::Config,
    prompts::FilePromptSource,
    sink::JsonFileResultsSink,
    state::AppState,
    store::JsonFileStateStore,
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bracketbattle=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting BracketBattle...");

    let config = Config::from_env();
    tracing::info!(
        "Snapshots and results in {}, prompts from {}, {}s voting window",
        config.data_dir.display(),
        config.prompts_dir.display(),
        config.voting_seconds
    );

    let state = Arc::new(
        AppState::new(
            Arc::new(JsonFileStateStore::new(&config.data_dir)),
            Arc::new(FilePromptSource::new(&config.prompts_dir)),
            Arc::new(JsonFileResultsSink::new(&config.data_dir)),
        )
        .with_voting_duration(config.voting_duration()),
    );

    let app = api::router(state);

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
