use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod api;
mod audio;
mod config;
mod dialogue;
mod error;
mod store;
mod tts;

use api::routes::{create_router, AppState};
use config::Config;
use store::AudioStore;
use tts::TtsService;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    tracing::info!("Dialogue TTS Server v{}", env!("CARGO_PKG_VERSION"));

    let store = AudioStore::open(&config.audio_dir).expect("Failed to create audio directory");
    tracing::info!("Audio files stored in: {}", store.dir().display());

    // A missing model is not fatal: /health reports it and /tts answers 500.
    let engine = tts::init_engine(&config.model_path);
    if !engine.is_ready() {
        tracing::warn!("Starting without a TTS model; synthesis requests will fail");
    }

    let state = Arc::new(AppState {
        tts: TtsService::new(engine, store),
        base_url: config.base_url.clone(),
    });

    let app = create_router(state, config.cors_origins.clone());

    tracing::info!("Starting server on http://{}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
