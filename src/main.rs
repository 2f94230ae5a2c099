use std::sync::Arc;

use sketch_semantics_api::config::Config;
use sketch_semantics_api::invoker::gemini::GeminiInvoker;
use sketch_semantics_api::server::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; model calls will be rejected upstream");
    }

    let state = AppState {
        invoker: Arc::new(GeminiInvoker::from_config(&config)),
    };
    let app = router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        model = %config.model,
        origins = config.allowed_origins.len(),
        "listening on {}",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;
    Ok(())
}
