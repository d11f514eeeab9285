//! Ace Viva - mock viva service for Ace by ISU
//!
//! Runs AI-driven oral examinations on C++ topics. Each viva is a small
//! state machine that asks the Gemini completion API for questions,
//! feedback and a final scored report, and keeps a short history of past
//! sessions in SQLite. The same API backs a personalised tutor chat and a
//! coding practice lab.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod providers;
mod routes;

use config::Config;
use crate::core::{CodingLab, SqliteHistoryStore, TutorEngine, VivaEngine};
use providers::{GeminiProvider, RetryPolicy};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub viva: Arc<VivaEngine>,
    pub tutor: Arc<TutorEngine>,
    pub coding: Arc<CodingLab>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ace_viva=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let settings = config.load_settings()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let history = Arc::new(SqliteHistoryStore::new(&config.history_db_path()).await?);

    let provider = GeminiProvider::new(
        config.gemini_base_url.clone(),
        config.gemini_model.clone(),
        config.gemini_api_key.clone(),
    )
    .with_generation(settings.generation.clone())
    .with_retry(RetryPolicy::from(&settings.retry));

    if !provider.has_api_key() {
        tracing::warn!("GEMINI_API_KEY is not set; viva requests will fail until it is configured");
    }

    let provider = Arc::new(provider);
    let idle_timeout = settings.session.idle_timeout();

    let viva = Arc::new(
        VivaEngine::new(provider.clone(), history, settings.session.tick_period())
            .with_idle_timeout(idle_timeout),
    );
    let tutor = Arc::new(TutorEngine::new(provider.clone()).with_idle_timeout(idle_timeout));
    let coding = Arc::new(CodingLab::new(provider));

    let state = AppState {
        config,
        viva,
        tutor,
        coding,
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    tracing::info!("Ace Viva API running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
