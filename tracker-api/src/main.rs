//! Signal Call Tracker API Server
//!
//! Runs the milestone tracker in the background and serves the signal
//! statistics API plus the Telegram webhook that feeds new calls in.

mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tracker_market::{FallbackGateway, MarketDataGateway, RateLimiter, RugCheckClient};
use tracker_services::{
    AggregationEngine, AlertSink, KeyedLocks, LogAlertSink, MilestoneScheduler, SignalAdmission,
    SignalIntake, SignalStore, SignalTracker, SqliteSignalStore, TelegramAlertSink,
    TelegramClient, TrackerConfig,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SignalStore>,
    pub aggregation: Arc<AggregationEngine>,
    pub tracker: Arc<SignalTracker>,
    pub intake: Arc<SignalIntake>,
    /// Limiter shared by the market data sources
    pub rate_limiter: Arc<RateLimiter>,
    /// Telegram client (optional - requires TELEGRAM_BOT_TOKEN)
    pub telegram: Option<Arc<TelegramClient>>,
}

/// Assemble the full router for `state`
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::webhook_routes())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,tracker_api=debug,tracker_services=debug")
            }),
        )
        .init();

    info!("Starting Signal Call Tracker API");

    let config = TrackerConfig::from_env()?;

    info!("Initializing signal store at: {}", config.db_path.display());
    let store: Arc<dyn SignalStore> = Arc::new(
        SqliteSignalStore::new(&config.db_path)?.with_acquire_timeout(config.store_timeout),
    );
    let locks = Arc::new(KeyedLocks::new());

    let rate_limiter = Arc::new(RateLimiter::for_dexscreener());
    let fallback = FallbackGateway::standard(config.fetch_timeout)
        .with_rate_limiter(Arc::clone(&rate_limiter));
    info!(
        "Market data sources: {} (worst-case fetch {:?})",
        fallback.source_names().join(" -> "),
        fallback.worst_case_fetch()
    );
    let gateway: Arc<dyn MarketDataGateway> = Arc::new(fallback);

    // Alerts go to Telegram when a bot token is configured, otherwise to the log
    let telegram = config
        .telegram_bot_token
        .as_ref()
        .map(|token| Arc::new(TelegramClient::new(token.clone())));
    let sink: Arc<dyn AlertSink> = match &telegram {
        Some(client) => {
            info!("Telegram alerts enabled");
            Arc::new(TelegramAlertSink::new(Arc::clone(client)))
        }
        None => {
            warn!("TELEGRAM_BOT_TOKEN not set - alerts will only be logged");
            Arc::new(LogAlertSink)
        }
    };

    let scheduler = MilestoneScheduler::new(
        Arc::clone(&store),
        Arc::clone(&gateway),
        sink,
        Arc::clone(&locks),
    )
    .with_schedule(config.schedule.clone())
    .with_thresholds(config.thresholds.clone())
    .with_config(config.scheduler_config());

    let tracker = Arc::new(SignalTracker::new(Arc::new(scheduler), config.tick_interval));
    let tracker_handle = Arc::clone(&tracker).start();

    let aggregation = Arc::new(AggregationEngine::new(
        Arc::clone(&store),
        config.schedule.clone(),
    ));
    let admission = Arc::new(SignalAdmission::new(
        Arc::clone(&store),
        locks,
        config.store_timeout,
    ));

    let mut intake = SignalIntake::new(admission, Arc::clone(&aggregation), gateway)
        .with_allowed_chats(config.allowed_chats.clone())
        .with_fetch_timeout(config.fetch_timeout);
    if config.rugcheck_enabled {
        intake = intake.with_rugcheck(Arc::new(RugCheckClient::new()));
    }

    let state = AppState {
        store,
        aggregation,
        tracker: Arc::clone(&tracker),
        intake: Arc::new(intake),
        rate_limiter,
        telegram,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let the in-flight tick finish before exiting
    tracker.stop();
    if let Err(e) = tracker_handle.await {
        warn!("Signal tracker task ended abnormally: {}", e);
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
