//! Conference Catalog Backend
//!
//! REST backend for events, locations, organizations, speakers, rooms,
//! topics, talks and their schedule, persisted in SQLite or MySQL.

mod api;
mod auth;
mod config;
mod content_type;
mod db;
mod errors;
mod metrics;
mod models;

use std::sync::Arc;

use axum::{
    extract::FromRef,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::AnyPool;
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::AccessGate;
use crate::config::{Config, DbDriver};
use crate::db::{
    EntityStore, EventStore, LocationStore, OrganizationStore, PersonStore, RoomStore,
    TalkDateStore, TalkStore, TopicStore,
};
use crate::metrics::Metrics;

/// Application state shared across all handlers.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub locations: Arc<LocationStore>,
    pub organizations: Arc<OrganizationStore>,
    pub events: Arc<EventStore>,
    pub rooms: Arc<RoomStore>,
    pub persons: Arc<PersonStore>,
    pub topics: Arc<TopicStore>,
    pub talks: Arc<TalkStore>,
    pub talk_dates: Arc<TalkDateStore>,
    pub pool: AnyPool,
    pub driver: DbDriver,
    pub gate: Arc<AccessGate>,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: AnyPool, gate: AccessGate, metrics: Metrics, config: Config) -> Self {
        Self {
            locations: Arc::new(LocationStore::new(pool.clone())),
            organizations: Arc::new(OrganizationStore::new(pool.clone())),
            events: Arc::new(EventStore::new(pool.clone())),
            rooms: Arc::new(RoomStore::new(pool.clone())),
            persons: Arc::new(PersonStore::new(pool.clone())),
            topics: Arc::new(TopicStore::new(pool.clone())),
            talks: Arc::new(TalkStore::new(pool.clone())),
            talk_dates: Arc::new(TalkDateStore::new(pool.clone())),
            pool,
            driver: config.database.driver,
            gate: Arc::new(gate),
            metrics: Arc::new(metrics),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Conference Catalog Backend");
    tracing::info!("Database driver: {:?}", config.database.driver);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize database
    let pool = db::init_database(&config.database, config.log_persistence).await?;

    if config.seed_on_startup {
        db::seed::reseed(&pool, config.database.driver).await?;
    }

    let gate = AccessGate::from_config(&config.oauth).await?;
    tracing::info!(enabled = gate.is_enabled(), "Access gate ready");
    let metrics = Metrics::new()?;

    let bind_addr = config.bind_addr;
    let shutdown_timeout = config.shutdown_timeout;
    let state = AppState::new(pool, gate, metrics, config);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    let shutdown = Arc::new(Notify::new());
    let mut server = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.notified().await })
                .await
        }
    });

    tokio::select! {
        result = &mut server => {
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    tracing::info!("Shutting down, waiting up to {:?} for in-flight requests", shutdown_timeout);
    shutdown.notify_one();
    match tokio::time::timeout(shutdown_timeout, server).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!("Graceful shutdown timed out"),
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let gate = state.gate.clone();
    let metrics = state.metrics.clone();

    let mut router = Router::new()
        // CRUD
        .merge(entity_routes::<LocationStore>("/locations", &gate))
        .merge(entity_routes::<EventStore>("/events", &gate))
        .merge(entity_routes::<OrganizationStore>("/organizations", &gate))
        .merge(entity_routes::<PersonStore>("/persons", &gate))
        .merge(entity_routes::<RoomStore>("/rooms", &gate))
        .merge(entity_routes::<TopicStore>("/topics", &gate))
        .merge(entity_routes::<TalkStore>("/talks", &gate))
        .merge(entity_routes::<TalkDateStore>("/talkDates", &gate))
        // Relations
        .route("/events/talk/{id}", get(api::events_by_talk))
        .route("/talks/event/{id}", get(api::talks_by_event))
        .route("/talks/person/{id}", get(api::talks_by_person))
        .route("/talkDates/event/{id}", get(api::talk_dates_by_event))
        .route("/topics/event/{id}", get(api::topics_by_event))
        // OAuth2, metrics and liveness (no auth required)
        .route("/oauth2/callback", get(auth::oauth2_callback))
        .route("/metrics", get(metrics::render_metrics))
        .route("/", get(api::health_check));

    if state.config.admin_reseed_enabled {
        tracing::warn!("POST /initDB is enabled");
        let bearer = {
            let gate = gate.clone();
            middleware::from_fn(move |req, next| auth::require_bearer(gate.clone(), req, next))
        };
        router = router.route("/initDB", post(api::reseed_database).layer(bearer));
    }

    router
        .layer(middleware::from_fn(move |req, next| {
            metrics::track_requests(metrics.clone(), req, next)
        }))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The five CRUD routes of one entity. Writes pass the bearer gate, and
/// POST/PUT additionally require a JSON body.
fn entity_routes<S>(path: &str, gate: &Arc<AccessGate>) -> Router<AppState>
where
    S: EntityStore,
    Arc<S>: FromRef<AppState>,
{
    let gate = gate.clone();
    let bearer =
        middleware::from_fn(move |req, next| auth::require_bearer(gate.clone(), req, next));
    let json = middleware::from_fn(content_type::enforce_json);

    Router::new()
        .route(
            path,
            get(api::list::<S>).merge(
                post(api::create::<S>)
                    .layer(json.clone())
                    .layer(bearer.clone()),
            ),
        )
        .route(
            &format!("{path}/{{id}}"),
            get(api::get_one::<S>)
                .merge(put(api::update::<S>).layer(json).layer(bearer.clone()))
                .merge(delete(api::remove::<S>).layer(bearer)),
        )
}
