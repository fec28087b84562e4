use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::authz::Authorizer;
use crate::config::AppConfig;
use crate::handlers;
use crate::init_data::InitDataVerifier;
use crate::services::ClassroomService;
use crate::store::{ClassroomRepository, ClassroomStore, MemoryStore, PgStore, RoleStore};

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub authorizer: Authorizer,
    pub roles: Arc<dyn RoleStore>,
    pub repo: Arc<dyn ClassroomRepository>,
    pub classrooms: ClassroomService,
}

impl AppState {
    pub fn new<S>(config: AppConfig, store: Arc<S>) -> Self
    where
        S: ClassroomStore + 'static,
    {
        let roles: Arc<dyn RoleStore> = store.clone();
        let repo: Arc<dyn ClassroomRepository> = store;
        let verifier = Arc::new(InitDataVerifier::new(config.security.bot_token.expose()));
        let authorizer = Authorizer::new(verifier, roles.clone())
            .with_max_age(config.security.init_data_max_age);
        let classrooms = ClassroomService::new(roles.clone(), &config.telegram);

        Self {
            config: Arc::new(config),
            authorizer,
            roles,
            repo,
            classrooms,
        }
    }
}

/// Open the configured store and wire the state around it.
///
/// Without `DATABASE_URL` everything lives in memory and is lost on exit.
pub async fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    match config.database.url.clone() {
        Some(url) => {
            let store = PgStore::connect(&url, config.database.max_connections).await?;
            store.bootstrap().await?;
            info!("Connected to Postgres, schema ready");
            Ok(AppState::new(config, Arc::new(store)))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store");
            Ok(AppState::new(config, Arc::new(MemoryStore::new())))
        }
    }
}

/// Bind and serve until ctrl-c.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let port = config.server.port;
    info!("Starting Classroom API in {:?} mode", config.environment);

    let state = build_state(config).await?;
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    info!("Classroom API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_routes())
        .merge(classroom_routes())
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_routes() -> Router<AppState> {
    use handlers::auth;

    Router::new()
        .route("/api/auth/role", get(auth::role_get))
        .route(
            "/api/auth/session",
            get(auth::session_get)
                .post(auth::session_post)
                .delete(auth::session_delete),
        )
}

fn classroom_routes() -> Router<AppState> {
    use handlers::{announcements, assignments, calendar, courses, schedule};

    Router::new()
        .route(
            "/api/courses",
            get(courses::get)
                .post(courses::post)
                .put(courses::put)
                .delete(courses::delete),
        )
        .route(
            "/api/schedule",
            get(schedule::get)
                .post(schedule::post)
                .put(schedule::put)
                .delete(schedule::delete),
        )
        .route(
            "/api/assignments",
            get(assignments::get)
                .post(assignments::post)
                .put(assignments::put)
                .delete(assignments::delete),
        )
        .route(
            "/api/announcements",
            get(announcements::get)
                .post(announcements::post)
                .put(announcements::put)
                .delete(announcements::delete),
        )
        .route("/api/calendar", get(calendar::get).post(calendar::post))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Classroom API",
            "version": version,
            "description": "Backend for the classroom mini-app: schedules, assignments and announcements per group topic",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "auth": "/api/auth/role, /api/auth/session",
                "courses": "/api/courses (read: unsigned context, write: representative)",
                "schedule": "/api/schedule (read: unsigned context, write: representative)",
                "assignments": "/api/assignments (read: unsigned context, write: representative)",
                "announcements": "/api/announcements (read: unsigned context, write: representative)",
                "calendar": "/api/calendar (read: unsigned context, write: representative)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.roles.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
