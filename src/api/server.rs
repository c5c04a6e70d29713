//! HTTP API server

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{LoginLimiter, PasswordHasher, TokenIssuer};
use crate::config::Config;
use crate::content::{self, SharedPageCache};
use crate::db::{self, MemoryStore, PgStore, SharedStore};
use crate::error::Result;

use super::{keepalive, routes};

pub const API_PREFIX: &str = "/api/v1";
pub const HEALTH_PATH: &str = "/api/v1/health";

/// Requests slower than this are logged at warn
const SLOW_REQUEST: Duration = Duration::from_millis(500);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SharedStore,
    pub tokens: TokenIssuer,
    pub hasher: PasswordHasher,
    pub limiter: LoginLimiter,
    pub cache: SharedPageCache,
}

impl AppState {
    pub fn new(config: Config, store: SharedStore) -> Result<Self> {
        let tokens = TokenIssuer::from_config(&config.auth)?;
        let hasher = PasswordHasher::new(config.auth.bcrypt_cost);
        let limiter = LoginLimiter::new(config.auth.login_attempts_per_minute);
        let cache = content::build_cache(&config.content);

        Ok(Self {
            config: Arc::new(config),
            store,
            tokens,
            hasher,
            limiter,
            cache,
        })
    }
}

/// Open the configured store. Without a database URL everything lives in
/// process memory and is lost on exit.
pub async fn open_store(config: &Config) -> Result<SharedStore> {
    match &config.database.url {
        Some(url) => {
            let store = PgStore::connect(url, config.database.connect_timeout()).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("no database configured, using the in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Run the HTTP API server
pub async fn run_server(config: Config, host: &str, port: u16) -> Result<()> {
    let store = open_store(&config).await?;
    let state = AppState::new(config, store)?;

    db::ensure_principal(state.store.as_ref(), &state.config.bootstrap, &state.hasher).await?;
    state.limiter.spawn_sweeper();
    keepalive::spawn(&state.config);

    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health))
        .nest("/auth", auth_routes())
        .nest("/admins", admin_routes())
        .nest("/students", student_routes())
        .nest("/teachers", teacher_routes())
        .nest("/classes", class_routes())
        .nest("/exams", exam_routes())
        .nest("/applications", application_routes())
        .nest("/contacts", contact_routes())
        .nest("/site-content", content_routes());

    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(routes::root))
        .nest(API_PREFIX, api)
        .fallback(routes::not_found)
        .layer(middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state)
}

fn auth_routes() -> Router<AppState> {
    use routes::auth;

    Router::new()
        .route("/login/access-token", post(auth::login))
        .route("/me", get(auth::me).put(auth::update_me))
        .route("/me/password", put(auth::change_password))
}

fn admin_routes() -> Router<AppState> {
    use routes::admins;

    Router::new()
        .route("/", get(admins::list).post(admins::create))
        .route("/permissions", get(admins::permissions))
        .route(
            "/{id}",
            get(admins::get_one).put(admins::update).delete(admins::remove),
        )
}

fn student_routes() -> Router<AppState> {
    use routes::students;

    Router::new()
        .route("/", get(students::list).post(students::create))
        .route("/stats/summary", get(students::stats))
        .route(
            "/{id}",
            get(students::get_one)
                .put(students::update)
                .delete(students::remove),
        )
}

fn teacher_routes() -> Router<AppState> {
    use routes::teachers;

    Router::new()
        .route("/", get(teachers::list).post(teachers::create))
        .route("/stats/summary", get(teachers::stats))
        .route(
            "/{id}",
            get(teachers::get_one)
                .put(teachers::update)
                .delete(teachers::remove),
        )
}

fn class_routes() -> Router<AppState> {
    use routes::classes;

    Router::new()
        .route("/", get(classes::list).post(classes::create))
        .route("/stats/summary", get(classes::stats))
        .route(
            "/{id}",
            get(classes::get_one)
                .put(classes::update)
                .delete(classes::remove),
        )
}

fn exam_routes() -> Router<AppState> {
    use routes::exams;

    Router::new()
        .route("/", get(exams::list).post(exams::create))
        .route("/stats/summary", get(exams::stats))
        .route(
            "/{id}",
            get(exams::get_one).put(exams::update).delete(exams::remove),
        )
}

fn application_routes() -> Router<AppState> {
    use routes::applications;

    Router::new()
        .route("/", get(applications::list).post(applications::submit))
        .route("/stats/summary", get(applications::stats))
        .route(
            "/{id}",
            get(applications::get_one)
                .put(applications::update)
                .delete(applications::remove),
        )
}

fn contact_routes() -> Router<AppState> {
    use routes::contacts;

    Router::new()
        .route("/", get(contacts::list).post(contacts::submit))
        .route("/stats/summary", get(contacts::stats))
        .route(
            "/{id}",
            get(contacts::get_one)
                .put(contacts::update)
                .delete(contacts::remove),
        )
}

fn content_routes() -> Router<AppState> {
    use routes::content;

    Router::new()
        .route("/public/{page_slug}", get(content::public_page))
        .route("/pages", get(content::list_pages))
        .route("/pages/{page_slug}", get(content::page_sections))
        .route("/sections", post(content::create_section))
        .route(
            "/sections/{id}",
            get(content::get_section)
                .put(content::update_section)
                .delete(content::delete_section),
        )
        .route("/seed/{page_slug}", post(content::seed_page))
}

/// CORS for the configured origins, with credentials. A `*` entry mirrors
/// the request origin, since credentials rule out a literal wildcard.
fn cors_layer(config: &Config) -> CorsLayer {
    let allow_origin = if config.server.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(configured_origins(config))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
}

fn configured_origins(config: &Config) -> Vec<HeaderValue> {
    config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

/// One `api_request` event per request, skipping probes and the landing page
async fn log_requests(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if matches!(path.as_str(), "/" | "/favicon.ico" | HEALTH_PATH) {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let query: Option<String> = request
        .uri()
        .query()
        .map(|q| q.chars().take(100).collect());
    let started = Instant::now();

    let response = next.run(request).await;

    let elapsed = started.elapsed();
    let status = response.status().as_u16();
    let ms = elapsed.as_secs_f64() * 1000.0;

    if status >= 400 || elapsed > SLOW_REQUEST {
        tracing::warn!(
            method = %method,
            path = %path,
            status,
            ms,
            query = query.as_deref(),
            slow = elapsed > SLOW_REQUEST,
            "api_request"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status,
            ms,
            query = query.as_deref(),
            "api_request"
        );
    }

    response
}
