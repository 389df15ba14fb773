use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::PermissionTable;
use crate::errors::AppError;
use crate::events::{self, EventBus};
use crate::routes::{auth, companies, health, users};
use crate::token::TokenConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub tokens: Arc<TokenConfig>,
    /// Immutable for the process lifetime; replacing permissions means
    /// building a new table and swapping the Arc, never mutating this one.
    pub permissions: Arc<PermissionTable>,
    pub events: EventBus,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        tokens: TokenConfig,
        permissions: PermissionTable,
        events: EventBus,
    ) -> Self {
        Self {
            pool,
            tokens: Arc::new(tokens),
            permissions: Arc::new(permissions),
            events,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let tokens = TokenConfig::from_env()?;
    let permissions = PermissionTable::builtin();

    let (event_bus, event_rx) = events::init_event_bus();
    tokio::spawn(events::start_audit_listener(event_rx, pool.clone()));

    let state = AppState::new(pool, tokens, permissions, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/switch-company", post(auth::switch_company))
        .route("/logout", post(auth::logout));

    let company_routes = Router::new()
        .route("/", get(companies::list_companies))
        .route("/", post(companies::create_company))
        .route("/:id", get(companies::get_company));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/:id", get(users::get_user));

    let router = Router::new()
        .nest("/auth", auth_routes)
        .nest("/companies", company_routes)
        .nest("/users", user_routes)
        .route("/api/health", get(health::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
