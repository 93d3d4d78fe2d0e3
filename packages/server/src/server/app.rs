//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::domains::auth::{NotificationHandler, SessionIssuer};
use crate::domains::cache::TokenCache;
use crate::domains::entitlement::EntitlementService;
use crate::domains::identity::IdentityService;
use crate::server::middleware::bearer_auth_middleware;
use crate::server::routes::{
    change_password_handler, delete_me_handler, exchange_handler, health_handler, login_handler,
    me_handler, notify_handler, payments_handler, register_handler, update_me_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub cache: TokenCache,
    pub identity: IdentityService,
    pub entitlement: EntitlementService,
    pub notifications: NotificationHandler,
    pub sessions: Arc<SessionIssuer>,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let cache = TokenCache::new();
        let identity = IdentityService::new(pool.clone(), cache.clone());
        let entitlement = EntitlementService::new(pool.clone());
        let notifications = NotificationHandler::new(
            cache.clone(),
            entitlement.clone(),
            config.ott_ttl_seconds,
        );
        let sessions = Arc::new(SessionIssuer::new(
            &config.token_secret,
            config.token_issuer.clone(),
            config.session_ttl_days,
        ));

        Self {
            db_pool: pool,
            cache,
            identity,
            entitlement,
            notifications,
            sessions,
        }
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/exchange", post(exchange_handler))
        .route(
            "/api/me",
            get(me_handler)
                .patch(update_me_handler)
                .delete(delete_me_handler),
        )
        .route("/api/me/password", post(change_password_handler))
        .route("/api/me/payments", get(payments_handler))
        .route("/api/notify", post(notify_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
