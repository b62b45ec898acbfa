pub mod auth;
pub mod explore;
pub mod repos;
pub mod search;
pub mod users;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::{time, SameSite};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::error::{GatewayError, Result};
use crate::rate_limit::{self, RateLimiter};
use crate::state::AppState;
use crate::{admin, health};

const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24);

/// Builds the complete HTTP surface: API groups, admin, health checks and the
/// session, CORS and tracing layers around them.
pub fn app(state: AppState) -> Result<Router> {
    let idle_timeout: time::Duration = SESSION_IDLE_TIMEOUT
        .try_into()
        .map_err(|e| GatewayError::ConfigError(format!("Invalid session expiry: {}", e)))?;

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.production)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(idle_timeout));

    let origin = HeaderValue::from_str(&state.config.client_base_url)
        .map_err(|e| GatewayError::ConfigError(format!("Invalid client origin: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let api = Router::new()
        .nest("/api/auth", auth::router(&state))
        .nest("/api/users", users::router(&state))
        .nest("/api/explore", explore::router(&state))
        .nest("/api/repos", repos::router(&state))
        .nest("/api/search", search::router(&state))
        .nest("/api/admin", admin::router())
        .merge(health::router())
        .with_state(state);

    Ok(api
        .layer(cors)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http()))
}

/// Wraps `router` with the quota of `limiter`. Guards layered on the result
/// run before the quota is counted.
pub(crate) fn limited(router: Router<AppState>, limiter: &Arc<RateLimiter>) -> Router<AppState> {
    router.route_layer(from_fn_with_state(limiter.clone(), rate_limit::enforce))
}
