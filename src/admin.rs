use crate::auth::{require_admin, SessionUser};
use crate::error::{GatewayError, Result};
use crate::rate_limit::CallerId;
use crate::state::AppState;
use axum::{
    extract::State,
    middleware::from_fn,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::info;

/// Quota table size of one route group
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitGroupStats {
    pub group: String,
    pub limit: u32,
    pub window_secs: u64,
    pub tracked_callers: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub users: u64,
    pub repos: u64,
    pub uptime_seconds: u64,
    pub rate_limits: Vec<RateLimitGroupStats>,
}

/// Identifies whose windows to clear: a member by name or an anonymous
/// caller by address.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub username: Option<String>,
    pub ip: Option<IpAddr>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub success: bool,
    pub cleared: usize,
}

/// Admin API; every route requires an administrator session.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/rate-limits/reset", post(reset_rate_limits))
        .route_layer(from_fn(require_admin))
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<AdminStats>> {
    let (users, repos) = {
        let conn = state.db_pool.get().await?;
        (conn.count_users().await?, conn.count_repos().await?)
    };

    let rate_limits = state
        .limiters
        .all()
        .iter()
        .map(|limiter| RateLimitGroupStats {
            group: limiter.name().to_string(),
            limit: limiter.limit(),
            window_secs: limiter.window().as_secs(),
            tracked_callers: limiter.tracked_callers(),
        })
        .collect();

    Ok(Json(AdminStats {
        users,
        repos,
        uptime_seconds: state.start_time.elapsed().as_secs(),
        rate_limits,
    }))
}

async fn reset_rate_limits(
    State(state): State<AppState>,
    Extension(admin): Extension<SessionUser>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ResetResponse>> {
    let caller = match (request.username, request.ip) {
        (Some(username), _) if !username.trim().is_empty() => CallerId::User(username),
        (_, Some(ip)) => CallerId::anonymous(Some(&std::net::SocketAddr::new(ip, 0))),
        _ => {
            return Err(GatewayError::BadRequest(
                "Either username or ip is required".to_string(),
            ))
        }
    };

    let cleared = state.limiters.reset_caller(&caller);
    info!(admin = %admin.username, caller = %caller, cleared, "Rate limit windows reset");

    Ok(Json(ResetResponse {
        success: true,
        cleared,
    }))
}
