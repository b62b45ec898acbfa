use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::error;

const READINESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChecks {
    pub database: CheckResult,
}

/// Result of an individual check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check)) // Kubernetes convention
        .route("/livez", get(liveness_check))
        .route("/readyz", get(readiness_check))
}

async fn check_database(state: &AppState) -> CheckResult {
    let conn = match state.db_pool.get().await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult {
                status: HealthStatus::Unhealthy,
                message: Some(format!("Failed to get database connection: {}", e)),
            }
        }
    };

    match conn.ping().await {
        Ok(()) => CheckResult {
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => {
            error!("Health check query failed: {}", e);
            CheckResult {
                status: HealthStatus::Unhealthy,
                message: Some(format!("Database query failed: {}", e)),
            }
        }
    }
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let status = database.status.clone();

    let response = HealthResponse {
        status: status.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        checks: HealthChecks { database },
    };

    let status_code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

/// Liveness only says the process is serving requests.
async fn liveness_check() -> impl IntoResponse {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ready = matches!(
        tokio::time::timeout(READINESS_TIMEOUT, check_database(&state)).await,
        Ok(CheckResult {
            status: HealthStatus::Healthy,
            ..
        })
    );

    let response = ReadinessResponse {
        ready: db_ready,
        message: (!db_ready).then(|| "Not ready - DB: Failed".to_string()),
    };

    let status_code = if db_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
