use axum::{
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{error, info};

use crate::auth::{current_user, require_user_or_redirect, SessionUser, SESSION_USER_KEY};
use crate::error::Result;
use crate::models::{LoginProfile, User};
use crate::state::AppState;

use super::limited;

pub fn router(state: &AppState) -> Router<AppState> {
    let dashboard = Router::new()
        .route("/dashboard", get(dashboard))
        .route_layer(from_fn_with_state(state.clone(), require_user_or_redirect));

    // Each login redirect stores a pending session, so the entry point is
    // throttled like the proxy groups.
    let login_redirect = limited(
        Router::new().route("/github", get(login)),
        &state.limiters.login,
    );

    Router::new()
        .route("/github/callback", get(callback))
        .route("/check", get(check))
        .route("/logout", get(logout))
        .merge(login_redirect)
        .merge(dashboard)
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub user: Option<User>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

async fn login(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    let url = state.oauth.begin(&session).await?;
    Ok(Redirect::to(&url))
}

async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Response {
    let (Some(code), Some(csrf_state)) = (params.code, params.state) else {
        error!("GitHub callback missing code or state");
        return Redirect::to(&state.config.login_page_url()).into_response();
    };

    match finish_login(&state, &session, &code, &csrf_state).await {
        Ok(user) => {
            info!(username = %user.username, "User logged in");
            Redirect::to(&state.config.client_base_url).into_response()
        }
        Err(e) => {
            error!("GitHub login failed: {}", e);
            Redirect::to(&state.config.login_page_url()).into_response()
        }
    }
}

async fn finish_login(
    state: &AppState,
    session: &Session,
    code: &str,
    csrf_state: &str,
) -> Result<SessionUser> {
    let access_token = state.oauth.complete(session, code, csrf_state).await?;
    let github_user = state.github.authenticated_user(&access_token).await?;
    let is_admin = state.config.is_admin(&github_user.login);

    let conn = state.db_pool.get().await?;
    let user = conn
        .upsert_login_user(&LoginProfile::from(github_user), is_admin)
        .await?;

    let session_user = SessionUser {
        username: user.username,
        avatar_url: user.avatar_url,
        is_admin: user.is_admin,
    };

    session.cycle_id().await?;
    session.insert(SESSION_USER_KEY, &session_user).await?;
    Ok(session_user)
}

/// Returns the stored member record of the session user, or `null`.
async fn check(State(state): State<AppState>, session: Session) -> Result<Json<CheckResponse>> {
    let Some(session_user) = current_user(&session).await? else {
        return Ok(Json(CheckResponse { user: None }));
    };

    let conn = state.db_pool.get().await?;
    let user = conn.get_user(&session_user.username).await?;
    Ok(Json(CheckResponse { user }))
}

async fn logout(session: Session) -> Result<Json<LogoutResponse>> {
    if let Some(user) = current_user(&session).await? {
        info!(username = %user.username, "User logged out");
    }
    session.flush().await?;

    Ok(Json(LogoutResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    }))
}

async fn dashboard(State(state): State<AppState>) -> Redirect {
    Redirect::to(&format!("{}/dashboard", state.config.client_base_url))
}
