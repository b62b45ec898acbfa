use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};
use crate::state::AppState;

pub const SESSION_USER_KEY: &str = "user";

/// Identity stored in the session after a successful GitHub login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub username: String,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

pub async fn current_user(session: &Session) -> Result<Option<SessionUser>> {
    Ok(session.get::<SessionUser>(SESSION_USER_KEY).await?)
}

// The session handle is cloned out so the guard future never holds a
// borrow of the request across an await.
fn session_of(req: &Request) -> Option<Session> {
    req.extensions().get::<Session>().cloned()
}

async fn resolve(session: Option<Session>) -> Result<Option<SessionUser>> {
    match session {
        Some(session) => current_user(&session).await,
        None => {
            warn!("Session layer missing from request");
            Ok(None)
        }
    }
}

/// API-style guard: 401 JSON when nobody is logged in.
pub async fn require_user(mut req: Request, next: Next) -> Response {
    match resolve(session_of(&req)).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(None) => {
            debug!(path = %req.uri().path(), "Rejected unauthenticated request");
            GatewayError::Unauthorized.into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Browser-style guard: sends anonymous visitors to the client login page.
pub async fn require_user_or_redirect(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match resolve(session_of(&req)).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(None) => Redirect::to(&state.config.login_page_url()).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Admin guard: 401 without a session, 403 for non-admin members.
pub async fn require_admin(mut req: Request, next: Next) -> Response {
    match resolve(session_of(&req)).await {
        Ok(Some(user)) if user.is_admin => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(Some(user)) => {
            warn!(username = %user.username, "Non-admin attempted admin access");
            GatewayError::Forbidden.into_response()
        }
        Ok(None) => GatewayError::Unauthorized.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Session identity for handlers that also serve anonymous callers.
#[derive(Debug, Clone, Default)]
pub struct MaybeUser(pub Option<SessionUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        match parts.extensions.get::<Session>().cloned() {
            Some(session) => Ok(MaybeUser(current_user(&session).await?)),
            None => Ok(MaybeUser(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware::from_fn, routing::get, Router};
    use std::sync::Arc;
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    fn guarded() -> Router {
        Router::new()
            .route("/user", get(|| async { "user" }))
            .route_layer(from_fn(require_user))
            .merge(
                Router::new()
                    .route("/admin", get(|| async { "admin" }))
                    .route_layer(from_fn(require_admin)),
            )
            .layer(SessionManagerLayer::new(MemoryStore::default()))
    }

    async fn status_of(router: Router, uri: &str) -> StatusCode {
        let req = axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        router.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_guards_reject_anonymous_callers() {
        assert_eq!(status_of(guarded(), "/user").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(guarded(), "/admin").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_guard_without_session_layer_treats_caller_as_anonymous() {
        let router = Router::new()
            .route("/user", get(|| async { "user" }))
            .route_layer(from_fn(require_user));
        assert_eq!(status_of(router, "/user").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_user_round_trips_through_session() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new(None, store, None);

        assert_eq!(current_user(&session).await.unwrap(), None);

        let user = SessionUser {
            username: "octocat".to_string(),
            avatar_url: Some("https://avatars.example/octocat".to_string()),
            is_admin: false,
        };
        session.insert(SESSION_USER_KEY, &user).await.unwrap();

        assert_eq!(current_user(&session).await.unwrap(), Some(user));
    }
}
