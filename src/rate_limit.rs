use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::auth::current_user;
use crate::error::GatewayError;

pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";
pub const RESET_HEADER: &str = "X-RateLimit-Reset";

/// Key a caller is counted under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallerId {
    User(String),
    Anonymous(String),
}

impl CallerId {
    /// Anonymous callers are identified by a one-way digest of their address.
    pub fn anonymous(addr: Option<&SocketAddr>) -> Self {
        let source = addr
            .map(|a| a.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        CallerId::Anonymous(sha1_smol::Sha1::from(source.as_bytes()).digest().to_string())
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerId::User(name) => write!(f, "user:{}", name),
            CallerId::Anonymous(digest) => write!(f, "anon:{}", digest),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
    reset_unix_ms: i64,
}

impl Window {
    fn starting(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: now + window,
            reset_unix_ms: chrono::Utc::now().timestamp_millis() + window.as_millis() as i64,
        }
    }
}

/// Outcome of counting one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Window end as Unix seconds, rounded up
    pub reset_unix: i64,
    /// Whole seconds until the window ends, rounded up
    pub retry_after: u64,
}

impl RateLimitDecision {
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(LIMIT_HEADER, HeaderValue::from(self.limit));
        headers.insert(REMAINING_HEADER, HeaderValue::from(self.remaining));
        headers.insert(RESET_HEADER, HeaderValue::from(self.reset_unix));
    }
}

/// Fixed-window quota table for one route group.
///
/// Callers are keyed by their session username, or by a digest of their
/// network address when anonymous, so raw addresses are never retained.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    name: &'static str,
    limit: u32,
    window: Duration,
    entries: Arc<DashMap<CallerId, Window>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, limit: u32, window: Duration) -> Self {
        Self {
            name,
            limit,
            window,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Callers currently holding a window.
    pub fn tracked_callers(&self) -> usize {
        self.entries.len()
    }

    /// Drops the caller's window so the next request starts afresh.
    pub fn reset(&self, caller: &CallerId) -> bool {
        self.entries.remove(caller).is_some()
    }

    /// Counts one request for `caller`.
    ///
    /// The read, compare and increment happen while the map shard is locked,
    /// so concurrent requests from one caller are never lost.
    pub fn check(&self, caller: &CallerId) -> RateLimitDecision {
        let now = Instant::now();
        let mut started_window = None;

        let window = {
            let mut entry = self.entries.entry(caller.clone()).or_insert_with(|| {
                let fresh = Window::starting(now, self.window);
                started_window = Some(fresh.reset_at);
                fresh
            });

            if now > entry.reset_at {
                *entry = Window::starting(now, self.window);
                started_window = Some(entry.reset_at);
            }

            entry.count = entry.count.saturating_add(1);
            *entry
        };

        if let Some(reset_at) = started_window {
            self.schedule_eviction(caller.clone(), reset_at);
        }

        let retry_after = window.reset_at.saturating_duration_since(now);
        let retry_after = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);

        RateLimitDecision {
            allowed: window.count <= self.limit,
            limit: self.limit,
            remaining: self.limit.saturating_sub(window.count),
            reset_unix: (window.reset_unix_ms + 999).div_euclid(1000),
            retry_after,
        }
    }

    /// Removes the entry once its window has passed, unless a newer window
    /// replaced it in the meantime.
    fn schedule_eviction(&self, caller: CallerId, reset_at: Instant) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let entries = Arc::downgrade(&self.entries);

        handle.spawn(async move {
            tokio::time::sleep_until(reset_at).await;
            if let Some(entries) = entries.upgrade() {
                entries.remove_if(&caller, |_, w| w.reset_at <= reset_at);
            }
        });
    }
}

/// Resolves who is calling: the session user when logged in, otherwise the
/// hashed peer address.
pub async fn identify(session: Option<&Session>, addr: Option<&SocketAddr>) -> CallerId {
    if let Some(session) = session {
        match current_user(session).await {
            Ok(Some(user)) => return CallerId::User(user.username),
            Ok(None) => {}
            Err(e) => warn!("Failed to read session for rate limiting: {}", e),
        }
    }
    CallerId::anonymous(addr)
}

/// Middleware enforcing the quota of the limiter it is constructed with.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();
    let addr = ConnectInfo::<SocketAddr>::from_request_parts(&mut parts, &())
        .await
        .ok()
        .map(|ConnectInfo(addr)| addr);
    let session = parts.extensions.get::<Session>().cloned();
    let req = Request::from_parts(parts, body);

    let caller = identify(session.as_ref(), addr.as_ref()).await;
    let decision = limiter.check(&caller);

    if !decision.allowed {
        warn!(
            group = limiter.name(),
            caller = %caller,
            retry_after = decision.retry_after,
            "Rate limit exceeded"
        );
        let mut response = GatewayError::RateLimited {
            retry_after: decision.retry_after,
        }
        .into_response();
        decision.apply_headers(response.headers_mut());
        return response;
    }

    debug!(
        group = limiter.name(),
        caller = %caller,
        remaining = decision.remaining,
        "Request within rate limit"
    );
    let mut response = next.run(req).await;
    decision.apply_headers(response.headers_mut());
    response
}

/// One limiter per route group, built once per process.
#[derive(Debug, Clone)]
pub struct RateLimiters {
    pub explore: Arc<RateLimiter>,
    pub repo_details: Arc<RateLimiter>,
    pub repo_resources: Arc<RateLimiter>,
    pub profile: Arc<RateLimiter>,
    pub search: Arc<RateLimiter>,
    pub search_code: Arc<RateLimiter>,
    pub search_advanced: Arc<RateLimiter>,
    pub login: Arc<RateLimiter>,
}

impl RateLimiters {
    pub fn from_settings(settings: &crate::config::RateLimitSettings) -> Self {
        let window = settings.window;
        let build = |name, limit| Arc::new(RateLimiter::new(name, limit, window));
        Self {
            explore: build("explore", settings.explore),
            repo_details: build("repo_details", settings.repo_details),
            repo_resources: build("repo_resources", settings.repo_resources),
            profile: build("profile", settings.profile),
            search: build("search", settings.search),
            search_code: build("search_code", settings.search_code),
            search_advanced: build("search_advanced", settings.search_advanced),
            login: build("login", settings.login),
        }
    }

    pub fn all(&self) -> [&Arc<RateLimiter>; 8] {
        [
            &self.explore,
            &self.repo_details,
            &self.repo_resources,
            &self.profile,
            &self.search,
            &self.search_code,
            &self.search_advanced,
            &self.login,
        ]
    }

    /// Clears the caller in every group, returning how many windows were dropped.
    pub fn reset_caller(&self, caller: &CallerId) -> usize {
        self.all().iter().filter(|l| l.reset(caller)).count()
    }
}
