#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    extract::{connect_info::MockConnectInfo, Path, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use github_gateway::config::{AppConfig, OAuthSettings, RateLimitSettings};
use github_gateway::pool::{create_pool, PoolConfig, SurrealConnectionConfig, SurrealPool};
use github_gateway::{app, AppState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const CLIENT_BASE_URL: &str = "http://client.test";
pub const SERVICE_KEY: &str = "service-key";
pub const ADMIN_LOGIN: &str = "admin";

/// Logins the fake GitHub answers 404 for.
pub const UNKNOWN_LOGIN: &str = "ghost";
pub const UNKNOWN_OWNER: &str = "missing";

/// Login whose profile the fake GitHub takes [`SLOW_RESPONSE`] to serve.
pub const SLOW_LOGIN: &str = "slowpoke";
pub const SLOW_RESPONSE: Duration = Duration::from_secs(30);

#[derive(Clone, Default)]
pub struct Recorder {
    hits: Arc<Mutex<Vec<String>>>,
    authorizations: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    /// Every request seen so far as `"METHOD /path?query"`.
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.hits().iter().filter(|h| h.starts_with(prefix)).count()
    }

    pub fn authorizations(&self) -> Vec<String> {
        self.authorizations.lock().unwrap().clone()
    }
}

async fn record(State(recorder): State<Recorder>, req: Request, next: Next) -> Response {
    recorder
        .hits
        .lock()
        .unwrap()
        .push(format!("{} {}", req.method(), req.uri()));
    if let Some(auth) = req.headers().get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        recorder.authorizations.lock().unwrap().push(auth.to_string());
    }
    next.run(req).await
}

/// In-process stand-in for the GitHub REST and OAuth endpoints.
pub struct FakeGitHub {
    pub base_url: String,
    pub recorder: Recorder,
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))).into_response()
}

pub fn user_json(login: &str) -> Value {
    json!({
        "login": login,
        "id": login.len() as u64 * 1000,
        "name": format!("{} name", login),
        "avatar_url": format!("https://avatars.test/{}", login),
        "html_url": format!("https://github.test/{}", login),
        "url": format!("https://api.github.test/users/{}", login),
        "bio": format!("{} bio", login),
        "location": "Earth",
        "company": null,
        "followers": 10,
        "following": 2,
        "public_repos": 3,
        "public_gists": 1,
    })
}

pub fn repo_json(owner: &str, name: &str, stars: u64) -> Value {
    json!({
        "name": name,
        "full_name": format!("{}/{}", owner, name),
        "html_url": format!("https://github.test/{}/{}", owner, name),
        "description": format!("{} description", name),
        "stargazers_count": stars,
        "forks_count": 7,
        "watchers_count": stars,
        "language": "Rust",
        "private": false,
        "owner": { "login": owner },
    })
}

async fn access_token(body: String) -> Json<Value> {
    let code = url::form_urlencoded::parse(body.as_bytes())
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();
    Json(json!({
        "access_token": format!("tok-{}", code),
        "token_type": "bearer",
        "scope": "read:user,user:email",
    }))
}

async fn authenticated_user(headers: HeaderMap) -> Response {
    let login = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer tok-"));
    match login {
        Some(login) if !login.is_empty() => Json(user_json(login)).into_response(),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" }))).into_response(),
    }
}

async fn get_user(Path(login): Path<String>) -> Response {
    if login == UNKNOWN_LOGIN {
        return not_found();
    }
    if login == SLOW_LOGIN {
        tokio::time::sleep(SLOW_RESPONSE).await;
    }
    Json(user_json(&login)).into_response()
}

async fn user_listing(Path((login, listing)): Path<(String, String)>) -> Response {
    if login == UNKNOWN_LOGIN {
        return not_found();
    }
    let body = match listing.as_str() {
        "repos" => json!([
            repo_json(&login, "alpha", 5),
            repo_json(&login, "beta", 50),
            repo_json(&login, "gamma", 0),
        ]),
        "followers" | "following" => json!([{ "login": "friend" }]),
        _ => return not_found(),
    };
    Json(body).into_response()
}

async fn public_events(Path(login): Path<String>) -> Json<Value> {
    Json(json!([
        {
            "id": "1",
            "type": "PushEvent",
            "actor": { "login": login },
            "repo": { "name": format!("{}/alpha", login) },
            "created_at": "2024-01-01T00:00:00Z",
            "payload": { "ref": "refs/heads/main", "commits": [{ "sha": "a" }, { "sha": "b" }] }
        },
        {
            "id": "2",
            "type": "PullRequestEvent",
            "actor": { "login": login },
            "repo": { "name": format!("{}/beta", login) },
            "created_at": "2024-01-02T00:00:00Z",
            "payload": { "action": "opened", "number": 3, "pull_request": { "title": "Add tests" } }
        }
    ]))
}

async fn get_repo(Path((owner, repo)): Path<(String, String)>) -> Response {
    if owner == UNKNOWN_OWNER {
        return not_found();
    }
    Json(repo_json(&owner, &repo, 42)).into_response()
}

async fn repo_resource(Path((owner, repo, resource)): Path<(String, String, String)>) -> Response {
    if owner == UNKNOWN_OWNER {
        return not_found();
    }
    match resource.as_str() {
        "readme" => format!("# {}\n", repo).into_response(),
        "languages" => Json(json!({ "Rust": 1000 })).into_response(),
        "stargazers" | "forks" | "contributors" | "issues" | "pulls" => {
            Json(json!([{ "id": 1, "resource": resource }])).into_response()
        }
        _ => not_found(),
    }
}

async fn create_fork(Path((owner, repo, resource)): Path<(String, String, String)>) -> Response {
    if owner == UNKNOWN_OWNER || resource != "forks" {
        return not_found();
    }
    (StatusCode::ACCEPTED, Json(repo_json("forker", &repo, 0))).into_response()
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn search(Path(kind): Path<String>) -> Response {
    let items = match kind.as_str() {
        "repositories" => json!([repo_json("rust-lang", "rust", 90000), repo_json("tokio-rs", "tokio", 25000)]),
        "users" => json!([{ "login": "alice" }, { "login": "bob" }]),
        "code" => json!([{ "name": "main.rs", "path": "src/main.rs" }]),
        "issues" => json!([{ "number": 1, "title": "Bug" }]),
        "topics" => json!([{ "name": "rust" }]),
        _ => return not_found(),
    };
    let total = items.as_array().map_or(0, |a| a.len());
    Json(json!({ "total_count": total, "incomplete_results": false, "items": items })).into_response()
}

impl FakeGitHub {
    pub async fn start() -> Self {
        let recorder = Recorder::default();

        let router = Router::new()
            .route("/login/oauth/access_token", post(access_token))
            .route("/user", get(authenticated_user))
            .route("/users/{login}", get(get_user))
            .route("/users/{login}/events/public", get(public_events))
            .route("/users/{login}/{listing}", get(user_listing))
            .route("/repos/{owner}/{repo}", get(get_repo))
            .route("/repos/{owner}/{repo}/{resource}", get(repo_resource).post(create_fork))
            .route("/user/starred/{owner}/{repo}", put(no_content).delete(no_content))
            .route("/user/following/{login}", put(no_content).delete(no_content))
            .route("/search/{kind}", get(search))
            .layer(from_fn_with_state(recorder.clone(), record));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake github");
        let addr = listener.local_addr().expect("fake github addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        FakeGitHub {
            base_url: format!("http://{}", addr),
            recorder,
        }
    }
}

pub async fn memory_pool() -> Arc<SurrealPool> {
    let pool = create_pool(
        SurrealConnectionConfig {
            url: "mem://".to_string(),
            username: "root".to_string(),
            password: "root".to_string(),
            namespace: "gateway".to_string(),
            database: "test".to_string(),
        },
        PoolConfig::default(),
    )
    .expect("create pool");

    pool.get()
        .await
        .expect("connection")
        .init_schema()
        .await
        .expect("schema");

    Arc::new(pool)
}

pub fn test_config(github_url: &str, rate_limits: RateLimitSettings) -> AppConfig {
    AppConfig {
        github_api_key: SERVICE_KEY.to_string(),
        github_api_url: github_url.to_string(),
        client_base_url: CLIENT_BASE_URL.to_string(),
        production: false,
        admin_users: vec![ADMIN_LOGIN.to_string()],
        upstream_timeout: Duration::from_secs(5),
        oauth: OAuthSettings {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            authorize_url: format!("{}/login/oauth/authorize", github_url),
            token_url: format!("{}/login/oauth/access_token", github_url),
            callback_url: "http://localhost:5000/api/auth/github/callback".to_string(),
        },
        rate_limits,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub github: FakeGitHub,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|h| h.to_str().ok())
    }

    pub fn location(&self) -> &str {
        self.header("location").expect("location header")
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_limits(RateLimitSettings::default()).await
    }

    pub async fn with_limits(rate_limits: RateLimitSettings) -> Self {
        Self::build(rate_limits, Duration::from_secs(5)).await
    }

    /// Gateway whose upstream calls give up after `timeout`.
    pub async fn with_upstream_timeout(timeout: Duration) -> Self {
        Self::build(RateLimitSettings::default(), timeout).await
    }

    async fn build(rate_limits: RateLimitSettings, upstream_timeout: Duration) -> Self {
        let github = FakeGitHub::start().await;
        let config = AppConfig {
            upstream_timeout,
            ..test_config(&github.base_url, rate_limits)
        };
        let state = AppState::new(config, memory_pool().await).expect("app state");
        let router = Self::router_from(&state, "203.0.113.10:40000");

        TestApp { router, state, github }
    }

    /// Another front door onto the same state, seen from a different peer.
    pub fn router_from(state: &AppState, peer: &str) -> Router {
        let peer: SocketAddr = peer.parse().expect("peer addr");
        app(state.clone()).expect("router").layer(MockConnectInfo(peer))
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        send_to(&self.router, req).await
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, cookie, None)).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, body: Option<Value>) -> TestResponse {
        self.send(request(Method::POST, uri, cookie, body)).await
    }

    pub async fn put(&self, uri: &str, cookie: Option<&str>, body: Option<Value>) -> TestResponse {
        self.send(request(Method::PUT, uri, cookie, body)).await
    }

    /// Runs the GitHub OAuth dance for `login` and returns the session cookie.
    pub async fn login(&self, login: &str) -> String {
        let start = self.get("/api/auth/github", None).await;
        assert_eq!(start.status, StatusCode::SEE_OTHER);
        let cookie = session_cookie(&start.headers).expect("session cookie after login start");

        let authorize = url::Url::parse(start.location()).expect("authorize url");
        let state = authorize
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .expect("state param");

        let callback = self
            .get(
                &format!("/api/auth/github/callback?code={}&state={}", login, state),
                Some(&cookie),
            )
            .await;
        assert_eq!(callback.status, StatusCode::SEE_OTHER);
        assert_eq!(callback.location(), CLIENT_BASE_URL, "login for {} failed", login);

        session_cookie(&callback.headers).unwrap_or(cookie)
    }
}

pub fn request(method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("request")
}

pub async fn send_to(router: &Router, req: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(req).await.expect("infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    TestResponse { status, headers, body }
}

/// `name=value` part of the session `Set-Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .find(|c| c.starts_with("id="))
        .and_then(|c| c.split(';').next())
        .map(str::to_string)
}
