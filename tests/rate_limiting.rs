mod common;

use axum::http::{Method, StatusCode};
use common::{request, send_to, TestApp};
use github_gateway::config::RateLimitSettings;
use std::time::Duration;

fn tight_limits() -> RateLimitSettings {
    RateLimitSettings {
        window: Duration::from_secs(3600),
        explore: 1,
        repo_details: 3,
        repo_resources: 2,
        profile: 2,
        search: 2,
        search_code: 1,
        search_advanced: 1,
        login: 2,
    }
}

#[tokio::test]
async fn test_requests_over_limit_get_429_without_reaching_upstream() {
    let app = TestApp::with_limits(tight_limits()).await;

    for remaining in ["1", "0"] {
        let res = app.get("/api/search/repos?q=tokio", None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.header("x-ratelimit-limit"), Some("2"));
        assert_eq!(res.header("x-ratelimit-remaining"), Some(remaining));
    }

    let rejected = app.get("/api/search/repos?q=tokio", None).await;
    assert_eq!(rejected.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(rejected.body["error"], "Too Many Requests");
    assert_eq!(
        rejected.body["message"],
        "You have exceeded the API rate limit. Please try again later."
    );
    let retry_after = rejected.body["retryAfter"].as_u64().expect("retryAfter");
    assert!(retry_after > 0 && retry_after <= 3600);
    assert_eq!(rejected.header("x-ratelimit-remaining"), Some("0"));

    let reset: i64 = rejected
        .header("x-ratelimit-reset")
        .expect("reset header")
        .parse()
        .expect("unix seconds");
    assert!(reset > chrono::Utc::now().timestamp());

    assert_eq!(app.github.recorder.count("GET /search/repositories"), 2);
}

#[tokio::test]
async fn test_route_groups_have_independent_budgets() {
    let app = TestApp::with_limits(tight_limits()).await;

    assert_eq!(app.get("/api/search/code?q=fn+main", None).await.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/search/code?q=fn+main", None).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    // Code search exhaustion leaves the general search budget intact.
    let res = app.get("/api/search/issues?q=panic", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("x-ratelimit-limit"), Some("2"));
}

#[tokio::test]
async fn test_search_routes_share_one_group_budget() {
    let app = TestApp::with_limits(tight_limits()).await;

    assert_eq!(app.get("/api/search/repos?q=a", None).await.status, StatusCode::OK);
    assert_eq!(app.get("/api/search/issues?q=b", None).await.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/search/users?q=c", None).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_anonymous_callers_are_keyed_by_address() {
    let app = TestApp::with_limits(tight_limits()).await;
    let other_peer = TestApp::router_from(&app.state, "198.51.100.20:5555");

    assert_eq!(app.get("/api/search/code?q=x", None).await.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/search/code?q=x", None).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    let res = send_to(&other_peer, request(Method::GET, "/api/search/code?q=x", None, None)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(app.state.limiters.search_code.tracked_callers(), 2);
}

#[tokio::test]
async fn test_members_are_keyed_by_username() {
    let app = TestApp::with_limits(tight_limits()).await;
    let alice = app.login("alice").await;
    let bob = app.login("bob").await;

    assert_eq!(app.get("/api/explore/topics", Some(&alice)).await.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/explore/topics", Some(&alice)).await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    // Same address, different member.
    assert_eq!(app.get("/api/explore/topics", Some(&bob)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_unauthenticated_requests_are_rejected_before_counting() {
    let app = TestApp::with_limits(tight_limits()).await;

    for _ in 0..3 {
        let res = app.get("/api/explore/topics", None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert!(res.header("x-ratelimit-limit").is_none());
    }

    assert_eq!(app.state.limiters.explore.tracked_callers(), 0);
    assert_eq!(app.github.recorder.count("GET /search/topics"), 0);
}

#[tokio::test]
async fn test_login_redirects_are_limited() {
    let app = TestApp::with_limits(tight_limits()).await;

    for remaining in ["1", "0"] {
        let res = app.get("/api/auth/github", None).await;
        assert_eq!(res.status, StatusCode::SEE_OTHER);
        assert_eq!(res.header("x-ratelimit-remaining"), Some(remaining));
    }

    // Rejected before the handler, so no pending-login session is stored.
    let rejected = app.get("/api/auth/github", None).await;
    assert_eq!(rejected.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(rejected.header("set-cookie").is_none());

    let other_peer = TestApp::router_from(&app.state, "198.51.100.30:6000");
    let res = send_to(&other_peer, request(Method::GET, "/api/auth/github", None, None)).await;
    assert_eq!(res.status, StatusCode::SEE_OTHER);
    assert_eq!(app.state.limiters.login.tracked_callers(), 2);
}

#[tokio::test]
async fn test_unlimited_routes_carry_no_quota_headers() {
    let app = TestApp::with_limits(tight_limits()).await;
    let res = app.get("/api/auth/check", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.header("x-ratelimit-limit").is_none());
}

#[tokio::test]
async fn test_concurrent_requests_never_exceed_limit() {
    let app = TestApp::with_limits(RateLimitSettings {
        repo_resources: 5,
        ..RateLimitSettings::default()
    })
    .await;

    let requests = (0..20).map(|_| {
        let router = app.router.clone();
        tokio::spawn(async move {
            send_to(
                &router,
                request(Method::GET, "/api/repos/languages/rust-lang/rust", None, None),
            )
            .await
            .status
        })
    });

    let statuses = futures::future::join_all(requests).await;
    let ok = statuses
        .iter()
        .filter(|s| *s.as_ref().unwrap() == StatusCode::OK)
        .count();
    let limited = statuses
        .iter()
        .filter(|s| *s.as_ref().unwrap() == StatusCode::TOO_MANY_REQUESTS)
        .count();

    assert_eq!(ok, 5);
    assert_eq!(limited, 15);
}
