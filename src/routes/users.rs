use axum::{
    extract::{Path, Query, State},
    middleware::from_fn,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

use super::limited;
use crate::auth::{require_user, MaybeUser, SessionUser};
use crate::error::{GatewayError, Result};
use crate::models::{LikeOutcome, LikedBy, ProfileUpdate, User, MAX_PINNED_REPOS};
use crate::state::AppState;

pub fn router(state: &AppState) -> Router<AppState> {
    let profile = limited(
        Router::new().route("/profile/{username}", get(profile)),
        &state.limiters.profile,
    );

    let members = Router::new()
        .route("/likes", get(likes))
        .route("/like/{username}", post(like))
        .route("/follow/{username}", post(follow))
        .route("/unfollow/{username}", post(unfollow))
        .route("/followers", get(followers))
        .route("/following", get(following))
        .route("/profile", put(update_profile))
        .route("/stats", get(stats))
        .route("/activity", get(activity))
        .route("/pinned-repos", get(pinned_repos))
        .route_layer(from_fn(require_user));

    profile.merge(members)
}

/// Optional `?username=`; defaults to the session user.
#[derive(Debug, Default, Deserialize)]
pub struct UsernameQuery {
    pub username: Option<String>,
}

impl UsernameQuery {
    fn resolve(self, me: &SessionUser) -> String {
        self.username
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| me.username.clone())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user_profile: Value,
    pub repos: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikesResponse {
    pub liked_by: Vec<LikedBy>,
    pub liked_profiles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdateResponse {
    pub success: bool,
    pub message: String,
    pub user: User,
}

/// List envelopes keyed by what they hold.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UserListing {
    Followers(Value),
    Following(Value),
    Activity(Vec<ActivityEvent>),
    PinnedRepos(Vec<Value>),
}

async fn profile(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>> {
    let repos_path = format!("/users/{}/repos", username);
    let (mut user_profile, repos) = futures::try_join!(
        state.github.get_user(&username),
        state.github.get_json::<Value>(&repos_path, &[]),
    )?;

    let conn = state.db_pool.get().await?;
    if conn.get_user(&username).await?.is_some() {
        let is_liked = match viewer {
            Some(viewer) => conn
                .get_user(&viewer.username)
                .await?
                .is_some_and(|v| v.has_liked(&username)),
            None => false,
        };
        if let Some(obj) = user_profile.as_object_mut() {
            obj.insert("isLiked".to_string(), Value::Bool(is_liked));
        }
    }

    Ok(Json(ProfileResponse { user_profile, repos }))
}

async fn likes(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
) -> Result<Json<LikesResponse>> {
    let conn = state.db_pool.get().await?;
    let user = conn
        .get_user(&me.username)
        .await?
        .ok_or_else(|| GatewayError::NotFound("User not found".to_string()))?;

    Ok(Json(LikesResponse {
        liked_by: user.liked_by,
        liked_profiles: user.liked_profiles,
    }))
}

async fn like(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Path(username): Path<String>,
) -> Result<Json<ActionResponse>> {
    if me.username == username {
        return Err(GatewayError::BadRequest("You cannot like yourself".to_string()));
    }

    let conn = state.db_pool.get().await?;
    match conn.like_profile(&me.username, &username).await? {
        LikeOutcome::Liked => {
            info!(liker = %me.username, target = %username, "Profile liked");
            Ok(ActionResponse::ok("User liked successfully"))
        }
        LikeOutcome::AlreadyLiked => Err(GatewayError::BadRequest("User already liked".to_string())),
        LikeOutcome::UnknownTarget => Err(GatewayError::NotFound("User is not a member".to_string())),
        LikeOutcome::UnknownLiker => Err(GatewayError::NotFound("User not found".to_string())),
    }
}

async fn follow(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Path(username): Path<String>,
) -> Result<Json<ActionResponse>> {
    if me.username == username {
        return Err(GatewayError::BadRequest("You cannot follow yourself".to_string()));
    }

    state
        .github
        .put_empty(&format!("/user/following/{}", username))
        .await?;

    let conn = state.db_pool.get().await?;
    conn.record_follow(&me.username, &username).await?;

    Ok(ActionResponse::ok(format!("You are now following {}", username)))
}

async fn unfollow(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Path(username): Path<String>,
) -> Result<Json<ActionResponse>> {
    state
        .github
        .delete(&format!("/user/following/{}", username))
        .await?;

    let conn = state.db_pool.get().await?;
    conn.record_unfollow(&me.username, &username).await?;

    Ok(ActionResponse::ok(format!("You have unfollowed {}", username)))
}

async fn followers(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<UserListing>> {
    let username = query.resolve(&me);
    let list = state
        .github
        .get_json(&format!("/users/{}/followers", username), &[])
        .await?;
    Ok(Json(UserListing::Followers(list)))
}

async fn following(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<UserListing>> {
    let username = query.resolve(&me);
    let list = state
        .github
        .get_json(&format!("/users/{}/following", username), &[])
        .await?;
    Ok(Json(UserListing::Following(list)))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileUpdateResponse>> {
    if let Some(pinned) = &update.pinned_repos {
        if pinned.len() > MAX_PINNED_REPOS {
            return Err(GatewayError::BadRequest(format!(
                "You can pin at most {} repositories",
                MAX_PINNED_REPOS
            )));
        }
    }

    let conn = state.db_pool.get().await?;
    let user = conn
        .update_profile(&me.username, &update)
        .await?
        .ok_or_else(|| GatewayError::NotFound("User not found".to_string()))?;

    Ok(Json(ProfileUpdateResponse {
        success: true,
        message: "Profile updated successfully".to_string(),
        user,
    }))
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct ProfileCounts {
    pub followers: u64,
    pub following: u64,
    pub public_repos: u64,
    pub public_gists: u64,
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepoTotals {
    pub total_stars: u64,
    pub total_forks: u64,
    pub total_watchers: u64,
    pub count: usize,
    pub languages: BTreeMap<String, u64>,
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contributions {
    pub commits: u64,
    pub pull_requests: u64,
    pub issues: u64,
    pub reviews: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub profile: ProfileCounts,
    pub repos: RepoTotals,
    pub contributions: Contributions,
}

fn count_field(value: &Value, field: &str) -> u64 {
    value.get(field).and_then(Value::as_u64).unwrap_or(0)
}

pub fn summarize_repos(repos: &[Value]) -> RepoTotals {
    let mut totals = RepoTotals {
        count: repos.len(),
        ..Default::default()
    };
    for repo in repos {
        totals.total_stars += count_field(repo, "stargazers_count");
        totals.total_forks += count_field(repo, "forks_count");
        totals.total_watchers += count_field(repo, "watchers_count");
        if let Some(language) = repo.get("language").and_then(Value::as_str) {
            *totals.languages.entry(language.to_string()).or_default() += 1;
        }
    }
    totals
}

pub fn summarize_contributions(events: &[Value]) -> Contributions {
    let mut contributions = Contributions::default();
    for event in events {
        match event.get("type").and_then(Value::as_str) {
            Some("PushEvent") => {
                contributions.commits += event
                    .pointer("/payload/commits")
                    .and_then(Value::as_array)
                    .map_or(0, |c| c.len() as u64);
            }
            Some("PullRequestEvent") => contributions.pull_requests += 1,
            Some("IssuesEvent") => contributions.issues += 1,
            Some("PullRequestReviewEvent") => contributions.reviews += 1,
            _ => {}
        }
    }
    contributions
}

async fn stats(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<StatsResponse>> {
    let username = query.resolve(&me);
    let per_page = [("per_page", "100".to_string())];
    let repos_path = format!("/users/{}/repos", username);
    let events_path = format!("/users/{}/events/public", username);

    let (user, repos, events) = futures::try_join!(
        state.github.get_user(&username),
        state.github.get_json::<Vec<Value>>(&repos_path, &per_page),
        state.github.get_json::<Vec<Value>>(&events_path, &per_page),
    )?;

    Ok(Json(StatsResponse {
        profile: ProfileCounts {
            followers: count_field(&user, "followers"),
            following: count_field(&user, "following"),
            public_repos: count_field(&user, "public_repos"),
            public_gists: count_field(&user, "public_gists"),
        },
        repos: summarize_repos(&repos),
        contributions: summarize_contributions(&events),
    }))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActivityEvent {
    pub id: Value,
    #[serde(rename = "type")]
    pub kind: Value,
    pub actor: Value,
    pub repo: Value,
    pub created_at: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commits: Option<Value>,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forkee: Option<Value>,
}

impl ActivityEvent {
    /// Keeps the envelope of a public event plus the payload fields relevant
    /// to its type.
    pub fn from_event(event: &Value) -> Self {
        let field = |name: &str| event.get(name).cloned().unwrap_or(Value::Null);
        let payload = |pointer: &str| event.pointer(pointer).cloned();

        let mut summary = ActivityEvent {
            id: field("id"),
            kind: field("type"),
            actor: field("actor"),
            repo: field("repo"),
            created_at: field("created_at"),
            commits: None,
            git_ref: None,
            ref_type: None,
            action: None,
            number: None,
            title: None,
            forkee: None,
        };

        match event.get("type").and_then(Value::as_str) {
            Some("PushEvent") => {
                summary.commits = payload("/payload/commits");
                summary.git_ref = payload("/payload/ref");
            }
            Some("PullRequestEvent") => {
                summary.action = payload("/payload/action");
                summary.number = payload("/payload/number");
                summary.title = payload("/payload/pull_request/title");
            }
            Some("IssuesEvent") => {
                summary.action = payload("/payload/action");
                summary.number = payload("/payload/issue/number");
                summary.title = payload("/payload/issue/title");
            }
            Some("CreateEvent") => {
                summary.ref_type = payload("/payload/ref_type");
                summary.git_ref = payload("/payload/ref");
            }
            Some("ForkEvent") => {
                summary.forkee = event.pointer("/payload/forkee").map(|f| {
                    serde_json::json!({
                        "name": f.get("name"),
                        "full_name": f.get("full_name"),
                        "html_url": f.get("html_url"),
                    })
                });
            }
            Some("WatchEvent") => summary.action = payload("/payload/action"),
            _ => {}
        }

        summary
    }
}

async fn activity(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<UserListing>> {
    let username = query.resolve(&me);
    let events: Vec<Value> = state
        .github
        .get_json(
            &format!("/users/{}/events/public", username),
            &[("per_page", "30".to_string())],
        )
        .await?;

    Ok(Json(UserListing::Activity(
        events.iter().map(ActivityEvent::from_event).collect(),
    )))
}

/// Top repositories by stars, used when a member has not pinned any.
pub fn top_by_stars(mut repos: Vec<Value>, n: usize) -> Vec<Value> {
    repos.sort_by_key(|r| std::cmp::Reverse(count_field(r, "stargazers_count")));
    repos.truncate(n);
    repos
}

async fn pinned_repos(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<UserListing>> {
    let username = query.resolve(&me);

    let pinned = {
        let conn = state.db_pool.get().await?;
        conn.get_user(&username)
            .await?
            .map(|u| u.pinned_repos)
            .unwrap_or_default()
    };

    if !pinned.is_empty() {
        let repos = try_join_all(
            pinned
                .iter()
                .map(|name| state.github.get_repository_raw(&username, name)),
        )
        .await?;
        return Ok(Json(UserListing::PinnedRepos(repos)));
    }

    let repos: Vec<Value> = state
        .github
        .get_json(
            &format!("/users/{}/repos", username),
            &[("per_page", "100".to_string())],
        )
        .await?;

    Ok(Json(UserListing::PinnedRepos(top_by_stars(repos, MAX_PINNED_REPOS))))
}
