use axum::{
    extract::{Path, Query, State},
    middleware::from_fn,
    response::Json,
    routing::get,
    Extension, Router,
};
use chrono::{Months, NaiveDate, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::limited;
use crate::auth::{require_user, SessionUser};
use crate::error::Result;
use crate::state::AppState;
use crate::types::{RawItems, SearchKind, SearchParams, UserSearchItem};

const EXPLORE_PAGE_SIZE: u32 = 10;
const TOPICS_PAGE_SIZE: u32 = 20;

pub fn router(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/repos/{language}", get(popular_repos))
        .route("/trending", get(trending_repos))
        .route("/users", get(top_users))
        .route("/topics", get(topics))
        .route("/topic/{topic}", get(repos_by_topic));

    limited(routes, &state.limiters.explore).route_layer(from_fn(require_user))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExploreResult {
    Repos(RawItems),
    Users(RawItems),
    Topics(RawItems),
}

/// Trending window of `?since=`. Unknown values fall back to daily.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Since {
    #[default]
    Daily,
    Weekly,
    Monthly,
    #[serde(other)]
    Other,
}

impl Since {
    /// Earliest creation date included in the window ending on `today`.
    pub fn cutoff(self, today: NaiveDate) -> NaiveDate {
        let cutoff = match self {
            Since::Weekly => today.checked_sub_days(chrono::Days::new(7)),
            Since::Monthly => today.checked_sub_months(Months::new(1)),
            Since::Daily | Since::Other => today.checked_sub_days(chrono::Days::new(1)),
        };
        cutoff.unwrap_or(today)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendingQuery {
    #[serde(default)]
    pub since: Since,
    pub language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    pub language: Option<String>,
    pub location: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn trending_query(since: Since, language: Option<&str>, today: NaiveDate) -> String {
    let mut q = format!("created:>{}", since.cutoff(today).format("%Y-%m-%d"));
    if let Some(language) = language {
        q.push_str(&format!(" language:{}", language));
    }
    q
}

pub fn top_users_query(language: Option<&str>, location: Option<&str>) -> String {
    let mut q = String::from("type:user");
    if let Some(language) = language {
        q.push_str(&format!(" language:{}", language));
    }
    if let Some(location) = location {
        q.push_str(&format!(" location:{}", location));
    }
    q
}

async fn top_repos(state: &AppState, q: String) -> Result<Json<ExploreResult>> {
    let params = SearchParams::new(q)
        .sorted("stars", "desc")
        .paged(1, EXPLORE_PAGE_SIZE);
    let page = state.github.search::<Value>(SearchKind::Repositories, &params).await?;
    Ok(Json(ExploreResult::Repos(page.items)))
}

async fn popular_repos(
    State(state): State<AppState>,
    Path(language): Path<String>,
) -> Result<Json<ExploreResult>> {
    top_repos(&state, format!("language:{}", language)).await
}

async fn trending_repos(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> Result<Json<ExploreResult>> {
    let q = trending_query(query.since, non_empty(&query.language), Utc::now().date_naive());
    top_repos(&state, q).await
}

async fn repos_by_topic(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Json<ExploreResult>> {
    top_repos(&state, format!("topic:{}", topic)).await
}

/// Most followed users, each resolved to a full profile and annotated with
/// whether the caller has liked them.
async fn top_users(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<ExploreResult>> {
    let q = top_users_query(non_empty(&query.language), non_empty(&query.location));
    let params = SearchParams::new(q)
        .sorted("followers", "desc")
        .paged(1, EXPLORE_PAGE_SIZE);

    let page = state
        .github
        .search::<UserSearchItem>(SearchKind::Users, &params)
        .await?;
    let mut users = try_join_all(page.items.iter().map(|u| state.github.get_user(&u.login))).await?;

    let liked = {
        let conn = state.db_pool.get().await?;
        conn.get_user(&me.username)
            .await?
            .map(|u| u.liked_profiles)
            .unwrap_or_default()
    };

    for user in users.iter_mut() {
        let is_liked = user
            .get("login")
            .and_then(Value::as_str)
            .is_some_and(|login| liked.iter().any(|l| l == login));
        if let Some(obj) = user.as_object_mut() {
            obj.insert("isLiked".to_string(), Value::Bool(is_liked));
        }
    }

    Ok(Json(ExploreResult::Users(users)))
}

async fn topics(State(state): State<AppState>) -> Result<Json<ExploreResult>> {
    let params = SearchParams::new("stars:>1000")
        .sorted("stars", "desc")
        .paged(1, TOPICS_PAGE_SIZE);
    let page = state.github.search::<Value>(SearchKind::Topics, &params).await?;
    Ok(Json(ExploreResult::Topics(page.items)))
}
