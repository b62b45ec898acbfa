use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::limited;
use crate::error::{GatewayError, Result};
use crate::state::AppState;
use crate::types::{RawItems, SearchKind, SearchParams, UserSearchItem, UserSummary};

pub fn router(state: &AppState) -> Router<AppState> {
    let general = limited(
        Router::new()
            .route("/repos", get(search_repos))
            .route("/users", get(search_users))
            .route("/issues", get(search_issues)),
        &state.limiters.search,
    );
    let code = limited(
        Router::new().route("/code", get(search_code)),
        &state.limiters.search_code,
    );
    let advanced = limited(
        Router::new().route("/advanced", post(search_advanced)),
        &state.limiters.search_advanced,
    );

    general.merge(code).merge(advanced)
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub total_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incomplete_results: Option<bool>,
    #[serde(flatten)]
    pub results: SearchResults,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchResults {
    Repos(RawItems),
    Users(Vec<UserSummary>),
    Code(RawItems),
    Issues(RawItems),
    Results(RawItems),
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub language: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "type")]
    pub user_type: Option<String>,
}

impl SearchQuery {
    /// Validated base parameters; the query text is required.
    fn params(&self, default_sort: &str) -> Result<SearchParams> {
        let q = required(self.q.as_deref())?;
        Ok(SearchParams::new(q)
            .sorted(
                self.sort.clone().unwrap_or_else(|| default_sort.to_string()),
                self.order.clone().unwrap_or_else(|| "desc".to_string()),
            )
            .paged(self.page.unwrap_or(1), self.per_page.unwrap_or(30)))
    }
}

#[derive(Debug, Deserialize)]
pub struct AdvancedSearch {
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn required(q: Option<&str>) -> Result<&str> {
    q.map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| GatewayError::BadRequest("Search query is required".to_string()))
}

fn qualify(mut params: SearchParams, qualifier: &str, value: Option<&String>) -> SearchParams {
    if let Some(value) = value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        params.q = format!("{} {}:{}", params.q, qualifier, value);
    }
    params
}

async fn search_repos(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let params = qualify(query.params("stars")?, "language", query.language.as_ref());
    let page = state.github.search::<Value>(SearchKind::Repositories, &params).await?;

    Ok(Json(SearchResponse {
        total_count: page.total_count,
        incomplete_results: Some(page.incomplete_results),
        results: SearchResults::Repos(page.items),
    }))
}

/// User search resolves every hit to its profile so the results can show
/// follower counts and bios.
async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let user_type = query.user_type.clone().unwrap_or_else(|| "user".to_string());
    let params = qualify(query.params("followers")?, "type", Some(&user_type));

    let page = state
        .github
        .search::<UserSearchItem>(SearchKind::Users, &params)
        .await?;
    let paths: Vec<String> = page
        .items
        .iter()
        .map(|item| format!("/users/{}", item.login))
        .collect();
    let users = try_join_all(
        paths
            .iter()
            .map(|path| state.github.get_json::<UserSummary>(path, &[])),
    )
    .await?;

    Ok(Json(SearchResponse {
        total_count: page.total_count,
        incomplete_results: None,
        results: SearchResults::Users(users),
    }))
}

async fn search_code(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let params = query.params("indexed")?;
    let page = state.github.search::<Value>(SearchKind::Code, &params).await?;

    Ok(Json(SearchResponse {
        total_count: page.total_count,
        incomplete_results: None,
        results: SearchResults::Code(page.items),
    }))
}

async fn search_issues(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let params = qualify(query.params("updated")?, "state", query.state.as_ref());
    let page = state.github.search::<Value>(SearchKind::Issues, &params).await?;

    Ok(Json(SearchResponse {
        total_count: page.total_count,
        incomplete_results: None,
        results: SearchResults::Issues(page.items),
    }))
}

async fn search_advanced(
    State(state): State<AppState>,
    Json(body): Json<AdvancedSearch>,
) -> Result<Json<SearchResponse>> {
    let q = required(body.query.as_deref())?;
    let kind = SearchKind::from_advanced(body.kind.as_deref().unwrap_or("repositories"))
        .ok_or_else(|| GatewayError::BadRequest("Invalid search type".to_string()))?;

    let params = SearchParams::new(q)
        .sorted(
            body.sort.unwrap_or_else(|| "stars".to_string()),
            body.order.unwrap_or_else(|| "desc".to_string()),
        )
        .paged(body.page.unwrap_or(1), body.per_page.unwrap_or(30));
    let page = state.github.search::<Value>(kind, &params).await?;

    Ok(Json(SearchResponse {
        total_count: page.total_count,
        incomplete_results: None,
        results: SearchResults::Results(page.items),
    }))
}
