use axum::{
    extract::{Path, Query, State},
    middleware::from_fn,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::limited;
use super::users::ActionResponse;
use crate::auth::{require_user, MaybeUser, SessionUser};
use crate::error::Result;
use crate::models::RepoSeed;
use crate::state::AppState;
use crate::surreal_client::SurrealClient;

pub fn router(state: &AppState) -> Router<AppState> {
    let details = limited(
        Router::new().route("/{owner}/{repo}", get(details)),
        &state.limiters.repo_details,
    );

    let actions = Router::new()
        .route("/star/{owner}/{repo}", post(star))
        .route("/unstar/{owner}/{repo}", post(unstar))
        .route("/fork/{owner}/{repo}", post(fork))
        .route_layer(from_fn(require_user));

    let resources = limited(
        Router::new()
            .route("/stargazers/{owner}/{repo}", get(stargazers))
            .route("/forks/{owner}/{repo}", get(forks))
            .route("/contributors/{owner}/{repo}", get(contributors))
            .route("/languages/{owner}/{repo}", get(languages))
            .route("/issues/{owner}/{repo}", get(issues))
            .route("/pulls/{owner}/{repo}", get(pulls)),
        &state.limiters.repo_resources,
    );

    details.merge(actions).merge(resources)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoDetails {
    pub repo: Value,
    pub readme: Option<String>,
    pub is_starred: bool,
}

#[derive(Debug, Serialize)]
pub struct ForkResponse {
    pub success: bool,
    pub message: String,
    pub fork: Value,
}

/// Pass-through list envelopes for repository sub-resources.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RepoResource {
    Stargazers(Value),
    Forks(Value),
    Contributors(Value),
    Languages(Value),
    Issues(Value),
    PullRequests(Value),
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub state: Option<String>,
}

impl PageQuery {
    fn paging(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page.unwrap_or(1).max(1).to_string()),
            ("per_page", self.per_page.unwrap_or(30).clamp(1, 100).to_string()),
        ]
    }

    fn with_state(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("state", self.state.clone().unwrap_or_else(|| "open".to_string()))];
        query.extend(self.paging());
        query
    }
}

fn full_name(owner: &str, repo: &str) -> String {
    format!("{}/{}", owner, repo)
}

async fn details(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<RepoDetails>> {
    let (repo_data, readme) = tokio::join!(
        state.github.get_repository_raw(&owner, &repo),
        state.github.get_readme(&owner, &repo),
    );
    let repo_data = repo_data?;

    let is_starred = match viewer {
        Some(viewer) => {
            let conn = state.db_pool.get().await?;
            conn.get_user(&viewer.username)
                .await?
                .is_some_and(|u| u.has_starred(&full_name(&owner, &repo)))
        }
        None => false,
    };

    Ok(Json(RepoDetails {
        repo: repo_data,
        readme,
        is_starred,
    }))
}

/// Creates the ledger entry for a repository the gateway has not seen yet.
/// `stars_already_counted` is how many of the caller's stars the upstream
/// counter already includes.
async fn ensure_ledger_entry(
    state: &AppState,
    conn: &SurrealClient,
    owner: &str,
    repo: &str,
    stars_already_counted: u32,
) -> Result<bool> {
    if conn.get_repo(&full_name(owner, repo)).await?.is_some() {
        return Ok(true);
    }

    match state.github.get_repository_info(owner, repo).await {
        Ok(info) => {
            let mut seed = RepoSeed::from(&info);
            seed.stars = seed.stars.saturating_sub(stars_already_counted);
            conn.ensure_repo(&seed).await?;
            Ok(true)
        }
        Err(e) => {
            warn!(owner, repo, "Could not seed repo ledger: {}", e);
            Ok(false)
        }
    }
}

async fn star(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<ActionResponse>> {
    state
        .github
        .put_empty(&format!("/user/starred/{}/{}", owner, repo))
        .await?;

    let conn = state.db_pool.get().await?;
    // Upstream already counts this star, so the seed excludes it.
    ensure_ledger_entry(&state, &conn, &owner, &repo, 1).await?;
    if conn.record_star(&me.username, &full_name(&owner, &repo)).await? {
        info!(username = %me.username, %owner, %repo, "Repository starred");
    }

    Ok(ActionResponse::ok("Repository starred successfully"))
}

async fn unstar(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<ActionResponse>> {
    state
        .github
        .delete(&format!("/user/starred/{}/{}", owner, repo))
        .await?;

    let conn = state.db_pool.get().await?;
    if conn.record_unstar(&me.username, &full_name(&owner, &repo)).await? {
        info!(username = %me.username, %owner, %repo, "Repository unstarred");
    }

    Ok(ActionResponse::ok("Repository unstarred successfully"))
}

async fn fork(
    State(state): State<AppState>,
    Extension(me): Extension<SessionUser>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<ForkResponse>> {
    let fork = state
        .github
        .post_json(&format!("/repos/{}/{}/forks", owner, repo))
        .await?;

    let conn = state.db_pool.get().await?;
    ensure_ledger_entry(&state, &conn, &owner, &repo, 0).await?;
    if conn.record_fork(&me.username, &full_name(&owner, &repo)).await? {
        info!(username = %me.username, %owner, %repo, "Repository forked");
    }

    Ok(Json(ForkResponse {
        success: true,
        message: "Repository forked successfully".to_string(),
        fork,
    }))
}

async fn resource(
    state: &AppState,
    owner: &str,
    repo: &str,
    name: &str,
    query: &[(&str, String)],
) -> Result<Value> {
    state
        .github
        .get_json(&format!("/repos/{}/{}/{}", owner, repo, name), query)
        .await
}

async fn stargazers(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<RepoResource>> {
    let list = resource(&state, &owner, &repo, "stargazers", &query.paging()).await?;
    Ok(Json(RepoResource::Stargazers(list)))
}

async fn forks(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<RepoResource>> {
    let list = resource(&state, &owner, &repo, "forks", &query.paging()).await?;
    Ok(Json(RepoResource::Forks(list)))
}

async fn contributors(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<RepoResource>> {
    let list = resource(&state, &owner, &repo, "contributors", &[]).await?;
    Ok(Json(RepoResource::Contributors(list)))
}

async fn languages(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<RepoResource>> {
    let list = resource(&state, &owner, &repo, "languages", &[]).await?;
    Ok(Json(RepoResource::Languages(list)))
}

async fn issues(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<RepoResource>> {
    let list = resource(&state, &owner, &repo, "issues", &query.with_state()).await?;
    Ok(Json(RepoResource::Issues(list)))
}

async fn pulls(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<RepoResource>> {
    let list = resource(&state, &owner, &repo, "pulls", &query.with_state()).await?;
    Ok(Json(RepoResource::PullRequests(list)))
}
