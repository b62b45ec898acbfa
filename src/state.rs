use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::error::Result;
use crate::github::GitHubClient;
use crate::oauth::GitHubOAuth;
use crate::pool::SurrealPool;
use crate::rate_limit::RateLimiters;

/// Shared handles every handler and middleware reaches through `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub github: Arc<GitHubClient>,
    pub db_pool: Arc<SurrealPool>,
    pub limiters: Arc<RateLimiters>,
    pub oauth: Arc<GitHubOAuth>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, db_pool: Arc<SurrealPool>) -> Result<Self> {
        let github = GitHubClient::with_base_url(
            &config.github_api_url,
            config.github_api_key.clone(),
            config.upstream_timeout,
        )?;
        let oauth = GitHubOAuth::new(&config.oauth, config.upstream_timeout)?;
        let limiters = RateLimiters::from_settings(&config.rate_limits);

        Ok(Self {
            config: Arc::new(config),
            github: Arc::new(github),
            db_pool,
            limiters: Arc::new(limiters),
            oauth: Arc::new(oauth),
            start_time: Instant::now(),
        })
    }
}
