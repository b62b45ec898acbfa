use crate::error::{GatewayError, Result};
use crate::types::{GitHubRepo, GitHubUser, SearchKind, SearchPage, SearchParams};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const API_BASE_URL: &str = "https://api.github.com";
const ACCEPT_JSON: &str = "application/vnd.github+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw+json";
const USER_AGENT: &str = "GitHub Gateway/0.1.0";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the upstream GitHub REST API.
///
/// Every request carries the service credential. Failures are reported once and
/// never retried; non-success statuses become [`GatewayError::Upstream`] with
/// the upstream status preserved.
pub struct GitHubClient {
    client: Client,
    base_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(token: String) -> Result<Self> {
        Self::with_base_url(API_BASE_URL, token, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(base_url: &str, token: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(GitHubClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self
            .client
            .request(method, url)
            .header(header::ACCEPT, ACCEPT_JSON);

        if self.token.is_empty() {
            builder
        } else {
            builder.header(header::AUTHORIZATION, format!("token {}", self.token))
        }
    }

    /// Sends the request and converts any non-success status into an upstream
    /// error carrying GitHub's own message when it supplied one.
    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let remaining = response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        let message = upstream_message(status, &body);

        warn!(
            status = status.as_u16(),
            rate_limit_remaining = remaining.as_deref().unwrap_or("unknown"),
            "GitHub API request failed: {}",
            message
        );

        Err(GatewayError::Upstream { status, message })
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        debug!(path, "GET upstream");
        let response = self.send(self.request(Method::GET, path).query(query)).await?;
        Ok(response.json().await?)
    }

    /// `PUT` with an empty body, as GitHub expects for star and follow.
    pub async fn put_empty(&self, path: &str) -> Result<StatusCode> {
        debug!(path, "PUT upstream");
        let response = self
            .send(
                self.request(Method::PUT, path)
                    .header(header::CONTENT_LENGTH, "0"),
            )
            .await?;
        Ok(response.status())
    }

    pub async fn delete(&self, path: &str) -> Result<StatusCode> {
        debug!(path, "DELETE upstream");
        let response = self.send(self.request(Method::DELETE, path)).await?;
        Ok(response.status())
    }

    pub async fn post_json(&self, path: &str) -> Result<Value> {
        debug!(path, "POST upstream");
        let response = self.send(self.request(Method::POST, path)).await?;
        Ok(response.json().await?)
    }

    pub async fn get_user(&self, login: &str) -> Result<Value> {
        self.get_json(&format!("/users/{}", login), &[]).await
    }

    pub async fn get_repository_info(&self, owner: &str, repo: &str) -> Result<GitHubRepo> {
        self.get_json(&format!("/repos/{}/{}", owner, repo), &[]).await
    }

    pub async fn get_repository_raw(&self, owner: &str, repo: &str) -> Result<Value> {
        self.get_json(&format!("/repos/{}/{}", owner, repo), &[]).await
    }

    /// Decoded README text, `None` when the repository has none or the call fails.
    pub async fn get_readme(&self, owner: &str, repo: &str) -> Option<String> {
        let builder = self
            .request(Method::GET, &format!("/repos/{}/{}/readme", owner, repo))
            .header(header::ACCEPT, ACCEPT_RAW);

        match self.send(builder).await {
            Ok(response) => response.text().await.ok(),
            Err(e) => {
                debug!(owner, repo, "No readme available: {}", e);
                None
            }
        }
    }

    pub async fn search<T: DeserializeOwned>(
        &self,
        kind: SearchKind,
        params: &SearchParams,
    ) -> Result<SearchPage<T>> {
        self.get_json(kind.path(), &params.to_query()).await
    }

    /// Fetches the profile behind a user's OAuth access token.
    pub async fn authenticated_user(&self, access_token: &str) -> Result<GitHubUser> {
        let builder = self
            .client
            .get(format!("{}/user", self.base_url))
            .header(header::ACCEPT, ACCEPT_JSON)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token));

        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }
}

/// Prefers the `message` field of a GitHub error body, falling back to the
/// status reason phrase.
pub fn upstream_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string())
}
