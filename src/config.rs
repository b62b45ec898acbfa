use std::time::Duration;

/// Runtime configuration shared by every handler.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub github_api_key: String,
    pub github_api_url: String,
    /// Browser client origin without a trailing slash
    pub client_base_url: String,
    pub production: bool,
    pub admin_users: Vec<String>,
    pub upstream_timeout: Duration,
    pub oauth: OAuthSettings,
    pub rate_limits: RateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub callback_url: String,
}

/// Per route group request budgets. Every group shares the same window length.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window: Duration,
    pub explore: u32,
    pub repo_details: u32,
    pub repo_resources: u32,
    pub profile: u32,
    pub search: u32,
    pub search_code: u32,
    pub search_advanced: u32,
    /// Login redirects, each of which opens a pending session
    pub login: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60 * 60),
            explore: 30,
            repo_details: 100,
            repo_resources: 50,
            profile: 100,
            search: 30,
            search_code: 20,
            search_advanced: 20,
            login: 30,
        }
    }
}

impl AppConfig {
    pub fn is_admin(&self, username: &str) -> bool {
        self.admin_users.iter().any(|u| u.eq_ignore_ascii_case(username))
    }

    pub fn login_page_url(&self) -> String {
        format!("{}/login", self.client_base_url)
    }
}
