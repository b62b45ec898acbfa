use clap::Parser;
use std::time::Duration;

use crate::config::{AppConfig, OAuthSettings, RateLimitSettings};

#[derive(Parser, Debug, Clone)]
#[command(name = "github-gateway")]
#[command(about = "GitHub Gateway - Proxies the GitHub API with session login, rate limiting and social bookkeeping")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Port the HTTP server listens on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Service credential attached to every upstream GitHub call
    #[arg(long, env = "GITHUB_API_KEY", default_value = "")]
    pub github_api_key: String,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub github_api_url: String,

    /// GitHub web base URL used for the OAuth authorize and token endpoints
    #[arg(long, env = "GITHUB_OAUTH_URL", default_value = "https://github.com")]
    pub github_oauth_url: String,

    /// OAuth application client id
    #[arg(long, env = "GITHUB_CLIENT_ID", default_value = "")]
    pub github_client_id: String,

    /// OAuth application client secret
    #[arg(long, env = "GITHUB_CLIENT_SECRET", default_value = "")]
    pub github_client_secret: String,

    /// OAuth callback URL registered with GitHub
    #[arg(
        long,
        env = "GITHUB_CALLBACK_URL",
        default_value = "http://localhost:5000/api/auth/github/callback"
    )]
    pub github_callback_url: String,

    /// Browser client origin, used for CORS and login redirects
    #[arg(long, env = "CLIENT_BASE_URL", default_value = "http://localhost:3000")]
    pub client_base_url: String,

    /// Mark session cookies as Secure
    #[arg(long, env = "PRODUCTION")]
    pub production: bool,

    /// Usernames granted the administrator flag at login
    #[arg(long, env = "ADMIN_USERS", value_delimiter = ',')]
    pub admin_users: Vec<String>,

    /// Timeout for every upstream GitHub request, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// Rate limit window, in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 3600)]
    pub rate_limit_window_secs: u64,

    /// Requests per window for the explore routes
    #[arg(long, env = "RATE_LIMIT_EXPLORE", default_value_t = 30)]
    pub rate_limit_explore: u32,

    /// Requests per window for repository details
    #[arg(long, env = "RATE_LIMIT_REPO_DETAILS", default_value_t = 100)]
    pub rate_limit_repo_details: u32,

    /// Requests per window for repository sub-resources (stargazers, issues, ...)
    #[arg(long, env = "RATE_LIMIT_REPO_RESOURCES", default_value_t = 50)]
    pub rate_limit_repo_resources: u32,

    /// Requests per window for user profiles
    #[arg(long, env = "RATE_LIMIT_PROFILE", default_value_t = 100)]
    pub rate_limit_profile: u32,

    /// Requests per window for repository, user and issue search
    #[arg(long, env = "RATE_LIMIT_SEARCH", default_value_t = 30)]
    pub rate_limit_search: u32,

    /// Requests per window for code search
    #[arg(long, env = "RATE_LIMIT_SEARCH_CODE", default_value_t = 20)]
    pub rate_limit_search_code: u32,

    /// Requests per window for advanced search
    #[arg(long, env = "RATE_LIMIT_SEARCH_ADVANCED", default_value_t = 20)]
    pub rate_limit_search_advanced: u32,

    /// Login redirects per window
    #[arg(long, env = "RATE_LIMIT_LOGIN", default_value_t = 30)]
    pub rate_limit_login: u32,

    /// SurrealDB connection URL
    #[arg(long, env = "DB_URL", default_value = "ws://localhost:8000")]
    pub db_url: String,

    /// SurrealDB username
    #[arg(long, env = "DB_USER", default_value = "root")]
    pub db_user: String,

    /// SurrealDB password
    #[arg(long, env = "DB_PASS", default_value = "root")]
    pub db_pass: String,

    /// SurrealDB namespace
    #[arg(long, env = "DB_NAMESPACE", default_value = "gateway")]
    pub db_namespace: String,

    /// SurrealDB database
    #[arg(long, env = "DB_DATABASE", default_value = "social")]
    pub db_database: String,

    /// Maximum pooled SurrealDB connections
    #[arg(long, env = "DB_POOL_MAX_SIZE", default_value_t = 10)]
    pub db_pool_max_size: usize,

    /// Use a local SurrealDB at ws://localhost:8000
    #[arg(long)]
    pub local: bool,
}

impl Cli {
    pub fn into_config(self) -> AppConfig {
        AppConfig {
            github_api_key: self.github_api_key,
            github_api_url: self.github_api_url,
            client_base_url: self.client_base_url.trim_end_matches('/').to_string(),
            production: self.production,
            admin_users: self
                .admin_users
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect(),
            upstream_timeout: Duration::from_secs(self.upstream_timeout_secs),
            oauth: OAuthSettings {
                client_id: self.github_client_id,
                client_secret: self.github_client_secret,
                authorize_url: format!("{}/login/oauth/authorize", self.github_oauth_url.trim_end_matches('/')),
                token_url: format!("{}/login/oauth/access_token", self.github_oauth_url.trim_end_matches('/')),
                callback_url: self.github_callback_url,
            },
            rate_limits: RateLimitSettings {
                window: Duration::from_secs(self.rate_limit_window_secs),
                explore: self.rate_limit_explore,
                repo_details: self.rate_limit_repo_details,
                repo_resources: self.rate_limit_repo_resources,
                profile: self.rate_limit_profile,
                search: self.rate_limit_search,
                search_code: self.rate_limit_search_code,
                search_advanced: self.rate_limit_search_advanced,
                login: self.rate_limit_login,
            },
        }
    }
}
