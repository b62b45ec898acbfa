use serde::{Deserialize, Serialize};
use serde_json::Value;

// GitHub API response structures. Only the fields the gateway reads are typed,
// everything else is relayed as raw JSON.

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepo {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub forks_count: u32,
    #[serde(default)]
    pub watchers_count: u32,
    pub language: Option<String>,
    #[serde(default)]
    pub private: bool,
    pub owner: GitHubOwner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubOwner {
    pub login: String,
}

/// Full profile returned by `/users/{login}` and `/user`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
    pub id: u64,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub html_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub following: u32,
}

/// Entry in a search result page; only the login is needed to resolve details.
#[derive(Debug, Clone, Deserialize)]
pub struct UserSearchItem {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage<T> {
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    pub items: Vec<T>,
}

/// Compact user card returned by user search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub followers: Option<u64>,
    pub following: Option<u64>,
    pub public_repos: Option<u64>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub html_url: Option<String>,
}

/// Search endpoints addressable through the advanced search route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Repositories,
    Users,
    Code,
    Issues,
    Topics,
}

impl SearchKind {
    pub fn path(self) -> &'static str {
        match self {
            SearchKind::Repositories => "/search/repositories",
            SearchKind::Users => "/search/users",
            SearchKind::Code => "/search/code",
            SearchKind::Issues => "/search/issues",
            SearchKind::Topics => "/search/topics",
        }
    }

    /// Parses the `type` field of an advanced search request. Topics are not
    /// offered there.
    pub fn from_advanced(name: &str) -> Option<Self> {
        match name {
            "repositories" => Some(SearchKind::Repositories),
            "users" => Some(SearchKind::Users),
            "code" => Some(SearchKind::Code),
            "issues" => Some(SearchKind::Issues),
            _ => None,
        }
    }
}

/// Common query parameters forwarded to a search endpoint.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub q: String,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl SearchParams {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            sort: None,
            order: None,
            page: 1,
            per_page: 30,
        }
    }

    pub fn sorted(mut self, sort: impl Into<String>, order: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self.order = Some(order.into());
        self
    }

    pub fn paged(mut self, page: u32, per_page: u32) -> Self {
        self.page = page.max(1);
        self.per_page = per_page.clamp(1, 100);
        self
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("q", self.q.clone())];
        if let Some(sort) = &self.sort {
            query.push(("sort", sort.clone()));
        }
        if let Some(order) = &self.order {
            query.push(("order", order.clone()));
        }
        query.push(("page", self.page.to_string()));
        query.push(("per_page", self.per_page.to_string()));
        query
    }
}

/// Raw JSON objects relayed to the client untouched.
pub type RawItems = Vec<Value>;
