use serde::{Deserialize, Serialize};
use surrealdb::sql::Datetime;

/// Pinned repositories a profile may show.
pub const MAX_PINNED_REPOS: usize = 6;

/// Local member record, keyed `user:⟨username⟩`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub name: Option<String>,
    pub profile_url: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub following: u32,
    #[serde(default)]
    pub liked_profiles: Vec<String>,
    #[serde(default)]
    pub liked_by: Vec<LikedBy>,
    #[serde(default)]
    pub starred_repos: Vec<String>,
    #[serde(default)]
    pub pinned_repos: Vec<String>,
    #[serde(default)]
    pub following_users: Vec<String>,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: Option<Datetime>,
    pub last_login: Option<Datetime>,
    pub last_active: Option<Datetime>,
}

impl User {
    pub fn has_liked(&self, username: &str) -> bool {
        self.liked_profiles.iter().any(|u| u == username)
    }

    pub fn has_starred(&self, full_name: &str) -> bool {
        self.starred_repos.iter().any(|r| r == full_name)
    }
}

/// Who liked a profile and when.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LikedBy {
    pub username: String,
    pub avatar_url: Option<String>,
    pub liked_date: Option<Datetime>,
}

/// Local star/fork ledger for a repository, keyed `repo:⟨owner/name⟩`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repo {
    pub name: String,
    pub owner: String,
    pub full_name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub stars: u32,
    #[serde(default)]
    pub forks: u32,
    #[serde(default)]
    pub watchers: u32,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub starred_by: Vec<String>,
    #[serde(default)]
    pub forked_by: Vec<String>,
    #[serde(default)]
    pub is_private: bool,
    pub created_at: Option<Datetime>,
    pub updated_at: Option<Datetime>,
}

/// Values a new ledger entry starts from.
#[derive(Debug, Clone)]
pub struct RepoSeed {
    pub name: String,
    pub owner: String,
    pub full_name: String,
    pub description: String,
    pub url: String,
    pub stars: u32,
    pub forks: u32,
    pub watchers: u32,
    pub language: String,
    pub is_private: bool,
}

impl From<&crate::types::GitHubRepo> for RepoSeed {
    fn from(repo: &crate::types::GitHubRepo) -> Self {
        Self {
            name: repo.name.clone(),
            owner: repo.owner.login.clone(),
            full_name: repo.full_name.clone(),
            description: repo.description.clone().unwrap_or_default(),
            url: repo.html_url.clone(),
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            watchers: repo.watchers_count,
            language: repo.language.clone().unwrap_or_default(),
            is_private: repo.private,
        }
    }
}

/// Profile fields refreshed from GitHub at every login.
#[derive(Debug, Clone)]
pub struct LoginProfile {
    pub username: String,
    pub name: Option<String>,
    pub profile_url: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub followers: u32,
    pub following: u32,
}

impl From<crate::types::GitHubUser> for LoginProfile {
    fn from(user: crate::types::GitHubUser) -> Self {
        Self {
            username: user.login,
            name: user.name,
            profile_url: Some(user.html_url),
            avatar_url: user.avatar_url,
            bio: user.bio,
            location: user.location,
            company: user.company,
            followers: user.followers,
            following: user.following,
        }
    }
}

/// Locally editable profile fields. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub pinned_repos: Option<Vec<String>>,
}

/// Result of a like attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Liked,
    AlreadyLiked,
    UnknownTarget,
    UnknownLiker,
}
