use github_gateway::models::{LoginProfile, ProfileUpdate, RepoSeed, User, MAX_PINNED_REPOS};
use github_gateway::types::{GitHubRepo, GitHubUser};
use serde_json::json;

fn user(username: &str) -> User {
    serde_json::from_value(json!({ "username": username })).expect("minimal user")
}

#[test]
fn test_user_defaults_missing_lists() {
    let user = user("alice");

    assert_eq!(user.username, "alice");
    assert!(user.liked_profiles.is_empty());
    assert!(user.pinned_repos.is_empty());
    assert!(!user.is_admin);
    assert!(user.created_at.is_none());
}

#[test]
fn test_user_serializes_camel_case() {
    let mut user = user("alice");
    user.liked_profiles.push("bob".to_string());
    user.avatar_url = Some("https://avatars.test/alice".to_string());

    let value = serde_json::to_value(&user).unwrap();
    assert_eq!(value["likedProfiles"], json!(["bob"]));
    assert_eq!(value["avatarUrl"], "https://avatars.test/alice");
    assert_eq!(value["isAdmin"], false);
    assert!(value.get("liked_profiles").is_none());
}

#[test]
fn test_membership_helpers() {
    let mut user = user("alice");
    user.liked_profiles = vec!["bob".to_string()];
    user.starred_repos = vec!["rust-lang/rust".to_string()];

    assert!(user.has_liked("bob"));
    assert!(!user.has_liked("carol"));
    assert!(user.has_starred("rust-lang/rust"));
    assert!(!user.has_starred("rust-lang/cargo"));
}

#[test]
fn test_profile_update_leaves_absent_fields_unset() {
    let update: ProfileUpdate =
        serde_json::from_value(json!({ "bio": "hi", "pinnedRepos": ["a", "b"] })).unwrap();

    assert_eq!(update.bio.as_deref(), Some("hi"));
    assert!(update.company.is_none());
    assert!(update.location.is_none());
    assert_eq!(update.pinned_repos, Some(vec!["a".to_string(), "b".to_string()]));
    assert_eq!(MAX_PINNED_REPOS, 6);
}

#[test]
fn test_repo_seed_from_github() {
    let repo: GitHubRepo = serde_json::from_value(json!({
        "name": "rust",
        "full_name": "rust-lang/rust",
        "html_url": "https://github.com/rust-lang/rust",
        "description": null,
        "stargazers_count": 90000,
        "forks_count": 12000,
        "language": null,
        "owner": { "login": "rust-lang" },
        "topics": ["compiler"]
    }))
    .unwrap();

    let seed = RepoSeed::from(&repo);
    assert_eq!(seed.owner, "rust-lang");
    assert_eq!(seed.full_name, "rust-lang/rust");
    assert_eq!(seed.stars, 90000);
    assert_eq!(seed.watchers, 0);
    assert_eq!(seed.description, "");
    assert_eq!(seed.language, "");
    assert!(!seed.is_private);
}

#[test]
fn test_login_profile_from_github_user() {
    let user: GitHubUser = serde_json::from_value(json!({
        "login": "octocat",
        "id": 1,
        "name": "The Octocat",
        "avatar_url": "https://avatars.test/octocat",
        "html_url": "https://github.com/octocat",
        "bio": null,
        "location": "San Francisco",
        "company": "@github",
        "followers": 4000,
        "following": 9
    }))
    .unwrap();

    let profile = LoginProfile::from(user);
    assert_eq!(profile.username, "octocat");
    assert_eq!(profile.profile_url.as_deref(), Some("https://github.com/octocat"));
    assert_eq!(profile.followers, 4000);
    assert!(profile.bio.is_none());
}
