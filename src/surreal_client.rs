use serde::Deserialize;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::{RecordId, Surreal};
use tracing::{debug, info};

use crate::error::{GatewayError, Result};
use crate::models::{LikeOutcome, LoginProfile, ProfileUpdate, Repo, RepoSeed, User};
use crate::pool::SurrealConnectionConfig;

const USER_TABLE: &str = "user";
const REPO_TABLE: &str = "repo";

#[derive(Clone, Debug)]
pub struct SurrealClient {
    pub db: Surreal<Any>,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

impl SurrealClient {
    /// Connect, authenticate and select the namespace and database.
    pub async fn connect(config: &SurrealConnectionConfig) -> Result<Self> {
        let db = any::connect(config.url.as_str()).await?;

        if !config.is_embedded() {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;

        info!(url = %config.url, "Connected to SurrealDB");
        Ok(Self { db })
    }

    pub async fn ping(&self) -> Result<()> {
        self.db.query("RETURN 1").await?.check()?;
        Ok(())
    }

    /// Declares the tables the gateway owns. Safe to run on every start.
    pub async fn init_schema(&self) -> Result<()> {
        self.db
            .query(
                r#"
                DEFINE TABLE IF NOT EXISTS user SCHEMALESS;
                DEFINE TABLE IF NOT EXISTS repo SCHEMALESS;
            "#,
            )
            .await?
            .check()?;
        Ok(())
    }

    pub async fn get_user(&self, username: &str) -> Result<Option<User>> {
        let user: Option<User> = self
            .db
            .select(RecordId::from((USER_TABLE, username)))
            .await?;
        Ok(user)
    }

    /// Creates the member on first login and refreshes GitHub-owned fields on
    /// every later one. Locally edited bio/company/location survive.
    pub async fn upsert_login_user(&self, profile: &LoginProfile, is_admin: bool) -> Result<User> {
        let query = r#"
            UPSERT type::thing('user', $username) SET
                username = $username,
                name = $name,
                profileUrl = $profile_url,
                avatarUrl = $avatar_url,
                bio = bio ?? $bio,
                location = location ?? $location,
                company = company ?? $company,
                followers = $followers,
                following = $following,
                likedProfiles = likedProfiles ?? [],
                likedBy = likedBy ?? [],
                starredRepos = starredRepos ?? [],
                pinnedRepos = pinnedRepos ?? [],
                followingUsers = followingUsers ?? [],
                isAdmin = $is_admin OR (isAdmin ?? false),
                createdAt = createdAt ?? time::now(),
                lastLogin = time::now(),
                lastActive = time::now()
            RETURN AFTER
        "#;

        let mut result = self
            .db
            .query(query)
            .bind(("username", profile.username.clone()))
            .bind(("name", profile.name.clone()))
            .bind(("profile_url", profile.profile_url.clone()))
            .bind(("avatar_url", profile.avatar_url.clone()))
            .bind(("bio", profile.bio.clone()))
            .bind(("location", profile.location.clone()))
            .bind(("company", profile.company.clone()))
            .bind(("followers", profile.followers))
            .bind(("following", profile.following))
            .bind(("is_admin", is_admin))
            .await?
            .check()?;

        let users: Vec<User> = result.take(0)?;
        info!(username = %profile.username, "Upserted user on login");
        users
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Internal(format!("Upsert returned no user for {}", profile.username)))
    }

    pub async fn update_profile(&self, username: &str, update: &ProfileUpdate) -> Result<Option<User>> {
        let query = r#"
            UPDATE type::thing('user', $username) SET
                bio = $bio ?? bio,
                company = $company ?? company,
                location = $location ?? location,
                pinnedRepos = $pinned_repos ?? pinnedRepos,
                lastActive = time::now()
            RETURN AFTER
        "#;

        let mut result = self
            .db
            .query(query)
            .bind(("username", username.to_string()))
            .bind(("bio", update.bio.clone()))
            .bind(("company", update.company.clone()))
            .bind(("location", update.location.clone()))
            .bind(("pinned_repos", update.pinned_repos.clone()))
            .await?
            .check()?;

        let users: Vec<User> = result.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Records that `liker` likes `target`. Membership is re-checked inside the
    /// update itself so two concurrent likes cannot both land.
    pub async fn like_profile(&self, liker: &str, target: &str) -> Result<LikeOutcome> {
        let Some(target_user) = self.get_user(target).await? else {
            return Ok(LikeOutcome::UnknownTarget);
        };
        let Some(liker_user) = self.get_user(liker).await? else {
            return Ok(LikeOutcome::UnknownLiker);
        };
        if liker_user.has_liked(&target_user.username) {
            return Ok(LikeOutcome::AlreadyLiked);
        }

        let mut result = self
            .db
            .query(
                r#"
                UPDATE type::thing('user', $liker) SET
                    likedProfiles += $target,
                    lastActive = time::now()
                WHERE $target NOTINSIDE likedProfiles
                RETURN AFTER
            "#,
            )
            .bind(("liker", liker.to_string()))
            .bind(("target", target.to_string()))
            .await?
            .check()?;

        let updated: Vec<User> = result.take(0)?;
        if updated.is_empty() {
            return Ok(LikeOutcome::AlreadyLiked);
        }

        self.db
            .query(
                r#"
                UPDATE type::thing('user', $target) SET
                    likedBy += { username: $liker, avatarUrl: $avatar_url, likedDate: time::now() }
                RETURN NONE
            "#,
            )
            .bind(("target", target.to_string()))
            .bind(("liker", liker.to_string()))
            .bind(("avatar_url", liker_user.avatar_url.clone()))
            .await?
            .check()?;

        debug!(liker, target, "Profile liked");
        Ok(LikeOutcome::Liked)
    }

    pub async fn get_repo(&self, full_name: &str) -> Result<Option<Repo>> {
        let repo: Option<Repo> = self
            .db
            .select(RecordId::from((REPO_TABLE, full_name)))
            .await?;
        Ok(repo)
    }

    /// Creates the ledger entry if it does not exist yet. Counters and
    /// membership lists of an existing entry are left alone.
    pub async fn ensure_repo(&self, seed: &RepoSeed) -> Result<()> {
        let query = r#"
            UPSERT type::thing('repo', $full_name) SET
                name = $name,
                owner = $owner,
                fullName = $full_name,
                description = $description,
                url = $url,
                language = $language,
                isPrivate = $is_private,
                stars = stars ?? $stars,
                forks = forks ?? $forks,
                watchers = watchers ?? $watchers,
                starredBy = starredBy ?? [],
                forkedBy = forkedBy ?? [],
                createdAt = createdAt ?? time::now(),
                updatedAt = time::now()
            RETURN NONE
        "#;

        self.db
            .query(query)
            .bind(("full_name", seed.full_name.clone()))
            .bind(("name", seed.name.clone()))
            .bind(("owner", seed.owner.clone()))
            .bind(("description", seed.description.clone()))
            .bind(("url", seed.url.clone()))
            .bind(("language", seed.language.clone()))
            .bind(("is_private", seed.is_private))
            .bind(("stars", seed.stars))
            .bind(("forks", seed.forks))
            .bind(("watchers", seed.watchers))
            .await?
            .check()?;

        debug!(full_name = %seed.full_name, "Ensured repo ledger entry");
        Ok(())
    }

    /// Adds the star to both the member and the repo ledger. Returns whether the
    /// repo counter moved; repeated stars are no-ops.
    pub async fn record_star(&self, username: &str, full_name: &str) -> Result<bool> {
        let query = r#"
            UPDATE type::thing('user', $username) SET
                starredRepos += $full_name
            WHERE $full_name NOTINSIDE starredRepos
            RETURN NONE;
            UPDATE type::thing('repo', $full_name) SET
                starredBy += $username,
                stars += 1,
                updatedAt = time::now()
            WHERE $username NOTINSIDE starredBy
            RETURN AFTER;
        "#;

        let mut result = self
            .db
            .query(query)
            .bind(("username", username.to_string()))
            .bind(("full_name", full_name.to_string()))
            .await?
            .check()?;

        let updated: Vec<Repo> = result.take(1)?;
        Ok(!updated.is_empty())
    }

    /// Removes the star from both sides. The counter only moves when the member
    /// was actually listed and never drops below zero.
    pub async fn record_unstar(&self, username: &str, full_name: &str) -> Result<bool> {
        let query = r#"
            UPDATE type::thing('user', $username) SET
                starredRepos -= $full_name
            WHERE $full_name INSIDE starredRepos
            RETURN NONE;
            UPDATE type::thing('repo', $full_name) SET
                starredBy -= $username,
                stars = math::max([stars - 1, 0]),
                updatedAt = time::now()
            WHERE $username INSIDE starredBy
            RETURN AFTER;
        "#;

        let mut result = self
            .db
            .query(query)
            .bind(("username", username.to_string()))
            .bind(("full_name", full_name.to_string()))
            .await?
            .check()?;

        let updated: Vec<Repo> = result.take(1)?;
        Ok(!updated.is_empty())
    }

    pub async fn record_fork(&self, username: &str, full_name: &str) -> Result<bool> {
        let query = r#"
            UPDATE type::thing('repo', $full_name) SET
                forkedBy += $username,
                forks += 1,
                updatedAt = time::now()
            WHERE $username NOTINSIDE forkedBy
            RETURN AFTER
        "#;

        let mut result = self
            .db
            .query(query)
            .bind(("username", username.to_string()))
            .bind(("full_name", full_name.to_string()))
            .await?
            .check()?;

        let updated: Vec<Repo> = result.take(0)?;
        Ok(!updated.is_empty())
    }

    pub async fn record_follow(&self, username: &str, target: &str) -> Result<bool> {
        let query = r#"
            UPDATE type::thing('user', $username) SET
                followingUsers += $target,
                lastActive = time::now()
            WHERE $target NOTINSIDE followingUsers
            RETURN AFTER
        "#;

        let mut result = self
            .db
            .query(query)
            .bind(("username", username.to_string()))
            .bind(("target", target.to_string()))
            .await?
            .check()?;

        let updated: Vec<User> = result.take(0)?;
        Ok(!updated.is_empty())
    }

    pub async fn record_unfollow(&self, username: &str, target: &str) -> Result<bool> {
        let query = r#"
            UPDATE type::thing('user', $username) SET
                followingUsers -= $target,
                lastActive = time::now()
            WHERE $target INSIDE followingUsers
            RETURN AFTER
        "#;

        let mut result = self
            .db
            .query(query)
            .bind(("username", username.to_string()))
            .bind(("target", target.to_string()))
            .await?
            .check()?;

        let updated: Vec<User> = result.take(0)?;
        Ok(!updated.is_empty())
    }

    pub async fn count_users(&self) -> Result<u64> {
        self.count(USER_TABLE).await
    }

    pub async fn count_repos(&self) -> Result<u64> {
        self.count(REPO_TABLE).await
    }

    async fn count(&self, table: &'static str) -> Result<u64> {
        let mut result = self
            .db
            .query("SELECT count() FROM type::table($table) GROUP ALL")
            .bind(("table", table))
            .await?
            .check()?;

        let row: Option<CountRow> = result.take(0)?;
        Ok(row.map(|r| r.count).unwrap_or(0))
    }
}
