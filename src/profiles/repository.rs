// Repository pattern - isolates profile persistence
use async_trait::async_trait;
use rusqlite::{params, ErrorCode, OptionalExtension, TransactionBehavior};
use thiserror::Error;

use crate::db::models::Profile;
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Both encodings of "no such row" count as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepositoryError::NotFound(_) | RepositoryError::Sql(rusqlite::Error::QueryReturnedNoRows)
        )
    }

    fn from_write(err: rusqlite::Error, what: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
                RepositoryError::Conflict(what.to_string())
            }
            _ => RepositoryError::Sql(err),
        }
    }
}

/// A partial profile update. `None` leaves a field untouched; an empty
/// string clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileChanges {
    pub fn username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.full_name.is_none()
            && self.bio.is_none()
            && self.avatar_url.is_none()
    }

    /// Apply the changes to an in-memory profile, with the same clearing rules as the database.
    pub fn apply_to(&self, profile: &mut Profile) {
        fn merge(field: &mut Option<String>, change: &Option<String>) {
            if let Some(value) = change {
                *field = if value.is_empty() {
                    None
                } else {
                    Some(value.clone())
                };
            }
        }

        if let Some(username) = &self.username {
            profile.username = username.clone();
        }
        merge(&mut profile.full_name, &self.full_name);
        merge(&mut profile.bio, &self.bio);
        merge(&mut profile.avatar_url, &self.avatar_url);
        profile.updated_at = Some(crate::db::now_timestamp());
    }
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find(&self, id: &str) -> Result<Option<Profile>, RepositoryError>;

    /// Insert unless a profile with this id exists. Returns whether a row was written.
    async fn insert(&self, profile: &Profile) -> Result<bool, RepositoryError>;

    /// Returns the updated profile, or `None` when no row has this id.
    async fn update(
        &self,
        id: &str,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>, RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}

pub struct SqliteProfileRepository {
    pool: DbPool,
}

impl SqliteProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_PROFILE: &str =
    "SELECT id, username, full_name, avatar_url, bio, created_at, updated_at FROM profiles";

#[async_trait]
impl ProfileRepository for SqliteProfileRepository {
    async fn find(&self, id: &str) -> Result<Option<Profile>, RepositoryError> {
        let conn = self.pool.get()?;
        let profile = conn
            .query_row(
                &format!("{SELECT_PROFILE} WHERE id = ?1"),
                params![id],
                Profile::from_row,
            )
            .optional()?;
        Ok(profile)
    }

    async fn insert(&self, profile: &Profile) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.get()?;
        // IMMEDIATE serializes concurrent bootstraps for the same user
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM profiles WHERE id = ?1",
            params![profile.id],
            |row| row.get(0),
        )?;
        if exists {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO profiles (id, username, full_name, avatar_url, bio, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, COALESCE(?7, ?6))",
            params![
                profile.id,
                profile.username,
                profile.full_name,
                profile.avatar_url,
                profile.bio,
                profile.created_at,
                profile.updated_at,
            ],
        )
        .map_err(|e| {
            RepositoryError::from_write(e, &format!("username '{}' is taken", profile.username))
        })?;

        tx.commit()?;
        Ok(true)
    }

    async fn update(
        &self,
        id: &str,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE profiles SET
                   username = COALESCE(?2, username),
                   full_name = CASE WHEN ?3 IS NULL THEN full_name ELSE NULLIF(?3, '') END,
                   bio = CASE WHEN ?4 IS NULL THEN bio ELSE NULLIF(?4, '') END,
                   avatar_url = CASE WHEN ?5 IS NULL THEN avatar_url ELSE NULLIF(?5, '') END,
                   updated_at = datetime('now')
                 WHERE id = ?1",
                params![
                    id,
                    changes.username,
                    changes.full_name,
                    changes.bio,
                    changes.avatar_url,
                ],
            )
            .map_err(|e| {
                RepositoryError::from_write(
                    e,
                    &format!(
                        "username '{}' is taken",
                        changes.username.as_deref().unwrap_or_default()
                    ),
                )
            })?;

        if rows == 0 {
            return Ok(None);
        }

        let profile = conn.query_row(
            &format!("{SELECT_PROFILE} WHERE id = ?1"),
            params![id],
            Profile::from_row,
        )?;
        Ok(Some(profile))
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let conn = self.pool.get()?;
        let count = conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::TempDir;

    fn create_test_repo() -> (SqliteProfileRepository, DbPool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = db::create_pool(&temp_dir.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, email, password_hash) VALUES ('u1', 'a@x.com', 'h');
             INSERT INTO users (id, email, password_hash) VALUES ('u2', 'b@x.com', 'h');",
        )
        .unwrap();
        (SqliteProfileRepository::new(pool.clone()), pool, temp_dir)
    }

    fn profile(id: &str, username: &str) -> Profile {
        Profile {
            id: id.to_string(),
            username: username.to_string(),
            full_name: None,
            avatar_url: None,
            bio: None,
            created_at: "2025-01-15 12:00:00".to_string(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let (repo, _pool, _tmp) = create_test_repo();
        assert!(repo.find("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_then_find() {
        let (repo, _pool, _tmp) = create_test_repo();
        assert!(repo.insert(&profile("u1", "a")).await.unwrap());

        let found = repo.find("u1").await.unwrap().unwrap();
        assert_eq!(found.username, "a");
        assert_eq!(found.updated_at.as_deref(), Some("2025-01-15 12:00:00"));
    }

    #[tokio::test]
    async fn insert_is_noop_when_row_exists() {
        let (repo, _pool, _tmp) = create_test_repo();
        assert!(repo.insert(&profile("u1", "a")).await.unwrap());
        assert!(!repo.insert(&profile("u1", "other")).await.unwrap());
        assert_eq!(repo.find("u1").await.unwrap().unwrap().username, "a");
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let (repo, _pool, _tmp) = create_test_repo();
        repo.insert(&profile("u1", "a")).await.unwrap();
        let err = repo.insert(&profile("u2", "a")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_sets_and_clears_fields() {
        let (repo, _pool, _tmp) = create_test_repo();
        repo.insert(&profile("u1", "a")).await.unwrap();

        let changes = ProfileChanges {
            bio: Some("hello".into()),
            full_name: Some("Ada".into()),
            ..Default::default()
        };
        let updated = repo.update("u1", &changes).await.unwrap().unwrap();
        assert_eq!(updated.bio.as_deref(), Some("hello"));
        assert_eq!(updated.full_name.as_deref(), Some("Ada"));
        assert_eq!(updated.username, "a");

        let cleared = repo
            .update(
                "u1",
                &ProfileChanges {
                    bio: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(cleared.bio.is_none());
        assert_eq!(cleared.full_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn update_missing_row_returns_none() {
        let (repo, _pool, _tmp) = create_test_repo();
        let result = repo
            .update("u1", &ProfileChanges::username("zed"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn count_profiles() {
        let (repo, _pool, _tmp) = create_test_repo();
        repo.insert(&profile("u1", "a")).await.unwrap();
        repo.insert(&profile("u2", "b")).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[test]
    fn changes_apply_to_in_memory_profile() {
        let mut p = profile("u1", "a");
        p.bio = Some("old".into());
        ProfileChanges {
            username: Some("b".into()),
            bio: Some(String::new()),
            ..Default::default()
        }
        .apply_to(&mut p);
        assert_eq!(p.username, "b");
        assert!(p.bio.is_none());
        assert!(p.updated_at.is_some());
    }

    #[test]
    fn not_found_has_two_encodings() {
        assert!(RepositoryError::NotFound("u1".into()).is_not_found());
        assert!(RepositoryError::Sql(rusqlite::Error::QueryReturnedNoRows).is_not_found());
        assert!(!RepositoryError::Conflict("x".into()).is_not_found());
    }
}
