use serde::Serialize;

use crate::db::models::Profile;
use crate::error::{AppError, AppResult};
use crate::media;
use crate::profiles::repository::{ProfileChanges, RepositoryError};
use crate::profiles::ProfileService;
use crate::realtime::{ChangeEvent, ChangeKind};

const MAX_USERNAME_LEN: usize = 64;
const MAX_FULL_NAME_LEN: usize = 100;
const MAX_BIO_LEN: usize = 500;
const MAX_AVATAR_URL_LEN: usize = 2048;

/// Where a viewed profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSource {
    Database,
    Shadow,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub profile: Profile,
    pub source: ProfileSource,
}

/// Usernames are handles: non-empty, no whitespace, no `/` or `@`.
pub fn validate_username(raw: &str) -> Result<String, String> {
    let username = raw.trim();
    if username.is_empty() {
        return Err("Username is required".into());
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(format!(
            "Username must be {} characters or less",
            MAX_USERNAME_LEN
        ));
    }
    if username
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '@')
    {
        return Err("Username cannot contain spaces, '/' or '@'".into());
    }
    Ok(username.to_string())
}

fn validate_text(value: &Option<String>, field: &str, max: usize) -> AppResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) => {
            let trimmed = v.trim();
            if trimmed.chars().count() > max {
                return Err(AppError::BadRequest(format!(
                    "{} must be {} characters or less",
                    field, max
                )));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

/// An avatar is cleared with an empty string, linked by http(s) URL, or
/// inlined as an image data URL under `max_avatar_bytes`.
pub fn validate_avatar_url(raw: &str, max_avatar_bytes: usize) -> AppResult<String> {
    let url = raw.trim();
    if url.is_empty() {
        return Ok(String::new());
    }
    if media::is_data_url(url) {
        media::check_data_url(url, max_avatar_bytes)
            .map_err(|e| AppError::BadRequest(format!("Invalid avatar: {}", e)))?;
        return Ok(url.to_string());
    }
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(AppError::BadRequest(
            "Avatar must be an http(s) URL or an image".into(),
        ));
    }
    if url.len() > MAX_AVATAR_URL_LEN {
        return Err(AppError::BadRequest(format!(
            "Avatar URL must be {} characters or less",
            MAX_AVATAR_URL_LEN
        )));
    }
    Ok(url.to_string())
}

/// Validate and normalise user-supplied changes.
pub fn validate_changes(
    changes: &ProfileChanges,
    max_avatar_bytes: usize,
) -> AppResult<ProfileChanges> {
    let username = match &changes.username {
        Some(raw) => Some(validate_username(raw).map_err(AppError::BadRequest)?),
        None => None,
    };
    Ok(ProfileChanges {
        username,
        full_name: validate_text(&changes.full_name, "Full name", MAX_FULL_NAME_LEN)?,
        bio: validate_text(&changes.bio, "Bio", MAX_BIO_LEN)?,
        avatar_url: changes
            .avatar_url
            .as_deref()
            .map(|raw| validate_avatar_url(raw, max_avatar_bytes))
            .transpose()?,
    })
}

impl ProfileService {
    /// The stored profile, else the shadow record, else `None`.
    pub async fn view(&self, user_id: &str) -> AppResult<Option<ProfileView>> {
        match self.repo.find(user_id).await {
            Ok(Some(profile)) => {
                return Ok(Some(ProfileView {
                    profile,
                    source: ProfileSource::Database,
                }))
            }
            Ok(None) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(AppError::Internal(e.to_string())),
        }

        match self.shadow.read(user_id) {
            Ok(Some(profile)) => Ok(Some(ProfileView {
                profile,
                source: ProfileSource::Shadow,
            })),
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::error!("Error reading shadow record for {}: {}", user_id, e);
                Ok(None)
            }
        }
    }

    /// Update the caller's own profile. If the database refuses the write,
    /// an existing shadow record is patched and the error still reported.
    pub async fn update(&self, user_id: &str, changes: &ProfileChanges) -> AppResult<ProfileView> {
        let changes = validate_changes(changes, self.max_avatar_bytes)?;
        if changes.is_empty() {
            return self.view(user_id).await?.ok_or(AppError::NotFound);
        }

        let err = match self.repo.update(user_id, &changes).await {
            Ok(Some(profile)) => {
                self.changes
                    .publish(ChangeEvent::profile(ChangeKind::Update, user_id));
                return Ok(ProfileView {
                    profile,
                    source: ProfileSource::Database,
                });
            }
            Ok(None) => None,
            Err(e) => Some(e),
        };

        let patched = match self.shadow.patch(user_id, &changes) {
            Ok(patched) => patched,
            Err(e) => {
                tracing::error!("Error patching shadow record for {}: {}", user_id, e);
                None
            }
        };

        match (err, patched) {
            (Some(RepositoryError::Conflict(msg)), _) => Err(AppError::Conflict(msg)),
            (Some(e), _) => {
                tracing::error!("Error updating profile {}: {}", user_id, e);
                Err(AppError::Internal(e.to_string()))
            }
            (None, Some(profile)) => Ok(ProfileView {
                profile,
                source: ProfileSource::Shadow,
            }),
            (None, None) => Err(AppError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::profiles::{ShadowStore, SqliteProfileRepository};
    use crate::realtime::ChangeBus;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service(tmp: &TempDir) -> ProfileService {
        let pool = db::create_pool(&tmp.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        pool.get()
            .unwrap()
            .execute_batch(
                "INSERT INTO users (id, email, password_hash) VALUES ('u1', 'a@x.com', 'h');
                 INSERT INTO users (id, email, password_hash) VALUES ('u2', 'b@x.com', 'h');",
            )
            .unwrap();
        ProfileService::new(
            Arc::new(SqliteProfileRepository::new(pool)),
            ShadowStore::new(tmp.path().join("shadow")),
            ChangeBus::new(),
        )
    }

    #[test]
    fn username_rules() {
        assert_eq!(validate_username("  ada ").unwrap(), "ada");
        assert!(validate_username("").is_err());
        assert!(validate_username("a b").is_err());
        assert!(validate_username("a@b").is_err());
        assert!(validate_username(&"x".repeat(65)).is_err());
        assert!(validate_username("jane.doe+tag").is_ok());
    }

    #[test]
    fn bio_length_is_capped() {
        let changes = ProfileChanges {
            bio: Some("x".repeat(501)),
            ..Default::default()
        };
        assert!(matches!(
            validate_changes(&changes, 1024),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn avatar_accepts_links_images_and_clearing() {
        assert_eq!(validate_avatar_url("  ", 1024).unwrap(), "");
        assert_eq!(
            validate_avatar_url(" https://img.example/a.png ", 1024).unwrap(),
            "https://img.example/a.png"
        );
        let inline = media::encode_data_url("image/png", &[1u8; 16]);
        assert_eq!(validate_avatar_url(&inline, 1024).unwrap(), inline);
    }

    #[test]
    fn avatar_rejects_non_image_data_url() {
        let html = media::encode_data_url("text/html", b"<script></script>");
        assert!(matches!(
            validate_avatar_url(&html, 1024),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn avatar_rejects_oversized_data_url() {
        let big = media::encode_data_url("image/png", &vec![0u8; 2048]);
        assert!(matches!(
            validate_avatar_url(&big, 1024),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn avatar_rejects_other_schemes_and_long_urls() {
        for raw in ["javascript:alert(1)", "ftp://host/a.png", "not a url"] {
            assert!(
                matches!(validate_avatar_url(raw, 1024), Err(AppError::BadRequest(_))),
                "accepted {raw}"
            );
        }
        let long = format!("https://img.example/{}", "x".repeat(MAX_AVATAR_URL_LEN));
        assert!(matches!(
            validate_avatar_url(&long, 1024),
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn update_rejects_oversized_avatar_without_writing() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp).with_avatar_limit(1024);
        service.ensure_profile("u1", "a@x.com").await;

        let changes = ProfileChanges {
            avatar_url: Some(media::encode_data_url("text/html", &vec![0u8; 4096])),
            ..Default::default()
        };
        let err = service.update("u1", &changes).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let stored = service.view("u1").await.unwrap().unwrap();
        assert!(stored.profile.avatar_url.is_none());
    }

    #[tokio::test]
    async fn view_prefers_database_then_shadow() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp);
        assert!(service.view("u1").await.unwrap().is_none());

        service.ensure_profile("u1", "a@x.com").await;
        let view = service.view("u1").await.unwrap().unwrap();
        assert_eq!(view.source, ProfileSource::Database);

        let shadow = Profile {
            id: "u2".into(),
            username: "b".into(),
            full_name: None,
            avatar_url: None,
            bio: None,
            created_at: "2025-01-15 12:00:00".into(),
            updated_at: None,
        };
        service.shadow().write(&shadow).unwrap();
        let view = service.view("u2").await.unwrap().unwrap();
        assert_eq!(view.source, ProfileSource::Shadow);
        assert_eq!(view.profile.username, "b");
    }

    #[tokio::test]
    async fn update_writes_database_row() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp);
        service.ensure_profile("u1", "a@x.com").await;

        let view = service
            .update(
                "u1",
                &ProfileChanges {
                    username: Some(" ada ".into()),
                    bio: Some("hello".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view.source, ProfileSource::Database);
        assert_eq!(view.profile.username, "ada");
        assert_eq!(view.profile.bio.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn update_to_taken_username_conflicts() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp);
        service.ensure_profile("u1", "a@x.com").await;
        service.ensure_profile("u2", "b@x.com").await;

        let err = service
            .update("u2", &ProfileChanges::username("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_without_row_patches_shadow() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp);
        let shadow = Profile {
            id: "u2".into(),
            username: "b".into(),
            full_name: None,
            avatar_url: None,
            bio: None,
            created_at: "2025-01-15 12:00:00".into(),
            updated_at: None,
        };
        service.shadow().write(&shadow).unwrap();

        let view = service
            .update("u2", &ProfileChanges::username("bee"))
            .await
            .unwrap();
        assert_eq!(view.source, ProfileSource::Shadow);
        assert_eq!(service.shadow().read("u2").unwrap().unwrap().username, "bee");
    }

    #[tokio::test]
    async fn update_with_no_profile_anywhere_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp);
        let err = service
            .update("u1", &ProfileChanges::username("zed"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}
