//! Validating and submitting new posts.

use thiserror::Error;

use crate::db::models::Post;
use crate::error::AppError;
use crate::media::{ImageUpload, MediaError};
use crate::realtime::{ChangeEvent, ChangeKind};
use crate::state::AppState;

pub const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("Post cannot be empty")]
    EmptyPost,

    #[error("Post must be {max} characters or less")]
    ContentTooLong { max: usize },

    #[error("Please select an image file")]
    UnsupportedMediaType(String),

    #[error("Image must be less than {}", human_size(.limit))]
    ImageTooLarge { size: usize, limit: usize },

    #[error("Failed to create post")]
    Failed,
}

/// `5242880` reads as `5MB`; sizes that are not whole units stay in bytes.
fn human_size(bytes: &usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * 1024;
    match *bytes {
        b if b >= MB && b % MB == 0 => format!("{}MB", b / MB),
        b if b >= KB && b % KB == 0 => format!("{}KB", b / KB),
        b => format!("{} bytes", b),
    }
}

impl From<MediaError> for ComposeError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::UnsupportedType(mime) => ComposeError::UnsupportedMediaType(mime),
            MediaError::TooLarge { size, limit } => ComposeError::ImageTooLarge { size, limit },
            MediaError::MalformedDataUrl => {
                ComposeError::UnsupportedMediaType("invalid data URL".into())
            }
        }
    }
}

impl From<ComposeError> for AppError {
    fn from(e: ComposeError) -> Self {
        match e {
            ComposeError::Failed => AppError::Internal(e.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

/// What the composer form submits.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub content: String,
    pub image: Option<ImageUpload>,
}

/// A draft that passed validation. The image is not yet encoded.
#[derive(Debug)]
pub struct ValidDraft {
    pub content: String,
    pub image: Option<(String, ImageUpload)>,
}

impl PostDraft {
    /// Check the draft without touching storage.
    pub fn validate(self, max_image_bytes: usize) -> Result<ValidDraft, ComposeError> {
        let content = self.content.trim().to_string();
        let image = self.image.filter(|img| !img.is_empty());

        if content.is_empty() && image.is_none() {
            return Err(ComposeError::EmptyPost);
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(ComposeError::ContentTooLong {
                max: MAX_CONTENT_CHARS,
            });
        }

        let image = match image {
            Some(img) => {
                let mime = img.validate(max_image_bytes)?;
                Some((mime, img))
            }
            None => None,
        };

        Ok(ValidDraft { content, image })
    }
}

/// Create a post for `user_id`. The author's profile is bootstrapped first;
/// the post row is written in a single transaction.
pub async fn submit(
    state: &AppState,
    user_id: &str,
    email: &str,
    draft: PostDraft,
) -> Result<Post, ComposeError> {
    let draft = draft.validate(state.config.media.max_image_bytes)?;

    // Posting must not be blocked by a failed bootstrap
    let outcome = state.profiles.ensure_profile(user_id, email).await;
    tracing::debug!("Bootstrap before post for {}: {:?}", user_id, outcome);

    let media_url = draft
        .image
        .as_ref()
        .map(|(mime, img)| crate::media::encode_data_url(mime, &img.bytes));

    let post = insert_in_transaction(state, user_id, &draft.content, media_url.as_deref())
        .map_err(|e| {
            tracing::error!("Error creating post for {}: {}", user_id, e);
            ComposeError::Failed
        })?;

    tracing::info!("User {} created post {}", user_id, post.id);
    state
        .changes
        .publish(ChangeEvent::post(ChangeKind::Insert, &post.id));
    Ok(post)
}

fn insert_in_transaction(
    state: &AppState,
    user_id: &str,
    content: &str,
    media_url: Option<&str>,
) -> Result<Post, AppError> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;
    let post = crate::posts::insert_post(&tx, user_id, content, media_url)?;
    tx.commit()?;
    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(mime: &str, len: usize) -> ImageUpload {
        ImageUpload {
            file_name: Some("pic".into()),
            content_type: Some(mime.into()),
            bytes: vec![1u8; len],
        }
    }

    #[test]
    fn empty_draft_is_rejected() {
        let draft = PostDraft {
            content: "   ".into(),
            image: None,
        };
        assert_eq!(draft.validate(100).unwrap_err(), ComposeError::EmptyPost);
    }

    #[test]
    fn empty_file_counts_as_no_image() {
        let draft = PostDraft {
            content: String::new(),
            image: Some(image("image/png", 0)),
        };
        assert_eq!(draft.validate(100).unwrap_err(), ComposeError::EmptyPost);
    }

    #[test]
    fn image_only_post_is_valid() {
        let draft = PostDraft {
            content: String::new(),
            image: Some(image("image/png", 10)),
        };
        let valid = draft.validate(100).unwrap();
        assert!(valid.content.is_empty());
        assert_eq!(valid.image.unwrap().0, "image/png");
    }

    #[test]
    fn oversized_and_wrong_type_images_are_rejected() {
        let big = PostDraft {
            content: "hi".into(),
            image: Some(image("image/png", 100)),
        };
        assert_eq!(
            big.validate(100).unwrap_err(),
            ComposeError::ImageTooLarge {
                size: 100,
                limit: 100
            }
        );

        let pdf = PostDraft {
            content: "hi".into(),
            image: Some(image("application/pdf", 10)),
        };
        assert!(matches!(
            pdf.validate(100),
            Err(ComposeError::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn long_content_is_rejected() {
        let draft = PostDraft {
            content: "x".repeat(MAX_CONTENT_CHARS + 1),
            image: None,
        };
        let err = draft.validate(100).unwrap_err();
        assert_eq!(err, ComposeError::ContentTooLong { max: 2000 });
        assert_eq!(err.to_string(), "Post must be 2000 characters or less");
    }

    #[test]
    fn image_limit_message_follows_configured_limit() {
        let too_big = |limit| ComposeError::ImageTooLarge { size: limit, limit };
        assert_eq!(
            too_big(5 * 1024 * 1024).to_string(),
            "Image must be less than 5MB"
        );
        assert_eq!(
            too_big(1024 * 1024).to_string(),
            "Image must be less than 1MB"
        );
        assert_eq!(too_big(512 * 1024).to_string(), "Image must be less than 512KB");
        assert_eq!(too_big(100).to_string(), "Image must be less than 100 bytes");

        let draft = PostDraft {
            content: "hi".into(),
            image: Some(image("image/png", 2048)),
        };
        assert_eq!(
            draft.validate(1024).unwrap_err().to_string(),
            "Image must be less than 1KB"
        );
    }

    #[test]
    fn content_is_trimmed() {
        let draft = PostDraft {
            content: "  hello \n".into(),
            image: None,
        };
        assert_eq!(draft.validate(100).unwrap().content, "hello");
    }

    #[test]
    fn failure_maps_to_internal_error() {
        assert!(matches!(
            AppError::from(ComposeError::Failed),
            AppError::Internal(_)
        ));
        assert!(matches!(
            AppError::from(ComposeError::EmptyPost),
            AppError::BadRequest(_)
        ));
    }
}
