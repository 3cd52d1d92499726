use async_graphql::*;

use crate::error::AppError;
use crate::graphql::types::{BootstrapResult, CommentNode, LikeNode, ProfileNode, UpdateProfileInput};
use crate::graphql::{app_error, viewer};
use crate::likes::LikeState;
use crate::posts::DeleteOutcome;
use crate::profiles::ProfileChanges;
use crate::realtime::{ChangeEvent, ChangeKind};

/// GraphQL Mutation root
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn add_comment(&self, ctx: &Context<'_>, post_id: ID, content: String) -> Result<CommentNode> {
        let (state, user) = viewer(ctx)?;
        let conn = state.db.get().map_err(app_error)?;
        let comment = crate::comments::add(&conn, &post_id, &user.id, &content).map_err(app_error)?;
        state.changes.publish(ChangeEvent::comment(
            ChangeKind::Insert,
            &comment.id,
            &comment.post_id,
        ));

        let authors = crate::feed::resolve_authors(&conn, [user.id.as_str()]).map_err(app_error)?;
        Ok(CommentNode::from(crate::comments::ThreadComment {
            author: crate::feed::author_or_placeholder(&authors, &user.id),
            comment,
        }))
    }

    /// Delete one of your own comments. Returns false when nothing matched.
    async fn delete_comment(&self, ctx: &Context<'_>, id: ID) -> Result<bool> {
        let (state, user) = viewer(ctx)?;
        let conn = state.db.get().map_err(app_error)?;
        match crate::comments::delete(&conn, &id, &user.id).map_err(app_error)? {
            Some(post_id) => {
                state
                    .changes
                    .publish(ChangeEvent::comment(ChangeKind::Delete, &id, &post_id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn toggle_like(&self, ctx: &Context<'_>, post_id: ID) -> Result<LikeNode> {
        let (state, user) = viewer(ctx)?;
        let conn = state.db.get().map_err(app_error)?;
        let item = crate::feed::load_post(&conn, &post_id)
            .map_err(app_error)?
            .ok_or_else(|| app_error(AppError::NotFound))?;

        let mut like = LikeState::seed(&item, &user.id);
        let kind = like.toggle(&conn, &post_id, &user.id).map_err(app_error)?;
        state
            .changes
            .publish(ChangeEvent::like(kind, &user.id, &post_id));
        Ok(LikeNode::new(&post_id, like))
    }

    async fn delete_post(&self, ctx: &Context<'_>, id: ID) -> Result<bool> {
        let (state, user) = viewer(ctx)?;
        let conn = state.db.get().map_err(app_error)?;
        match crate::posts::delete_post(&conn, &id, &user.id).map_err(app_error)? {
            DeleteOutcome::Deleted => {
                state
                    .changes
                    .publish(ChangeEvent::post(ChangeKind::Delete, &id));
                Ok(true)
            }
            DeleteOutcome::NotFound => Ok(false),
            DeleteOutcome::NotOwner => Err(app_error(AppError::Forbidden)),
        }
    }

    /// Edit the signed-in user's profile
    async fn update_profile(&self, ctx: &Context<'_>, input: UpdateProfileInput) -> Result<ProfileNode> {
        let (state, user) = viewer(ctx)?;
        let changes = ProfileChanges {
            username: input.username,
            full_name: input.full_name,
            bio: input.bio,
            avatar_url: input.avatar_url,
        };
        let view = state
            .profiles
            .update(&user.id, &changes)
            .await
            .map_err(app_error)?;
        Ok(view.into())
    }

    /// Run profile bootstrap for the signed-in user
    async fn ensure_profile(&self, ctx: &Context<'_>) -> Result<BootstrapResult> {
        let (state, user) = viewer(ctx)?;
        let outcome = state.profiles.ensure_profile(&user.id, &user.email).await;
        Ok(outcome.into())
    }
}
