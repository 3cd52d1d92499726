use async_graphql::*;

use crate::graphql::types::{CommentNode, DiagnosticsNode, PostNode, ProfileNode};
use crate::graphql::{app_error, viewer};

/// GraphQL Query root
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The signed-in user's profile, from the database or the shadow store
    async fn me(&self, ctx: &Context<'_>) -> Result<Option<ProfileNode>> {
        let (state, user) = viewer(ctx)?;
        let view = state.profiles.view(&user.id).await.map_err(app_error)?;
        Ok(view.map(ProfileNode::from))
    }

    /// Every post, newest first
    async fn feed(&self, ctx: &Context<'_>) -> Result<Vec<PostNode>> {
        let (state, user) = viewer(ctx)?;
        let conn = state.db.get().map_err(app_error)?;
        let items = crate::feed::load_feed(&conn).map_err(app_error)?;
        Ok(items
            .into_iter()
            .map(|item| PostNode::from_item(item, &user.id))
            .collect())
    }

    async fn post(&self, ctx: &Context<'_>, id: ID) -> Result<Option<PostNode>> {
        let (state, user) = viewer(ctx)?;
        let conn = state.db.get().map_err(app_error)?;
        let item = crate::feed::load_post(&conn, &id).map_err(app_error)?;
        Ok(item.map(|item| PostNode::from_item(item, &user.id)))
    }

    /// Comments on a post, oldest first
    async fn comments(&self, ctx: &Context<'_>, post_id: ID) -> Result<Vec<CommentNode>> {
        let (state, _) = viewer(ctx)?;
        let conn = state.db.get().map_err(app_error)?;
        let thread = crate::comments::list(&conn, &post_id).map_err(app_error)?;
        Ok(thread.into_iter().map(CommentNode::from).collect())
    }

    async fn profile(&self, ctx: &Context<'_>, id: ID) -> Result<Option<ProfileNode>> {
        let (state, _) = viewer(ctx)?;
        let view = state.profiles.view(&id).await.map_err(app_error)?;
        Ok(view.map(ProfileNode::from))
    }

    /// Profile bootstrap state for the signed-in user
    async fn diagnostics(&self, ctx: &Context<'_>) -> Result<DiagnosticsNode> {
        let (state, user) = viewer(ctx)?;
        let diagnostics = crate::diagnostics::collect(state, &user.id)
            .await
            .map_err(app_error)?;
        Ok(diagnostics.into())
    }
}
