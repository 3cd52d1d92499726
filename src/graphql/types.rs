use async_graphql::*;

use crate::comments::ThreadComment;
use crate::db::models::{Author, Profile};
use crate::diagnostics::Diagnostics;
use crate::feed::FeedItem;
use crate::likes::LikeState;
use crate::profiles::{BootstrapOutcome, ProfileSource, ProfileView};

/// A user's public profile
#[derive(Clone, Debug, SimpleObject)]
pub struct ProfileNode {
    pub id: ID,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
    /// Where the profile was read from
    pub source: ProfileOrigin,
}

#[derive(Clone, Copy, Debug, Enum, Eq, PartialEq)]
pub enum ProfileOrigin {
    Database,
    Shadow,
}

impl From<ProfileSource> for ProfileOrigin {
    fn from(source: ProfileSource) -> Self {
        match source {
            ProfileSource::Database => ProfileOrigin::Database,
            ProfileSource::Shadow => ProfileOrigin::Shadow,
        }
    }
}

impl ProfileNode {
    pub fn new(profile: Profile, source: ProfileSource) -> Self {
        Self {
            id: ID(profile.id),
            username: profile.username,
            full_name: profile.full_name,
            avatar_url: profile.avatar_url,
            bio: profile.bio,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
            source: source.into(),
        }
    }
}

impl From<ProfileView> for ProfileNode {
    fn from(view: ProfileView) -> Self {
        Self::new(view.profile, view.source)
    }
}

/// Author shown next to posts and comments
#[derive(Clone, Debug, SimpleObject)]
pub struct AuthorNode {
    pub id: ID,
    pub username: String,
    pub avatar_url: Option<String>,
    /// True when the author has no profile row
    pub is_placeholder: bool,
}

impl From<Author> for AuthorNode {
    fn from(author: Author) -> Self {
        Self {
            is_placeholder: author.is_placeholder(),
            id: ID(author.id),
            username: author.username,
            avatar_url: author.avatar_url,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct PostNode {
    pub id: ID,
    pub user_id: ID,
    pub content: String,
    /// Inline `data:` URL for an attached image
    pub media_url: Option<String>,
    pub created_at: String,
    pub author: AuthorNode,
    pub like_user_ids: Vec<ID>,
    pub comment_ids: Vec<ID>,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked_by_me: bool,
}

impl PostNode {
    pub fn from_item(item: FeedItem, viewer_id: &str) -> Self {
        let like_count = item.like_count();
        let comment_count = item.comment_count();
        let liked_by_me = item.liked_by(viewer_id);
        Self {
            id: ID(item.post.id),
            user_id: ID(item.post.user_id),
            content: item.post.content,
            media_url: item.post.media_url,
            created_at: item.post.created_at,
            author: item.author.into(),
            like_user_ids: item.like_user_ids.into_iter().map(ID).collect(),
            comment_ids: item.comment_ids.into_iter().map(ID).collect(),
            like_count,
            comment_count,
            liked_by_me,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct CommentNode {
    pub id: ID,
    pub post_id: ID,
    pub user_id: ID,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    pub author: AuthorNode,
}

impl From<ThreadComment> for CommentNode {
    fn from(tc: ThreadComment) -> Self {
        Self {
            id: ID(tc.comment.id),
            post_id: ID(tc.comment.post_id),
            user_id: ID(tc.comment.user_id),
            content: tc.comment.content,
            created_at: tc.comment.created_at,
            updated_at: tc.comment.updated_at,
            author: tc.author.into(),
        }
    }
}

/// Like state after a toggle
#[derive(Clone, Debug, SimpleObject)]
pub struct LikeNode {
    pub post_id: ID,
    pub liked: bool,
    pub count: i64,
}

impl LikeNode {
    pub fn new(post_id: &str, state: LikeState) -> Self {
        Self {
            post_id: ID(post_id.to_string()),
            liked: state.liked,
            count: state.count,
        }
    }
}

#[derive(Clone, Copy, Debug, Enum, Eq, PartialEq)]
pub enum Bootstrap {
    Existing,
    Created,
    Restored,
    Shadowed,
    Failed,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct BootstrapResult {
    pub outcome: Bootstrap,
    /// The profile written by this run, if any
    pub profile: Option<ProfileNode>,
}

impl From<BootstrapOutcome> for BootstrapResult {
    fn from(outcome: BootstrapOutcome) -> Self {
        let kind = match &outcome {
            BootstrapOutcome::Existing => Bootstrap::Existing,
            BootstrapOutcome::Created(_) => Bootstrap::Created,
            BootstrapOutcome::Restored(_) => Bootstrap::Restored,
            BootstrapOutcome::Shadowed(_) => Bootstrap::Shadowed,
            BootstrapOutcome::Failed => Bootstrap::Failed,
        };
        let source = if kind == Bootstrap::Shadowed {
            ProfileSource::Shadow
        } else {
            ProfileSource::Database
        };
        Self {
            outcome: kind,
            profile: outcome
                .profile()
                .cloned()
                .map(|p| ProfileNode::new(p, source)),
        }
    }
}

/// Fields accepted by `updateProfile`. An empty string clears a field.
#[derive(Clone, Debug, Default, InputObject)]
pub struct UpdateProfileInput {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct DiagnosticsNode {
    pub profile_count: i64,
    pub profile: Option<ProfileNode>,
    pub shadow_record: Option<ProfileNode>,
    pub shadow_records: Vec<ProfileNode>,
    pub change_subscribers: i64,
}

impl From<Diagnostics> for DiagnosticsNode {
    fn from(d: Diagnostics) -> Self {
        let shadow = |p: Profile| ProfileNode::new(p, ProfileSource::Shadow);
        Self {
            profile_count: d.profile_count,
            profile: d
                .profile
                .map(|p| ProfileNode::new(p, ProfileSource::Database)),
            shadow_record: d.shadow_record.map(shadow),
            shadow_records: d.shadow_records.into_iter().map(shadow).collect(),
            change_subscribers: d.change_subscribers as i64,
        }
    }
}
