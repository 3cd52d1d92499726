pub mod bootstrap;
pub mod editor;
pub mod repository;
pub mod shadow;

use std::sync::Arc;

use crate::realtime::ChangeBus;

/// Avatar size cap used until the configured one is applied.
pub const DEFAULT_MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

pub use bootstrap::{default_username, BootstrapOutcome, UsernameUpdate};
pub use editor::{validate_username, ProfileSource, ProfileView};
pub use repository::{ProfileChanges, ProfileRepository, RepositoryError, SqliteProfileRepository};
pub use shadow::{ShadowError, ShadowStore};

/// Profile lifecycle: bootstrap on sign-in, viewing and editing, with the
/// shadow store as a fallback when the database refuses a write.
#[derive(Clone)]
pub struct ProfileService {
    repo: Arc<dyn ProfileRepository>,
    shadow: ShadowStore,
    changes: ChangeBus,
    max_avatar_bytes: usize,
}

impl ProfileService {
    pub fn new(repo: Arc<dyn ProfileRepository>, shadow: ShadowStore, changes: ChangeBus) -> Self {
        Self {
            repo,
            shadow,
            changes,
            max_avatar_bytes: DEFAULT_MAX_AVATAR_BYTES,
        }
    }

    pub fn with_avatar_limit(mut self, max_avatar_bytes: usize) -> Self {
        self.max_avatar_bytes = max_avatar_bytes;
        self
    }

    pub fn repository(&self) -> &Arc<dyn ProfileRepository> {
        &self.repo
    }

    pub fn shadow(&self) -> &ShadowStore {
        &self.shadow
    }
}
