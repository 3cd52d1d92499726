use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::graphql::{build_schema, PlazaSchema};
use crate::profiles::{ProfileService, ShadowStore, SqliteProfileRepository};
use crate::realtime::ChangeBus;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub sessions: SessionStore,
    pub profiles: ProfileService,
    pub changes: ChangeBus,
    pub graphql_schema: PlazaSchema,
}

impl AppState {
    /// Wire services over an already migrated pool.
    pub fn new(db: DbPool, config: Config) -> Self {
        let changes = ChangeBus::new();
        let profiles = ProfileService::new(
            Arc::new(SqliteProfileRepository::new(db.clone())),
            ShadowStore::new(config.shadow_path()),
            changes.clone(),
        )
        .with_avatar_limit(config.media.max_avatar_bytes);
        let sessions = SessionStore::new(db.clone(), config.auth.clone(), profiles.clone());

        Self {
            db,
            config,
            sessions,
            profiles,
            changes,
            graphql_schema: build_schema(),
        }
    }
}
