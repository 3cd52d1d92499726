use serde::Serialize;

use crate::db::models::Profile;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// State of the profile machinery for one user.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub profile_count: i64,
    pub profile: Option<Profile>,
    pub shadow_record: Option<Profile>,
    pub shadow_records: Vec<Profile>,
    pub change_subscribers: usize,
}

pub async fn collect(state: &AppState, user_id: &str) -> AppResult<Diagnostics> {
    let repo = state.profiles.repository();
    let profile_count = repo
        .count()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let profile = repo
        .find(user_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let shadow = state.profiles.shadow();
    let shadow_record = shadow.read(user_id).unwrap_or_else(|e| {
        tracing::error!("Error reading shadow record for {}: {}", user_id, e);
        None
    });
    let shadow_records = shadow.list().unwrap_or_else(|e| {
        tracing::error!("Error listing shadow records: {}", e);
        Vec::new()
    });

    Ok(Diagnostics {
        profile_count,
        profile,
        shadow_record,
        shadow_records,
        change_subscribers: state.changes.subscriber_count(),
    })
}
