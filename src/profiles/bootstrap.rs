use rand::Rng;

use crate::db::models::Profile;
use crate::profiles::repository::ProfileChanges;
use crate::profiles::ProfileService;
use crate::realtime::{ChangeEvent, ChangeKind};

/// What a bootstrap run did. Never an error: failures are logged and
/// reported as `Shadowed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// A profile row already existed; nothing was written.
    Existing,
    /// A new profile row was inserted.
    Created(Profile),
    /// A shadow record was replayed into the profiles table.
    Restored(Profile),
    /// The insert failed and the profile lives in the shadow store.
    Shadowed(Profile),
    /// Neither the database nor the shadow store accepted the profile.
    Failed,
}

impl BootstrapOutcome {
    /// The profile as it now exists, when this run wrote or found one.
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            BootstrapOutcome::Created(p)
            | BootstrapOutcome::Restored(p)
            | BootstrapOutcome::Shadowed(p) => Some(p),
            BootstrapOutcome::Existing | BootstrapOutcome::Failed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernameUpdate {
    Applied,
    /// The database update failed; the shadow record was patched instead.
    Shadowed,
    /// Neither store could be updated.
    Skipped,
}

/// Username derived from the email local-part, or `user_<n>` when there is none.
pub fn default_username(email: &str) -> String {
    username_with_fallback(email, rand::thread_rng().gen_range(0..10000))
}

fn username_with_fallback(email: &str, n: u32) -> String {
    let local = email.split('@').next().unwrap_or_default().trim();
    if local.is_empty() {
        format!("user_{n}")
    } else {
        local.to_string()
    }
}

impl ProfileService {
    /// Make sure `user_id` has a profile. Safe to call any number of times;
    /// when a profile exists this performs no writes.
    pub async fn ensure_profile(&self, user_id: &str, email: &str) -> BootstrapOutcome {
        tracing::debug!("Checking if profile exists for user {}", user_id);

        match self.repo.find(user_id).await {
            Ok(Some(_)) => return BootstrapOutcome::Existing,
            Ok(None) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                tracing::error!("Error checking for profile of {}: {}", user_id, e);
                return BootstrapOutcome::Failed;
            }
        }

        if let Some(outcome) = self.replay_shadow(user_id).await {
            return outcome;
        }

        let profile = Profile {
            id: user_id.to_string(),
            username: default_username(email),
            full_name: None,
            avatar_url: None,
            bio: None,
            created_at: crate::db::now_timestamp(),
            updated_at: None,
        };

        tracing::info!(
            "Creating profile for user {} with username {}",
            user_id,
            profile.username
        );

        match self.repo.insert(&profile).await {
            Ok(true) => {
                self.changes
                    .publish(ChangeEvent::profile(ChangeKind::Insert, user_id));
                BootstrapOutcome::Created(profile)
            }
            // Another bootstrap for the same user won the race
            Ok(false) => BootstrapOutcome::Existing,
            Err(e) => {
                tracing::warn!(
                    "Profile insert failed for {}, writing shadow record: {}",
                    user_id,
                    e
                );
                match self.shadow.write(&profile) {
                    Ok(()) => BootstrapOutcome::Shadowed(profile),
                    Err(e) => {
                        tracing::error!("Error writing shadow record for {}: {}", user_id, e);
                        BootstrapOutcome::Failed
                    }
                }
            }
        }
    }

    async fn replay_shadow(&self, user_id: &str) -> Option<BootstrapOutcome> {
        let shadowed = match self.shadow.read(user_id) {
            Ok(Some(profile)) => profile,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!("Error reading shadow record for {}: {}", user_id, e);
                return None;
            }
        };

        match self.repo.insert(&shadowed).await {
            Ok(inserted) => {
                if let Err(e) = self.shadow.remove(user_id) {
                    tracing::error!("Error removing replayed shadow record {}: {}", user_id, e);
                }
                if !inserted {
                    return Some(BootstrapOutcome::Existing);
                }
                tracing::info!("Restored shadow profile for {}", user_id);
                self.changes
                    .publish(ChangeEvent::profile(ChangeKind::Insert, user_id));
                Some(BootstrapOutcome::Restored(shadowed))
            }
            Err(e) => {
                tracing::warn!("Shadow profile for {} still not insertable: {}", user_id, e);
                Some(BootstrapOutcome::Shadowed(shadowed))
            }
        }
    }

    /// Apply a username chosen at sign-up to the freshly bootstrapped profile.
    pub async fn apply_signup_username(&self, user_id: &str, username: &str) -> UsernameUpdate {
        let changes = ProfileChanges::username(username);

        let failure = match self.repo.update(user_id, &changes).await {
            Ok(Some(_)) => {
                self.changes
                    .publish(ChangeEvent::profile(ChangeKind::Update, user_id));
                return UsernameUpdate::Applied;
            }
            Ok(None) => "no profile row".to_string(),
            Err(e) => e.to_string(),
        };

        tracing::error!("Error updating username during signup: {}", failure);
        match self.shadow.patch(user_id, &changes) {
            Ok(Some(_)) => {
                tracing::info!("Updated username in shadow record for {}", user_id);
                UsernameUpdate::Shadowed
            }
            Ok(None) => UsernameUpdate::Skipped,
            Err(e) => {
                tracing::error!("Error patching shadow record for {}: {}", user_id, e);
                UsernameUpdate::Skipped
            }
        }
    }
}
