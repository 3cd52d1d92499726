//! File-backed fallback records for profiles the database refused.
//!
//! Each record lives at `<dir>/profile_<user_id>.json` and holds a full
//! JSON-encoded [`Profile`]. Records are only written when a profile insert
//! fails and are replayed into the database by the next bootstrap.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::db::models::Profile;
use crate::profiles::repository::ProfileChanges;

const KEY_PREFIX: &str = "profile_";

#[derive(Debug, Error)]
pub enum ShadowError {
    #[error("Shadow store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Shadow record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid user id for shadow key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone)]
pub struct ShadowStore {
    dir: PathBuf,
}

impl ShadowStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Storage key for a user's record.
    pub fn key(user_id: &str) -> String {
        format!("{KEY_PREFIX}{user_id}")
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf, ShadowError> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ShadowError::InvalidKey(user_id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", Self::key(user_id))))
    }

    pub fn write(&self, profile: &Profile) -> Result<(), ShadowError> {
        let path = self.path_for(&profile.id)?;
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(profile)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read(&self, user_id: &str) -> Result<Option<Profile>, ShadowError> {
        let path = self.path_for(user_id)?;
        match std::fs::read_to_string(&path) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Patch an existing record. Returns the patched profile, or `None` when
    /// the user has no record.
    pub fn patch(
        &self,
        user_id: &str,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>, ShadowError> {
        let Some(mut profile) = self.read(user_id)? else {
            return Ok(None);
        };
        changes.apply_to(&mut profile);
        self.write(&profile)?;
        Ok(Some(profile))
    }

    /// Returns whether a record was removed.
    pub fn remove(&self, user_id: &str) -> Result<bool, ShadowError> {
        let path = self.path_for(user_id)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Every readable record. Unparseable files are logged and skipped.
    pub fn list(&self) -> Result<Vec<Profile>, ShadowError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut profiles = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(KEY_PREFIX) && n.ends_with(".json"));
            if !is_record {
                continue;
            }
            match std::fs::read_to_string(&path)
                .map_err(ShadowError::from)
                .and_then(|json| serde_json::from_str::<Profile>(&json).map_err(ShadowError::from))
            {
                Ok(profile) => profiles.push(profile),
                Err(e) => tracing::error!("Error parsing shadow record {}: {}", path.display(), e),
            }
        }
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(profiles)
    }
}
