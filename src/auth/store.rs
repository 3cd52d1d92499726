//! Email/password identity and session lifecycle.
//!
//! Every successful sign-up or sign-in publishes [`AuthEvent::SignedIn`] and
//! bootstraps the user's profile. The bootstrap watcher spawned at startup
//! runs the bootstrap again for each such event; repeating it is a no-op.

use rusqlite::{params, OptionalExtension};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::auth::password::PasswordHash;
use crate::auth::session::{self, SessionUser};
use crate::config::AuthConfig;
use crate::error::AppError;
use crate::profiles::{validate_username, ProfileService};
use crate::state::DbPool;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidUsername(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Password task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => AppError::Unauthorized,
            AuthError::EmailTaken => AppError::Conflict(e.to_string()),
            AuthError::InvalidEmail | AuthError::WeakPassword(_) | AuthError::InvalidUsername(_) => {
                AppError::BadRequest(e.to_string())
            }
            AuthError::Database(e) => AppError::Database(e),
            AuthError::Pool(e) => AppError::Pool(e),
            AuthError::Hash(e) => AppError::Internal(e.to_string()),
            AuthError::Task(e) => AppError::Internal(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: String, email: String },
    SignedOut { user_id: String },
}

/// A freshly created session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

#[derive(Clone)]
pub struct SessionStore {
    db: DbPool,
    config: AuthConfig,
    profiles: ProfileService,
    events: broadcast::Sender<AuthEvent>,
}

/// Trimmed and lowercased, with a non-empty local part and a dotted domain.
pub fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@').ok_or(AuthError::InvalidEmail)?;
    let domain_ok = domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.');
    if local.is_empty() || !domain_ok || domain.contains('@') || email.contains(char::is_whitespace)
    {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email)
}

impl SessionStore {
    pub fn new(db: DbPool, config: AuthConfig, profiles: ProfileService) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db,
            config,
            profiles,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn hash_password(&self, password: &str) -> Result<PasswordHash, AuthError> {
        let password = password.to_string();
        let cost = self.config.bcrypt_cost;
        Ok(tokio::task::spawn_blocking(move || PasswordHash::new(&password, cost)).await??)
    }

    /// Register a new account and sign it in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<Session, AuthError> {
        let email = match normalize_email(email) {
            Ok(email) => email,
            Err(e) => {
                tracing::warn!("Sign-up rejected, invalid email {:?}", email.trim());
                return Err(e);
            }
        };
        if password.chars().count() < self.config.min_password_len {
            tracing::warn!("Sign-up for {} rejected, password too short", email);
            return Err(AuthError::WeakPassword(self.config.min_password_len));
        }
        let username = username
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(validate_username)
            .transpose()
            .map_err(|reason| {
                tracing::warn!("Sign-up for {} rejected, bad username: {}", email, reason);
                AuthError::InvalidUsername(reason)
            })?;

        let hash = self.hash_password(password).await?;
        let user_id = uuid::Uuid::now_v7().to_string();

        let token = {
            let conn = self.db.get()?;
            let taken: Option<String> = conn
                .query_row(
                    "SELECT id FROM users WHERE email = ?1",
                    params![email],
                    |r| r.get(0),
                )
                .optional()?;
            if taken.is_some() {
                tracing::warn!("Sign-up rejected, email {} already registered", email);
                return Err(AuthError::EmailTaken);
            }

            match conn.execute(
                "INSERT INTO users (id, email, password_hash) VALUES (?1, ?2, ?3)",
                params![user_id, email, hash.as_str()],
            ) {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(f, _))
                    if f.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    tracing::warn!("Sign-up lost a race for email {}", email);
                    return Err(AuthError::EmailTaken);
                }
                Err(e) => return Err(e.into()),
            }
            session::create_session(&conn, &user_id, self.config.session_hours)?
        };

        tracing::info!("User {} signed up", user_id);
        let user = SessionUser {
            id: user_id,
            email,
        };
        self.start(&user).await;

        if let Some(username) = username {
            let update = self.profiles.apply_signup_username(&user.id, &username).await;
            tracing::debug!("Signup username for {}: {:?}", user.id, update);
        }

        Ok(Session { token, user })
    }

    /// Verify credentials and open a new session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim().to_lowercase();

        let row: Option<(String, String)> = self
            .db
            .get()?
            .query_row(
                "SELECT id, password_hash FROM users WHERE email = ?1",
                params![email],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let Some((user_id, hash)) = row else {
            tracing::warn!("Sign-in for unknown email {}", email);
            return Err(AuthError::InvalidCredentials);
        };

        let password = password.to_string();
        let verified =
            tokio::task::spawn_blocking(move || PasswordHash(hash).verify(&password)).await?;
        if !verified {
            tracing::warn!("Wrong password for user {}", user_id);
            return Err(AuthError::InvalidCredentials);
        }

        let token = {
            let conn = self.db.get()?;
            session::create_session(&conn, &user_id, self.config.session_hours)?
        };
        let user = SessionUser {
            id: user_id,
            email,
        };

        tracing::info!("User {} signed in", user.id);
        self.start(&user).await;
        Ok(Session { token, user })
    }

    async fn start(&self, user: &SessionUser) {
        self.publish(AuthEvent::SignedIn {
            user_id: user.id.clone(),
            email: user.email.clone(),
        });
        let outcome = self.profiles.ensure_profile(&user.id, &user.email).await;
        tracing::debug!("Bootstrap for {}: {:?}", user.id, outcome);
    }

    pub fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        let conn = self.db.get()?;
        let user = session::lookup_session(&conn, token)?;
        session::delete_session(&conn, token)?;
        if let Some(user) = user {
            tracing::info!("User {} signed out", user.id);
            self.publish(AuthEvent::SignedOut { user_id: user.id });
        }
        Ok(())
    }

    /// The identity behind `token`, if the session is live.
    pub fn resolve(&self, token: &str) -> Result<Option<SessionUser>, AuthError> {
        let conn = self.db.get()?;
        Ok(session::lookup_session(&conn, token)?)
    }

    /// Re-run profile bootstrap for every sign-in until the store is dropped.
    pub fn spawn_bootstrap_watcher(&self) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        let profiles = self.profiles.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(AuthEvent::SignedIn { user_id, email }) => {
                        profiles.ensure_profile(&user_id, &email).await;
                    }
                    Ok(AuthEvent::SignedOut { .. }) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Bootstrap watcher skipped {} auth events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
