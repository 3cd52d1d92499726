use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

/// Who a session token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
}

/// Create a new session for a user. Returns the session token.
pub fn create_session(conn: &Connection, user_id: &str, hours: u64) -> rusqlite::Result<String> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token. Returns whether a session was removed.
pub fn delete_session(conn: &Connection, token: &str) -> rusqlite::Result<bool> {
    let removed = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(removed > 0)
}

/// The user behind an unexpired session.
pub fn lookup_session(conn: &Connection, token: &str) -> rusqlite::Result<Option<SessionUser>> {
    conn.query_row(
        "SELECT u.id, u.email FROM sessions s \
         JOIN users u ON u.id = s.user_id \
         WHERE s.token = ?1 AND s.expires_at > datetime('now')",
        params![token],
        |row| {
            Ok(SessionUser {
                id: row.get(0)?,
                email: row.get(1)?,
            })
        },
    )
    .optional()
}

pub fn purge_expired(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
