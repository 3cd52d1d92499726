use rusqlite::{params, Connection};
use serde::Serialize;

use crate::feed::FeedItem;
use crate::realtime::ChangeKind;

/// A viewer's like state for one post. The count is seeded once from the
/// post's like list and then only adjusted by this viewer's own toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub count: i64,
}

impl LikeState {
    pub fn seed(item: &FeedItem, viewer_id: &str) -> Self {
        Self {
            liked: item.liked_by(viewer_id),
            count: item.like_count(),
        }
    }

    /// Flip the like for `(post_id, user_id)`. Returns the kind of row change made.
    pub fn toggle(
        &mut self,
        conn: &Connection,
        post_id: &str,
        user_id: &str,
    ) -> rusqlite::Result<ChangeKind> {
        let kind = if self.liked {
            conn.execute(
                "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
                params![post_id, user_id],
            )?;
            self.count = (self.count - 1).max(0);
            ChangeKind::Delete
        } else {
            conn.execute(
                "INSERT OR IGNORE INTO likes (post_id, user_id) VALUES (?1, ?2)",
                params![post_id, user_id],
            )?;
            self.count += 1;
            ChangeKind::Insert
        };
        self.liked = !self.liked;
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::feed::load_post;
    use crate::posts::insert_post;

    fn setup() -> (tempfile::TempDir, crate::state::DbPool) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        pool.get()
            .unwrap()
            .execute_batch(
                "INSERT INTO users (id, email, password_hash) VALUES ('u1', 'a@x.com', 'h');
                 INSERT INTO users (id, email, password_hash) VALUES ('u2', 'b@x.com', 'h');",
            )
            .unwrap();
        (tmp, pool)
    }

    fn stored_likes(conn: &Connection, post_id: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
            params![post_id],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn seed_reflects_embedded_likes() {
        let (_tmp, pool) = setup();
        let conn = pool.get().unwrap();
        let post = insert_post(&conn, "u1", "hi", None).unwrap();
        conn.execute(
            "INSERT INTO likes (post_id, user_id) VALUES (?1, 'u2')",
            params![post.id],
        )
        .unwrap();

        let item = load_post(&conn, &post.id).unwrap().unwrap();
        assert_eq!(
            LikeState::seed(&item, "u2"),
            LikeState {
                liked: true,
                count: 1
            }
        );
        assert_eq!(
            LikeState::seed(&item, "u1"),
            LikeState {
                liked: false,
                count: 1
            }
        );
    }

    #[test]
    fn toggle_twice_restores_state() {
        let (_tmp, pool) = setup();
        let conn = pool.get().unwrap();
        let post = insert_post(&conn, "u1", "hi", None).unwrap();
        let item = load_post(&conn, &post.id).unwrap().unwrap();

        let original = LikeState::seed(&item, "u2");
        let mut state = original;

        assert_eq!(state.toggle(&conn, &post.id, "u2").unwrap(), ChangeKind::Insert);
        assert_eq!(state, LikeState { liked: true, count: 1 });
        assert_eq!(stored_likes(&conn, &post.id), 1);

        assert_eq!(state.toggle(&conn, &post.id, "u2").unwrap(), ChangeKind::Delete);
        assert_eq!(state, original);
        assert_eq!(stored_likes(&conn, &post.id), 0);
    }

    #[test]
    fn local_count_is_not_reconciled() {
        let (_tmp, pool) = setup();
        let conn = pool.get().unwrap();
        let post = insert_post(&conn, "u1", "hi", None).unwrap();
        let item = load_post(&conn, &post.id).unwrap().unwrap();
        let mut state = LikeState::seed(&item, "u2");

        // A like arriving through another path is not seen by the local count
        conn.execute(
            "INSERT INTO likes (post_id, user_id) VALUES (?1, 'u1')",
            params![post.id],
        )
        .unwrap();
        state.toggle(&conn, &post.id, "u2").unwrap();
        assert_eq!(state.count, 1);
        assert_eq!(stored_likes(&conn, &post.id), 2);
    }

    #[test]
    fn liking_missing_post_fails() {
        let (_tmp, pool) = setup();
        let conn = pool.get().unwrap();
        let mut state = LikeState {
            liked: false,
            count: 0,
        };
        assert!(state.toggle(&conn, "no-such-post", "u1").is_err());
        assert_eq!(state.count, 0);
    }
}
