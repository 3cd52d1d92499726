use std::time::Duration;

use futures::StreamExt;
use plaza::composer::{self, PostDraft};
use plaza::config::Config;
use plaza::db;
use plaza::realtime::{ChangeFilter, ChangeKind, Table};
use plaza::state::AppState;
use tempfile::TempDir;

fn test_state() -> (TempDir, AppState) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.resolve_paths(temp_dir.path());
    config.auth.bcrypt_cost = 4;
    let pool = db::create_pool(&config.db_path()).unwrap();
    db::run_migrations(&pool).unwrap();
    (temp_dir, AppState::new(pool, config))
}

#[tokio::test]
async fn post_insert_reaches_subscribers() {
    let (_tmp, state) = test_state();
    let session = state
        .sessions
        .sign_up("a@x.com", "secret", None)
        .await
        .unwrap();

    let mut posts = Box::pin(state.changes.stream(ChangeFilter {
        table: Some(Table::Posts),
        post_id: None,
    }));

    let post = composer::submit(
        &state,
        &session.user.id,
        &session.user.email,
        PostDraft {
            content: "hello".into(),
            image: None,
        },
    )
    .await
    .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), posts.next())
        .await
        .expect("no change event within a second")
        .unwrap();
    assert_eq!(event.table, Table::Posts);
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.id, post.id);
}

#[tokio::test]
async fn per_post_subscription_ignores_other_posts() {
    let (_tmp, state) = test_state();
    let session = state
        .sessions
        .sign_up("a@x.com", "secret", None)
        .await
        .unwrap();
    let user = &session.user;

    let draft = |content: &str| PostDraft {
        content: content.into(),
        image: None,
    };
    let watched = composer::submit(&state, &user.id, &user.email, draft("watched"))
        .await
        .unwrap();
    let other = composer::submit(&state, &user.id, &user.email, draft("other"))
        .await
        .unwrap();

    let mut thread = Box::pin(state.changes.stream(ChangeFilter {
        table: Some(Table::Comments),
        post_id: Some(watched.id.clone()),
    }));

    {
        let conn = state.db.get().unwrap();
        for post_id in [&other.id, &watched.id] {
            let comment = plaza::comments::add(&conn, post_id, &user.id, "hi").unwrap();
            state.changes.publish(plaza::realtime::ChangeEvent::comment(
                ChangeKind::Insert,
                &comment.id,
                post_id,
            ));
        }
    }

    let event = tokio::time::timeout(Duration::from_secs(1), thread.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.post_id.as_deref(), Some(watched.id.as_str()));
}

#[tokio::test]
async fn sign_up_publishes_profile_insert() {
    let (_tmp, state) = test_state();
    let mut rx = state.changes.subscribe();

    let session = state
        .sessions
        .sign_up("a@x.com", "secret", None)
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.table, Table::Profiles);
    assert_eq!(event.kind, ChangeKind::Insert);
    assert_eq!(event.id, session.user.id);
}
