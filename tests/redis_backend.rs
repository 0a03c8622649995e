//! Needs a live server: `REDIS_URL=redis://127.0.0.1/ cargo test --test redis_backend -- --ignored`

use std::sync::Arc;

use dropbook::db::models::*;
use dropbook::store::{
    Collection, DocumentBackend, DocumentStore, DocumentWrite, DynStore, RedisBackend, Store,
};

async fn backend() -> RedisBackend {
    let url = std::env::var("REDIS_URL").expect("REDIS_URL must point at a Redis server");
    let conn = redis::Client::open(url.as_str())
        .unwrap()
        .get_connection_manager()
        .await
        .unwrap();
    let prefix = format!("dropbook-test-{:016x}:", rand::random::<u64>());
    RedisBackend::with_connection(conn, prefix)
}

fn write(collection: Collection, expected: Option<&str>, body: &str) -> DocumentWrite {
    DocumentWrite {
        collection,
        expected: expected.map(str::to_string),
        body: body.to_string(),
    }
}

#[tokio::test]
#[ignore]
async fn test_missing_key_loads_as_none() {
    let backend = backend().await;
    assert_eq!(backend.load(Collection::Records).await.unwrap(), None);
}

#[tokio::test]
#[ignore]
async fn test_commit_requires_absent_key_when_nothing_expected() {
    let backend = backend().await;
    assert!(backend
        .commit(&[write(Collection::Records, None, "[1]")])
        .await
        .unwrap());

    // The key now exists, so a writer that saw it absent must lose.
    assert!(!backend
        .commit(&[write(Collection::Records, None, "[2]")])
        .await
        .unwrap());
    assert_eq!(
        backend.load(Collection::Records).await.unwrap().as_deref(),
        Some("[1]")
    );

    assert!(backend
        .commit(&[write(Collection::Records, Some("[1]"), "[3]")])
        .await
        .unwrap());
    assert_eq!(
        backend.load(Collection::Records).await.unwrap().as_deref(),
        Some("[3]")
    );
}

#[tokio::test]
#[ignore]
async fn test_commit_is_all_or_nothing_across_keys() {
    let backend = backend().await;
    assert!(backend
        .commit(&[write(Collection::Records, None, "[1]")])
        .await
        .unwrap());

    // First key is fresh, second carries a stale expectation.
    let applied = backend
        .commit(&[
            write(Collection::Comments, None, "[]"),
            write(Collection::Records, Some("[0]"), "[2]"),
        ])
        .await
        .unwrap();
    assert!(!applied);
    assert_eq!(backend.load(Collection::Comments).await.unwrap(), None);
    assert_eq!(
        backend.load(Collection::Records).await.unwrap().as_deref(),
        Some("[1]")
    );

    // Each key gets its own body from the packed arguments.
    let applied = backend
        .commit(&[
            write(Collection::Comments, None, "[\"c\"]"),
            write(Collection::Records, Some("[1]"), "[\"r\"]"),
            write(Collection::DogRecords, None, "[\"d\"]"),
        ])
        .await
        .unwrap();
    assert!(applied);
    assert_eq!(
        backend.load(Collection::Comments).await.unwrap().as_deref(),
        Some("[\"c\"]")
    );
    assert_eq!(
        backend.load(Collection::Records).await.unwrap().as_deref(),
        Some("[\"r\"]")
    );
    assert_eq!(
        backend.load(Collection::DogRecords).await.unwrap().as_deref(),
        Some("[\"d\"]")
    );
}

#[tokio::test]
#[ignore]
async fn test_comment_counter_round_trip() {
    let store: DynStore = Arc::new(DocumentStore::new(backend().await));
    let record = store
        .create_record(NewAirdropRecord {
            user_id: 1,
            username: "admin".into(),
            project: "Foo".into(),
            platform: "X".into(),
            status: AirdropStatus::InProgress,
            reward: String::new(),
            difficulty: Difficulty::Easy,
            description: String::new(),
            final_reward: 0.0,
            funding: String::new(),
        })
        .await
        .unwrap();

    let comment = store
        .create_comment(NewComment {
            record_id: record.id,
            record_type: RecordKind::Airdrop,
            username: "bob".into(),
            content: "nice".into(),
        })
        .await
        .unwrap();
    assert_eq!(store.record(record.id).await.unwrap().unwrap().comment_count, 1);

    assert!(store.delete_comment(comment.id).await.unwrap());
    assert_eq!(store.record(record.id).await.unwrap().unwrap().comment_count, 0);

    assert!(store.delete_record(record.id).await.unwrap());
    assert!(store.comments().await.unwrap().is_empty());
}
