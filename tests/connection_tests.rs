//! Connection manager: database creation, handle reuse and reconnection.

mod common;

use common::TestDb;
use futures::future::join_all;
use rollcall::RollcallError;
use rollcall::db::ConnectionManager;

#[tokio::test]
async fn first_handle_creates_the_database_file() {
    let db = TestDb::new();
    let manager = db.manager();
    assert!(!db.settings.database_path().exists());

    let handle = manager.get_handle().await.expect("connect failed");

    assert!(db.settings.database_path().exists());
    assert_eq!(handle.sequence(), 1);
    assert_eq!(manager.connect_count(), 1);
}

#[tokio::test]
async fn live_handle_is_reused() {
    let db = TestDb::new();
    let manager = db.manager();

    let first = manager.get_handle().await.unwrap();
    let second = manager.get_handle().await.unwrap();

    assert_eq!(first.sequence(), second.sequence());
    assert_eq!(manager.connect_count(), 1);
}

#[tokio::test]
async fn concurrent_cold_start_runs_one_connect_sequence() {
    let db = TestDb::new();
    let manager = db.manager();

    let results = join_all((0..16).map(|_| manager.get_handle())).await;

    assert_eq!(manager.connect_count(), 1);
    for result in results {
        let handle = result.expect("every caller should get a handle");
        assert_eq!(handle.sequence(), 1);
        sqlx::query("SELECT 1")
            .execute(handle.pool())
            .await
            .expect("handle should be usable");
    }
}

#[tokio::test]
async fn concurrent_spawned_callers_share_one_handle() {
    let db = TestDb::new();
    let manager = db.manager();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_handle().await.map(|h| h.sequence()) })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 1);
    }
    assert_eq!(manager.connect_count(), 1);
}

#[tokio::test]
async fn dead_handle_is_replaced() {
    let db = TestDb::new();
    let manager = db.manager();

    let stale = manager.get_handle().await.unwrap();
    stale.pool().close().await;
    assert!(!stale.is_live(db.settings.query_timeout()).await);

    let fresh = manager.get_handle().await.unwrap();

    assert_eq!(fresh.sequence(), 2);
    assert_eq!(manager.connect_count(), 2);
    assert!(fresh.is_live(db.settings.query_timeout()).await);
}

#[tokio::test]
async fn data_survives_reconnect() {
    let db = TestDb::new();
    let manager = db.manager();

    let handle = manager.get_handle().await.unwrap();
    sqlx::query("CREATE TABLE marker (v INTEGER)")
        .execute(handle.pool())
        .await
        .unwrap();
    sqlx::query("INSERT INTO marker (v) VALUES (7)")
        .execute(handle.pool())
        .await
        .unwrap();
    handle.pool().close().await;

    let handle = manager.get_handle().await.unwrap();
    let v: i64 = sqlx::query_scalar("SELECT v FROM marker")
        .fetch_one(handle.pool())
        .await
        .unwrap();
    assert_eq!(v, 7);
}

#[tokio::test]
async fn unreachable_store_yields_one_consistent_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    // A regular file where the data directory should be: nothing can be created below it.
    let blocker = temp_dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let mut settings = TestDb::new().settings;
    settings.data_dir = blocker.join("data");
    let manager = ConnectionManager::new(settings);

    let results = join_all((0..8).map(|_| manager.get_handle())).await;

    assert_eq!(manager.connect_count(), 1);
    let messages: Vec<String> = results
        .into_iter()
        .map(|r| match r {
            Err(RollcallError::Connectivity(msg)) => msg,
            other => panic!("expected connectivity error, got {other:?}"),
        })
        .collect();
    assert!(messages.iter().all(|m| m == &messages[0]));
}

#[tokio::test]
async fn health_check_and_close() {
    let db = TestDb::new();
    let manager = db.manager();

    manager.health_check().await.expect("store should be healthy");
    manager.close().await;

    // A closed manager reconnects on demand.
    manager.get_handle().await.unwrap();
    assert_eq!(manager.connect_count(), 2);
}

#[tokio::test]
async fn busy_connection_is_not_mistaken_for_a_dead_one() {
    let mut db = TestDb::new();
    db.settings.connect_timeout_secs = 1;
    let manager = db.manager();
    let handle = manager.get_handle().await.unwrap();

    // The pool has a single connection; hold it so the liveness check cannot acquire it.
    let held = handle.pool().acquire().await.unwrap();
    let again = manager.get_handle().await.unwrap();
    drop(held);

    assert_eq!(again.sequence(), 1);
    assert_eq!(manager.connect_count(), 1);
}
