use storage::{KeyValueStore, SessionStore};

#[tokio::test]
async fn session_entries_survive_reopening_the_database() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("session.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    {
        let store = SessionStore::new(&database_url).await.expect("open");
        store.put("auth_token", "persisted").await.expect("put");
    }

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    let reopened = SessionStore::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened.get("auth_token").await.expect("get"),
        Some("persisted".to_string())
    );
}
