use std::sync::Arc;

use tantra_core::{ConnectionStatus, ErrorCategory, Message};
use tantra_store::{
    AppStore, CredentialStore, FileKeyValueStore, KeyValueStore, DEFAULT_STORE_KEY,
    DEFAULT_TOKEN_KEY,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_state_survives_restart_on_disk() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("state");

    {
        let backend: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(&dir));
        let store = AppStore::new(backend.clone(), DEFAULT_STORE_KEY);
        let creds = CredentialStore::new(backend, DEFAULT_TOKEN_KEY);

        store.create_new_session();
        store.add_message(Message::user("what is the uptime?"));
        store.add_message(Message::assistant("42 hours", None));
        store.save_current_session();
        store.log_error(ErrorCategory::Connection, "socket closed", None);
        store.set_connection_status(ConnectionStatus::Connected);
        store.persist().await.unwrap();

        creds.set("token-1").await.unwrap();
    }

    assert!(dir.join("agi-store.json").exists());
    assert!(dir.join("agi_token.json").exists());

    let backend: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(&dir));
    let store = AppStore::new(backend.clone(), DEFAULT_STORE_KEY);
    let creds = CredentialStore::new(backend, DEFAULT_TOKEN_KEY);

    assert!(store.hydrate().await.unwrap());
    assert_eq!(creds.load().await.unwrap().as_deref(), Some("token-1"));

    let state = store.snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.current_session().unwrap().messages.len(), 2);
    assert_eq!(state.errors.len(), 1);
    assert_eq!(state.connection_status, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_hydrate_without_snapshot_keeps_initial_state() {
    let temp = TempDir::new().unwrap();
    let backend: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(temp.path()));
    let store = AppStore::new(backend, DEFAULT_STORE_KEY);

    assert!(!store.hydrate().await.unwrap());
    assert_eq!(store.snapshot().current_page, "dashboard");
}

#[tokio::test]
async fn test_future_version_is_ignored() {
    let temp = TempDir::new().unwrap();
    let backend: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(temp.path()));
    backend
        .set(DEFAULT_STORE_KEY, r#"{"version": 7, "state": {"current_page": "x"}}"#)
        .await
        .unwrap();

    let store = AppStore::new(backend, DEFAULT_STORE_KEY);
    assert!(!store.hydrate().await.unwrap());
    assert_eq!(store.snapshot().current_page, "dashboard");
}
