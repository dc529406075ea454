use std::sync::Arc;

use super::*;

#[test]
fn fresh_store_is_logged_out() {
    let session = SessionStore::new(Arc::new(MemoryTokenStore::new()));
    assert!(!session.is_authenticated());
    assert_eq!(session.token(), None);
}

#[test]
fn login_sets_and_persists_the_token() {
    let storage = Arc::new(MemoryTokenStore::new());
    let session = SessionStore::new(Arc::clone(&storage) as Arc<dyn TokenStore>);

    session.login("tok-1".to_owned());

    assert!(session.is_authenticated());
    assert_eq!(session.token(), Some("tok-1".to_owned()));
    assert_eq!(storage.load(), Some("tok-1".to_owned()));
}

#[test]
fn logout_clears_memory_and_storage() {
    let storage = Arc::new(MemoryTokenStore::new());
    let session = SessionStore::new(Arc::clone(&storage) as Arc<dyn TokenStore>);
    session.login("tok-1".to_owned());

    session.logout();

    assert_eq!(session.token(), None);
    assert_eq!(storage.load(), None);
}

#[test]
fn new_store_picks_up_persisted_token() {
    let storage = Arc::new(MemoryTokenStore::new());
    storage.save("persisted");

    let session = SessionStore::new(storage);
    assert_eq!(session.token(), Some("persisted".to_owned()));
}

#[test]
fn login_replaces_the_token_wholesale() {
    let session = SessionStore::new(Arc::new(MemoryTokenStore::new()));
    session.login("old".to_owned());
    session.login("new".to_owned());
    assert_eq!(session.token(), Some("new".to_owned()));
}

#[test]
fn clones_share_one_slot() {
    let session = SessionStore::new(Arc::new(MemoryTokenStore::new()));
    let other = session.clone();

    session.login("shared".to_owned());
    assert_eq!(other.token(), Some("shared".to_owned()));

    other.logout();
    assert_eq!(session.token(), None);
}

#[test]
fn file_store_round_trips_through_disk() {
    let dir = std::env::temp_dir().join(format!("penwatch-test-{}", std::process::id()));
    let store = FileTokenStore::at(dir.join("access_token"));

    store.clear();
    assert_eq!(store.load(), None);

    store.save("tok-disk");
    assert_eq!(store.load(), Some("tok-disk".to_owned()));

    store.clear();
    assert_eq!(store.load(), None);

    let _ = std::fs::remove_dir_all(dir);
}
