//! Unit tests for per-slot credential storage.

use gitdesk::services::credential_store::{CredentialStore, CredentialStoreTrait};
use gitdesk::types::credential::StoredCredential;
use rstest::rstest;
use tempfile::TempDir;

fn cred(token: &str, login: &str) -> StoredCredential {
    StoredCredential {
        token: token.to_string(),
        login: login.to_string(),
        display_name: Some(format!("{} display", login)),
        avatar_url: None,
    }
}

fn store_with_slots(dir: &TempDir, logins: &[&str]) -> CredentialStore {
    let store = CredentialStore::new(dir.path()).unwrap();
    for (slot, login) in logins.iter().enumerate() {
        store.save(slot, &cred(&format!("gho_{}", login), login)).unwrap();
    }
    store
}

#[test]
fn test_unconfigured_slot_loads_none() {
    let dir = TempDir::new().unwrap();
    let store = CredentialStore::new(dir.path()).unwrap();

    assert!(!store.is_configured(0));
    assert!(store.load(0).unwrap().is_none());
    assert!(store.clear(0).is_ok(), "clearing an empty slot is a no-op");
}

#[test]
fn test_save_then_load_returns_credential() {
    let dir = TempDir::new().unwrap();
    let store = CredentialStore::new(dir.path()).unwrap();

    store.save(0, &cred("gho_abc", "octocat")).unwrap();

    assert!(store.is_configured(0));
    let loaded = store.load(0).unwrap().expect("credential should be stored");
    assert_eq!(loaded.token, "gho_abc");
    assert_eq!(loaded.login, "octocat");
    assert_eq!(loaded.display_name.as_deref(), Some("octocat display"));
}

#[test]
fn test_save_overwrites_previous_token() {
    let dir = TempDir::new().unwrap();
    let store = CredentialStore::new(dir.path()).unwrap();

    store.save(0, &cred("gho_old", "octocat")).unwrap();
    store.save(0, &cred("gho_new", "octocat")).unwrap();

    assert_eq!(store.load(0).unwrap().unwrap().token, "gho_new");
}

#[test]
fn test_clear_forgets_token_but_keeps_slot_dir() {
    let dir = TempDir::new().unwrap();
    let store = store_with_slots(&dir, &["a"]);

    store.clear(0).unwrap();

    assert!(store.load(0).unwrap().is_none());
    assert!(store.slot_dir(0).exists());
}

#[test]
fn test_second_store_instance_reads_saved_token() {
    let dir = TempDir::new().unwrap();
    store_with_slots(&dir, &["a", "b"]);

    let reopened = CredentialStore::new(dir.path()).unwrap();
    assert_eq!(reopened.load(1).unwrap().unwrap().login, "b");
}

#[rstest]
#[case(0, &["b", "c"])]
#[case(1, &["a", "c"])]
#[case(2, &["a", "b"])]
fn test_remove_slot_shifts_higher_slots_down(#[case] removed: usize, #[case] expected: &[&str]) {
    let dir = TempDir::new().unwrap();
    let store = store_with_slots(&dir, &["a", "b", "c"]);

    store.remove_slot(removed, 3).unwrap();

    for (slot, login) in expected.iter().enumerate() {
        let loaded = store.load(slot).unwrap().expect("slot should be populated");
        assert_eq!(&loaded.login, login);
        assert_eq!(loaded.token, format!("gho_{}", login));
    }
    assert!(!store.slot_dir(2).exists(), "the highest slot directory must be gone");
}

#[test]
fn test_remove_slot_tolerates_missing_directories() {
    let dir = TempDir::new().unwrap();
    let store = CredentialStore::new(dir.path()).unwrap();
    store.save(2, &cred("gho_c", "c")).unwrap();

    store.remove_slot(0, 3).unwrap();

    assert_eq!(store.load(1).unwrap().unwrap().login, "c");
    assert!(!store.is_configured(2));
}
