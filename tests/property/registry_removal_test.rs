//! Removing any account keeps registry positions, account slots and
//! credential directories aligned.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use common::*;
use gitdesk::managers::session_registry::{AddAccountOutcome, DefaultAccountFactory, SessionRegistry};
use gitdesk::services::credential_store::{CredentialStore, CredentialStoreTrait};
use gitdesk::services::http_transport::{HttpResponse, Method, ScriptedTransport};
use gitdesk::services::settings_engine::SettingsEngine;
use parking_lot::Mutex;
use proptest::prelude::*;
use tempfile::TempDir;

fn run<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}

struct Case {
    _dir: TempDir,
    store: Arc<CredentialStore>,
    registry: SessionRegistry,
    logins: Vec<String>,
}

async fn populated(count: usize) -> Case {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(CredentialStore::new(dir.path()).unwrap());
    let transport = ScriptedTransport::new();
    let settings = Arc::new(Mutex::new(SettingsEngine::new(Some(dir.path().join("settings.json")))));
    let factory = Arc::new(DefaultAccountFactory::new(
        Arc::clone(&store),
        Arc::new(transport.clone()),
        TestPrompt::declining(),
    ));
    let mut registry = SessionRegistry::new(factory, Arc::clone(&store), settings);

    let logins: Vec<String> = (0..count).map(|i| format!("user{}", i)).collect();
    for (slot, login) in logins.iter().enumerate() {
        save_credential(&store, slot, &format!("tok-{}", login), login);
        transport.push(Method::Get, "/user", HttpResponse::json_body(200, &user_json(login)));
    }
    for slot in 0..count {
        assert_eq!(registry.add_account(Some(slot)).await, AddAccountOutcome::Added(slot));
    }

    Case {
        _dir: dir,
        store,
        registry,
        logins,
    }
}

proptest! {
    // every case derives a credential key and opens SQLite files
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn removal_keeps_slots_aligned(
        (count, remove, current) in (1usize..5).prop_flat_map(|n| (Just(n), 0..n, 0..n)),
    ) {
        let mut case = run(populated(count));
        case.registry.switch_account(current).unwrap();

        case.registry.remove_account(remove).unwrap();

        let mut expected = case.logins.clone();
        expected.remove(remove);
        let remaining: Vec<String> = case.registry.accounts().iter().map(|a| a.username()).collect();
        prop_assert_eq!(&remaining, &expected);

        for (position, account) in case.registry.accounts().iter().enumerate() {
            prop_assert_eq!(account.slot(), position);
            let stored = case.store.load(position).unwrap().unwrap();
            prop_assert_eq!(stored.token.clone(), format!("tok-{}", expected[position]));
        }
        prop_assert!(!case.store.is_configured(count - 1));
        prop_assert_eq!(case.registry.persisted_count(), count - 1);

        let expected_current = if current == remove {
            (count > 1).then_some(0)
        } else if current > remove {
            Some(current - 1)
        } else {
            Some(current)
        };
        prop_assert_eq!(case.registry.current_index(), expected_current);
    }
}
