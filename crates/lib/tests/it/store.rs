use std::time::Duration;

use credstore::{
    CredentialStore, Error, OpContext, StoreOptions, UserId, backend::UserBackend,
    store::StoreError,
};

use crate::helpers::*;

// ===== create / load =====

#[tokio::test]
async fn test_distinct_emails_create_and_duplicate_fails() {
    let store = test_store().await;
    store.create(new_user("e1@x.com")).await.unwrap();
    store.create(new_user("e2@x.com")).await.unwrap();

    let err = store.create(new_user("e1@x.com")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Store(StoreError::DuplicateIdentity { ref email }) if email == "e1@x.com"
    ));
    assert!(err.is_conflict());
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_create_assigns_increasing_ids() {
    let store = test_store().await;
    let a = store.create(new_user("a@x.com")).await.unwrap();
    let b = store.create(new_user("b@x.com")).await.unwrap();
    assert!(a.id().unwrap() < b.id().unwrap());
}

#[tokio::test]
async fn test_load_missing_identity() {
    let store = test_store().await;
    let err = store.load("nobody@x.com").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        err,
        Error::Store(StoreError::IdentityNotFound { .. })
    ));
}

#[tokio::test]
async fn test_role_change_example() {
    let store = test_store().await;
    let ctx = OpContext::background();

    let mut user = store.create(new_user("a@x.com")).await.unwrap();
    assert_eq!(user.role, "User");

    assert!(store.create(new_user("a@x.com")).await.unwrap_err().is_conflict());

    user.role = "Administrator".to_string();
    store.save(&ctx, &user).await.unwrap();
    assert_eq!(store.load("a@x.com").await.unwrap().role, "Administrator");
}

#[tokio::test]
async fn test_load_returns_latest_save() {
    let store = test_store().await;
    let ctx = OpContext::background();
    let mut user = saved_user(&store, "a@x.com").await;

    for name in ["first", "second", "third"] {
        user.name = name.to_string();
        store.save(&ctx, &user).await.unwrap();
    }
    let loaded = store.load("a@x.com").await.unwrap();
    assert_eq!(loaded.name, "third");
    assert_eq!(loaded, user);
}

#[tokio::test]
async fn test_load_by_id_and_list() {
    let store = test_store().await;
    let b = saved_user(&store, "b@x.com").await;
    let a = saved_user(&store, "a@x.com").await;

    assert_eq!(store.load_by_id(a.id().unwrap()).await.unwrap(), a);
    assert!(store.load_by_id(UserId::new(999)).await.unwrap_err().is_not_found());

    let emails: Vec<_> = store
        .list()
        .await
        .iter()
        .map(|u| u.email().to_string())
        .collect();
    assert_eq!(emails, vec![b.email(), a.email()]);
}

// ===== save =====

#[tokio::test]
async fn test_save_of_uncreated_record_is_rejected() {
    let store = test_store().await;
    let user = credstore::User::new(new_user("ghost@x.com"));
    let err = store.save(&OpContext::background(), &user).await.unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::NotPersisted { .. })));
    assert!(store.load("ghost@x.com").await.is_err());
}

// ===== selector lookups =====

#[tokio::test]
async fn test_confirm_selector_follows_latest_save() {
    let store = test_store().await;
    let ctx = OpContext::background();
    let mut user = saved_user(&store, "a@x.com").await;

    user.confirm_selector = Some("s1".into());
    user.confirm_verifier = Some("v1".into());
    store.save(&ctx, &user).await.unwrap();
    assert_eq!(store.load_by_confirm_selector("s1").await.unwrap(), user);

    user.confirm_selector = Some("s2".into());
    store.save(&ctx, &user).await.unwrap();
    assert!(
        store
            .load_by_confirm_selector("s1")
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert_eq!(store.load_by_confirm_selector("s2").await.unwrap(), user);
}

#[tokio::test]
async fn test_recover_selector_lookup() {
    let store = test_store().await;
    let ctx = OpContext::background();
    let mut user = saved_user(&store, "a@x.com").await;
    saved_user(&store, "b@x.com").await;

    user.recover_selector = Some("r1".into());
    store.save(&ctx, &user).await.unwrap();
    assert_eq!(
        store.load_by_recover_selector("r1").await.unwrap().email(),
        "a@x.com"
    );
    // The confirm map is separate
    assert!(store.load_by_confirm_selector("r1").await.is_err());
}

#[tokio::test]
async fn test_empty_selector_never_matches() {
    let store = test_store().await;
    let ctx = OpContext::background();
    let mut user = saved_user(&store, "a@x.com").await;
    user.confirm_selector = Some(String::new());
    store.save(&ctx, &user).await.unwrap();

    assert!(store.load_by_confirm_selector("").await.unwrap_err().is_not_found());
    assert!(store.load_by_recover_selector("").await.unwrap_err().is_not_found());
}

// ===== remember tokens =====

#[tokio::test]
async fn test_remember_token_single_use() {
    let store = test_store().await;
    store.add_remember_token("a@x.com", "t").await;

    store.use_remember_token("a@x.com", "t").await.unwrap();
    let err = store.use_remember_token("a@x.com", "t").await.unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::TokenNotFound { .. })));
    assert!(err.is_token_error());
}

#[tokio::test]
async fn test_remember_tokens_have_independent_lifetimes() {
    let store = test_store().await;
    store.add_remember_token("a@x.com", "t1").await;
    store.add_remember_token("a@x.com", "t2").await;

    store.use_remember_token("a@x.com", "t2").await.unwrap();
    assert!(store.use_remember_token("a@x.com", "t2").await.is_err());
    store.use_remember_token("a@x.com", "t1").await.unwrap();
}

#[tokio::test]
async fn test_unknown_identity_has_no_tokens() {
    let store = test_store().await;
    assert!(
        store
            .use_remember_token("nobody@x.com", "t")
            .await
            .unwrap_err()
            .is_token_error()
    );
}

#[tokio::test]
async fn test_delete_all_tokens() {
    let store = test_store().await;
    assert_eq!(store.delete_remember_tokens("a@x.com").await, 0);

    store.add_remember_token("a@x.com", "t1").await;
    store.add_remember_token("a@x.com", "t2").await;
    store.add_remember_token("b@x.com", "t1").await;
    assert_eq!(store.delete_remember_tokens("a@x.com").await, 2);

    assert!(store.use_remember_token("a@x.com", "t1").await.is_err());
    store.use_remember_token("b@x.com", "t1").await.unwrap();
}

#[tokio::test]
async fn test_tokens_do_not_survive_restart() {
    let backend = FaultyBackend::new();
    let store = backend.open(StoreOptions::default()).await.unwrap();
    saved_user(&store, "a@x.com").await;
    store.add_remember_token("a@x.com", "t").await;

    let restarted = backend.open(StoreOptions::default()).await.unwrap();
    assert!(restarted.load("a@x.com").await.is_ok());
    assert_eq!(restarted.remember_token_count("a@x.com").await, 0);
}

// ===== bootstrap =====

#[tokio::test]
async fn test_bootstrap_restores_saved_records() {
    let backend = FaultyBackend::new();
    let store = backend.open(StoreOptions::default()).await.unwrap();
    let ctx = OpContext::background();

    let mut a = saved_user(&store, "a@x.com").await;
    a.confirm_selector = Some("sel".into());
    store.save(&ctx, &a).await.unwrap();
    let b = saved_user(&store, "b@x.com").await;
    // Created but never saved: lost on restart
    store.create(new_user("c@x.com")).await.unwrap();

    let restarted = backend.open(StoreOptions::default()).await.unwrap();
    assert_eq!(restarted.len().await, 2);
    assert_eq!(restarted.load_by_confirm_selector("sel").await.unwrap(), a);

    // Identifiers continue after the highest persisted one
    let d = restarted.create(new_user("d@x.com")).await.unwrap();
    assert!(d.id().unwrap() > b.id().unwrap());
}

#[tokio::test]
async fn test_bootstrap_scan_failure_starts_empty() {
    let backend = FaultyBackend::new();
    let store = backend.open(StoreOptions::default()).await.unwrap();
    saved_user(&store, "a@x.com").await;

    Faults::set(&backend.faults.fail_scan, true);
    let restarted = backend.open(StoreOptions::default()).await.unwrap();
    assert!(restarted.is_empty().await);
}

#[tokio::test]
async fn test_failed_scan_never_reuses_stored_ids() {
    let backend = FaultyBackend::new();
    let store = backend.open(StoreOptions::default()).await.unwrap();
    let alice = saved_user(&store, "alice@x.com").await;

    Faults::set(&backend.faults.fail_scan, true);
    let restarted = backend.open(StoreOptions::default()).await.unwrap();
    let bob = saved_user(&restarted, "bob@x.com").await;

    assert_ne!(bob.id(), alice.id());
    assert_eq!(backend.rows.get(alice.id().unwrap()).await.unwrap(), alice);
    assert_eq!(backend.rows.get(bob.id().unwrap()).await.unwrap(), bob);
    assert_eq!(backend.rows.len().await, 2);
}

#[tokio::test]
async fn test_failed_scan_with_unknown_ids_refuses_create() {
    let backend = FaultyBackend::new();
    let store = backend.open(StoreOptions::default()).await.unwrap();
    let alice = saved_user(&store, "alice@x.com").await;

    Faults::set(&backend.faults.fail_scan, true);
    Faults::set(&backend.faults.fail_max_id, true);
    let restarted = backend.open(StoreOptions::default()).await.unwrap();

    let err = restarted.create(new_user("bob@x.com")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Store(StoreError::Degraded { operation: "create" })
    ));
    assert!(restarted.is_empty().await);
    assert_eq!(backend.rows.get(alice.id().unwrap()).await.unwrap(), alice);
}

#[tokio::test]
async fn test_save_cannot_take_over_stored_row() {
    let backend = FaultyBackend::new();
    let store = backend.open(StoreOptions::default()).await.unwrap();
    let alice = saved_user(&store, "alice@x.com").await;

    // A second store that never saw alice hands out her identifier
    let other = CredentialStore::open(
        Box::new(credstore::backend::database::InMemory::new()),
        StoreOptions::default(),
        &OpContext::background(),
    )
    .await
    .unwrap();
    let bob = other.create(new_user("bob@x.com")).await.unwrap();
    assert_eq!(bob.id(), alice.id());

    let err = backend.upsert(&bob).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(backend.rows.get(alice.id().unwrap()).await.unwrap(), alice);
}

#[tokio::test]
async fn test_strict_bootstrap_scan_failure_is_fatal() {
    let backend = FaultyBackend::new();
    Faults::set(&backend.faults.fail_scan, true);

    let err = backend
        .open(StoreOptions::default().strict_bootstrap(true))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::StartupFailure { .. })));
}

#[tokio::test]
async fn test_provisioning_failure_is_fatal() {
    let backend = FaultyBackend::new();
    Faults::set(&backend.faults.fail_provision, true);

    // Without provisioning the failing step never runs
    assert!(backend.open(StoreOptions::default()).await.is_ok());

    let err = backend
        .open(StoreOptions::default().provision_schema(true))
        .await
        .unwrap_err();
    assert!(err.is_persistence_error());
    assert!(matches!(err, Error::Store(StoreError::StartupFailure { .. })));
}

#[tokio::test]
async fn test_cancelled_bootstrap_aborts_open() {
    let (handle, ctx) = OpContext::cancellable();
    handle.cancel();
    let err = CredentialStore::open(Box::new(FaultyBackend::new()), StoreOptions::default(), &ctx)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

// ===== write-through failures =====

#[tokio::test]
async fn test_persistence_failure_keeps_memory_update() {
    let backend = FaultyBackend::new();
    let store = backend.open(StoreOptions::default()).await.unwrap();
    let mut user = saved_user(&store, "a@x.com").await;

    Faults::set(&backend.faults.fail_writes, true);
    user.role = "Administrator".into();
    let err = store.save(&OpContext::background(), &user).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Store(StoreError::PersistenceFailure { .. })
    ));

    // Memory leads the durable table
    assert_eq!(store.load("a@x.com").await.unwrap().role, "Administrator");
    let row = backend.rows.get(user.id().unwrap()).await.unwrap();
    assert_eq!(row.role, "User");

    // The next successful save converges them
    Faults::set(&backend.faults.fail_writes, false);
    store.save(&OpContext::background(), &user).await.unwrap();
    let row = backend.rows.get(user.id().unwrap()).await.unwrap();
    assert_eq!(row.role, "Administrator");
}

#[tokio::test]
async fn test_timeout_during_durable_write() {
    let backend = FaultyBackend::new();
    let store = backend.open(StoreOptions::default()).await.unwrap();
    let mut user = saved_user(&store, "a@x.com").await;

    backend
        .faults
        .write_delay_ms
        .store(2_000, std::sync::atomic::Ordering::SeqCst);
    user.name = "slow".into();
    let ctx = OpContext::with_timeout(Duration::from_millis(50));
    let err = store.save(&ctx, &user).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(matches!(err, Error::Store(StoreError::TimedOut { .. })));
    assert_eq!(store.load("a@x.com").await.unwrap().name, "slow");
    assert_eq!(
        backend.rows.get(user.id().unwrap()).await.unwrap().name,
        "Test User"
    );
}

#[tokio::test]
async fn test_cancel_during_durable_write() {
    let backend = FaultyBackend::new();
    let store = backend.open(StoreOptions::default()).await.unwrap();
    let mut user = saved_user(&store, "a@x.com").await;

    backend
        .faults
        .write_delay_ms
        .store(2_000, std::sync::atomic::Ordering::SeqCst);
    let (handle, ctx) = OpContext::cancellable();
    user.name = "cancelled".into();

    let save = {
        let store = store.clone();
        let user = user.clone();
        tokio::spawn(async move { store.save(&ctx, &user).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let err = save.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::Cancelled { .. })));
    assert_eq!(
        backend.rows.get(user.id().unwrap()).await.unwrap().name,
        "Test User"
    );
}
