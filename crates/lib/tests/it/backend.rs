use chrono::{DateTime, Duration, Utc};
use credstore::{
    OpContext, StoreOptions, User, UserId,
    backend::database::InMemory,
    user::LockoutState,
};

use crate::helpers::*;

/// A timestamp every backend stores exactly (whole microseconds).
fn now_micros() -> DateTime<Utc> {
    DateTime::from_timestamp_micros(Utc::now().timestamp_micros()).unwrap()
}

fn full_record(id: i64, email: &str) -> User {
    let now = now_micros();
    let mut user = User::new(new_user(email)).restored(
        UserId::new(id),
        LockoutState {
            attempt_count: 7,
            last_attempt: Some(now),
            locked_until: Some(now + Duration::hours(12)),
        },
    );
    user.confirm_selector = Some("csel".into());
    user.confirm_verifier = Some("cver".into());
    user.recover_selector = Some("rsel".into());
    user.recover_verifier = Some("rver".into());
    user.recover_token_expiry = Some(now + Duration::hours(24));
    user
}

#[tokio::test]
async fn test_backend_round_trip_fidelity() {
    let backend = test_backend().await;
    backend.provision_schema().await.unwrap();

    let user = full_record(1, "a@x.com");
    let mut bare = User::new(new_user("b@x.com")).restored(UserId::new(2), LockoutState::default());
    bare.confirmed = true;

    backend.insert(&user).await.unwrap();
    backend.upsert(&bare).await.unwrap();

    let mut rows = backend.select_all().await.unwrap();
    rows.sort_by_key(|u| u.id());
    assert_eq!(rows, vec![user, bare]);
}

#[tokio::test]
async fn test_backend_provision_is_idempotent() {
    let backend = test_backend().await;
    backend.provision_schema().await.unwrap();
    backend.insert(&full_record(1, "a@x.com")).await.unwrap();
    backend.provision_schema().await.unwrap();
    assert_eq!(backend.select_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_backend_uniqueness() {
    let backend = test_backend().await;
    backend.provision_schema().await.unwrap();
    backend.insert(&full_record(1, "a@x.com")).await.unwrap();

    assert!(backend.insert(&full_record(1, "b@x.com")).await.unwrap_err().is_conflict());
    assert!(backend.insert(&full_record(2, "a@x.com")).await.unwrap_err().is_conflict());
    assert!(backend.upsert(&full_record(3, "a@x.com")).await.unwrap_err().is_conflict());

    // Same identifier, other email: the stored identity is kept
    assert!(backend.upsert(&full_record(1, "b@x.com")).await.unwrap_err().is_conflict());
    let rows = backend.select_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].email(), "a@x.com");
}

#[tokio::test]
async fn test_backend_max_id() {
    let backend = test_backend().await;
    backend.provision_schema().await.unwrap();
    assert_eq!(backend.max_id().await.unwrap(), None);

    backend.insert(&full_record(4, "a@x.com")).await.unwrap();
    backend.insert(&full_record(2, "b@x.com")).await.unwrap();
    assert_eq!(backend.max_id().await.unwrap(), Some(UserId::new(4)));
}

#[tokio::test]
async fn test_backend_update_by_id() {
    let backend = test_backend().await;
    backend.provision_schema().await.unwrap();

    let mut user = full_record(5, "a@x.com");
    assert!(backend.update_by_id(&user).await.unwrap_err().is_not_found());

    backend.insert(&user).await.unwrap();
    user.clear_recovery();
    user.role = "Administrator".into();
    backend.update_by_id(&user).await.unwrap();
    assert_eq!(backend.select_all().await.unwrap(), vec![user]);
}

#[tokio::test]
async fn test_store_saves_exact_lockout_fields() {
    let store = test_store().await;
    let mut user = saved_user(&store, "a@x.com").await;

    let policy = *store.lockout_policy();
    let now = now_micros();
    policy.register_failure(&mut user, now);
    policy.register_failure(&mut user, now);
    store.save(&OpContext::background(), &user).await.unwrap();

    let stored = store
        .backend()
        .select_all()
        .await
        .unwrap()
        .into_iter()
        .find(|u| u.email() == "a@x.com")
        .unwrap();
    assert_eq!(stored.lockout(), user.lockout());
    assert_eq!(stored.lockout().attempt_count, 2);
}

#[tokio::test]
async fn test_in_memory_json_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credstore.json");

    let store = credstore::CredentialStore::open(
        Box::new(InMemory::new()),
        StoreOptions::default(),
        &OpContext::background(),
    )
    .await
    .unwrap();
    let user = saved_user(&store, "a@x.com").await;
    store
        .backend()
        .as_any()
        .downcast_ref::<InMemory>()
        .unwrap()
        .save_to_file(&path)
        .await
        .unwrap();

    let reloaded = credstore::CredentialStore::open(
        Box::new(InMemory::load_from_file(&path).await.unwrap()),
        StoreOptions::default(),
        &OpContext::background(),
    )
    .await
    .unwrap();
    assert_eq!(reloaded.load("a@x.com").await.unwrap(), user);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_file_restart() {
    use credstore::backend::database::SqlxBackend;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credstore.db");
    let options = StoreOptions::default().provision_schema(true);
    let ctx = OpContext::background();

    let backend = SqlxBackend::open_sqlite(&path).await.unwrap();
    let store = credstore::CredentialStore::open(Box::new(backend), options.clone(), &ctx)
        .await
        .unwrap();
    let mut user = saved_user(&store, "a@x.com").await;
    user.confirmed = true;
    store.save(&ctx, &user).await.unwrap();
    drop(store);

    let backend = SqlxBackend::open_sqlite(&path).await.unwrap();
    let store = credstore::CredentialStore::open(Box::new(backend), options, &ctx)
        .await
        .unwrap();
    assert_eq!(store.load("a@x.com").await.unwrap(), user);
}
