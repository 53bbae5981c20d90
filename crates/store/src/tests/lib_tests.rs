use super::*;
use serde_json::json;

#[test]
fn merge_recurses_into_nested_objects() {
    let mut target = json!({
        "name": "Acme",
        "settings": {"theme": "dark", "locale": "en"}
    });
    merge_values(&mut target, json!({"settings": {"locale": "de"}}));
    assert_eq!(
        target,
        json!({
            "name": "Acme",
            "settings": {"theme": "dark", "locale": "de"}
        })
    );
}

#[test]
fn merge_null_removes_the_field() {
    let mut target = json!({"name": "Acme", "avatar_url": "a.png"});
    merge_values(&mut target, json!({"avatar_url": null}));
    assert_eq!(target, json!({"name": "Acme"}));
}

#[test]
fn merge_replaces_scalars_and_arrays_wholesale() {
    let mut target = json!({"tags": ["a", "b"], "count": 1});
    merge_values(&mut target, json!({"tags": ["c"], "count": 2}));
    assert_eq!(target, json!({"tags": ["c"], "count": 2}));

    let mut scalar = json!("old");
    merge_values(&mut scalar, json!({"now": "object"}));
    assert_eq!(scalar, json!({"now": "object"}));
}

#[test]
fn store_keys_render_and_parse_symmetrically() {
    let keys = [
        StoreKey::Workspace(WorkspaceId(42)),
        StoreKey::CurrencyList,
        StoreKey::Betas,
        StoreKey::PersonalDetails,
        StoreKey::LoginList,
    ];
    for key in keys {
        let rendered = key.to_string();
        let parsed: StoreKey = rendered.parse().expect("parse rendered key");
        assert_eq!(parsed, key);
    }

    assert!("workspace_not_a_number".parse::<StoreKey>().is_err());
    assert!("unknown_collection".parse::<StoreKey>().is_err());
}

#[tokio::test]
async fn set_then_get_round_trips() {
    let store = DeviceStore::in_memory().await.expect("store");
    let key = StoreKey::Workspace(WorkspaceId(1));
    store.set(key, json!({"name": "Acme"})).await;
    assert_eq!(store.get(&key).await, Some(json!({"name": "Acme"})));
}

#[tokio::test]
async fn merge_creates_missing_entries_and_publishes_the_merged_value() {
    let store = DeviceStore::in_memory().await.expect("store");
    let key = StoreKey::Workspace(WorkspaceId(7));
    let mut changes = store.subscribe();

    store.merge(key, json!({"is_avatar_uploading": true})).await;
    store.merge(key, json!({"name": "Acme"})).await;

    let first = changes.recv().await.expect("first change");
    assert_eq!(first.key, key);
    assert_eq!(first.value, json!({"is_avatar_uploading": true}));

    let second = changes.recv().await.expect("second change");
    assert_eq!(
        second.value,
        json!({"is_avatar_uploading": true, "name": "Acme"})
    );
}

#[tokio::test]
async fn typed_reads_deserialize_stored_values() {
    let store = DeviceStore::in_memory().await.expect("store");
    store
        .set(StoreKey::Betas, json!(["workspaces", "all"]))
        .await;

    let betas: Vec<String> = read_as(&store, &StoreKey::Betas).await.expect("betas");
    assert_eq!(betas, vec!["workspaces".to_string(), "all".to_string()]);

    let missing: Option<Vec<String>> = read_as(&store, &StoreKey::LoginList).await;
    assert!(missing.is_none());
}

#[tokio::test]
async fn entries_persist_across_reopen() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let db_path = std::env::temp_dir().join(format!("device_store_test_{suffix}.sqlite3"));
    let database_url = format!("sqlite://{}", db_path.display());

    let key = StoreKey::Workspace(WorkspaceId(3));
    {
        let store = DeviceStore::new(&database_url).await.expect("store");
        store
            .merge(key, json!({"name": "Acme", "output_currency": "USD"}))
            .await;
        store.merge(key, json!({"name": "Acme Inc"})).await;
    }

    let reopened = DeviceStore::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened.get(&key).await,
        Some(json!({"name": "Acme Inc", "output_currency": "USD"}))
    );

    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn unrecognized_persisted_keys_are_skipped_on_load() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let db_path = std::env::temp_dir().join(format!("device_store_skew_{suffix}.sqlite3"));
    let database_url = format!("sqlite://{}", db_path.display());

    {
        let store = DeviceStore::new(&database_url).await.expect("store");
        store.set(StoreKey::Betas, json!(["workspaces"])).await;
        sqlx::query("INSERT INTO kv_entries (key, value) VALUES ('legacy_blob', '{}')")
            .execute(&store.pool)
            .await
            .expect("insert legacy row");
    }

    let reopened = DeviceStore::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened.get(&StoreKey::Betas).await,
        Some(json!(["workspaces"]))
    );

    let _ = std::fs::remove_file(&db_path);
}
