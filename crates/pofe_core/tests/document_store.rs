use pofe_core::{DocumentStore, SqliteDocumentStore, StoreError};
use serde_json::json;

#[test]
fn create_then_read_round_trips_document() {
    let store = SqliteDocumentStore::open_in_memory().expect("in-memory store should open");
    let doc = json!({"project_summary": "context store", "tags": ["a", "b"], "depth": 2});

    store.create("overview", &doc).expect("layer should be created");

    assert_eq!(store.read("overview").expect("layer should be readable"), doc);
    assert!(store.exists("overview").expect("existence check should succeed"));
}

#[test]
fn read_and_remove_missing_layer_return_not_found() {
    let store = SqliteDocumentStore::open_in_memory().expect("in-memory store should open");

    assert!(matches!(store.read("ideas"), Err(StoreError::NotFound(layer)) if layer == "ideas"));
    assert!(matches!(store.remove("ideas"), Err(StoreError::NotFound(_))));
}

#[test]
fn update_merge_replaces_top_level_keys_only() {
    let store = SqliteDocumentStore::open_in_memory().expect("in-memory store should open");
    store
        .create(
            "overview",
            &json!({"summary": "v1", "goals": {"primary": "a", "secondary": "b"}}),
        )
        .expect("layer should be created");

    store
        .update("overview", &json!({"goals": {"primary": "c"}, "owner": "team"}), true)
        .expect("layer should be updated");

    assert_eq!(
        store.read("overview").expect("layer should be readable"),
        json!({"summary": "v1", "goals": {"primary": "c"}, "owner": "team"})
    );
}

#[test]
fn update_without_merge_replaces_whole_document() {
    let store = SqliteDocumentStore::open_in_memory().expect("in-memory store should open");
    store
        .create("overview", &json!({"summary": "v1", "owner": "team"}))
        .expect("layer should be created");

    store
        .update("overview", &json!({"summary": "v2"}), false)
        .expect("layer should be updated");

    assert_eq!(store.read("overview").expect("layer should be readable"), json!({"summary": "v2"}));
}

#[test]
fn update_creates_absent_layer_in_both_modes() {
    let store = SqliteDocumentStore::open_in_memory().expect("in-memory store should open");

    store.update("ideas", &json!({"ideas": []}), true).expect("layer should be updated");
    store.update("notes", &json!({"text": "x"}), false).expect("layer should be updated");

    assert_eq!(store.read("ideas").expect("layer should be readable"), json!({"ideas": []}));
    assert_eq!(store.read("notes").expect("layer should be readable"), json!({"text": "x"}));
}

#[test]
fn list_is_sorted_and_tracks_removals() {
    let store = SqliteDocumentStore::open_in_memory().expect("in-memory store should open");
    for layer in ["requirements", "architecture", "overview"] {
        store.create(layer, &json!({})).expect("layer should be created");
    }

    assert_eq!(
        store.list().expect("layers should be listed"),
        vec!["architecture", "overview", "requirements"]
    );

    store.remove("overview").expect("layer should be removed");
    assert_eq!(store.list().expect("layers should be listed"), vec!["architecture", "requirements"]);
    assert!(!store.exists("overview").expect("existence check should succeed"));
}

#[test]
fn reopening_file_store_rebuilds_index() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("context.db");

    {
        let store = SqliteDocumentStore::open(&path).expect("store should open");
        store
            .create(
                "requirements",
                &json!({"requirements": [{"uid": "req-aaaa1111", "title": "Login", "status": "new"}]}),
            )
            .expect("layer should be created");
    }

    let reopened = SqliteDocumentStore::open(&path).expect("store should open");
    let entry = reopened
        .find("req-aaaa1111")
        .expect("find should succeed")
        .expect("uid should be indexed");
    assert_eq!(entry.layer, "requirements");
    assert_eq!(entry.item["title"], "Login");
    assert_eq!(reopened.list().expect("layers should be listed"), vec!["requirements"]);
}

#[test]
fn replace_many_is_all_or_nothing() {
    let store = SqliteDocumentStore::open_in_memory().expect("in-memory store should open");
    store.create("overview", &json!({"summary": "v1"})).expect("layer should be created");

    let good = json!({"summary": "v2"});
    let bad = json!("not an object");
    let err = store
        .replace_many(&[("overview", &good), ("ideas", &bad)])
        .expect_err("invalid layer should abort the batch");

    assert!(matches!(err, StoreError::InvalidDocument { .. }));
    assert_eq!(store.read("overview").expect("layer should be readable"), json!({"summary": "v1"}));
    assert!(!store.exists("ideas").expect("existence check should succeed"));
}
