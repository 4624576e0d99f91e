use pofe_core::model::extract::extract_items;
use pofe_core::{DocumentStore, LayerKind, SqliteDocumentStore, UidKind};
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn indexed_uids(store: &SqliteDocumentStore) -> Vec<String> {
    store
        .entries()
        .expect("entries should load")
        .into_iter()
        .map(|entry| entry.uid)
        .collect()
}

fn requirements(items: Value) -> Value {
    json!({ "requirements": items })
}

/// Index rows as `uid -> (layer, item)`.
fn indexed(store: &SqliteDocumentStore) -> BTreeMap<String, (String, Value)> {
    store
        .entries()
        .expect("entries should load")
        .into_iter()
        .map(|entry| (entry.uid, (entry.layer, entry.item)))
        .collect()
}

/// Items found by walking every stored document; the smallest layer name
/// and then the first occurrence own a shared uid.
fn walked(store: &SqliteDocumentStore) -> BTreeMap<String, (String, Value)> {
    let mut out = BTreeMap::new();
    for layer in store.list().expect("list should succeed") {
        let doc = store.read(&layer).expect("listed layer should be readable");
        for location in extract_items(LayerKind::from_name(&layer), &doc) {
            let item = doc
                .pointer(&location.pointer)
                .cloned()
                .expect("extracted pointer should resolve");
            out.entry(location.uid).or_insert((layer.clone(), item));
        }
    }
    out
}

fn assert_index_matches_documents(store: &SqliteDocumentStore, step: &str) {
    assert_eq!(indexed(store), walked(store), "index diverged after {step}");
}

#[test]
fn writes_index_every_addressable_item_of_each_layer() {
    let store = SqliteDocumentStore::open_in_memory().expect("store should open");
    store
        .create(
            "requirements",
            &requirements(json!([
                {"uid": "req-00000001", "title": "Login", "status": "new"},
                {"title": "Draft without uid"}
            ])),
        )
        .expect("requirements should be created");
    store
        .create(
            "architecture",
            &json!({"architecture": {"components": [{"uid": "arch-00000001", "component": "Auth"}], "behaviors": []}}),
        )
        .expect("architecture should be created");
    store
        .create(
            "implementation",
            &json!({"implementation": {"files": [{
                "path": "src/auth.rs",
                "classes": [{"uid": "cls-00000001", "name": "Auth", "methods": [{"uid": "mtd-00000001", "name": "login"}]}],
                "functions": [{"uid": "fn-00000001", "name": "hash"}]
            }]}}),
        )
        .expect("implementation should be created");
    store
        .create("overview", &json!({"uid": "req-ffffffff", "summary": "no items here"}))
        .expect("overview should be created");

    assert_eq!(
        indexed_uids(&store),
        vec![
            "arch-00000001",
            "cls-00000001",
            "fn-00000001",
            "mtd-00000001",
            "req-00000001"
        ]
    );

    let method = store
        .find("mtd-00000001")
        .expect("find should succeed")
        .expect("method should be indexed");
    assert_eq!(method.layer, "implementation");
    assert_eq!(method.kind, Some(UidKind::Method));
    assert_eq!(method.item["name"], "login");
}

#[test]
fn rewriting_a_layer_drops_stale_entries() {
    let store = SqliteDocumentStore::open_in_memory().expect("store should open");
    store
        .create(
            "requirements",
            &requirements(json!([
                {"uid": "req-00000001", "title": "a"},
                {"uid": "req-00000002", "title": "b"}
            ])),
        )
        .expect("requirements should be created");

    store
        .update(
            "requirements",
            &requirements(json!([{"uid": "req-00000002", "title": "b2"}])),
            false,
        )
        .expect("requirements should be replaced");

    assert!(store
        .find("req-00000001")
        .expect("find should succeed")
        .is_none());
    assert_eq!(
        store
            .find("req-00000002")
            .expect("find should succeed")
            .expect("kept uid should be indexed")
            .item["title"],
        "b2"
    );
}

#[test]
fn removing_a_layer_drops_its_entries() {
    let store = SqliteDocumentStore::open_in_memory().expect("store should open");
    store
        .create("ideas", &json!({"ideas": [{"uid": "idea-1", "status": "new"}]}))
        .expect("ideas should be created");
    store
        .create("requirements", &requirements(json!([{"uid": "req-00000001"}])))
        .expect("requirements should be created");

    store.remove("ideas").expect("ideas should be removed");

    assert_eq!(indexed_uids(&store), vec!["req-00000001"]);
}

#[test]
fn rebuild_is_idempotent() {
    let store = SqliteDocumentStore::open_in_memory().expect("store should open");
    store
        .create(
            "requirements",
            &requirements(json!([
                {"uid": "req-00000001", "status": "new"},
                {"uid": "req-00000002", "status": "done"}
            ])),
        )
        .expect("requirements should be created");
    let before = store.entries().expect("entries should load");

    assert_eq!(store.rebuild_all().expect("rebuild should succeed"), 2);
    assert_eq!(store.rebuild_all().expect("rebuild should succeed"), 2);
    assert_eq!(store.entries().expect("entries should load"), before);
}

#[test]
fn shared_uid_belongs_to_smallest_layer_name_regardless_of_write_order() {
    let store = SqliteDocumentStore::open_in_memory().expect("store should open");
    store
        .create(
            "requirements",
            &requirements(json!([
                {"uid": "req-00000001", "title": "first"},
                {"uid": "req-00000001", "title": "second"}
            ])),
        )
        .expect("requirements should be created");
    store
        .create(
            "architecture",
            &json!({"architecture": {"components": [{"uid": "req-00000001", "component": "Shadow"}]}}),
        )
        .expect("architecture should be created");

    let owner = store
        .find("req-00000001")
        .expect("find should succeed")
        .expect("shared uid should be indexed");
    assert_eq!(owner.layer, "architecture");
    assert_index_matches_documents(&store, "second writer");

    let before = store.entries().expect("entries should load");
    store.rebuild_all().expect("rebuild should succeed");
    assert_eq!(store.entries().expect("entries should load"), before);
}

#[test]
fn removing_the_owner_hands_shared_uid_to_remaining_layer() {
    let store = SqliteDocumentStore::open_in_memory().expect("store should open");
    store
        .create(
            "requirements",
            &requirements(json!([{"uid": "req-00000001", "title": "Login"}])),
        )
        .expect("requirements should be created");
    store
        .create(
            "ideas",
            &json!({"ideas": [{"uid": "req-00000001", "title": "Login idea"}]}),
        )
        .expect("ideas should be created");
    assert_eq!(
        store
            .find("req-00000001")
            .expect("find should succeed")
            .expect("shared uid should be indexed")
            .layer,
        "ideas"
    );

    store.remove("ideas").expect("ideas should be removed");

    let entry = store
        .find("req-00000001")
        .expect("find should succeed")
        .expect("uid should fall back to requirements");
    assert_eq!(entry.layer, "requirements");
    assert_eq!(entry.item["title"], "Login");
    assert_index_matches_documents(&store, "owner removal");
}

#[test]
fn rewriting_the_owner_without_the_uid_releases_it() {
    let store = SqliteDocumentStore::open_in_memory().expect("store should open");
    store
        .create("requirements", &requirements(json!([{"uid": "req-00000001", "title": "Login"}])))
        .expect("requirements should be created");
    store
        .create("ideas", &json!({"ideas": [{"uid": "req-00000001", "title": "idea"}]}))
        .expect("ideas should be created");

    store
        .update("ideas", &json!({"ideas": []}), false)
        .expect("ideas should be replaced");

    assert_eq!(
        store
            .find("req-00000001")
            .expect("find should succeed")
            .expect("uid should fall back to requirements")
            .layer,
        "requirements"
    );
    assert_index_matches_documents(&store, "owner rewrite");
}

#[test]
fn reopening_repairs_a_tampered_index() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let path = dir.path().join("context.db");

    {
        let store = SqliteDocumentStore::open(&path).expect("store should open");
        store
            .create(
                "requirements",
                &requirements(json!([
                    {"uid": "req-00000001", "title": "Login", "status": "new"},
                    {"uid": "req-00000002", "title": "Logout", "status": "new"}
                ])),
            )
            .expect("requirements should be created");
        store
            .connection()
            .execute_batch(
                "DELETE FROM entity_index WHERE uid = 'req-00000001';
                 INSERT INTO entity_index (uid, layer, kind, status, item)
                 VALUES ('req-stale000', 'requirements', 'req', 'new', '{\"uid\":\"req-stale000\"}');
                 UPDATE entity_index SET status = 'done' WHERE uid = 'req-00000002';",
            )
            .expect("index rows should be tampered");
        assert_ne!(indexed(&store), walked(&store));
    }

    let reopened = SqliteDocumentStore::open(&path).expect("store should reopen");

    assert_index_matches_documents(&reopened, "reopen");
    assert_eq!(indexed_uids(&reopened), vec!["req-00000001", "req-00000002"]);
    assert_eq!(
        reopened
            .find_by_status("new")
            .expect("status query should succeed")
            .len(),
        2
    );
}

#[test]
fn index_mirrors_documents_through_mixed_writes() {
    let store = SqliteDocumentStore::open_in_memory().expect("store should open");

    store
        .create(
            "requirements",
            &requirements(json!([
                {"uid": "req-00000001", "title": "Login", "status": "new"},
                {"uid": "req-00000002", "title": "Export", "status": "new"}
            ])),
        )
        .expect("requirements should be created");
    assert_index_matches_documents(&store, "create requirements");

    store
        .create(
            "architecture",
            &json!({"architecture": {"components": [
                {"uid": "arch-00000001", "component": "Auth", "related_to": ["req-00000001"]}
            ], "behaviors": []}}),
        )
        .expect("architecture should be created");
    assert_index_matches_documents(&store, "create architecture");

    store
        .update(
            "requirements",
            &requirements(json!([
                {"uid": "req-00000002", "title": "Export", "status": "reviewed"},
                {"uid": "req-00000003", "title": "Audit"}
            ])),
            true,
        )
        .expect("requirements should be merged");
    assert_index_matches_documents(&store, "merge update");

    store
        .update(
            "implementation",
            &json!({"files": [{"path": "src/auth.rs", "functions": [{"uid": "fn-00000001", "name": "login"}]}]}),
            false,
        )
        .expect("implementation should be created by update");
    assert_index_matches_documents(&store, "replace update of absent layer");

    let ideas = json!({"ideas": [{"uid": "req-00000003", "title": "Audit idea"}, {"uid": "idea-1"}]});
    let architecture = json!({"components": [{"uid": "arch-00000002", "component": "Store"}]});
    store
        .replace_many(&[("ideas", &ideas), ("architecture", &architecture)])
        .expect("replace_many should succeed");
    assert_index_matches_documents(&store, "replace_many");
    assert!(store
        .find("arch-00000001")
        .expect("find should succeed")
        .is_none());

    store.remove("ideas").expect("ideas should be removed");
    assert_index_matches_documents(&store, "remove ideas");

    store
        .update("implementation", &json!({"notes": "none"}), true)
        .expect("implementation should be merged");
    assert_index_matches_documents(&store, "merge without items");

    store
        .remove("requirements")
        .expect("requirements should be removed");
    assert_index_matches_documents(&store, "remove requirements");

    let before = store.entries().expect("entries should load");
    store.rebuild_all().expect("rebuild should succeed");
    assert_eq!(store.entries().expect("entries should load"), before);
}

#[test]
fn status_lookup_reflects_latest_write() {
    let store = SqliteDocumentStore::open_in_memory().expect("store should open");
    store
        .create(
            "requirements",
            &requirements(json!([
                {"uid": "req-00000002", "status": "new"},
                {"uid": "req-00000001", "status": "new"},
                {"uid": "req-00000003", "status": "reviewed"}
            ])),
        )
        .expect("requirements should be created");

    let new: Vec<String> = store
        .find_by_status("new")
        .expect("status query should succeed")
        .into_iter()
        .map(|entry| entry.uid)
        .collect();
    assert_eq!(new, vec!["req-00000001", "req-00000002"]);
    assert!(store
        .find_by_status("done")
        .expect("status query should succeed")
        .is_empty());
}
