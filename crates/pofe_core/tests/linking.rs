use pofe_core::{ContextService, DocumentStore, SqliteDocumentStore};
use serde_json::json;

fn service() -> ContextService<SqliteDocumentStore> {
    let store = SqliteDocumentStore::open_in_memory().expect("in-memory store should open");
    store
        .create(
            "requirements",
            &json!({"requirements": [
                {"uid": "req-1", "title": "Login", "related_to": ["arch-1", "arch-missing"]}
            ]}),
        )
        .expect("layer should be created");
    store
        .create(
            "architecture",
            &json!({"architecture": {"components": [
                {"uid": "arch-1", "component": "Auth"},
                {"uid": "arch-2", "component": "Store", "related_to": []}
            ]}}),
        )
        .expect("layer should be created");
    ContextService::new(store)
}

#[test]
fn link_records_both_directions() {
    let service = service();

    assert!(service.link("req-1", "arch-2").expect("link should succeed"));

    let requirement = service
        .store()
        .find("req-1")
        .expect("find should succeed")
        .expect("uid should be indexed");
    let component = service
        .store()
        .find("arch-2")
        .expect("find should succeed")
        .expect("uid should be indexed");
    assert_eq!(
        requirement.item["related_to"],
        json!(["arch-1", "arch-missing", "arch-2"])
    );
    assert_eq!(component.item["related_to"], json!(["req-1"]));

    let bundle = service.gather("arch-2", 1).expect("gather should succeed");
    assert!(bundle.related.contains_key("req-1"));
}

#[test]
fn link_rejects_unknown_or_identical_endpoints() {
    let service = service();

    assert!(!service.link("req-1", "arch-404").expect("link should succeed"));
    assert!(!service.link("req-1", "req-1").expect("link should succeed"));
}

#[test]
fn repeated_link_does_not_duplicate_edges() {
    let service = service();

    service.link("req-1", "arch-2").expect("link should succeed");
    service.link("arch-2", "req-1").expect("link should succeed");

    let component = service
        .store()
        .find("arch-2")
        .expect("find should succeed")
        .expect("uid should be indexed");
    assert_eq!(component.item["related_to"], json!(["req-1"]));
}

#[test]
fn backfill_mirrors_resolvable_edges() {
    let service = service();

    assert_eq!(service.backfill_links("requirements").expect("backfill should succeed"), 1);
    assert_eq!(service.backfill_links("requirements").expect("backfill should succeed"), 0);

    let component = service
        .store()
        .find("arch-1")
        .expect("find should succeed")
        .expect("uid should be indexed");
    assert_eq!(component.item["related_to"], json!(["req-1"]));
    let doc = service.store().read("architecture").expect("layer should be readable");
    assert_eq!(doc["architecture"]["components"][0]["component"], "Auth");
}
