use pofe_core::{resolve_names, DocumentStore, NameQuery, SqliteDocumentStore, UidKind};
use serde_json::json;

fn store() -> SqliteDocumentStore {
    let store = SqliteDocumentStore::open_in_memory().expect("in-memory store should open");
    store
        .create(
            "requirements",
            &json!({"requirements": [{"uid": "req-00000001", "title": "User Login"}]}),
        )
        .expect("layer should be created");
    store
        .create(
            "architecture",
            &json!({"architecture": {"components": [
                {"uid": "arch-00000001", "component": "ContextStore"},
                {"uid": "arch-00000002", "component": "Store"}
            ]}}),
        )
        .expect("layer should be created");
    store
}

#[test]
fn names_in_question_resolve_to_uids() {
    let store = store();

    let hits = resolve_names(
        &store,
        &NameQuery::new("How does user login reach the contextstore?"),
    )
    .expect("name resolution should succeed");

    let uids: Vec<&str> = hits.iter().map(|hit| hit.uid.as_str()).collect();
    assert_eq!(uids, vec!["arch-00000001", "req-00000001"]);
    assert_eq!(hits[0].name, "ContextStore");
    assert_eq!(hits[1].layer, "requirements");
}

#[test]
fn kind_filter_limit_and_blank_text() {
    let store = store();

    let mut query = NameQuery::new("store and ContextStore and User Login");
    query.kind = Some(UidKind::Component);
    let hits = resolve_names(&store, &query).expect("name resolution should succeed");
    assert_eq!(hits.len(), 2);

    query.limit = 1;
    assert_eq!(resolve_names(&store, &query).expect("name resolution should succeed").len(), 1);

    assert!(resolve_names(&store, &NameQuery::new("   ")).expect("name resolution should succeed").is_empty());
}
