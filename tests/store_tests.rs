//! Index store behavior: open/search/commit semantics and stemming

use loreseek::worker::{DocumentEntry, IndexStore};

fn entry(id: &str, body: &str) -> DocumentEntry {
    DocumentEntry {
        id: id.to_string(),
        locator: format!("/notes/{id}.txt"),
        kind: "plaintext".to_string(),
        body: body.to_string(),
        digest: format!("{:016x}", xxhash_rust::xxh3::xxh3_64(body.as_bytes())),
    }
}

#[test]
fn search_before_init_returns_empty_not_error() {
    let store = IndexStore::new(50_000_000);
    assert!(!store.is_open());
    assert!(store.search("dragons", 10).is_empty());
    assert_eq!(store.num_docs(), 0);
}

#[test]
fn indexed_terms_are_searchable() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = IndexStore::new(50_000_000);
    store.open(dir.path()).unwrap();

    store.commit_document(&entry("doc-1", "foo bar baz")).unwrap();
    assert_eq!(store.num_docs(), 1);

    for term in ["foo", "bar", "baz"] {
        let hits = store.search(term, 10);
        assert_eq!(hits.len(), 1, "term `{term}` should match");
        assert_eq!(hits[0].doc_id, "doc-1");
        assert_eq!(hits[0].kind, "plaintext");
        assert_eq!(hits[0].excerpt, "foo bar baz");
    }
    assert!(store.search("qux", 10).is_empty());
}

#[test]
fn stemming_matches_morphological_variants() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = IndexStore::new(50_000_000);
    store.open(dir.path()).unwrap();

    store
        .commit_document(&entry("doc-1", "the dragons guard their lairs"))
        .unwrap();

    // Singular query, plural document, and vice versa.
    assert_eq!(store.search("dragon", 10).len(), 1);
    assert_eq!(store.search("lair", 10).len(), 1);
    assert_eq!(store.search("DRAGONS", 10).len(), 1);
}

#[test]
fn recommitting_the_same_id_replaces_the_posting() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = IndexStore::new(50_000_000);
    store.open(dir.path()).unwrap();

    store.commit_document(&entry("doc-1", "old goblin notes")).unwrap();
    store.commit_document(&entry("doc-1", "new dragon notes")).unwrap();

    assert_eq!(store.num_docs(), 1);
    assert!(store.search("goblin", 10).is_empty());
    assert_eq!(store.search("dragon", 10).len(), 1);
}

#[test]
fn unparsable_query_returns_empty_not_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = IndexStore::new(50_000_000);
    store.open(dir.path()).unwrap();
    store.commit_document(&entry("doc-1", "foo")).unwrap();

    // Unbalanced quote is a parser error inside the engine.
    assert!(store.search("\"unterminated", 10).is_empty());
}

#[test]
fn reopening_preserves_committed_documents() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let store = IndexStore::new(50_000_000);
        store.open(dir.path()).unwrap();
        store.commit_document(&entry("doc-1", "persistent lore")).unwrap();
        store.close().unwrap();
    }
    let store = IndexStore::new(50_000_000);
    store.open(dir.path()).unwrap();
    assert_eq!(store.num_docs(), 1);
    assert_eq!(store.search("lore", 10).len(), 1);
}

#[test]
fn reinit_swaps_to_a_different_index() {
    let dir_a = tempfile::TempDir::new().unwrap();
    let dir_b = tempfile::TempDir::new().unwrap();
    let store = IndexStore::new(50_000_000);

    store.open(dir_a.path()).unwrap();
    store.commit_document(&entry("doc-a", "ravenloft mists")).unwrap();

    store.open(dir_b.path()).unwrap();
    assert_eq!(store.num_docs(), 0);
    assert!(store.search("mists", 10).is_empty());

    // The first campaign's index is still intact on disk.
    store.open(dir_a.path()).unwrap();
    assert_eq!(store.search("mists", 10).len(), 1);
}

#[test]
fn close_is_safe_on_an_unopened_store() {
    let store = IndexStore::new(50_000_000);
    store.close().unwrap();
    store.close().unwrap();
}

#[test]
fn result_limit_caps_ranked_hits() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = IndexStore::new(50_000_000);
    store.open(dir.path()).unwrap();

    for i in 0..15 {
        store
            .commit_document(&entry(&format!("doc-{i}"), "dragon sighting report"))
            .unwrap();
    }
    assert_eq!(store.num_docs(), 15);
    assert_eq!(store.search("dragon", 10).len(), 10);
}
