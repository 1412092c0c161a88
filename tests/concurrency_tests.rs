//! Concurrent access to the shared index store

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use loreseek::worker::{IndexStore, index_document};
use loreseek::{DocumentRef, ProviderRegistry};

const WRITERS: usize = 4;
const DOCS_PER_WRITER: usize = 8;

#[test]
fn concurrent_writers_and_searchers_share_one_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = Arc::new(IndexStore::new(50_000_000));
    store.open(dir.path()).unwrap();
    let registry = Arc::new(ProviderRegistry::with_defaults());
    let writing = Arc::new(AtomicBool::new(true));

    // Searcher threads hammer the store while the writers commit; every
    // query must come back (possibly empty), never panic or error.
    let searchers: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            let writing = Arc::clone(&writing);
            std::thread::spawn(move || {
                let mut observed = 0usize;
                while writing.load(Ordering::Acquire) {
                    observed = observed.max(store.search("session", 64).len());
                    std::thread::yield_now();
                }
                observed
            })
        })
        .collect();

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let store = Arc::clone(&store);
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for i in 0..DOCS_PER_WRITER {
                    let mut file = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
                    writeln!(file, "session notes volume {w} page {i}").unwrap();
                    let doc = DocumentRef::new(file.path().to_string_lossy(), "plaintext");
                    index_document(&store, &registry, &doc).unwrap();
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    writing.store(false, Ordering::Release);
    for searcher in searchers {
        searcher.join().unwrap();
    }

    let expected = (WRITERS * DOCS_PER_WRITER) as u64;
    assert_eq!(store.num_docs(), expected);
    assert_eq!(
        store.search("session", expected as usize * 2).len(),
        expected as usize
    );
}

#[test]
fn reopen_during_concurrent_queries_is_safe() {
    let dir_a = tempfile::TempDir::new().unwrap();
    let dir_b = tempfile::TempDir::new().unwrap();
    let store = Arc::new(IndexStore::new(50_000_000));
    store.open(dir_a.path()).unwrap();
    let running = Arc::new(AtomicBool::new(true));

    let searcher = {
        let store = Arc::clone(&store);
        let running = Arc::clone(&running);
        std::thread::spawn(move || {
            while running.load(Ordering::Acquire) {
                // Must never observe a torn handle, whichever index is live.
                let _ = store.search("dragons", 10);
                std::thread::yield_now();
            }
        })
    };

    for _ in 0..10 {
        store.open(dir_b.path()).unwrap();
        store.open(dir_a.path()).unwrap();
    }

    running.store(false, Ordering::Release);
    searcher.join().unwrap();
    assert!(store.is_open());
}
