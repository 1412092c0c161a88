//! Background indexing thread
//!
//! Single consumer of the document queue. The pop uses a short timeout so
//! the stop flag is observed within one interval instead of blocking
//! forever. Extraction runs outside the store mutex; only the final
//! commit takes it, so a slow PDF conversion never blocks a concurrent
//! search.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use xxhash_rust::xxh3::xxh3_64;

use crate::protocol::WorkerEvent;
use crate::provider::ProviderRegistry;
use crate::types::DocumentRef;

use super::EventSink;
use super::errors::{IndexError, IndexResult};
use super::store::{DocumentEntry, IndexStore};

pub(crate) struct Indexer {
    pub(crate) store: Arc<IndexStore>,
    pub(crate) registry: Arc<ProviderRegistry>,
    pub(crate) documents: Receiver<DocumentRef>,
    pub(crate) events: EventSink,
    pub(crate) keep_going: Arc<AtomicBool>,
    pub(crate) poll: Duration,
}

impl Indexer {
    pub(crate) fn run(self) {
        tracing::debug!("indexer thread started");
        while self.keep_going.load(Ordering::Acquire) {
            match self.documents.recv_timeout(self.poll) {
                Ok(doc) => self.process(doc),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::debug!("indexer thread stopped");
    }

    fn process(&self, doc: DocumentRef) {
        match index_document(&self.store, &self.registry, &doc) {
            Ok(()) => {
                tracing::debug!(doc_id = %doc.id, locator = %doc.locator, "document indexed");
                self.events.send(&WorkerEvent::Indexed {
                    doc_id: doc.id.to_string(),
                });
            }
            Err(e) => {
                // Per-document failure: log, report, move on.
                tracing::warn!(
                    doc_id = %doc.id,
                    locator = %doc.locator,
                    kind = %doc.kind,
                    error = %e,
                    "dropping document"
                );
                self.events.send(&WorkerEvent::Dropped {
                    doc_id: doc.id.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Index one document: provider lookup, pre-check, extraction (all outside
/// the store mutex), then a stem-tokenized commit under it.
pub fn index_document(
    store: &IndexStore,
    registry: &ProviderRegistry,
    doc: &DocumentRef,
) -> IndexResult<()> {
    let provider = registry
        .get(&doc.kind)
        .ok_or_else(|| IndexError::MissingProvider(doc.kind.clone()))?;

    if !provider.can_handle(doc) {
        return Err(IndexError::Extraction {
            locator: doc.locator.clone(),
            source: crate::provider::ExtractError::Rejected(
                "provider pre-check refused the document".into(),
            ),
        });
    }

    let body = provider
        .extract(doc)
        .map_err(|source| IndexError::Extraction {
            locator: doc.locator.clone(),
            source,
        })?;

    let entry = DocumentEntry {
        id: doc.id.to_string(),
        locator: doc.locator.clone(),
        kind: doc.kind.clone(),
        digest: format!("{:016x}", xxh3_64(body.as_bytes())),
        body,
    };
    store.commit_document(&entry)
}
