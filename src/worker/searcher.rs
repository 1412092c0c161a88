//! Background query thread
//!
//! Single consumer of the query queue with the same bounded-timeout pop
//! discipline as the indexer. The store mutex is held only around the
//! engine call; result delivery happens after release.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::protocol::WorkerEvent;
use crate::types::QueryRequest;

use super::EventSink;
use super::store::IndexStore;

pub(crate) struct Searcher {
    pub(crate) store: Arc<IndexStore>,
    pub(crate) queries: Receiver<QueryRequest>,
    pub(crate) events: EventSink,
    pub(crate) keep_going: Arc<AtomicBool>,
    pub(crate) poll: Duration,
}

impl Searcher {
    pub(crate) fn run(self) {
        tracing::debug!("searcher thread started");
        while self.keep_going.load(Ordering::Acquire) {
            match self.queries.recv_timeout(self.poll) {
                Ok(request) => self.execute(request),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::debug!("searcher thread stopped");
    }

    fn execute(&self, request: QueryRequest) {
        // Empty or unparsable queries and an unopened store all come back
        // as zero hits from the store.
        let hits = self.store.search(&request.text, request.limit);
        tracing::debug!(query = %request.text, hits = hits.len(), "query executed");
        self.events.send(&WorkerEvent::Results {
            query: request.text,
            hits,
        });
    }
}
