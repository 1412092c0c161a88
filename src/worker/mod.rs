//! Worker-process internals: supervisor, index store, indexer, searcher
//!
//! The [`WorkerHost`] owns everything that lives inside the worker
//! process. It builds the provider registry and the (initially unopened)
//! index store, starts the indexer and searcher threads, and then runs
//! the command-receive loop until `quit` or end-of-stream. Commands
//! either act synchronously (`init_database`) or push onto one of the two
//! single-consumer queues (`index`, `search`).

mod errors;
mod indexer;
mod schema;
mod searcher;
mod store;

pub use errors::{IndexError, IndexResult};
pub use indexer::index_document;
pub use schema::{BODY_TOKENIZER, DocSchema};
pub use store::{DocumentEntry, IndexStore};

use std::io::{BufRead, ErrorKind, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::config::WorkerConfig;
use crate::protocol::{Command, PROTOCOL_VERSION, WorkerEvent};
use crate::provider::ProviderRegistry;
use crate::types::QueryRequest;

/// Shared, thread-safe writer for the outbound event stream. Both worker
/// threads and the command loop report through the same sink; the mutex
/// keeps event lines from interleaving.
#[derive(Clone)]
pub struct EventSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl EventSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Write one event line. Send failures are logged, not propagated;
    /// losing an event must never take down a worker thread.
    pub fn send(&self, event: &WorkerEvent) {
        let line = match event.encode() {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode worker event");
                return;
            }
        };
        let mut writer = self.inner.lock();
        if let Err(e) = writeln!(writer, "{line}").and_then(|()| writer.flush()) {
            tracing::warn!(error = %e, "failed to write event to channel");
        }
    }
}

/// The worker-side supervisor.
pub struct WorkerHost {
    config: WorkerConfig,
    store: Arc<IndexStore>,
    registry: Arc<ProviderRegistry>,
}

impl WorkerHost {
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        let store = Arc::new(IndexStore::new(config.writer_memory_budget));
        let registry = Arc::new(ProviderRegistry::with_defaults());
        Self {
            config,
            store,
            registry,
        }
    }

    /// The shared index store; exposed so embedding callers and tests can
    /// observe indexing progress.
    #[must_use]
    pub fn store(&self) -> Arc<IndexStore> {
        Arc::clone(&self.store)
    }

    /// Run the command-receive loop until `quit` or end-of-stream, then
    /// tear down. `input` carries protocol commands; `output` carries the
    /// JSON event stream.
    pub fn run<R, W>(&self, mut input: R, output: W) -> anyhow::Result<()>
    where
        R: BufRead,
        W: Write + Send + 'static,
    {
        let events = EventSink::new(output);
        let keep_going = Arc::new(AtomicBool::new(true));

        let (documents_tx, documents_rx) = crossbeam_channel::unbounded();
        let (queries_tx, queries_rx) = crossbeam_channel::unbounded();

        let indexer = indexer::Indexer {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            documents: documents_rx,
            events: events.clone(),
            keep_going: Arc::clone(&keep_going),
            poll: self.config.queue_poll,
        };
        let indexer_thread = std::thread::Builder::new()
            .name("indexer".into())
            .spawn(move || indexer.run())?;

        let searcher = searcher::Searcher {
            store: Arc::clone(&self.store),
            queries: queries_rx,
            events: events.clone(),
            keep_going: Arc::clone(&keep_going),
            poll: self.config.queue_poll,
        };
        let searcher_thread = std::thread::Builder::new()
            .name("searcher".into())
            .spawn(move || searcher.run())?;

        events.send(&WorkerEvent::Ready {
            version: PROTOCOL_VERSION,
        });
        tracing::info!(version = PROTOCOL_VERSION, "worker ready");

        let mut line = String::new();
        loop {
            line.clear();
            match input.read_line(&mut line) {
                Ok(0) => {
                    tracing::info!("command channel closed by peer");
                    break;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match Command::parse(trimmed) {
                        Ok(Command::Quit) => {
                            tracing::info!("quit command received");
                            break;
                        }
                        Ok(command) => self.dispatch(command, &documents_tx, &queries_tx, &events),
                        Err(e) => {
                            // Malformed commands never kill the loop.
                            tracing::warn!(line = %trimmed, error = %e, "ignoring malformed command");
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    tracing::warn!(error = %e, "ignoring undecodable command line");
                }
                Err(e) => {
                    tracing::error!(error = %e, "command channel read failed");
                    break;
                }
            }
        }

        self.teardown(
            &keep_going,
            documents_tx,
            queries_tx,
            indexer_thread,
            searcher_thread,
            &events,
        );
        Ok(())
    }

    fn dispatch(
        &self,
        command: Command,
        documents_tx: &crossbeam_channel::Sender<crate::types::DocumentRef>,
        queries_tx: &crossbeam_channel::Sender<QueryRequest>,
        events: &EventSink,
    ) {
        match command {
            Command::InitDatabase { path } => {
                // Synchronous by design; index/search for this campaign
                // are only meaningful once this has completed.
                if let Err(e) = self.store.open(&path) {
                    tracing::error!(path = ?path, error = %e, "init_database failed");
                    events.send(&WorkerEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
            Command::Index(doc) => {
                if documents_tx.send(doc).is_err() {
                    tracing::warn!("indexer queue is gone; dropping index request");
                }
            }
            Command::Search { terms, limit } => {
                let request = QueryRequest {
                    text: terms.join(" "),
                    limit,
                };
                if queries_tx.send(request).is_err() {
                    tracing::warn!("searcher queue is gone; dropping query");
                }
            }
            Command::Ack => events.send(&WorkerEvent::Ack),
            // Quit is handled by the receive loop before dispatch.
            Command::Quit => {}
        }
    }

    /// Fault-isolated teardown: every step runs even if an earlier one
    /// fails, so a stuck commit can't leak threads and a panicked thread
    /// can't leave the index without its final commit.
    fn teardown(
        &self,
        keep_going: &AtomicBool,
        documents_tx: crossbeam_channel::Sender<crate::types::DocumentRef>,
        queries_tx: crossbeam_channel::Sender<QueryRequest>,
        indexer_thread: JoinHandle<()>,
        searcher_thread: JoinHandle<()>,
        events: &EventSink,
    ) {
        tracing::info!("worker shutting down");
        keep_going.store(false, Ordering::Release);

        // Disconnect the queues so blocked pops return immediately; the
        // threads otherwise notice the flag within one poll interval.
        drop(documents_tx);
        drop(queries_tx);

        for (name, handle) in [("indexer", indexer_thread), ("searcher", searcher_thread)] {
            if handle.join().is_err() {
                tracing::error!(thread = name, "worker thread panicked during shutdown");
            }
        }

        if let Err(e) = self.store.close() {
            tracing::error!(error = %e, "closing index store failed");
        }

        events.send(&WorkerEvent::Bye);
        tracing::info!("worker shutdown complete");
    }
}
