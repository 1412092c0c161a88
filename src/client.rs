//! Caller-side connection to the worker process
//!
//! [`WorkerClient`] owns the caller's end of the IPC channel. Its methods
//! look synchronous but only encode and send commands; results come back
//! later through a listener thread that decodes the worker's event stream
//! and dispatches to the registered [`Responder`]. A [`NullSearchService`]
//! stands in when the subsystem is administratively disabled: same calls,
//! no IPC, always "enabled", functionally silent.

use std::io::{BufRead, BufReader, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::SearchConfig;
use crate::launcher::{LaunchError, WorkerLauncher, WorkerPipes};
use crate::protocol::{Command, WorkerEvent};
use crate::types::{DocumentRef, SearchSections, section_hits};

/// Callbacks the UI layer registers for asynchronous outcomes. Invoked
/// from the listener thread; implementations must not block it.
pub trait Responder: Send + Sync {
    fn on_results_ready(&self, results: SearchSections);
    fn on_indexing_started(&self);
    fn on_error(&self);
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("worker connection is not live")]
    NotConnected,

    #[error("failed to send command: {0}")]
    Io(#[from] std::io::Error),
}

/// The synchronous-looking search API. Implemented by the real
/// [`WorkerClient`] and by [`NullSearchService`].
pub trait SearchService: Send + Sync {
    /// Tell the worker which on-disk index to open or create. Must be
    /// called before any index/search call for that campaign.
    fn init_database(&self, campaign_id: &str) -> Result<(), ClientError>;

    /// Enqueue a document for background indexing; fire-and-forget.
    fn index_document(&self, doc: &DocumentRef) -> Result<(), ClientError>;

    /// Enqueue a query; results arrive via `Responder::on_results_ready`.
    fn search(&self, query: &str) -> Result<(), ClientError>;

    /// Liveness probe; the worker answers with an `ack` event.
    fn ping(&self) -> Result<(), ClientError>;

    /// `true` while the connection is believed to be live.
    fn enabled(&self) -> bool;

    /// Orderly shutdown of the caller side of the channel.
    fn shutdown(&self);
}

/// Client proxy talking to a live worker over its stdio pipes.
pub struct WorkerClient {
    config: SearchConfig,
    sender: Arc<Mutex<std::process::ChildStdin>>,
    /// Cleared by an orderly shutdown so the listener can tell a planned
    /// EOF from a worker crash.
    keep_going: Arc<AtomicBool>,
    /// Cleared when the channel is observed dead (EOF or write failure).
    live: Arc<AtomicBool>,
    listener: Mutex<Option<JoinHandle<()>>>,
    responder: Arc<dyn Responder>,
}

impl WorkerClient {
    /// Wrap the pipes of a freshly spawned worker and start the listener
    /// loop on its own thread.
    #[must_use]
    pub fn connect(
        config: SearchConfig,
        pipes: WorkerPipes,
        responder: Arc<dyn Responder>,
    ) -> Self {
        let keep_going = Arc::new(AtomicBool::new(true));
        let live = Arc::new(AtomicBool::new(true));

        let listener = {
            let keep_going = Arc::clone(&keep_going);
            let live = Arc::clone(&live);
            let responder = Arc::clone(&responder);
            let reader = BufReader::new(pipes.stdout);
            std::thread::Builder::new()
                .name("search-listener".into())
                .spawn(move || listen_loop(reader, &keep_going, &live, responder.as_ref()))
                .ok()
        };
        if listener.is_none() {
            tracing::error!("failed to start search listener thread");
        }

        Self {
            config,
            sender: Arc::new(Mutex::new(pipes.stdin)),
            keep_going,
            live,
            listener: Mutex::new(listener),
            responder,
        }
    }

    /// Send one command line. Safe for concurrent callers; the sender
    /// mutex serializes writes.
    fn send_command(&self, command: &Command) -> Result<(), ClientError> {
        if !self.live.load(Ordering::Acquire) {
            return Err(ClientError::NotConnected);
        }
        let line = command.encode();
        tracing::debug!(line = %line, "sending command to worker");
        let mut sender = self.sender.lock();
        let written = writeln!(sender, "{line}").and_then(|()| sender.flush());
        drop(sender);
        if let Err(e) = written {
            // One on_error per detected failure, not one per lost write.
            if self.live.swap(false, Ordering::AcqRel) {
                tracing::error!(error = %e, "worker command channel is dead");
                self.responder.on_error();
            }
            return Err(ClientError::Io(e));
        }
        Ok(())
    }
}

impl SearchService for WorkerClient {
    fn init_database(&self, campaign_id: &str) -> Result<(), ClientError> {
        let path = self.config.campaign_index_path(campaign_id);
        self.send_command(&Command::InitDatabase { path })
    }

    fn index_document(&self, doc: &DocumentRef) -> Result<(), ClientError> {
        self.responder.on_indexing_started();
        self.send_command(&Command::Index(doc.clone()))
    }

    fn search(&self, query: &str) -> Result<(), ClientError> {
        let terms: Vec<String> = query.split_whitespace().map(ToString::to_string).collect();
        if terms.is_empty() {
            tracing::debug!("ignoring empty search query");
            return Ok(());
        }
        self.send_command(&Command::Search {
            terms,
            limit: self.config.result_limit(),
        })
    }

    fn ping(&self) -> Result<(), ClientError> {
        self.send_command(&Command::Ack)
    }

    fn enabled(&self) -> bool {
        self.live.load(Ordering::Acquire) && self.keep_going.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        self.request_stop();
        self.join_listener();
    }
}

impl WorkerClient {
    /// Mark the shutdown as orderly and ask the worker to quit. Does not
    /// wait for anything; the worker also exits on EOF when its stdin
    /// closes.
    pub(crate) fn request_stop(&self) {
        if !self.keep_going.swap(false, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("shutting down worker client");
        let mut sender = self.sender.lock();
        let _ = writeln!(sender, "{}", Command::Quit.encode());
        let _ = sender.flush();
    }

    /// Join the listener thread. Only returns once the worker's stdout has
    /// closed, so callers that need a bound must make sure the worker is
    /// dead (or dying) first.
    pub(crate) fn join_listener(&self) {
        if let Some(handle) = self.listener.lock().take() {
            if handle.join().is_err() {
                tracing::error!("search listener thread panicked");
            }
        }
    }
}

/// Listener loop: decode worker events line by line and dispatch to the
/// responder. A single malformed line is logged and skipped; EOF ends the
/// loop and, unless shutdown was requested, reports the worker as gone.
fn listen_loop<R: BufRead>(
    mut reader: R,
    keep_going: &AtomicBool,
    live: &AtomicBool,
    responder: &dyn Responder,
) {
    tracing::debug!("search listener started");
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => {
                if keep_going.load(Ordering::Acquire) && live.swap(false, Ordering::AcqRel) {
                    tracing::error!("worker closed the event channel unexpectedly");
                    responder.on_error();
                } else {
                    tracing::debug!("event channel closed");
                }
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match WorkerEvent::parse(trimmed) {
                    Ok(event) => dispatch_event(event, responder),
                    Err(e) => {
                        tracing::warn!(line = %trimmed, error = %e, "ignoring undecodable event");
                    }
                }
            }
            Err(e) => {
                if keep_going.load(Ordering::Acquire) && live.swap(false, Ordering::AcqRel) {
                    tracing::error!(error = %e, "event channel read failed");
                    responder.on_error();
                }
                break;
            }
        }
    }
    tracing::debug!("search listener stopped");
}

fn dispatch_event(event: WorkerEvent, responder: &dyn Responder) {
    match event {
        WorkerEvent::Ready { version } => {
            tracing::debug!(version, "worker reported ready");
        }
        WorkerEvent::Ack => tracing::debug!("worker acknowledged ping"),
        WorkerEvent::Indexed { doc_id } => {
            tracing::debug!(doc_id = %doc_id, "worker indexed document");
        }
        WorkerEvent::Dropped { doc_id, reason } => {
            tracing::warn!(doc_id = %doc_id, reason = %reason, "worker dropped document");
        }
        WorkerEvent::Results { query, hits } => {
            tracing::debug!(query = %query, hits = hits.len(), "results received");
            responder.on_results_ready(section_hits(hits));
        }
        WorkerEvent::Error { message } => {
            tracing::warn!(message = %message, "worker reported an error");
            responder.on_error();
        }
        WorkerEvent::Bye => tracing::debug!("worker said goodbye"),
    }
}

/// Accepts the full API, performs no IPC, reports itself enabled. Used
/// when the search subsystem is administratively disabled so the rest of
/// the application never has to special-case a missing service.
pub struct NullSearchService;

impl SearchService for NullSearchService {
    fn init_database(&self, campaign_id: &str) -> Result<(), ClientError> {
        tracing::debug!(campaign_id, "null search service ignoring init_database");
        Ok(())
    }

    fn index_document(&self, doc: &DocumentRef) -> Result<(), ClientError> {
        tracing::debug!(doc_id = %doc.id, "null search service ignoring index request");
        Ok(())
    }

    fn search(&self, query: &str) -> Result<(), ClientError> {
        tracing::debug!(query, "null search service ignoring query");
        Ok(())
    }

    fn ping(&self) -> Result<(), ClientError> {
        tracing::debug!("null search service ignoring ping");
        Ok(())
    }

    fn enabled(&self) -> bool {
        true
    }

    fn shutdown(&self) {}
}

/// How long a worker gets to exit on its own after `quit` before the
/// launcher kills it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A running service: the client plus, for real workers, the launcher
/// that owns the child process.
pub struct ServiceHandle {
    service: Arc<dyn SearchService>,
    client: Option<Arc<WorkerClient>>,
    launcher: Option<WorkerLauncher>,
}

impl ServiceHandle {
    /// Start the search service for this configuration: spawn a worker
    /// and connect to it, or hand back the null service when disabled.
    pub fn start(
        config: SearchConfig,
        responder: Arc<dyn Responder>,
    ) -> Result<Self, LaunchError> {
        if config.disabled() {
            tracing::info!("search service disabled; using null client");
            return Ok(Self {
                service: Arc::new(NullSearchService),
                client: None,
                launcher: None,
            });
        }

        let launcher = WorkerLauncher::new(config.clone());
        let pid = launcher.spawn()?;
        let pipes = launcher
            .take_pipes()
            .ok_or(LaunchError::PipesUnavailable)?;
        tracing::debug!(pid, "search service connected to worker");
        let client = Arc::new(WorkerClient::connect(config, pipes, responder));
        let service: Arc<dyn SearchService> = client.clone();
        Ok(Self {
            service,
            client: Some(client),
            launcher: Some(launcher),
        })
    }

    #[must_use]
    pub fn service(&self) -> Arc<dyn SearchService> {
        Arc::clone(&self.service)
    }

    #[must_use]
    pub fn launcher(&self) -> Option<&WorkerLauncher> {
        self.launcher.as_ref()
    }

    /// Orderly shutdown with a bounded wait: ask the worker to quit, give
    /// it a grace period to exit, then kill whatever remains. Killing the
    /// child closes its stdout, so the listener join cannot block on a
    /// wedged worker.
    pub fn shutdown(self) {
        let Some(launcher) = self.launcher else {
            self.service.shutdown();
            return;
        };

        if let Some(client) = &self.client {
            client.request_stop();
        }
        let deadline = std::time::Instant::now() + SHUTDOWN_GRACE;
        while launcher.is_alive() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
        launcher.shutdown();
        if let Some(client) = &self.client {
            client.join_listener();
        }
    }
}
