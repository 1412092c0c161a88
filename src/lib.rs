//! loreseek: supervised full-text search for campaign documents
//!
//! The indexing service runs as a separate worker process hosting a
//! tantivy inverted index. The caller talks to it over a small text
//! command protocol on the worker's stdio: commands go down as
//! newline-delimited token lines, results come back as JSON event lines.
//! Inside the worker, an indexer thread and a searcher thread drain their
//! own queues against one mutex-guarded index store.
//!
//! Search is a best-effort background service: a crashed worker, a bad
//! document, or a failed query degrades search, never the application.

pub mod client;
pub mod config;
pub mod launcher;
pub mod protocol;
pub mod provider;
pub mod types;
pub mod worker;

pub use client::{NullSearchService, Responder, SearchService, ServiceHandle, WorkerClient};
pub use config::{ConfigError, RespawnPolicy, SearchConfig, WorkerConfig};
pub use launcher::{LaunchError, WorkerLauncher, WorkerPipes};
pub use protocol::{Command, PROTOCOL_VERSION, ProtocolError, WorkerEvent};
pub use provider::{ExtractError, Provider, ProviderRegistry};
pub use types::{DocumentRef, SearchHit, SearchSection, SearchSections};
pub use worker::{IndexError, IndexStore, WorkerHost};
