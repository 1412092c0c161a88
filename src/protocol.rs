//! Wire protocol between the caller and the worker process
//!
//! Inbound commands (caller to worker) travel as newline-delimited UTF-8
//! lines of space-separated tokens. Path and locator tokens are
//! percent-encoded so the line stays newline-free and space-safe. The
//! command set is closed and versioned; unknown commands are a recoverable
//! parse error, never fatal to the receive loop.
//!
//! Outbound events (worker to caller) are one JSON object per line.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{DocumentRef, SearchHit};

/// Bumped whenever the command or event set changes shape.
pub const PROTOCOL_VERSION: u32 = 1;

/// Result type alias for protocol parsing.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while decoding a command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty command line")]
    Empty,

    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("command `{command}` is missing arguments")]
    MissingArguments { command: &'static str },

    #[error("command `{command}` has unexpected trailing arguments")]
    TrailingArguments { command: &'static str },

    #[error("bad token `{token}`: {reason}")]
    BadToken { token: String, reason: String },
}

/// A command sent from the caller to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open or create the on-disk index at the given path. Must precede any
    /// `Index` or `Search` for that campaign.
    InitDatabase { path: PathBuf },
    /// Enqueue a document for background indexing.
    Index(DocumentRef),
    /// Enqueue a ranked top-`limit` query; results arrive as a `Results`
    /// event.
    Search { terms: Vec<String>, limit: usize },
    /// Liveness probe; the worker answers with an `Ack` event.
    Ack,
    /// Orderly worker shutdown.
    Quit,
}

impl Command {
    /// Encode the command as a single newline-free wire line.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Command::InitDatabase { path } => {
                format!(
                    "init_database {}",
                    urlencoding::encode(&path.to_string_lossy())
                )
            }
            Command::Index(doc) => format!(
                "index {} {} {}",
                doc.id,
                urlencoding::encode(&doc.kind),
                urlencoding::encode(&doc.locator)
            ),
            Command::Search { terms, limit } => {
                format!("search {limit} {}", terms.join(" "))
            }
            Command::Ack => "ack ack".to_string(),
            Command::Quit => "quit".to_string(),
        }
    }

    /// Parse one wire line into a command.
    pub fn parse(line: &str) -> ProtocolResult<Command> {
        let mut tokens = line.split_whitespace();
        let name = tokens.next().ok_or(ProtocolError::Empty)?;
        let args: Vec<&str> = tokens.collect();

        match name {
            "init_database" => {
                let [token] = args[..] else {
                    return Err(arity_error("init_database", &args));
                };
                let path = decode_token(token)?;
                Ok(Command::InitDatabase {
                    path: PathBuf::from(path),
                })
            }
            "index" => {
                let [id, kind, locator] = args[..] else {
                    return Err(arity_error("index", &args));
                };
                let id = Uuid::parse_str(id).map_err(|e| ProtocolError::BadToken {
                    token: id.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Command::Index(DocumentRef {
                    id,
                    kind: decode_token(kind)?,
                    locator: decode_token(locator)?,
                }))
            }
            "search" => {
                let Some((limit, terms)) = args.split_first() else {
                    return Err(ProtocolError::MissingArguments { command: "search" });
                };
                if terms.is_empty() {
                    return Err(ProtocolError::MissingArguments { command: "search" });
                }
                let limit: usize = limit.parse().map_err(|e| ProtocolError::BadToken {
                    token: (*limit).to_string(),
                    reason: format!("result limit: {e}"),
                })?;
                if limit == 0 {
                    return Err(ProtocolError::BadToken {
                        token: "0".into(),
                        reason: "result limit must be greater than zero".into(),
                    });
                }
                Ok(Command::Search {
                    terms: terms.iter().map(ToString::to_string).collect(),
                    limit,
                })
            }
            "ack" => match args[..] {
                ["ack"] => Ok(Command::Ack),
                [] => Err(ProtocolError::MissingArguments { command: "ack" }),
                _ => Err(ProtocolError::TrailingArguments { command: "ack" }),
            },
            "quit" => {
                if args.is_empty() {
                    Ok(Command::Quit)
                } else {
                    Err(ProtocolError::TrailingArguments { command: "quit" })
                }
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

fn arity_error(command: &'static str, args: &[&str]) -> ProtocolError {
    if args.is_empty() {
        ProtocolError::MissingArguments { command }
    } else {
        ProtocolError::TrailingArguments { command }
    }
}

fn decode_token(token: &str) -> ProtocolResult<String> {
    urlencoding::decode(token)
        .map(|cow| cow.into_owned())
        .map_err(|e| ProtocolError::BadToken {
            token: token.to_string(),
            reason: e.to_string(),
        })
}

/// An asynchronous event sent from the worker back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// First event on the channel; announces the protocol version.
    Ready { version: u32 },
    /// Reply to a `Command::Ack` probe.
    Ack,
    /// A document was committed to the index.
    Indexed { doc_id: String },
    /// A document was dropped without being indexed (missing provider,
    /// extraction failure). Per-document, never fatal.
    Dropped { doc_id: String, reason: String },
    /// Ranked results for a previously enqueued query.
    Results { query: String, hits: Vec<SearchHit> },
    /// A command-level failure (e.g. the index could not be opened).
    Error { message: String },
    /// Last event before the worker exits.
    Bye,
}

impl WorkerEvent {
    /// Encode as a single JSON line (without the trailing newline).
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode one JSON line into an event.
    pub fn parse(line: &str) -> serde_json::Result<WorkerEvent> {
        serde_json::from_str(line.trim())
    }
}
