//! In-process worker host driven over real pipes
//!
//! These tests run the full command loop, indexer thread, and searcher
//! thread against an actual on-disk index, with the test standing in for
//! the caller side of the channel.

use std::io::{BufRead, BufReader, PipeReader, PipeWriter, Write};
use std::thread::JoinHandle;

use loreseek::config::WorkerConfig;
use loreseek::protocol::{Command, PROTOCOL_VERSION, WorkerEvent};
use loreseek::types::DocumentRef;
use loreseek::worker::WorkerHost;

struct Harness {
    commands: PipeWriter,
    events: BufReader<PipeReader>,
    host_thread: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    fn start() -> Self {
        let (command_rx, commands) = std::io::pipe().unwrap();
        let (event_rx, event_tx) = std::io::pipe().unwrap();

        let host_thread = std::thread::spawn(move || {
            let host = WorkerHost::new(WorkerConfig::default());
            host.run(BufReader::new(command_rx), event_tx)
        });

        let mut harness = Self {
            commands,
            events: BufReader::new(event_rx),
            host_thread,
        };
        assert_eq!(
            harness.next_event(),
            WorkerEvent::Ready {
                version: PROTOCOL_VERSION
            }
        );
        harness
    }

    fn send(&mut self, command: &Command) {
        self.send_raw(&command.encode());
    }

    fn send_raw(&mut self, line: &str) {
        writeln!(self.commands, "{line}").unwrap();
        self.commands.flush().unwrap();
    }

    fn next_event(&mut self) -> WorkerEvent {
        let mut line = String::new();
        let n = self.events.read_line(&mut line).unwrap();
        assert_ne!(n, 0, "event channel closed unexpectedly");
        WorkerEvent::parse(&line).unwrap()
    }

    /// Send `quit`, expect `bye`, and join the host thread.
    fn finish(mut self) {
        self.send(&Command::Quit);
        assert_eq!(self.next_event(), WorkerEvent::Bye);
        self.host_thread.join().unwrap().unwrap();
    }
}

#[test]
fn host_announces_ready_and_obeys_quit() {
    // Harness::start already asserts the ready handshake.
    Harness::start().finish();
}

#[test]
fn host_exits_cleanly_on_command_channel_eof() {
    let Harness {
        commands,
        mut events,
        host_thread,
    } = Harness::start();
    drop(commands);

    let mut line = String::new();
    assert_ne!(events.read_line(&mut line).unwrap(), 0);
    assert_eq!(WorkerEvent::parse(&line).unwrap(), WorkerEvent::Bye);
    host_thread.join().unwrap().unwrap();
}

#[test]
fn index_then_search_end_to_end() {
    let index_dir = tempfile::TempDir::new().unwrap();
    let mut note = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
    writeln!(note, "the party met a beholder beneath the ruined keep").unwrap();

    let mut harness = Harness::start();
    harness.send(&Command::InitDatabase {
        path: index_dir.path().to_path_buf(),
    });

    let doc = DocumentRef::new(note.path().to_string_lossy(), "plaintext");
    harness.send(&Command::Index(doc.clone()));
    assert_eq!(
        harness.next_event(),
        WorkerEvent::Indexed {
            doc_id: doc.id.to_string()
        }
    );

    // The indexed event is emitted after the commit, so the query below
    // is guaranteed to see the document.
    harness.send(&Command::Search {
        terms: vec!["beholder".into()],
        limit: 10,
    });
    match harness.next_event() {
        WorkerEvent::Results { query, hits } => {
            assert_eq!(query, "beholder");
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].doc_id, doc.id.to_string());
            assert_eq!(hits[0].kind, "plaintext");
        }
        other => panic!("expected results, got {other:?}"),
    }

    harness.send(&Command::Search {
        terms: vec!["tarrasque".into()],
        limit: 10,
    });
    match harness.next_event() {
        WorkerEvent::Results { hits, .. } => assert!(hits.is_empty()),
        other => panic!("expected results, got {other:?}"),
    }

    harness.finish();
}

#[test]
fn per_query_limit_from_the_wire_caps_results() {
    let index_dir = tempfile::TempDir::new().unwrap();
    let mut harness = Harness::start();
    harness.send(&Command::InitDatabase {
        path: index_dir.path().to_path_buf(),
    });

    let mut notes = Vec::new();
    for i in 0..3 {
        let mut note = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(note, "dragon sighting number {i}").unwrap();
        let doc = DocumentRef::new(note.path().to_string_lossy(), "plaintext");
        harness.send(&Command::Index(doc.clone()));
        assert_eq!(
            harness.next_event(),
            WorkerEvent::Indexed {
                doc_id: doc.id.to_string()
            }
        );
        notes.push(note);
    }

    // Three matching documents, limit of two.
    harness.send(&Command::Search {
        terms: vec!["dragon".into()],
        limit: 2,
    });
    match harness.next_event() {
        WorkerEvent::Results { hits, .. } => assert_eq!(hits.len(), 2),
        other => panic!("expected results, got {other:?}"),
    }

    harness.finish();
}

#[test]
fn teardown_completes_even_when_the_final_commit_fails() {
    let index_dir = tempfile::TempDir::new().unwrap();
    let mut note = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
    writeln!(note, "doomed session notes").unwrap();

    let mut harness = Harness::start();
    harness.send(&Command::InitDatabase {
        path: index_dir.path().to_path_buf(),
    });
    let doc = DocumentRef::new(note.path().to_string_lossy(), "plaintext");
    harness.send(&Command::Index(doc.clone()));
    assert_eq!(
        harness.next_event(),
        WorkerEvent::Indexed {
            doc_id: doc.id.to_string()
        }
    );

    // Yank the index directory out from under the open store so the
    // closing commit has nowhere to write. Teardown must still join the
    // worker threads and deliver the farewell.
    std::fs::remove_dir_all(index_dir.path()).unwrap();

    harness.finish();
}

#[test]
fn malformed_commands_never_kill_the_loop() {
    let mut harness = Harness::start();
    harness.send_raw("frobnicate all the things");
    harness.send_raw("index only-two-tokens");
    harness.send_raw("");

    // The loop is still alive and answering.
    harness.send(&Command::Ack);
    assert_eq!(harness.next_event(), WorkerEvent::Ack);
    harness.finish();
}

#[test]
fn document_with_unknown_kind_is_dropped() {
    let index_dir = tempfile::TempDir::new().unwrap();
    let mut harness = Harness::start();
    harness.send(&Command::InitDatabase {
        path: index_dir.path().to_path_buf(),
    });

    let doc = DocumentRef::new("/maps/barovia.svg", "hologram");
    harness.send(&Command::Index(doc.clone()));
    match harness.next_event() {
        WorkerEvent::Dropped { doc_id, reason } => {
            assert_eq!(doc_id, doc.id.to_string());
            assert!(reason.contains("hologram"), "reason was: {reason}");
        }
        other => panic!("expected dropped, got {other:?}"),
    }

    harness.finish();
}

#[test]
fn unopenable_index_path_reports_an_error_event() {
    // A regular file where the index directory should go.
    let blocker = tempfile::NamedTempFile::new().unwrap();

    let mut harness = Harness::start();
    harness.send(&Command::InitDatabase {
        path: blocker.path().to_path_buf(),
    });
    match harness.next_event() {
        WorkerEvent::Error { message } => {
            assert!(message.contains("failed to open index"), "message: {message}");
        }
        other => panic!("expected error, got {other:?}"),
    }

    // Queries still work, they just return nothing.
    harness.send(&Command::Search {
        terms: vec!["anything".into()],
        limit: 10,
    });
    match harness.next_event() {
        WorkerEvent::Results { hits, .. } => assert!(hits.is_empty()),
        other => panic!("expected results, got {other:?}"),
    }

    harness.finish();
}
