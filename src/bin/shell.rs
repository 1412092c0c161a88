//! loreseek-shell: interactive prompt for driving a live worker
//!
//! Handy for poking at an index without the surrounding application:
//! spawns a worker, forwards typed commands, and prints results as they
//! arrive from the listener thread.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use loreseek::{DocumentRef, Responder, SearchConfig, SearchSections, ServiceHandle};

struct PrintingResponder;

impl Responder for PrintingResponder {
    fn on_results_ready(&self, results: SearchSections) {
        if results.is_empty() {
            println!("(no results)");
            return;
        }
        for section in results {
            println!("[{}]", section.kind);
            for hit in section.hits {
                println!("  {:.2}  {}  {}", hit.score, hit.locator, hit.excerpt);
            }
        }
    }

    fn on_indexing_started(&self) {
        println!("(indexing started)");
    }

    fn on_error(&self) {
        println!("(search is currently unavailable)");
    }
}

const HELP: &str = "\
commands:
  init <campaign-id>        open or create the campaign's index
  index <path> [kind]       queue a document for indexing (kind defaults to plaintext)
  search <term> [...]       run a ranked query
  ping                      check the worker is responding
  quit                      shut down and exit";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LORESEEK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let index_root = std::env::var_os("LORESEEK_INDEX_ROOT")
        .map_or_else(|| std::env::temp_dir().join("loreseek"), Into::into);
    let config = SearchConfig::builder()
        .index_root(index_root)
        .build()
        .context("invalid configuration")?;

    let handle = ServiceHandle::start(config, Arc::new(PrintingResponder))
        .context("failed to start search service")?;
    let service = handle.service();

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();
    loop {
        print!("loreseek> ");
        std::io::stdout().flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let mut tokens = line.split_whitespace();
        let Some(verb) = tokens.next() else {
            continue;
        };
        let args: Vec<&str> = tokens.collect();

        let outcome = match (verb, args.as_slice()) {
            ("quit", _) => break,
            ("?" | "help", _) => {
                println!("{HELP}");
                Ok(())
            }
            ("init", [campaign_id]) => service.init_database(campaign_id),
            ("index", [path]) => service.index_document(&DocumentRef::new(*path, "plaintext")),
            ("index", [path, kind]) => service.index_document(&DocumentRef::new(*path, *kind)),
            ("search", terms) if !terms.is_empty() => service.search(&terms.join(" ")),
            // The ack comes back on the listener thread as a debug log.
            ("ping", _) => service.ping(),
            _ => {
                println!("unrecognized command (? for help)");
                Ok(())
            }
        };
        if let Err(e) = outcome {
            eprintln!("error: {e}");
        }
    }

    handle.shutdown();
    println!("Goodbye.");
    Ok(())
}
