//! loreseek-worker: the search worker process
//!
//! Spawned by the caller-side launcher with piped stdio. Stdin carries
//! protocol commands, stdout carries the JSON event stream, and all logs
//! go to stderr so they never corrupt the channel.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use loreseek::config::WorkerConfig;
use loreseek::worker::WorkerHost;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LORESEEK_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    install_signal_handlers();

    let host = WorkerHost::new(WorkerConfig::default());
    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout();
    host.run(stdin, stdout)
}

/// SIGTERM is an orderly stop; SIGSEGV is fatal and must not look like a
/// clean exit to the supervising launcher.
#[cfg(unix)]
fn install_signal_handlers() {
    extern "C" fn on_sigterm(_: libc::c_int) {
        // Only async-signal-safe calls are allowed here.
        unsafe { libc::_exit(0) }
    }
    extern "C" fn on_sigsegv(_: libc::c_int) {
        unsafe { libc::_exit(1) }
    }
    let sigterm: extern "C" fn(libc::c_int) = on_sigterm;
    let sigsegv: extern "C" fn(libc::c_int) = on_sigsegv;
    unsafe {
        libc::signal(libc::SIGTERM, sigterm as libc::sighandler_t);
        libc::signal(libc::SIGSEGV, sigsegv as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}
