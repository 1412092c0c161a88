//! Worker process lifecycle management
//!
//! The launcher owns the caller-side view of the worker process: it
//! spawns the worker binary with piped stdio, tracks at most one live
//! child at a time, polls its liveness on a ~1s interval, and applies an
//! explicit respawn policy when the child dies. Spawning while a child is
//! alive is rejected and logged, never queued or silently replaced.

use std::io;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::{RespawnPolicy, SearchConfig};

/// The caller's ends of the worker's stdio channel.
pub struct WorkerPipes {
    /// Command channel (caller to worker).
    pub stdin: ChildStdin,
    /// Event channel (worker to caller).
    pub stdout: ChildStdout,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("a worker child is already running")]
    AlreadyRunning,

    #[error("worker command is empty")]
    EmptyCommand,

    #[error("worker stdio pipes were not available after spawn")]
    PipesUnavailable,

    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] io::Error),
}

struct LauncherShared {
    child: Mutex<Option<Child>>,
    pipes: Mutex<Option<WorkerPipes>>,
    respawn_attempts: AtomicU32,
}

/// Caller-side process lifecycle manager for the worker.
pub struct WorkerLauncher {
    config: SearchConfig,
    shared: Arc<LauncherShared>,
    keep_going: Arc<AtomicBool>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerLauncher {
    /// Record the launch configuration and start the liveness monitor.
    /// No worker child exists yet; call [`spawn`](Self::spawn) for that.
    #[must_use]
    pub fn new(config: SearchConfig) -> Self {
        let shared = Arc::new(LauncherShared {
            child: Mutex::new(None),
            pipes: Mutex::new(None),
            respawn_attempts: AtomicU32::new(0),
        });
        let keep_going = Arc::new(AtomicBool::new(true));

        let monitor = {
            let config = config.clone();
            let shared = Arc::clone(&shared);
            let keep_going = Arc::clone(&keep_going);
            std::thread::Builder::new()
                .name("worker-monitor".into())
                .spawn(move || monitor_loop(&config, &shared, &keep_going))
                .ok()
        };
        if monitor.is_none() {
            tracing::error!("failed to start worker liveness monitor");
        }

        Self {
            config,
            shared,
            keep_going,
            monitor: Mutex::new(monitor),
        }
    }

    /// Start the worker child, blocking until the OS reports its pid.
    ///
    /// Rejected with [`LaunchError::AlreadyRunning`] if a child is alive;
    /// the request is dropped, not queued.
    pub fn spawn(&self) -> Result<u32, LaunchError> {
        let mut guard = self.shared.child.lock();
        if let Some(existing) = guard.as_mut() {
            match existing.try_wait() {
                Ok(None) => {
                    tracing::error!("asked to spawn while the current worker is still alive");
                    return Err(LaunchError::AlreadyRunning);
                }
                Ok(Some(status)) => {
                    tracing::warn!(%status, "previous worker had exited; reaping before respawn");
                    guard.take();
                }
                Err(e) => return Err(LaunchError::Spawn(e)),
            }
        }

        let (child, pipes) = spawn_worker(&self.config)?;
        let pid = child.id();
        *guard = Some(child);
        *self.shared.pipes.lock() = Some(pipes);
        self.shared.respawn_attempts.store(0, Ordering::Relaxed);
        tracing::info!(pid, "worker spawned");
        Ok(pid)
    }

    /// Take ownership of the stdio pipes of the most recent spawn. Returns
    /// `None` if no child was spawned or the pipes were already taken.
    #[must_use]
    pub fn take_pipes(&self) -> Option<WorkerPipes> {
        self.shared.pipes.lock().take()
    }

    /// `true` while a child is alive according to the OS.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        let mut guard = self.shared.child.lock();
        match guard.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Pid of the current child, if any.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.shared.child.lock().as_ref().map(Child::id)
    }

    /// Terminate the current child and reap it. Unconditional: in-flight
    /// work is lost, which is acceptable because indexing is idempotent.
    /// Idempotent when no child is running.
    pub fn kill(&self) -> io::Result<()> {
        let child = self.shared.child.lock().take();
        self.shared.pipes.lock().take();
        self.shared.respawn_attempts.store(0, Ordering::Relaxed);

        let Some(mut child) = child else {
            return Ok(());
        };
        let pid = child.id();
        if let Err(e) = child.kill() {
            // InvalidInput means the child already exited on its own.
            if e.kind() != io::ErrorKind::InvalidInput {
                return Err(e);
            }
        }
        child.wait()?;
        tracing::info!(pid, "worker terminated");
        Ok(())
    }

    /// Stop the monitor and terminate any child.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.keep_going.store(false, Ordering::Release);
        if let Err(e) = self.kill() {
            tracing::warn!(error = %e, "failed to kill worker during shutdown");
        }
        if let Some(handle) = self.monitor.lock().take() {
            // The monitor wakes at least once per poll interval, so this
            // join is bounded.
            if handle.join().is_err() {
                tracing::error!("worker monitor thread panicked");
            }
        }
    }
}

impl Drop for WorkerLauncher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_worker(config: &SearchConfig) -> Result<(Child, WorkerPipes), LaunchError> {
    let (program, args) = config
        .worker_command()
        .split_first()
        .ok_or(LaunchError::EmptyCommand)?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        // Worker logs go to stderr and stay visible alongside ours.
        .stderr(Stdio::inherit())
        .spawn()?;

    let stdin = child.stdin.take().ok_or(LaunchError::PipesUnavailable)?;
    let stdout = child.stdout.take().ok_or(LaunchError::PipesUnavailable)?;
    Ok((child, WorkerPipes { stdin, stdout }))
}

/// Liveness monitor: polls the child roughly once per `poll_interval`.
/// A detected death clears the handle and applies the respawn policy; it
/// never terminates a healthy child.
fn monitor_loop(config: &SearchConfig, shared: &LauncherShared, keep_going: &AtomicBool) {
    while keep_going.load(Ordering::Acquire) {
        std::thread::sleep(config.poll_interval());
        if !keep_going.load(Ordering::Acquire) {
            break;
        }

        let died = {
            let mut guard = shared.child.lock();
            match guard.as_mut() {
                None => None,
                Some(child) => match child.try_wait() {
                    Ok(Some(status)) => {
                        guard.take();
                        Some(status)
                    }
                    Ok(None) => None,
                    Err(e) => {
                        tracing::warn!(error = %e, "worker liveness check failed");
                        None
                    }
                },
            }
        };
        let Some(status) = died else {
            continue;
        };

        shared.pipes.lock().take();
        tracing::warn!(%status, "worker child died");

        match config.respawn() {
            RespawnPolicy::Manual => {
                // Caller must respawn and reconnect explicitly.
            }
            RespawnPolicy::Bounded {
                max_attempts,
                backoff,
            } => {
                let attempt = shared.respawn_attempts.fetch_add(1, Ordering::Relaxed) + 1;
                if attempt > *max_attempts {
                    tracing::error!(attempt, "respawn budget exhausted; giving up");
                    continue;
                }
                std::thread::sleep(*backoff * attempt);
                if !keep_going.load(Ordering::Acquire) {
                    break;
                }
                let mut guard = shared.child.lock();
                if guard.is_some() {
                    // The caller respawned explicitly while we backed off.
                    continue;
                }
                match spawn_worker(config) {
                    Ok((child, pipes)) => {
                        let pid = child.id();
                        *guard = Some(child);
                        drop(guard);
                        *shared.pipes.lock() = Some(pipes);
                        tracing::info!(pid, attempt, "worker respawned");
                    }
                    Err(e) => tracing::error!(error = %e, attempt, "worker respawn failed"),
                }
            }
        }
    }
}
