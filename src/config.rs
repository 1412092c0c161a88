//! Configuration for the search subsystem
//!
//! Campaign-level settings are carried in an explicit [`SearchConfig`]
//! passed into the launcher and client constructors; there is no
//! process-wide configuration singleton. The worker process itself only
//! needs the small [`WorkerConfig`] subset, since the index location
//! arrives over the wire at `init_database` time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// What the launcher does when it detects that the worker child died.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespawnPolicy {
    /// Log, clear the handle, and wait for the caller to respawn.
    Manual,
    /// Respawn automatically with linear backoff, up to `max_attempts`
    /// times. The attempt counter resets on an explicit `spawn` or `kill`.
    Bounded {
        max_attempts: u32,
        backoff: Duration,
    },
}

/// Errors produced while validating a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("index_root is required")]
    MissingIndexRoot,

    #[error("worker command is empty and no default worker binary was found")]
    MissingWorkerCommand,

    #[error("result_limit must be greater than zero")]
    ZeroResultLimit,

    #[error("poll_interval must be non-zero")]
    ZeroPollInterval,
}

/// Settings the worker process applies to its own threads and index writer.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Timeout for the indexer/searcher queue pops, so the stop flag is
    /// observed within one interval.
    pub queue_poll: Duration,
    /// Tantivy writer heap budget in bytes.
    pub writer_memory_budget: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_poll: Duration::from_millis(250),
            writer_memory_budget: 50_000_000,
        }
    }
}

/// Caller-side configuration for launching and talking to a worker.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub(crate) index_root: PathBuf,
    pub(crate) worker_command: Vec<String>,
    pub(crate) poll_interval: Duration,
    pub(crate) result_limit: usize,
    pub(crate) disabled: bool,
    pub(crate) respawn: RespawnPolicy,
}

impl SearchConfig {
    /// Start building a configuration. `index_root` is mandatory.
    #[must_use]
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }

    /// Directory under which per-campaign index directories are created.
    #[must_use]
    pub fn index_root(&self) -> &Path {
        &self.index_root
    }

    /// Resolve the on-disk index path for one campaign.
    #[must_use]
    pub fn campaign_index_path(&self, campaign_id: &str) -> PathBuf {
        self.index_root.join(campaign_id)
    }

    /// Argv used to start the worker process.
    #[must_use]
    pub fn worker_command(&self) -> &[String] {
        &self.worker_command
    }

    /// Liveness-poll interval for the launcher's monitor thread.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Fixed top-K requested from the worker per query.
    #[must_use]
    pub fn result_limit(&self) -> usize {
        self.result_limit
    }

    /// `true` when the subsystem is administratively disabled and the null
    /// client should be used instead of a worker process.
    #[must_use]
    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Respawn policy applied by the launcher's liveness monitor.
    #[must_use]
    pub fn respawn(&self) -> &RespawnPolicy {
        &self.respawn
    }
}

/// Builder for [`SearchConfig`] with validation and sensible defaults.
#[derive(Debug, Default)]
pub struct SearchConfigBuilder {
    index_root: Option<PathBuf>,
    worker_command: Option<Vec<String>>,
    poll_interval: Option<Duration>,
    result_limit: Option<usize>,
    disabled: bool,
    respawn: Option<RespawnPolicy>,
}

impl SearchConfigBuilder {
    #[must_use]
    pub fn index_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_root = Some(path.into());
        self
    }

    /// Override the worker argv. Defaults to a `loreseek-worker` binary
    /// sitting next to the current executable.
    #[must_use]
    pub fn worker_command(mut self, argv: Vec<String>) -> Self {
        self.worker_command = Some(argv);
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn result_limit(mut self, limit: usize) -> Self {
        self.result_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    #[must_use]
    pub fn respawn(mut self, policy: RespawnPolicy) -> Self {
        self.respawn = Some(policy);
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<SearchConfig, ConfigError> {
        let index_root = self.index_root.ok_or(ConfigError::MissingIndexRoot)?;

        let worker_command = match self.worker_command {
            Some(argv) if argv.is_empty() => return Err(ConfigError::MissingWorkerCommand),
            Some(argv) => argv,
            None => vec![
                default_worker_binary()
                    .ok_or(ConfigError::MissingWorkerCommand)?
                    .to_string_lossy()
                    .into_owned(),
            ],
        };

        let result_limit = self.result_limit.unwrap_or(10);
        if result_limit == 0 {
            return Err(ConfigError::ZeroResultLimit);
        }

        let poll_interval = self.poll_interval.unwrap_or(Duration::from_secs(1));
        if poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }

        Ok(SearchConfig {
            index_root,
            worker_command,
            poll_interval,
            result_limit,
            disabled: self.disabled,
            respawn: self.respawn.unwrap_or(RespawnPolicy::Manual),
        })
    }
}

/// Locate the sibling `loreseek-worker` binary next to the running
/// executable, the common deployment layout.
fn default_worker_binary() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    let name = if cfg!(windows) {
        "loreseek-worker.exe"
    } else {
        "loreseek-worker"
    };
    Some(dir.join(name))
}
