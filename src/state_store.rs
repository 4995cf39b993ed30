//! Persisted sampler state between runs.
//!
//! A single small JSON document holds the counters of the previous run and
//! the log scan watermark. Loading is best-effort: a missing or corrupt file
//! yields an empty state and every field is optional, so old or partial files
//! never block a run. Saving replaces the file atomically.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Counters and timestamps carried from one run to the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_read_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_write_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx_packets: Option<u64>,
    /// Epoch seconds of the previous sample.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Exclusive lower bound for the next log scan.
    #[serde(
        default,
        alias = "last_log_ts",
        skip_serializing_if = "Option::is_none"
    )]
    pub log_watermark: Option<i64>,
}

impl PersistedState {
    /// Watermark for the next scan, falling back to the previous sample time.
    pub fn watermark(&self) -> Option<i64> {
        self.log_watermark.or(self.timestamp)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("State file I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("State file {} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Another run holds the lock on {}", path.display())]
    Busy { path: PathBuf },

    #[error("Failed to lock {}: {errno}", path.display())]
    Lock { path: PathBuf, errno: Errno },
}

/// Exclusive advisory lock held for the duration of one run.
///
/// Released when dropped.
pub struct RunLock {
    _lock: Flock<File>,
    path: PathBuf,
}

impl std::fmt::Debug for RunLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLock").field("path", &self.path).finish()
    }
}

impl RunLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads and writes [`PersistedState`] at a fixed path.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort load. Any failure is logged and yields an empty state.
    pub fn load(&self) -> PersistedState {
        match self.try_load() {
            Ok(state) => state,
            Err(e) => {
                warn!("Ignoring previous state: {}", e);
                PersistedState::default()
            }
        }
    }

    /// Strict load. A missing file is an empty state, not an error.
    pub fn try_load(&self) -> Result<PersistedState, StateError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting fresh", self.path.display());
                return Ok(PersistedState::default());
            }
            Err(e) => return Err(self.io_err(e)),
        };

        serde_json::from_str(&content).map_err(|e| StateError::Parse {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Replaces the state file with `state`.
    ///
    /// Written to a sibling temp file, synced, then renamed over the target so
    /// a crash mid-write leaves either the old or the new state.
    pub fn save(&self, state: &PersistedState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let json = serde_json::to_vec(state).map_err(|e| StateError::Parse {
            path: self.path.clone(),
            source: e,
        })?;

        let tmp = self.sibling("tmp");
        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            self.io_err(e)
        })?;

        debug!("State saved to {}", self.path.display());
        Ok(())
    }

    /// Takes the run lock without blocking.
    ///
    /// Returns [`StateError::Busy`] when another run holds it.
    pub fn lock(&self) -> Result<RunLock, StateError> {
        let path = self.sibling("lock");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StateError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| StateError::Io {
                path: path.clone(),
                source: e,
            })?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => Ok(RunLock { _lock: lock, path }),
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Err(StateError::Busy { path }),
            Err((_, errno)) => Err(StateError::Lock { path, errno }),
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }

    fn io_err(&self, source: io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
