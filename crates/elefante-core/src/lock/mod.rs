//! Lock Manager - transaction-scoped write coordination
//!
//! Multiple client processes share the dual store on one host; the graph
//! engine is strictly single-writer. Locks here are held per operation
//! (milliseconds), never per session. Each lock is a JSON file recording
//! `{holder_pid, acquired_at, operation}` so a contender can tell a live
//! holder from a dead one.
//!
//! Acquisition: atomically create the lock file. If it already exists, read
//! the holder: a dead PID is reclaimed immediately, a lock older than the
//! hard stale threshold is reclaimed with a warning, and a live holder is
//! waited out with exponential backoff up to the acquisition timeout, after
//! which `WriteLockUnavailable` surfaces.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Name of the write lock file under `locks/`
const WRITE_LOCK_FILE: &str = "write.lock";

/// Initial backoff between acquisition attempts
const BACKOFF_INITIAL: Duration = Duration::from_millis(10);

/// Backoff ceiling
const BACKOFF_MAX: Duration = Duration::from_millis(500);

/// Contents of a lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// PID of the process holding the lock
    pub holder_pid: u32,
    /// When the lock was taken
    pub acquired_at: DateTime<Utc>,
    /// Operation the holder is performing
    pub operation: String,
}

/// True when a process with this PID exists on the host.
///
/// On unix this is a `kill(pid, 0)` probe; EPERM still means the process
/// exists. On other platforms liveness cannot be probed cheaply, so holders
/// are assumed alive and only the stale threshold reclaims their locks.
#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    let res = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if res == 0 {
        true
    } else {
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}

#[cfg(not(unix))]
pub fn pid_alive(_pid: u32) -> bool {
    true
}

/// RAII guard for the write lock; the file is removed on drop if this
/// process still owns it.
#[derive(Debug)]
pub struct WriteLock {
    path: PathBuf,
    holder_pid: u32,
}

impl WriteLock {
    /// Explicit release (drop does the same)
    pub fn release(self) {}
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                if let Ok(info) = serde_json::from_str::<LockInfo>(&raw) {
                    if info.holder_pid == self.holder_pid {
                        if let Err(e) = std::fs::remove_file(&self.path) {
                            tracing::warn!("Failed to release write lock {:?}: {}", self.path, e);
                        }
                    } else {
                        tracing::warn!(
                            holder_pid = info.holder_pid,
                            "Write lock was taken over before release; leaving it alone"
                        );
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to read write lock on release: {}", e),
        }
    }
}

/// Process-wide coordination over transaction-scoped write locks
pub struct LockManager {
    dir: PathBuf,
    acquire_timeout: Duration,
    stale_threshold: Duration,
}

impl LockManager {
    /// Create a manager over `dir` (created if absent)
    pub fn new(dir: &Path, acquire_timeout_ms: u64, stale_threshold_ms: u64) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            acquire_timeout: Duration::from_millis(acquire_timeout_ms),
            stale_threshold: Duration::from_millis(stale_threshold_ms),
        })
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(WRITE_LOCK_FILE)
    }

    /// Acquire the write lock for one operation, waiting with bounded
    /// exponential backoff up to the configured timeout.
    pub async fn acquire(&self, operation: &str) -> Result<WriteLock> {
        let path = self.lock_path();
        let started = std::time::Instant::now();
        let mut backoff = BACKOFF_INITIAL;
        let mut last_holder: Option<LockInfo> = None;

        loop {
            if let Some(lock) = self.try_create(&path, operation)? {
                return Ok(lock);
            }

            match self.inspect_holder(&path)? {
                HolderState::Gone => continue, // vanished between attempts
                HolderState::Dead(info) => {
                    tracing::debug!(
                        holder_pid = info.holder_pid,
                        operation = %info.operation,
                        "Reclaiming write lock from dead process"
                    );
                    self.remove_if_unchanged(&path)?;
                    continue;
                }
                HolderState::Stale(info) => {
                    tracing::warn!(
                        holder_pid = info.holder_pid,
                        operation = %info.operation,
                        acquired_at = %info.acquired_at,
                        "Reclaiming write lock past the hard stale threshold"
                    );
                    self.remove_if_unchanged(&path)?;
                    continue;
                }
                HolderState::Live(info) => {
                    last_holder = Some(info);
                }
                HolderState::Contended => {}
            }

            if started.elapsed() >= self.acquire_timeout {
                let holder = last_holder.unwrap_or(LockInfo {
                    holder_pid: 0,
                    acquired_at: Utc::now(),
                    operation: "unknown".to_string(),
                });
                return Err(CoreError::WriteLockUnavailable {
                    waited_ms: started.elapsed().as_millis() as u64,
                    holder_pid: holder.holder_pid,
                    operation: holder.operation,
                });
            }

            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(BACKOFF_MAX);
        }
    }

    /// Atomically create the lock file; `None` when it already exists
    fn try_create(&self, path: &Path, operation: &str) -> Result<Option<WriteLock>> {
        let info = LockInfo {
            holder_pid: std::process::id(),
            acquired_at: Utc::now(),
            operation: operation.to_string(),
        };

        match std::fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(serde_json::to_string(&info)?.as_bytes())?;
                file.sync_all()?;
                Ok(Some(WriteLock {
                    path: path.to_path_buf(),
                    holder_pid: info.holder_pid,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn inspect_holder(&self, path: &Path) -> Result<HolderState> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HolderState::Gone),
            Err(e) => return Err(e.into()),
        };

        let info: LockInfo = match serde_json::from_str(&raw) {
            Ok(info) => info,
            Err(_) => {
                // A freshly created file may not have its contents yet; only
                // an old unreadable file is real corruption.
                let age = std::fs::metadata(path)
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|t| t.elapsed().ok())
                    .unwrap_or(Duration::ZERO);
                if age < Duration::from_secs(1) {
                    return Ok(HolderState::Contended);
                }
                return Err(CoreError::InvariantViolation(format!(
                    "lock file {:?} is corrupt: {}",
                    path,
                    raw.chars().take(64).collect::<String>()
                )));
            }
        };

        if !pid_alive(info.holder_pid) {
            return Ok(HolderState::Dead(info));
        }

        let held_for = Utc::now() - info.acquired_at;
        if held_for.num_milliseconds() >= self.stale_threshold.as_millis() as i64 {
            return Ok(HolderState::Stale(info));
        }

        Ok(HolderState::Live(info))
    }

    /// Best-effort removal during reclaim; losing the race to another
    /// contender is fine, the next create attempt sorts it out.
    fn remove_if_unchanged(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

enum HolderState {
    /// Lock file disappeared between attempts
    Gone,
    /// Holder process no longer exists
    Dead(LockInfo),
    /// Holder exceeded the hard stale threshold
    Stale(LockInfo),
    /// Holder is alive and within bounds
    Live(LockInfo),
    /// File exists but is mid-write by another contender
    Contended,
}

// ============================================================================
// TESTS
// ============================================================================
