use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::error::{LauncherError, LauncherResult};
use crate::process;

/// A lock file younger than this with no readable owner is still being written.
const UNREADABLE_GRACE: Duration = Duration::from_secs(5);
const RETRY_EVERY: Duration = Duration::from_millis(25);

/// Cross-process lock held by the existence of a file.
///
/// The file records the owner's pid; a lock whose owner is gone is
/// treated as stale and taken over. Released on drop.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Take the lock if it is free. `Ok(None)` when another live owner holds it.
    pub fn try_acquire(path: &Path) -> LauncherResult<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        // Second round only after a stale lock was removed.
        for _ in 0..2 {
            match OpenOptions::new().create_new(true).write(true).open(path) {
                Ok(mut file) => {
                    let payload = serde_json::json!({ "pid": std::process::id() });
                    file.write_all(payload.to_string().as_bytes())
                        .map_err(|e| LauncherError::io(path, e))?;
                    return Ok(Some(Self {
                        path: path.to_path_buf(),
                    }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if !clear_stale(path) {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(LauncherError::io(path, e)),
            }
        }
        Ok(None)
    }

    /// Wait up to `timeout` for the lock.
    pub fn acquire(path: &Path, timeout: Duration) -> LauncherResult<Self> {
        let started = Instant::now();
        loop {
            if let Some(lock) = Self::try_acquire(path)? {
                return Ok(lock);
            }
            if started.elapsed() >= timeout {
                return Err(LauncherError::Busy(path.to_string_lossy().to_string()));
            }
            std::thread::sleep(RETRY_EVERY);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("failed to remove lock {}: {e}", self.path.to_string_lossy());
        }
    }
}

fn owner_pid(path: &Path) -> Option<u32> {
    let text = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&text).ok()?;
    value.get("pid")?.as_u64().map(|pid| pid as u32)
}

/// Remove the lock at `path` if its owner is gone. Returns whether it was removed.
fn clear_stale(path: &Path) -> bool {
    let stale = match owner_pid(path) {
        Some(pid) => !process::is_alive(pid),
        None => std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok())
            .is_some_and(|age| age > UNREADABLE_GRACE),
    };
    if !stale {
        return false;
    }
    log::warn!("removing stale lock {}", path.to_string_lossy());
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(_) => false,
    }
}
