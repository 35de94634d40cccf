//! Advisory locking of the configuration directory, grounded on
//! `lock_manager.rs::LockManager`/`FileLockGuard`: a lock file under the
//! config root, shared locks for readers, exclusive locks for mutators,
//! bounded by a timeout.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::CoreResult;
use crate::repository::atomic::open_for_lock;
use crate::CoreError;

const LOCK_FILE_NAME: &str = ".lock";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Owns the lock file handle for a configuration directory and hands out
/// shared/exclusive guards.
pub struct ConfigLock {
    path: PathBuf,
    timeout: Duration,
}

impl ConfigLock {
    pub fn new(config_dir: &Path, timeout: Duration) -> Self {
        ConfigLock {
            path: config_dir.join(LOCK_FILE_NAME),
            timeout,
        }
    }

    pub fn lock_shared(&self) -> CoreResult<LockGuard> {
        self.acquire(false)
    }

    pub fn lock_exclusive(&self) -> CoreResult<LockGuard> {
        self.acquire(true)
    }

    fn acquire(&self, exclusive: bool) -> CoreResult<LockGuard> {
        let file = open_for_lock(&self.path)?;
        let deadline = Instant::now() + self.timeout;

        loop {
            let attempt = if exclusive {
                file.try_lock_exclusive()
            } else {
                file.try_lock_shared()
            };

            match attempt {
                Ok(()) => return Ok(LockGuard { file }),
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(_) => {
                    return Err(CoreError::busy(self.path.display().to_string()));
                }
            }
        }
    }
}

/// RAII guard that releases the advisory lock when dropped.
pub struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
