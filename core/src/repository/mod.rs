//! Atomic, locked access to the JSON state files under the configuration
//! root: `master.key`, `secrets.json`, `users.json`, and friends.

pub mod atomic;
pub mod lock;

pub use atomic::{write_atomic, write_atomic_with_mode};
pub use lock::{ConfigLock, LockGuard};
