//! Encrypted, file-backed secrets store with RBAC, token auth, and
//! master-key rotation with snapshot backup/restore.
//!
//! Module layout mirrors the dependency order of the system: crypto
//! primitives at the bottom, the repository layer above them, then the
//! secrets store and user registry side by side, auth above both, rotation
//! spanning everything, and `Platform` as the composition root callers use.

pub mod auth;
pub mod cancellation;
pub mod config;
pub mod crypto;
pub mod error;
pub mod platform;
pub mod repository;
pub mod rotation;
pub mod secrets;
pub mod users;

pub use cancellation::CancellationToken;
pub use error::{CoreError, CoreResult};
pub use platform::{BootstrapOutcome, InstallState, Platform};
