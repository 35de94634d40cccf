//! Master-key rotation, snapshot backups, and restore, per spec section 4.5.

pub mod manager;
pub mod model;

pub use manager::RotationManager;
pub use model::{BackupDescriptor, BackupType};
