//! The user/token registry: creation, enable/disable, and the legacy /
//! multi-token lookup unification called for in spec section 9.

pub mod model;
pub mod registry;

pub use model::{TokenRecord, User};
pub use registry::UserRegistry;
