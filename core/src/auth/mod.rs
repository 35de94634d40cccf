//! Authentication and authorization: the single entry point spec section 9
//! demands in place of the teacher's duplicate legacy/platform auth paths.

pub mod rbac;
pub mod service;

pub use rbac::{default_role_permissions, Permission, RolePermissions};
pub use service::{AuthService, UserContext};
