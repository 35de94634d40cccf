//! Role to permission bindings, grounded in spec section 3's closed
//! permission set and default table.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::repository::atomic::read_if_exists;

pub type Permission = String;

pub const READ: &str = "read";
pub const WRITE: &str = "write";
pub const ROTATE_OWN_TOKEN: &str = "rotate-own-token";
pub const ROTATE_TOKENS: &str = "rotate-tokens";
pub const MANAGE_USERS: &str = "manage-users";

pub const ALL_PERMISSIONS: &[&str] = &[READ, WRITE, ROTATE_OWN_TOKEN, ROTATE_TOKENS, MANAGE_USERS];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolePermissions(pub HashMap<String, HashSet<Permission>>);

impl RolePermissions {
    pub fn permissions_for(&self, role: &str) -> Option<&HashSet<Permission>> {
        self.0.get(role)
    }
}

/// `admin` gets every permission; `reader` gets read-only access plus the
/// ability to rotate its own token.
pub fn default_role_permissions() -> RolePermissions {
    let mut map = HashMap::new();
    map.insert(
        "admin".to_string(),
        ALL_PERMISSIONS.iter().map(|p| p.to_string()).collect(),
    );
    map.insert(
        "reader".to_string(),
        [READ, ROTATE_OWN_TOKEN].iter().map(|p| p.to_string()).collect(),
    );
    RolePermissions(map)
}

/// Loads `roles.json` if present and overlays it on the default table;
/// absent roles keep the default binding (spec section 6: "optional;
/// defaults apply when absent").
pub fn load_role_permissions(config_dir: &Path) -> CoreResult<RolePermissions> {
    let mut table = default_role_permissions();
    if let Some(bytes) = read_if_exists(&config_dir.join("roles.json"))? {
        let overrides: HashMap<String, HashSet<Permission>> = serde_json::from_slice(&bytes)?;
        table.0.extend(overrides);
    }
    Ok(table)
}
