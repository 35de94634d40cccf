//! `AuthService`: the one `Authenticate`/`Authorize` entry point, per spec
//! sections 4.4 and 9 ("delete the other" duplicate auth path — there is
//! only ever this one in this crate).

use std::collections::HashSet;

use crate::auth::rbac::{Permission, RolePermissions};
use crate::crypto::token::hash_token;
use crate::error::{CoreError, CoreResult};
use crate::users::registry::UserRegistry;

/// Ephemeral authenticated principal. Authorization checks consult this
/// snapshot rather than re-deriving from the role table, so a concurrent
/// role-table edit cannot change the outcome of an in-flight request.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub username: String,
    pub role: String,
    pub permissions: HashSet<Permission>,
    pub token_hash: String,
}

pub struct AuthService<'a> {
    registry: &'a UserRegistry,
    role_permissions: RolePermissions,
}

impl<'a> AuthService<'a> {
    pub fn new(registry: &'a UserRegistry, role_permissions: RolePermissions) -> Self {
        AuthService {
            registry,
            role_permissions,
        }
    }

    /// Unknown token, wrong token, and disabled account all surface as
    /// `InvalidToken` to deny an enumeration oracle (spec section 4.4 / 7).
    pub fn authenticate(&self, token: &str) -> CoreResult<UserContext> {
        if token.is_empty() {
            return Err(CoreError::InvalidToken);
        }

        let token_hash = hash_token(token);

        let user = match self.registry.get_by_token(token) {
            Ok(user) => user,
            Err(CoreError::NotFound(_)) | Err(CoreError::Disabled(_)) => {
                return Err(CoreError::InvalidToken)
            }
            Err(other) => return Err(other),
        };

        let permissions = self
            .role_permissions
            .permissions_for(&user.role)
            .cloned()
            .ok_or_else(|| CoreError::InvalidRole(user.role.clone()))?;

        Ok(UserContext {
            username: user.username,
            role: user.role,
            permissions,
            token_hash,
        })
    }

    pub fn authorize(&self, ctx: &UserContext, permission: &str) -> CoreResult<()> {
        if ctx.permissions.contains(permission) {
            Ok(())
        } else {
            Err(CoreError::permission_denied(permission))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::rbac::{default_role_permissions, MANAGE_USERS, READ, WRITE};
    use tempfile::TempDir;

    #[test]
    fn reader_cannot_write() {
        let dir = TempDir::new().unwrap();
        let registry = UserRegistry::new(dir.path());
        let (_user, token) = registry.create("r", "reader").unwrap();

        let auth = AuthService::new(&registry, default_role_permissions());
        let ctx = auth.authenticate(&token).unwrap();

        assert!(auth.authorize(&ctx, READ).is_ok());
        assert!(matches!(
            auth.authorize(&ctx, WRITE),
            Err(CoreError::PermissionDenied { .. })
        ));
        assert!(auth.authorize(&ctx, MANAGE_USERS).is_err());
    }

    #[test]
    fn disabled_user_gets_invalid_token_not_not_found() {
        let dir = TempDir::new().unwrap();
        let registry = UserRegistry::new(dir.path());
        let (_user, token) = registry.create("r", "reader").unwrap();
        registry.disable("r").unwrap();

        let auth = AuthService::new(&registry, default_role_permissions());
        assert!(matches!(auth.authenticate(&token), Err(CoreError::InvalidToken)));
    }

    #[test]
    fn empty_token_is_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = UserRegistry::new(dir.path());
        let auth = AuthService::new(&registry, default_role_permissions());
        assert!(matches!(auth.authenticate(""), Err(CoreError::InvalidToken)));
    }

    #[test]
    fn unknown_token_is_rejected_uniformly() {
        let dir = TempDir::new().unwrap();
        let registry = UserRegistry::new(dir.path());
        registry.create("admin", "admin").unwrap();

        let auth = AuthService::new(&registry, default_role_permissions());
        assert!(matches!(
            auth.authenticate("not-a-real-token"),
            Err(CoreError::InvalidToken)
        ));
    }

    #[test]
    fn context_permissions_are_stable_despite_table_changes() {
        let dir = TempDir::new().unwrap();
        let registry = UserRegistry::new(dir.path());
        let (_user, token) = registry.create("r", "reader").unwrap();

        let auth = AuthService::new(&registry, default_role_permissions());
        let ctx = auth.authenticate(&token).unwrap();

        // A hypothetical concurrent edit to the role table cannot affect
        // a context already captured.
        let mut mutated = default_role_permissions();
        mutated.0.remove("reader");
        assert!(auth.authorize(&ctx, READ).is_ok());
        let _ = mutated;
    }
}
