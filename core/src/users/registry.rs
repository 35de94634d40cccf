//! `UserRegistry`: Create/GetByUsername/GetByToken/List/Update/Delete/
//! Enable/Disable/RotateToken/AddToken/RevokeToken/ListTokens, per spec
//! section 4.3.

use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::crypto::constant_time::constant_time_eq;
use crate::crypto::token::{generate_token, hash_token};
use crate::error::{CoreError, CoreResult};
use crate::repository::atomic::{read_if_exists, write_atomic};
use crate::users::model::{TokenRecord, User, ADMIN_ROLE};

pub struct UserRegistry {
    users_path: PathBuf,
}

impl UserRegistry {
    pub fn new(config_dir: &Path) -> Self {
        UserRegistry {
            users_path: config_dir.join("users.json"),
        }
    }

    pub fn load(&self) -> CoreResult<Vec<User>> {
        match read_if_exists(&self.users_path)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, users: &[User]) -> CoreResult<()> {
        let bytes = serde_json::to_vec_pretty(users)?;
        write_atomic(&self.users_path, &bytes)
    }

    /// Returns the new user record and the raw token, shown to the caller
    /// exactly once; only `hash(token)` is ever persisted.
    pub fn create(&self, username: &str, role: &str) -> CoreResult<(User, String)> {
        let mut users = self.load()?;
        if users.iter().any(|u| u.username == username) {
            return Err(CoreError::Exists(username.to_string()));
        }

        let raw_token = generate_token();
        let user = User {
            username: username.to_string(),
            role: role.to_string(),
            token_hash: Some(hash_token(&raw_token)),
            tokens: None,
            token_rotated_at: Some(Utc::now()),
            disabled: false,
        };

        users.push(user.clone());
        self.save(&users)?;
        Ok((user, raw_token))
    }

    pub fn get_by_username(&self, username: &str) -> CoreResult<User> {
        self.load()?
            .into_iter()
            .find(|u| u.username == username)
            .ok_or_else(|| CoreError::NotFound(username.to_string()))
    }

    /// Hashes `raw` and scans every user's candidate hashes with
    /// constant-time comparison. Returns `Disabled` (not `NotFound`) for a
    /// match against a disabled user, per spec section 4.3.
    pub fn get_by_token(&self, raw: &str) -> CoreResult<User> {
        let candidate = hash_token(raw);
        let candidate_bytes = candidate.as_bytes();

        let users = self.load()?;
        let matched = users.into_iter().find(|u| {
            u.token_hashes()
                .any(|h| constant_time_eq(h.as_bytes(), candidate_bytes))
        });

        match matched {
            Some(user) if user.disabled => Err(CoreError::Disabled(user.username)),
            Some(user) => Ok(user),
            None => Err(CoreError::NotFound("no matching token".to_string())),
        }
    }

    pub fn list(&self) -> CoreResult<Vec<User>> {
        self.load()
    }

    pub fn update(&self, username: &str, f: impl FnOnce(&mut User)) -> CoreResult<User> {
        let mut users = self.load()?;
        let user = users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| CoreError::NotFound(username.to_string()))?;
        f(user);
        let updated = user.clone();
        self.save(&users)?;
        Ok(updated)
    }

    /// Fails if `username` is the sole remaining admin.
    pub fn delete(&self, username: &str) -> CoreResult<()> {
        let mut users = self.load()?;
        let target = users
            .iter()
            .find(|u| u.username == username)
            .ok_or_else(|| CoreError::NotFound(username.to_string()))?;

        if target.is_admin() {
            let admin_count = users.iter().filter(|u| u.is_admin()).count();
            if admin_count <= 1 {
                return Err(CoreError::InvalidArgument(
                    "cannot delete the last remaining admin".to_string(),
                ));
            }
        }

        users.retain(|u| u.username != username);
        self.save(&users)
    }

    pub fn enable(&self, username: &str) -> CoreResult<User> {
        self.update(username, |u| u.disabled = false)
    }

    pub fn disable(&self, username: &str) -> CoreResult<User> {
        self.update(username, |u| u.disabled = true)
    }

    /// Generates a new token, replaces the legacy `token_hash`, and stamps
    /// `token_rotated_at`. Disabled users cannot rotate.
    pub fn rotate_token(&self, username: &str) -> CoreResult<String> {
        let mut users = self.load()?;
        let user = users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| CoreError::NotFound(username.to_string()))?;
        if user.disabled {
            return Err(CoreError::Disabled(username.to_string()));
        }

        let raw_token = generate_token();
        user.token_hash = Some(hash_token(&raw_token));
        user.token_rotated_at = Some(Utc::now());
        self.save(&users)?;
        Ok(raw_token)
    }

    /// Appends a named token record; names must be unique per user.
    pub fn add_token(&self, username: &str, name: &str) -> CoreResult<(TokenRecord, String)> {
        let mut users = self.load()?;
        let user = users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| CoreError::NotFound(username.to_string()))?;

        let existing = user.tokens.get_or_insert_with(Vec::new);
        if existing.iter().any(|t| t.name == name) {
            return Err(CoreError::Exists(format!("token name {name}")));
        }

        let raw_token = generate_token();
        let record = TokenRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            hash: hash_token(&raw_token),
            created_at: Utc::now(),
            last_used_at: None,
            disabled: false,
        };
        existing.push(record.clone());
        self.save(&users)?;
        Ok((record, raw_token))
    }

    pub fn revoke_token(&self, username: &str, token_id: &str) -> CoreResult<()> {
        let mut users = self.load()?;
        let user = users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| CoreError::NotFound(username.to_string()))?;

        let tokens = user
            .tokens
            .as_mut()
            .ok_or_else(|| CoreError::NotFound(token_id.to_string()))?;
        let before = tokens.len();
        tokens.retain(|t| t.id != token_id);
        if tokens.len() == before {
            return Err(CoreError::NotFound(token_id.to_string()));
        }
        self.save(&users)
    }

    pub fn list_tokens(&self, username: &str) -> CoreResult<Vec<TokenRecord>> {
        Ok(self.get_by_username(username)?.tokens.unwrap_or_default())
    }

    pub fn admin_exists(&self) -> CoreResult<bool> {
        Ok(self.load()?.iter().any(|u| u.role == ADMIN_ROLE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> UserRegistry {
        UserRegistry::new(dir.path())
    }

    #[test]
    fn create_then_authenticate_by_raw_token() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let (user, token) = reg.create("admin", ADMIN_ROLE).unwrap();
        assert_eq!(user.username, "admin");

        let found = reg.get_by_token(&token).unwrap();
        assert_eq!(found.username, "admin");
    }

    #[test]
    fn duplicate_username_rejected() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.create("admin", ADMIN_ROLE).unwrap();
        assert!(reg.create("admin", ADMIN_ROLE).is_err());
    }

    #[test]
    fn disabled_user_token_reports_disabled_not_not_found() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let (_user, token) = reg.create("r", "reader").unwrap();
        reg.disable("r").unwrap();

        match reg.get_by_token(&token) {
            Err(CoreError::Disabled(_)) => {}
            other => panic!("expected Disabled, got {other:?}"),
        }
    }

    #[test]
    fn rotate_token_invalidates_the_old_one() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        let (_user, old_token) = reg.create("admin", ADMIN_ROLE).unwrap();
        let new_token = reg.rotate_token("admin").unwrap();

        assert!(reg.get_by_token(&old_token).is_err());
        assert!(reg.get_by_token(&new_token).is_ok());
    }

    #[test]
    fn disabled_user_cannot_rotate() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.create("admin", ADMIN_ROLE).unwrap();
        reg.disable("admin").unwrap();
        assert!(reg.rotate_token("admin").is_err());
    }

    #[test]
    fn add_token_requires_unique_names_per_user() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.create("admin", ADMIN_ROLE).unwrap();
        reg.add_token("admin", "ci").unwrap();
        assert!(reg.add_token("admin", "ci").is_err());
    }

    #[test]
    fn revoke_token_removes_it_from_lookup() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.create("admin", ADMIN_ROLE).unwrap();
        let (record, raw) = reg.add_token("admin", "ci").unwrap();

        reg.revoke_token("admin", &record.id).unwrap();
        assert!(reg.get_by_token(&raw).is_err());
    }

    #[test]
    fn last_admin_cannot_be_deleted() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.create("admin", ADMIN_ROLE).unwrap();
        assert!(reg.delete("admin").is_err());
        assert_eq!(reg.list().unwrap().len(), 1);
    }

    #[test]
    fn second_admin_allows_deleting_the_first() {
        let dir = TempDir::new().unwrap();
        let reg = registry(&dir);
        reg.create("admin", ADMIN_ROLE).unwrap();
        reg.create("admin2", ADMIN_ROLE).unwrap();
        assert!(reg.delete("admin").is_ok());
    }
}
