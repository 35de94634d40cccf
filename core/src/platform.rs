//! `Platform`: the composition root. Spec section 9 calls out that the
//! source kept a process-wide CLI helper and a default token generator as
//! module-level globals; this crate has none — every service is built here
//! and handed to callers explicitly.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::auth::rbac::{load_role_permissions, RolePermissions};
use crate::auth::service::{AuthService, UserContext};
use crate::cancellation::CancellationToken;
use crate::config::Config;
use crate::crypto::aead::{MasterKey, AEAD_KEY_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::repository::atomic::write_atomic_with_mode;
use crate::repository::lock::ConfigLock;
use crate::rotation::manager::RotationManager;
use crate::rotation::model::BackupDescriptor;
use crate::secrets::store::SecretsStore;
use crate::users::model::{TokenRecord, User, ADMIN_ROLE};
use crate::users::registry::UserRegistry;

const MASTER_KEY_FILE: &str = "master.key";
const SECRETS_FILE: &str = "secrets.json";
const USERS_FILE: &str = "users.json";
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Which of the three protected files are present, per spec section 4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Healthy,
    FirstRun,
    Partial,
}

fn detect_state(config_dir: &Path) -> InstallState {
    let present = [
        config_dir.join(MASTER_KEY_FILE).is_file(),
        config_dir.join(SECRETS_FILE).is_file(),
        config_dir.join(USERS_FILE).is_file(),
    ];
    let count = present.iter().filter(|p| **p).count();
    match count {
        3 => InstallState::Healthy,
        0 => InstallState::FirstRun,
        _ => InstallState::Partial,
    }
}

/// The admin token is shown exactly once, at bootstrap; neither the
/// registry nor any log retains the raw value afterward.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub admin_username: String,
    pub admin_token: String,
}

pub struct Platform {
    config_dir: PathBuf,
    lock: ConfigLock,
    secrets: SecretsStore,
    registry: UserRegistry,
    rotation: RotationManager,
    role_permissions: RolePermissions,
    config: Config,
}

impl Platform {
    /// Opens (and, on first run, bootstraps) the configuration root.
    /// Refuses with `PartialInstallation` if some but not all of the three
    /// protected files exist.
    pub fn open(config_dir: &Path) -> CoreResult<(Platform, Option<BootstrapOutcome>)> {
        fs::create_dir_all(config_dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(config_dir)?.permissions();
            perms.set_mode(0o700);
            fs::set_permissions(config_dir, perms)?;
        }

        let state = detect_state(config_dir);
        let bootstrap_outcome = match state {
            InstallState::Partial => {
                return Err(CoreError::PartialInstallation(format!(
                    "{} is missing one or more of master.key, secrets.json, users.json",
                    config_dir.display()
                )))
            }
            InstallState::FirstRun => Some(bootstrap(config_dir)?),
            InstallState::Healthy => None,
        };

        let role_permissions = load_role_permissions(config_dir)?;
        let config = Config::load(config_dir)?;

        let platform = Platform {
            config_dir: config_dir.to_path_buf(),
            lock: ConfigLock::new(config_dir, DEFAULT_LOCK_TIMEOUT),
            secrets: SecretsStore::new(config_dir),
            registry: UserRegistry::new(config_dir),
            rotation: RotationManager::new(
                config_dir,
                DEFAULT_LOCK_TIMEOUT,
                config.rotation_backup_count as usize,
            ),
            role_permissions,
            config,
        };

        Ok((platform, bootstrap_outcome))
    }

    fn with_shared_lock<T>(&self, f: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        let _guard = self.lock.lock_shared()?;
        f()
    }

    fn with_exclusive_lock<T>(&self, f: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        let _guard = self.lock.lock_exclusive()?;
        f()
    }

    fn master_key(&self) -> CoreResult<MasterKey> {
        let bytes = fs::read(self.config_dir.join(MASTER_KEY_FILE))?;
        let array: [u8; AEAD_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CoreError::CorruptState("master.key has the wrong length".to_string()))?;
        Ok(MasterKey::from_bytes(array))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // --- Secrets ---

    pub fn put_secret(&self, key: &str, value: &[u8]) -> CoreResult<()> {
        self.with_exclusive_lock(|| {
            let key_material = self.master_key()?;
            self.secrets.put(&key_material, key, value)
        })
    }

    pub fn get_secret(&self, key: &str) -> CoreResult<Vec<u8>> {
        self.with_shared_lock(|| {
            let key_material = self.master_key()?;
            self.secrets.get(&key_material, key)
        })
    }

    pub fn delete_secret(&self, key: &str) -> CoreResult<()> {
        self.with_exclusive_lock(|| self.secrets.delete(key))
    }

    pub fn list_secrets(&self) -> CoreResult<Vec<String>> {
        self.with_shared_lock(|| self.secrets.list())
    }

    pub fn list_disabled_secrets(&self) -> CoreResult<Vec<String>> {
        self.with_shared_lock(|| self.secrets.list_disabled())
    }

    pub fn disable_secret(&self, key: &str) -> CoreResult<()> {
        self.with_exclusive_lock(|| self.secrets.disable(key))
    }

    pub fn enable_secret(&self, key: &str) -> CoreResult<()> {
        self.with_exclusive_lock(|| self.secrets.enable(key))
    }

    /// Delegates to `RotationManager`, which holds its own lock for the
    /// duration of the swap; do not also take `self.lock` here, or a
    /// restore called from within a locked context would self-deadlock.
    pub fn restore_secret(&self, key: &str) -> CoreResult<()> {
        self.rotation.restore_secret(key)
    }

    // --- Users ---

    pub fn create_user(&self, username: &str, role: &str) -> CoreResult<(User, String)> {
        self.with_exclusive_lock(|| self.registry.create(username, role))
    }

    pub fn get_user(&self, username: &str) -> CoreResult<User> {
        self.with_shared_lock(|| self.registry.get_by_username(username))
    }

    pub fn list_users(&self) -> CoreResult<Vec<User>> {
        self.with_shared_lock(|| self.registry.list())
    }

    pub fn delete_user(&self, username: &str) -> CoreResult<()> {
        self.with_exclusive_lock(|| self.registry.delete(username))
    }

    pub fn enable_user(&self, username: &str) -> CoreResult<User> {
        self.with_exclusive_lock(|| self.registry.enable(username))
    }

    pub fn disable_user(&self, username: &str) -> CoreResult<User> {
        self.with_exclusive_lock(|| self.registry.disable(username))
    }

    pub fn rotate_token(&self, username: &str) -> CoreResult<String> {
        self.with_exclusive_lock(|| self.registry.rotate_token(username))
    }

    pub fn add_token(&self, username: &str, name: &str) -> CoreResult<(TokenRecord, String)> {
        self.with_exclusive_lock(|| self.registry.add_token(username, name))
    }

    pub fn revoke_token(&self, username: &str, token_id: &str) -> CoreResult<()> {
        self.with_exclusive_lock(|| self.registry.revoke_token(username, token_id))
    }

    pub fn list_tokens(&self, username: &str) -> CoreResult<Vec<TokenRecord>> {
        self.with_shared_lock(|| self.registry.list_tokens(username))
    }

    // --- Auth ---

    pub fn authenticate(&self, token: &str) -> CoreResult<UserContext> {
        let service = AuthService::new(&self.registry, self.role_permissions.clone());
        service.authenticate(token)
    }

    pub fn authorize(&self, ctx: &UserContext, permission: &str) -> CoreResult<()> {
        let service = AuthService::new(&self.registry, self.role_permissions.clone());
        service.authorize(ctx, permission)
    }

    // --- Rotation / backup ---

    pub fn rotate_master_key(&self, cancel: &CancellationToken) -> CoreResult<()> {
        self.rotation.rotate_master_key(cancel)
    }

    pub fn restore_database(&self, backup_name: &str) -> CoreResult<()> {
        self.rotation.restore_database(backup_name)
    }

    pub fn validate_backup(&self, backup_name: &str) -> CoreResult<()> {
        self.rotation.validate_backup(backup_name)
    }

    pub fn list_backups(&self) -> CoreResult<Vec<BackupDescriptor>> {
        self.rotation.list_backups()
    }
}

fn bootstrap(config_dir: &Path) -> CoreResult<BootstrapOutcome> {
    info!(path = %config_dir.display(), "bootstrapping new configuration root");

    let master_key = MasterKey::generate();
    write_atomic_with_mode(
        &config_dir.join(MASTER_KEY_FILE),
        master_key.as_bytes(),
        0o600,
    )?;

    let secrets = SecretsStore::new(config_dir);
    let empty = crate::secrets::model::SecretsDocument::default();
    write_atomic_with_mode(
        &config_dir.join(SECRETS_FILE),
        &serde_json::to_vec_pretty(&empty)?,
        0o600,
    )?;
    drop(secrets);

    let registry = UserRegistry::new(config_dir);
    let (admin, token) = registry.create(DEFAULT_ADMIN_USERNAME, ADMIN_ROLE)?;

    Ok(BootstrapOutcome {
        admin_username: admin.username,
        admin_token: token,
    })
}
