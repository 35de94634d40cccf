//! `RotationManager`: the master-key rotation algorithm, full snapshot
//! backups, and restore, per spec section 4.5.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;

use crate::cancellation::CancellationToken;
use crate::crypto::aead::{decrypt, encrypt, MasterKey, AEAD_KEY_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::repository::atomic::{read_if_exists, write_atomic, write_atomic_with_mode};
use crate::repository::lock::ConfigLock;
use crate::rotation::model::{BackupDescriptor, BackupType};
use crate::secrets::model::SecretsDocument;
use crate::secrets::store::SecretsStore;

const MASTER_KEY_FILE: &str = "master.key";
const SECRETS_FILE: &str = "secrets.json";

pub struct RotationManager {
    config_dir: PathBuf,
    lock: ConfigLock,
    secrets: SecretsStore,
    retention: usize,
}

impl RotationManager {
    pub fn new(config_dir: &Path, lock_timeout: Duration, retention: usize) -> Self {
        RotationManager {
            config_dir: config_dir.to_path_buf(),
            lock: ConfigLock::new(config_dir, lock_timeout),
            secrets: SecretsStore::new(config_dir),
            retention: retention.max(1),
        }
    }

    fn master_key_path(&self) -> PathBuf {
        self.config_dir.join(MASTER_KEY_FILE)
    }

    fn secrets_path(&self) -> PathBuf {
        self.config_dir.join(SECRETS_FILE)
    }

    fn read_master_key(&self) -> CoreResult<MasterKey> {
        let bytes = read_if_exists(&self.master_key_path())?
            .ok_or_else(|| CoreError::CorruptState("master.key missing".to_string()))?;
        let array: [u8; AEAD_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CoreError::CorruptState("master.key has the wrong length".to_string()))?;
        Ok(MasterKey::from_bytes(array))
    }

    fn snapshot_name(&self, kind: BackupType) -> String {
        let base = match kind {
            BackupType::Rotation => "rotation",
            BackupType::Manual => "manual",
            BackupType::PreRestore => "pre-restore",
        };
        format!("{base}-{}", Utc::now().format("%Y%m%d-%H%M%S"))
    }

    fn write_snapshot(&self, kind: BackupType) -> CoreResult<PathBuf> {
        let name = self.snapshot_name(kind);
        let dir = self.config_dir.join(&name);
        fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&dir)?.permissions();
            perms.set_mode(0o700);
            fs::set_permissions(&dir, perms)?;
        }

        if let Some(key_bytes) = read_if_exists(&self.master_key_path())? {
            write_atomic_with_mode(&dir.join(MASTER_KEY_FILE), &key_bytes, 0o600)?;
        }
        if let Some(secrets_bytes) = read_if_exists(&self.secrets_path())? {
            write_atomic(&dir.join(SECRETS_FILE), &secrets_bytes)?;
        }
        Ok(dir)
    }

    /// Steps 1-7 of spec section 4.5. All-or-nothing: if any secret fails
    /// to decrypt under the old key, the rotation aborts before any file
    /// is replaced. `cancel` is checked before the snapshot and before
    /// each encryption; once the final rename has happened cancellation is
    /// no longer honored (post-commit, per spec section 5).
    pub fn rotate_master_key(&self, cancel: &CancellationToken) -> CoreResult<()> {
        let _guard = self.lock.lock_exclusive()?;
        cancel.check()?;

        let old_key = self.read_master_key()?;
        let new_key = MasterKey::generate();

        self.write_snapshot(BackupType::Rotation)?;
        cancel.check()?;

        let mut doc = self.secrets.load_document()?;
        for entry in doc.entries.values_mut() {
            cancel.check()?;
            let plaintext = decrypt(&old_key, &entry.encrypted_value()).map_err(|_| {
                CoreError::CorruptState("failed to decrypt a secret during rotation".to_string())
            })?;
            let resealed = encrypt(&new_key, &plaintext)?;
            entry.nonce = resealed.nonce;
            entry.ct = resealed.ciphertext;
        }

        let backups_dir = self.secrets.backups_dir();
        let mut rekeyed_backups = Vec::new();
        if backups_dir.is_dir() {
            for entry in fs::read_dir(backups_dir)? {
                cancel.check()?;
                let entry = entry?;
                let bytes = fs::read(entry.path())?;
                let sealed: crate::crypto::EncryptedValue = serde_json::from_slice(&bytes)?;
                let plaintext = decrypt(&old_key, &sealed).map_err(|_| {
                    CoreError::CorruptState(
                        "failed to decrypt a per-secret backup during rotation".to_string(),
                    )
                })?;
                let resealed = encrypt(&new_key, &plaintext)?;
                rekeyed_backups.push((entry.path(), serde_json::to_vec(&resealed)?));
            }
        }

        // Commit point: once this rename lands, cancellation is no longer honored.
        cancel.check()?;
        write_atomic_with_mode(&self.master_key_path(), new_key.as_bytes(), 0o600)?;
        write_atomic(&self.secrets_path(), &serde_json::to_vec_pretty(&doc)?)?;
        for (path, bytes) in rekeyed_backups {
            write_atomic(&path, &bytes)?;
        }

        self.apply_retention(BackupType::Rotation)?;
        Ok(())
    }

    fn apply_retention(&self, kind: BackupType) -> CoreResult<()> {
        let mut snapshots = self.list_backups_of_type(kind)?;
        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        for stale in snapshots.into_iter().skip(self.retention) {
            fs::remove_dir_all(&stale.path)?;
        }
        Ok(())
    }

    pub fn restore_secret(&self, key: &str) -> CoreResult<()> {
        let _guard = self.lock.lock_exclusive()?;
        self.secrets.restore_from_backup(key)
    }

    pub fn validate_backup(&self, name: &str) -> CoreResult<()> {
        let dir = self.config_dir.join(name);
        if !dir.join(MASTER_KEY_FILE).is_file() || !dir.join(SECRETS_FILE).is_file() {
            return Err(CoreError::NotFound(name.to_string()));
        }
        let secrets_bytes = fs::read(dir.join(SECRETS_FILE))?;
        let _: SecretsDocument = serde_json::from_slice(&secrets_bytes)?;
        let key_bytes = fs::read(dir.join(MASTER_KEY_FILE))?;
        if key_bytes.len() != AEAD_KEY_SIZE {
            return Err(CoreError::CorruptState(format!(
                "backup {name} has a master key of the wrong length"
            )));
        }
        Ok(())
    }

    /// Takes a `pre-restore` snapshot of current state, validates the
    /// target backup, then atomically replaces `master.key` and
    /// `secrets.json` from it.
    pub fn restore_database(&self, backup_name: &str) -> CoreResult<()> {
        let _guard = self.lock.lock_exclusive()?;
        self.validate_backup(backup_name)?;
        self.write_snapshot(BackupType::PreRestore)?;

        let dir = self.config_dir.join(backup_name);
        let key_bytes = fs::read(dir.join(MASTER_KEY_FILE))?;
        let secrets_bytes = fs::read(dir.join(SECRETS_FILE))?;

        write_atomic_with_mode(&self.master_key_path(), &key_bytes, 0o600)?;
        write_atomic(&self.secrets_path(), &secrets_bytes)?;
        Ok(())
    }

    pub fn list_backups(&self) -> CoreResult<Vec<BackupDescriptor>> {
        let mut out = Vec::new();
        if !self.config_dir.is_dir() {
            return Ok(out);
        }
        for entry in fs::read_dir(&self.config_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(descriptor) = parse_backup_descriptor(&self.config_dir, &name) {
                out.push(descriptor);
            }
        }
        Ok(out)
    }

    fn list_backups_of_type(&self, kind: BackupType) -> CoreResult<Vec<BackupDescriptor>> {
        Ok(self
            .list_backups()?
            .into_iter()
            .filter(|b| b.kind == kind)
            .collect())
    }
}

fn parse_backup_descriptor(config_dir: &Path, name: &str) -> Option<BackupDescriptor> {
    let parts: Vec<&str> = name.rsplitn(3, '-').collect();
    if parts.len() != 3 {
        return None;
    }
    let (time_part, date_part, base) = (parts[0], parts[1], parts[2]);
    let timestamp = chrono::NaiveDateTime::parse_from_str(
        &format!("{date_part}-{time_part}"),
        "%Y%m%d-%H%M%S",
    )
    .ok()?;

    let kind = match base {
        "rotation" => BackupType::Rotation,
        "manual" => BackupType::Manual,
        "pre-restore" => BackupType::PreRestore,
        _ => return None,
    };

    let path = config_dir.join(name);
    let size = dir_size(&path).unwrap_or(0);

    Some(BackupDescriptor {
        name: name.to_string(),
        path,
        size,
        timestamp: timestamp.and_utc(),
        kind,
    })
}

fn dir_size(dir: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        total += entry.metadata()?.len();
    }
    Ok(total)
}
