//! `SecretsStore`: Put/Get/Delete/List/Disable/Enable/RestoreFromBackup over
//! `secrets.json`, with the per-key `.bak` backup-on-overwrite discipline
//! from spec section 4.2.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::crypto::aead::{decrypt, encrypt, MasterKey};
use crate::error::{CoreError, CoreResult};
use crate::repository::atomic::{read_if_exists, write_atomic};
use crate::secrets::model::{SecretEntry, SecretsDocument};

const SHELL_METACHARACTERS: &[char] = &[
    '$', '`', ';', '|', '&', '>', '<', '*', '?', '[', ']', '{', '}', '~', '!', '#',
];

/// Rejects empty keys, path separators, `..` traversal, stray control
/// characters, and shell metacharacters, per the catalog in spec section
/// 4.2. Keys become filesystem-adjacent identifiers and must never admit
/// traversal or injection.
pub fn validate_key(key: &str) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::invalid_key(key, "key must not be empty"));
    }
    if key.contains('/') || key.contains('\\') {
        return Err(CoreError::invalid_key(key, "path separators are not allowed"));
    }
    if key.contains("..") {
        return Err(CoreError::invalid_key(key, "'..' is not allowed"));
    }
    if key
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\t' | '\n' | '\r'))
    {
        return Err(CoreError::invalid_key(key, "control characters are not allowed"));
    }
    if key.chars().any(|c| SHELL_METACHARACTERS.contains(&c)) {
        return Err(CoreError::invalid_key(
            key,
            "shell metacharacters are not allowed",
        ));
    }
    Ok(())
}

pub struct SecretsStore {
    secrets_path: PathBuf,
    backups_dir: PathBuf,
}

impl SecretsStore {
    pub fn new(config_dir: &Path) -> Self {
        SecretsStore {
            secrets_path: config_dir.join("secrets.json"),
            backups_dir: config_dir.join("backups"),
        }
    }

    pub fn load_document(&self) -> CoreResult<SecretsDocument> {
        match read_if_exists(&self.secrets_path)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(SecretsDocument::default()),
        }
    }

    fn save_document(&self, doc: &SecretsDocument) -> CoreResult<()> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        write_atomic(&self.secrets_path, &bytes)
    }

    fn backup_path(&self, key: &str) -> PathBuf {
        self.backups_dir.join(format!("{key}.bak"))
    }

    pub fn put(&self, master_key: &MasterKey, key: &str, value: &[u8]) -> CoreResult<()> {
        validate_key(key)?;
        let mut doc = self.load_document()?;

        if let Some(previous) = doc.entries.get(key) {
            let backup_bytes = serde_json::to_vec(&previous.encrypted_value())?;
            write_atomic(&self.backup_path(key), &backup_bytes)?;
        }

        let disabled = doc.entries.get(key).map(|e| e.disabled).unwrap_or(false);
        let sealed = encrypt(master_key, value)?;
        doc.entries
            .insert(key.to_string(), SecretEntry::new(sealed, disabled));
        self.save_document(&doc)
    }

    pub fn get(&self, master_key: &MasterKey, key: &str) -> CoreResult<Vec<u8>> {
        validate_key(key)?;
        let doc = self.load_document()?;
        let entry = doc
            .entries
            .get(key)
            .filter(|e| !e.disabled)
            .ok_or_else(|| CoreError::NotFound(key.to_string()))?;
        decrypt(master_key, &entry.encrypted_value())
    }

    pub fn delete(&self, key: &str) -> CoreResult<()> {
        validate_key(key)?;
        let mut doc = self.load_document()?;
        if doc.entries.remove(key).is_none() {
            return Err(CoreError::NotFound(key.to_string()));
        }
        self.save_document(&doc)
    }

    pub fn list(&self) -> CoreResult<Vec<String>> {
        let doc = self.load_document()?;
        Ok(doc
            .entries
            .iter()
            .filter(|(_, e)| !e.disabled)
            .map(|(k, _)| k.clone())
            .collect())
    }

    pub fn list_disabled(&self) -> CoreResult<Vec<String>> {
        let doc = self.load_document()?;
        Ok(doc
            .entries
            .iter()
            .filter(|(_, e)| e.disabled)
            .map(|(k, _)| k.clone())
            .collect())
    }

    pub fn disable(&self, key: &str) -> CoreResult<()> {
        self.set_disabled(key, true)
    }

    pub fn enable(&self, key: &str) -> CoreResult<()> {
        self.set_disabled(key, false)
    }

    fn set_disabled(&self, key: &str, disabled: bool) -> CoreResult<()> {
        validate_key(key)?;
        let mut doc = self.load_document()?;
        let entry = doc
            .entries
            .get_mut(key)
            .ok_or_else(|| CoreError::NotFound(key.to_string()))?;
        entry.disabled = disabled;
        entry.updated_at = chrono::Utc::now();
        self.save_document(&doc)
    }

    /// Swaps the current value with its `.bak`, per spec section 4.2 and
    /// the "overwrite backup" property: a second restore undoes the first.
    /// The `disabled` flag of the live entry is left untouched (spec
    /// section 9's resolved open question).
    pub fn restore_from_backup(&self, key: &str) -> CoreResult<()> {
        validate_key(key)?;
        let backup_path = self.backup_path(key);
        let backup_bytes = read_if_exists(&backup_path)?
            .ok_or_else(|| CoreError::NotFound(format!("no backup for {key}")))?;
        let backup_value: crate::crypto::EncryptedValue = serde_json::from_slice(&backup_bytes)?;

        let mut doc = self.load_document()?;
        let current = doc
            .entries
            .get(key)
            .ok_or_else(|| CoreError::NotFound(key.to_string()))?
            .clone();

        let displaced_bytes = serde_json::to_vec(&current.encrypted_value())?;
        write_atomic(&backup_path, &displaced_bytes)?;

        let restored = SecretEntry {
            nonce: backup_value.nonce,
            ct: backup_value.ciphertext,
            disabled: current.disabled,
            updated_at: chrono::Utc::now(),
        };
        doc.entries.insert(key.to_string(), restored);
        self.save_document(&doc)
    }

    /// All entries keyed raw, including disabled ones. Used by rotation.
    pub fn all_entries(&self) -> CoreResult<HashMap<String, SecretEntry>> {
        Ok(self.load_document()?.entries)
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SecretsStore {
        SecretsStore::new(dir.path())
    }

    #[test]
    fn round_trip_put_get() {
        let dir = TempDir::new().unwrap();
        let key = MasterKey::generate();
        let s = store(&dir);
        s.put(&key, "db", b"p@ss").unwrap();
        assert_eq!(s.get(&key, "db").unwrap(), b"p@ss");
    }

    #[test]
    fn overwrite_then_restore_swaps() {
        let dir = TempDir::new().unwrap();
        let key = MasterKey::generate();
        let s = store(&dir);
        s.put(&key, "db", b"v1").unwrap();
        s.put(&key, "db", b"v2").unwrap();
        assert_eq!(s.get(&key, "db").unwrap(), b"v2");

        s.restore_from_backup("db").unwrap();
        assert_eq!(s.get(&key, "db").unwrap(), b"v1");

        s.restore_from_backup("db").unwrap();
        assert_eq!(s.get(&key, "db").unwrap(), b"v2");
    }

    #[test]
    fn disabled_secret_is_hidden_but_preserved() {
        let dir = TempDir::new().unwrap();
        let key = MasterKey::generate();
        let s = store(&dir);
        s.put(&key, "db", b"v1").unwrap();
        s.disable("db").unwrap();

        assert!(s.get(&key, "db").is_err());
        assert!(s.list().unwrap().is_empty());
        assert_eq!(s.list_disabled().unwrap(), vec!["db".to_string()]);

        s.enable("db").unwrap();
        assert_eq!(s.get(&key, "db").unwrap(), b"v1");
        assert!(s.list_disabled().unwrap().is_empty());
    }

    #[test]
    fn rejects_path_traversal_keys() {
        assert!(validate_key("../../etc/passwd").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("a;rm -rf").is_err());
        assert!(validate_key("a$b").is_err());
    }

    #[test]
    fn accepts_ordinary_keys() {
        assert!(validate_key("db-password").is_ok());
        assert!(validate_key("API_KEY.prod").is_ok());
    }

    #[test]
    fn injection_attempt_creates_no_stray_files() {
        let dir = TempDir::new().unwrap();
        let key = MasterKey::generate();
        let s = store(&dir);
        assert!(s.put(&key, "../../etc/passwd", b"x").is_err());
        assert!(!dir.path().join("..").join("..").join("etc").exists());
    }
}
