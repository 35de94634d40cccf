//! On-disk shape of `secrets.json`, grounded on spec section 6's file
//! layout: one JSON document, one entry per key, values self-describing
//! with their own nonce and ciphertext.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptedValue;

pub const SECRETS_DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretEntry {
    pub nonce: String,
    pub ct: String,
    #[serde(default)]
    pub disabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl SecretEntry {
    pub fn new(value: EncryptedValue, disabled: bool) -> Self {
        SecretEntry {
            nonce: value.nonce,
            ct: value.ciphertext,
            disabled,
            updated_at: Utc::now(),
        }
    }

    pub fn encrypted_value(&self) -> EncryptedValue {
        EncryptedValue {
            nonce: self.nonce.clone(),
            ciphertext: self.ct.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsDocument {
    pub version: u32,
    #[serde(default)]
    pub entries: HashMap<String, SecretEntry>,
}

impl Default for SecretsDocument {
    fn default() -> Self {
        SecretsDocument {
            version: SECRETS_DOCUMENT_VERSION,
            entries: HashMap::new(),
        }
    }
}
