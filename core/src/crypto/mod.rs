//! Cryptographic primitives for the secrets platform.
//!
//! Every AEAD operation, random byte source, and token digest the rest of
//! the crate needs funnels through this module so there is exactly one
//! place that picks an algorithm, an encoding, and a random source.

pub mod aead;
pub mod constant_time;
pub mod secret_gen;
pub mod token;

pub use aead::{decrypt, encrypt, EncryptedValue, MasterKey, AEAD_KEY_SIZE, AEAD_NONCE_SIZE};
pub use constant_time::constant_time_eq;
pub use secret_gen::generate_secret;
pub use token::{generate_token, hash_token};
