//! At-rest encryption for cached values.
//!
//! The pending queue and the stored session both carry bearer tokens, so
//! the file store can seal every value with XChaCha20-Poly1305. The key is
//! derived with Argon2 from a per-device secret kept in the OS keychain and
//! a random salt stored next to the cache.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use tracing::info;

use crate::auth::CredentialStore;

const NONCE_LEN: usize = 24;
const SALT_LEN: usize = 16;

/// Salt file name in the cache directory
const SALT_FILE: &str = "vault.salt";

pub struct Vault {
    key: [u8; 32],
}

impl Vault {
    pub fn from_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Derive the vault key from a secret and salt with Argon2
    pub fn derive(secret: &[u8], salt: &[u8]) -> Result<Self> {
        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(secret, salt, &mut key)
            .map_err(|e| anyhow!("Argon2 key derivation failed: {}", e))?;
        Ok(Self { key })
    }

    /// Vault for this device: keychain secret plus the salt in `cache_dir`.
    /// Both are created on first use.
    pub fn for_device(cache_dir: &Path) -> Result<Self> {
        let secret = CredentialStore::device_secret()?;
        let salt = Self::load_or_create_salt(cache_dir)?;
        Self::derive(secret.as_bytes(), &salt)
    }

    fn load_or_create_salt(cache_dir: &Path) -> Result<Vec<u8>> {
        let path = cache_dir.join(SALT_FILE);
        if path.exists() {
            let salt = std::fs::read(&path).context("Failed to read vault salt")?;
            if salt.len() == SALT_LEN {
                return Ok(salt);
            }
            return Err(anyhow!("Vault salt has unexpected length {}", salt.len()));
        }
        let mut salt = vec![0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        std::fs::create_dir_all(cache_dir)?;
        std::fs::write(&path, &salt).context("Failed to write vault salt")?;
        info!("Created new vault salt");
        Ok(salt)
    }

    /// Encrypt `data`. The output is nonce || ciphertext.
    pub fn seal(&self, data: &[u8]) -> Result<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), data)
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt data produced by [`Vault::seal`]
    pub fn open(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(anyhow!("Ciphertext too short"));
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));
        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|e| anyhow!("Decryption failed: {}", e))
    }
}
