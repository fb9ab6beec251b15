use anyhow::{Context, Result};
use keyring::Entry;
use rand::RngCore;
use tracing::info;

const SERVICE_NAME: &str = "sigref";

/// Keychain account holding the secret the local vault key is derived from
const DEVICE_SECRET_ACCOUNT: &str = "__device_secret__";

pub struct CredentialStore;

impl CredentialStore {
    /// Store username and password in the OS keychain
    pub fn store(username: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve password for a username from the OS keychain
    pub fn get_password(username: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete stored credentials for a username
    pub fn delete(username: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, username)
            .context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }

    pub fn has_credentials(username: &str) -> bool {
        Entry::new(SERVICE_NAME, username)
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }

    /// The per-device vault secret, generated on first use
    pub fn device_secret() -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, DEVICE_SECRET_ACCOUNT)
            .context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(secret) => Ok(secret),
            Err(keyring::Error::NoEntry) => {
                let secret = generate_secret();
                entry
                    .set_password(&secret)
                    .context("Failed to store device secret in keychain")?;
                info!("Generated new device secret");
                Ok(secret)
            }
            Err(e) => Err(e).context("Failed to read device secret from keychain"),
        }
    }
}

/// 32 random bytes, hex encoded
fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
