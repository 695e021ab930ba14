//! Credential persistence using the OS keyring.
//!
//! The token lives in the platform secret facility only; it is never
//! written to the local database or any plaintext file. An unavailable
//! keyring is an explicit error, never a plaintext fallback.

use keyring::Entry;
use taskray_core::credentials::{CredentialError, CredentialResult, CredentialStore};

const KEYRING_SERVICE_NAME: &str = "taskray";
const KEYRING_TOKEN_USERNAME: &str = "api_token";

/// Credential store backed by the OS keyring (`keyring` crate).
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    username: String,
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self {
            service_name: KEYRING_SERVICE_NAME.to_string(),
            username: KEYRING_TOKEN_USERNAME.to_string(),
        }
    }
}

impl KeyringCredentialStore {
    fn entry(&self) -> CredentialResult<Entry> {
        Entry::new(&self.service_name, &self.username)
            .map_err(|error| CredentialError::SecureStorage(error.to_string()))
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load_token(&self) -> CredentialResult<Option<String>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(raw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(CredentialError::SecureStorage(error.to_string())),
        }
    }

    fn store_token(&self, token: &str) -> CredentialResult<()> {
        self.entry()?
            .set_password(token)
            .map_err(|error| CredentialError::SecureStorage(error.to_string()))
    }

    fn clear_token(&self) -> CredentialResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(CredentialError::SecureStorage(error.to_string())),
        }
    }
}
