//! Credential storage abstraction.
//!
//! The API token is a secret: it must never be written to the local
//! database, to logs, or to any other plaintext file. Shells provide a
//! store backed by the OS secret facility (keychain / credential manager);
//! this module defines the trait plus an in-memory store for embedding and
//! tests. Decryption happens in memory at the point of use only.

use std::fmt;
use std::sync::{Arc, RwLock};

use thiserror::Error;

/// Errors from a credential store.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The OS secret facility refused or is unavailable. This is explicit:
    /// there is no plaintext fallback.
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type CredentialResult<T> = Result<T, CredentialError>;

/// Storage for the API token.
///
/// `load_token` returning `Ok(None)` means no credential is configured;
/// callers surface that as an authentication prompt, never as a retryable
/// network failure.
pub trait CredentialStore: Clone + Send + Sync + 'static {
    fn load_token(&self) -> CredentialResult<Option<String>>;
    fn store_token(&self, token: &str) -> CredentialResult<()>;
    fn clear_token(&self) -> CredentialResult<()>;
}

/// Credential store that keeps the token in process memory.
///
/// Used by tests and by embedders that source the token from elsewhere
/// (environment, config service). Nothing is persisted.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    token: Arc<RwLock<Option<String>>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token.into()))),
        }
    }

    /// A store with no credential configured.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let configured = self
            .token
            .read()
            .map(|token| token.is_some())
            .unwrap_or(false);
        formatter
            .debug_struct("MemoryCredentialStore")
            .field("token", &if configured { "[REDACTED]" } else { "<none>" })
            .finish()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load_token(&self) -> CredentialResult<Option<String>> {
        self.token
            .read()
            .map(|token| token.clone())
            .map_err(|_| CredentialError::SecureStorage("credential lock poisoned".to_string()))
    }

    fn store_token(&self, token: &str) -> CredentialResult<()> {
        let mut slot = self
            .token
            .write()
            .map_err(|_| CredentialError::SecureStorage("credential lock poisoned".to_string()))?;
        *slot = Some(token.to_string());
        Ok(())
    }

    fn clear_token(&self) -> CredentialResult<()> {
        let mut slot = self
            .token
            .write()
            .map_err(|_| CredentialError::SecureStorage("credential lock poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}
