//! Credentials and their secure storage.

use crate::errors::{NationBuilderError, NationBuilderResult};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// An OAuth 2 access token with its type and optional expiry.
#[derive(Clone)]
pub struct Credential {
    access_token: SecretString,
    token_type: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Creates a credential. The access token must not be empty.
    pub fn new(access_token: impl Into<String>, token_type: Option<String>) -> NationBuilderResult<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(NationBuilderError::invalid_argument("Access token cannot be empty"));
        }
        Ok(Self {
            access_token: SecretString::new(access_token),
            token_type: token_type.filter(|t| !t.is_empty()),
            expires_at: None,
        })
    }

    /// Sets the expiry instant.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Gets the access token.
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// Gets the token type, e.g. `bearer`.
    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    /// Gets the expiry instant, if the server reported one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the credential expired at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }

    /// Returns true if the credential has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.token_type == other.token_type
            && self.expires_at == other.expires_at
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Secure storage for credentials, keyed by identifier.
///
/// Failures are reported as `false` / `None`; implementations never panic.
pub trait CredentialStore: Send + Sync {
    /// Saves `credential` under `identifier`, replacing any previous one.
    fn save(&self, credential: &Credential, identifier: &str) -> bool;

    /// Deletes the credential stored under `identifier`. Returns false if none existed.
    fn delete(&self, identifier: &str) -> bool;

    /// Fetches the credential stored under `identifier`.
    fn fetch(&self, identifier: &str) -> Option<Credential>;
}

/// In-memory credential store.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: Mutex<HashMap<String, Credential>>,
    fail_saves: AtomicBool,
}

impl InMemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail, simulating a locked keychain.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Returns true if a credential is stored under `identifier`.
    pub fn contains(&self, identifier: &str) -> bool {
        self.credentials
            .lock()
            .map(|c| c.contains_key(identifier))
            .unwrap_or(false)
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.credentials.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn save(&self, credential: &Credential, identifier: &str) -> bool {
        if self.fail_saves.load(Ordering::SeqCst) {
            return false;
        }
        match self.credentials.lock() {
            Ok(mut credentials) => {
                credentials.insert(identifier.to_string(), credential.clone());
                true
            }
            Err(_) => false,
        }
    }

    fn delete(&self, identifier: &str) -> bool {
        self.credentials
            .lock()
            .map(|mut c| c.remove(identifier).is_some())
            .unwrap_or(false)
    }

    fn fetch(&self, identifier: &str) -> Option<Credential> {
        self.credentials
            .lock()
            .ok()
            .and_then(|c| c.get(identifier).cloned())
    }
}
