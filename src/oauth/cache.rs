use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::oauth::token::Credential;

/// Process-lifetime credential cache keyed by account email.
///
/// Clones share the same storage. Concurrent flows for one account may
/// race; the last successful flow to store wins.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    entries: Arc<Mutex<HashMap<String, Credential>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Credential>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Credential> {
        self.lock().get(key).cloned()
    }

    /// Cached credential for `key` if it is still usable at `now`.
    pub fn get_valid_at(&self, key: &str, now: DateTime<Utc>) -> Option<Credential> {
        self.get(key).filter(|cred| !cred.is_expired_at(now))
    }

    pub fn get_valid(&self, key: &str) -> Option<Credential> {
        self.get_valid_at(key, Utc::now())
    }

    pub fn store(&self, key: &str, credential: Credential) {
        self.lock().insert(key.to_string(), credential);
    }
}
