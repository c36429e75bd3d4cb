//! Invalidated-token registry keyed by `jti`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::claims::Claims;
use crate::config::minutes_to_secs;
use crate::token::now;

/// What the blacklist remembers about one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistEntry {
    /// Rejected for good.
    Forever,
    /// Still accepted until this Unix timestamp (grace period), rejected after.
    ValidUntil(i64),
}

/// Storage behind the [`Blacklist`].  Shared across requests.
pub trait BlacklistStorage: Send + Sync {
    /// Store `entry` under `key`, droppable once `expires_at` has passed.
    /// `None` keeps it forever.
    fn add(&self, key: &str, entry: BlacklistEntry, expires_at: Option<i64>);
    fn get(&self, key: &str) -> Option<BlacklistEntry>;
    fn forget(&self, key: &str) -> bool;
    fn flush(&self);
}

/// In-process [`BlacklistStorage`].  Expired entries are swept on every
/// `add` and dropped on lookup.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, (BlacklistEntry, Option<i64>)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlacklistStorage for MemoryStorage {
    fn add(&self, key: &str, entry: BlacklistEntry, expires_at: Option<i64>) {
        let now = now();
        let mut entries = self.entries.lock();
        entries.retain(|_, (_, exp)| exp.map_or(true, |e| e > now));
        entries.insert(key.to_owned(), (entry, expires_at));
    }

    fn get(&self, key: &str) -> Option<BlacklistEntry> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((_, Some(expires_at))) if *expires_at <= now() => {
                entries.remove(key);
                None
            }
            Some((entry, _)) => Some(*entry),
            None => None,
        }
    }

    fn forget(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    fn flush(&self) {
        self.entries.lock().clear();
    }
}

/// Blacklist of invalidated tokens.
#[derive(Clone)]
pub struct Blacklist {
    storage: Arc<dyn BlacklistStorage>,
    grace_period_secs: i64,
    refresh_ttl_secs: i64,
}

impl std::fmt::Debug for Blacklist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blacklist")
            .field("grace_period_secs", &self.grace_period_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl Blacklist {
    pub fn new(storage: Arc<dyn BlacklistStorage>, grace_period_secs: u64, refresh_ttl_minutes: u64) -> Self {
        Self {
            storage,
            grace_period_secs: i64::try_from(grace_period_secs).unwrap_or(i64::MAX),
            refresh_ttl_secs: minutes_to_secs(refresh_ttl_minutes).unwrap_or(i64::MAX),
        }
    }

    /// Blacklist the token until its refresh window closes.  It stays usable
    /// for the configured grace period.  A token already on the blacklist
    /// keeps its existing entry.
    pub fn add(&self, claims: &Claims) {
        if self.storage.get(&claims.jti).is_some() {
            return;
        }
        let entry = BlacklistEntry::ValidUntil(now().saturating_add(self.grace_period_secs));
        // Once the refresh window is over the token is dead anyway.
        let expires_at = claims.iat.saturating_add(self.refresh_ttl_secs).max(claims.exp);
        self.storage.add(&claims.jti, entry, Some(expires_at));
    }

    pub fn add_forever(&self, claims: &Claims) {
        self.storage.add(&claims.jti, BlacklistEntry::Forever, None);
    }

    /// Whether the token must be rejected now.
    pub fn has(&self, claims: &Claims) -> bool {
        match self.storage.get(&claims.jti) {
            Some(BlacklistEntry::Forever) => true,
            Some(BlacklistEntry::ValidUntil(until)) => until <= now(),
            None => false,
        }
    }

    pub fn remove(&self, claims: &Claims) -> bool {
        self.storage.forget(&claims.jti)
    }

    pub fn clear(&self) {
        self.storage.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::CustomClaims;

    fn claims(jti: &str) -> Claims {
        let t = now();
        Claims {
            iss: None,
            iat: t,
            exp: t + 3600,
            nbf: t,
            jti: jti.into(),
            sub: "1".into(),
            aud: None,
            prv: None,
            custom: CustomClaims::new(),
        }
    }

    #[test]
    fn added_token_is_blacklisted() {
        let bl = Blacklist::new(Arc::new(MemoryStorage::new()), 0, 20_160);
        let c = claims("a");
        assert!(!bl.has(&c));
        bl.add(&c);
        assert!(bl.has(&c));
        assert!(!bl.has(&claims("b")));
    }

    #[test]
    fn grace_period_keeps_token_usable() {
        let bl = Blacklist::new(Arc::new(MemoryStorage::new()), 30, 20_160);
        let c = claims("a");
        bl.add(&c);
        assert!(!bl.has(&c));
        bl.add_forever(&c);
        assert!(bl.has(&c));
    }

    #[test]
    fn forever_entry_survives_later_add() {
        let bl = Blacklist::new(Arc::new(MemoryStorage::new()), 30, 20_160);
        let c = claims("a");
        bl.add_forever(&c);
        bl.add(&c);
        assert!(bl.has(&c));
    }

    #[test]
    fn repeated_add_keeps_original_grace_window() {
        let storage = Arc::new(MemoryStorage::new());
        let bl = Blacklist::new(storage.clone(), 30, 20_160);
        let c = claims("a");
        storage.add("a", BlacklistEntry::ValidUntil(now() - 1), Some(now() + 3600));
        bl.add(&c);
        assert!(bl.has(&c));
    }

    #[test]
    fn huge_ttls_saturate() {
        let bl = Blacklist::new(Arc::new(MemoryStorage::new()), u64::MAX, u64::MAX);
        let c = claims("a");
        bl.add(&c);
        assert!(!bl.has(&c));
        bl.add_forever(&c);
        assert!(bl.has(&c));
    }

    #[test]
    fn remove_and_clear() {
        let storage = Arc::new(MemoryStorage::new());
        let bl = Blacklist::new(storage.clone(), 0, 20_160);
        bl.add(&claims("a"));
        bl.add(&claims("b"));
        assert_eq!(storage.len(), 2);
        assert!(bl.remove(&claims("a")));
        assert!(!bl.has(&claims("a")));
        bl.clear();
        assert!(storage.is_empty());
    }

    #[test]
    fn memory_storage_drops_expired_entries() {
        let storage = MemoryStorage::new();
        storage.add("old", BlacklistEntry::Forever, Some(now() - 1));
        assert_eq!(storage.get("old"), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn memory_storage_sweeps_expired_entries_on_add() {
        let storage = MemoryStorage::new();
        for i in 0..1000 {
            storage.add(&format!("old-{i}"), BlacklistEntry::Forever, Some(now() - 1));
        }
        storage.add("live", BlacklistEntry::Forever, None);
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get("live"), Some(BlacklistEntry::Forever));
    }
}
