use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

static REVOKED: Lazy<TokenBlacklist> = Lazy::new(TokenBlacklist::new);

const DEFAULT_CAPACITY: usize = 10_000;
const SWEEP_EVERY: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy)]
struct RevokedToken {
    /// When the token would stop validating anyway
    expires_at: SystemTime,
    revoked_at: SystemTime,
}

/// Logged-out token ids (`jti`), kept until the token itself expires.
///
/// Bounded: when full, expired entries go first, then the earliest revoked half.
pub struct TokenBlacklist {
    entries: Mutex<HashMap<String, RevokedToken>>,
    capacity: usize,
}

impl Default for TokenBlacklist {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBlacklist {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Mutex::new(HashMap::new()), capacity }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RevokedToken>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn revoke(&self, jti: &str, expires_at: SystemTime) {
        let mut entries = self.lock();

        if entries.len() >= self.capacity {
            warn!(capacity = self.capacity, "revoked token list is full, evicting");
            purge_expired(&mut entries, SystemTime::now());
            if entries.len() >= self.capacity {
                evict_earliest(&mut entries, self.capacity / 2);
            }
        }

        entries.insert(jti.to_string(), RevokedToken { expires_at, revoked_at: SystemTime::now() });
        info!(jti, "token revoked");
    }

    pub fn contains(&self, jti: &str) -> bool {
        self.lock().contains_key(jti)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget tokens that have expired on their own; returns the number removed
    pub fn purge_expired(&self) -> usize {
        purge_expired(&mut self.lock(), SystemTime::now())
    }
}

fn purge_expired(entries: &mut HashMap<String, RevokedToken>, now: SystemTime) -> usize {
    let before = entries.len();
    entries.retain(|_, token| token.expires_at > now);
    before - entries.len()
}

fn evict_earliest(entries: &mut HashMap<String, RevokedToken>, count: usize) {
    let mut order: Vec<(SystemTime, String)> =
        entries.iter().map(|(jti, token)| (token.revoked_at, jti.clone())).collect();
    order.sort();

    for (_, jti) in order.into_iter().take(count) {
        entries.remove(&jti);
    }
    debug!(count, "evicted earliest revoked tokens");
}

pub fn blacklist() -> &'static TokenBlacklist {
    &REVOKED
}

/// Periodically forget expired revocations. Needs a running Tokio runtime.
pub fn start_cleanup_task() {
    tokio::spawn(async {
        let mut ticker = tokio::time::interval(SWEEP_EVERY);
        loop {
            ticker.tick().await;
            let removed = blacklist().purge_expired();
            debug!(removed, remaining = blacklist().len(), "revoked token sweep");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn in_secs(secs: u64) -> SystemTime {
        SystemTime::now() + Duration::from_secs(secs)
    }

    #[test]
    fn test_revoked_ids_are_reported() {
        let list = TokenBlacklist::new();
        assert!(list.is_empty());

        list.revoke("jti-1", in_secs(60));

        assert!(list.contains("jti-1"));
        assert!(!list.contains("jti-2"));
    }

    #[test]
    fn test_purge_keeps_only_live_tokens() {
        let list = TokenBlacklist::new();
        list.revoke("gone", SystemTime::now() - Duration::from_secs(1));
        list.revoke("live", in_secs(60));
        assert_eq!(list.len(), 2);

        assert_eq!(list.purge_expired(), 1);
        assert!(!list.contains("gone"));
        assert!(list.contains("live"));
    }

    #[test]
    fn test_full_list_evicts_earliest_half() {
        let list = TokenBlacklist::with_capacity(5);
        for i in 0..5 {
            list.revoke(&format!("jti-{}", i), in_secs(300));
            sleep(Duration::from_millis(10));
        }

        list.revoke("jti-new", in_secs(300));

        assert_eq!(list.len(), 4);
        assert!(!list.contains("jti-0"));
        assert!(!list.contains("jti-1"));
        assert!(list.contains("jti-2"));
        assert!(list.contains("jti-new"));
    }
}
