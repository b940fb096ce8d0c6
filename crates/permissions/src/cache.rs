//! Short-TTL role cache keyed by (identity, team scope).
//!
//! Entries are replaced wholesale; nothing mutates a cached assignment.

use kickoff_core::role::RoleAssignment;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

type Key = (String, String);

pub struct RoleCache {
    ttl: Duration,
    entries: Mutex<HashMap<Key, (RoleAssignment, Instant)>>,
}

impl RoleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, (RoleAssignment, Instant)>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A fresh cached assignment, if any. Expired entries are evicted.
    pub fn get(&self, identity: &str, team_scope_id: &str) -> Option<RoleAssignment> {
        let key = (identity.to_string(), team_scope_id.to_string());
        let mut entries = self.lock();
        match entries.get(&key) {
            Some((assignment, stored)) if stored.elapsed() < self.ttl => Some(assignment.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, assignment: RoleAssignment) {
        let key = (assignment.identity.clone(), assignment.team_scope_id.clone());
        self.lock().insert(key, (assignment, Instant::now()));
    }

    /// Drop every entry of one team, e.g. after a role write.
    pub fn invalidate_team(&self, team_scope_id: &str) {
        self.lock().retain(|(_, team), _| team != team_scope_id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = RoleCache::new(Duration::from_secs(60));
        cache.insert(RoleAssignment::minimal("u1", "KTI"));
        assert!(cache.get("u1", "KTI").is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.get("u1", "KTI").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_are_per_team() {
        let cache = RoleCache::new(Duration::from_secs(60));
        cache.insert(RoleAssignment::minimal("u1", "KTI"));
        assert!(cache.get("u1", "OTHER").is_none());
    }

    #[test]
    fn invalidate_team_keeps_other_teams() {
        let cache = RoleCache::new(Duration::from_secs(60));
        cache.insert(RoleAssignment::minimal("u1", "KTI"));
        cache.insert(RoleAssignment::minimal("u1", "OTHER"));
        cache.invalidate_team("KTI");
        assert_eq!(cache.len(), 1);
        assert!(cache.get("u1", "OTHER").is_some());
    }
}
