//! Sticky-session affinity table: which instance a given socket session is
//! pinned to, so a client that drops and reconnects lands back where its
//! socket state already lives.

use std::hash::{Hash, Hasher};

use dashmap::DashMap;

use super::service::InstanceId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Stable bucket for this key, used to pick an initial instance out of
    /// `instance_count` candidates before any affinity entry exists.
    pub fn bucket(&self, instance_count: usize) -> usize {
        if instance_count == 0 {
            return 0;
        }
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.0.hash(&mut hasher);
        (hasher.finish() as usize) % instance_count
    }
}

/// Maps sticky session keys to the instance currently holding them. Entries
/// are never proactively evicted on instance failure — the health poller
/// excludes the dead instance from new placements, and existing entries
/// drain naturally once their sessions disconnect and reconnect elsewhere.
#[derive(Default)]
pub struct AffinityTable {
    assignments: DashMap<SessionKey, InstanceId>,
}

impl AffinityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SessionKey) -> Option<InstanceId> {
        self.assignments.get(key).map(|entry| entry.clone())
    }

    pub fn assign(&self, key: SessionKey, instance: InstanceId) {
        self.assignments.insert(key, instance);
    }

    pub fn remove(&self, key: &SessionKey) {
        self.assignments.remove(key);
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_and_resolves() {
        let table = AffinityTable::new();
        let key = SessionKey::new("session-a");
        let instance = InstanceId::new("instance-1");
        table.assign(key.clone(), instance.clone());
        assert_eq!(table.get(&key), Some(instance));
    }

    #[test]
    fn bucket_is_stable_for_same_key() {
        let key = SessionKey::new("session-a");
        assert_eq!(key.bucket(5), key.bucket(5));
    }

    #[test]
    fn bucket_is_zero_with_no_instances() {
        let key = SessionKey::new("session-a");
        assert_eq!(key.bucket(0), 0);
    }
}
