//! Process-lifetime cache of the last reconciled state per topic.
//!
//! Slots outlive individual subscriptions and connections, so a late
//! subscriber sees the latest state immediately and a reconnecting transport
//! never blanks the views.

use crate::types::{Timestamp, Topic};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Last known state of one topic.
#[derive(Clone, Debug)]
pub struct CacheSlot {
    pub state: Arc<Value>,
    pub last_updated_at: Timestamp,
}

/// Shared map from topic to its last reconciled state.
#[derive(Default)]
pub struct SharedStateCache {
    slots: RwLock<HashMap<Topic, CacheSlot>>,
}

impl SharedStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest state for a topic, if any has been reconciled.
    pub fn get(&self, topic: &str) -> Option<Arc<Value>> {
        self.slots.read().get(topic).map(|slot| slot.state.clone())
    }

    /// Full slot including its update time.
    pub fn slot(&self, topic: &str) -> Option<CacheSlot> {
        self.slots.read().get(topic).cloned()
    }

    /// Replace the slot for a topic.
    pub fn set(&self, topic: &Topic, state: Arc<Value>) {
        let slot = CacheSlot {
            state,
            last_updated_at: Timestamp::now(),
        };
        self.slots.write().insert(topic.clone(), slot);
    }

    /// Topics that have a cached state.
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<_> = self.slots.read().keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_until_set() {
        let cache = SharedStateCache::new();
        assert!(cache.get("football-live").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_replaces_slot() {
        let cache = SharedStateCache::new();
        let topic = Topic::new("football-live");

        cache.set(&topic, Arc::new(json!([1])));
        let first = cache.slot("football-live").unwrap();

        let second_state = Arc::new(json!([1, 2]));
        cache.set(&topic, second_state.clone());
        let second = cache.slot("football-live").unwrap();

        assert!(Arc::ptr_eq(&second.state, &second_state));
        assert!(second.last_updated_at >= first.last_updated_at);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_topics_are_independent() {
        let cache = SharedStateCache::new();
        cache.set(&Topic::new("football-live"), Arc::new(json!({"sport": "football"})));
        cache.set(&Topic::new("basketball-live"), Arc::new(json!({"sport": "basketball"})));

        assert_eq!(cache.get("football-live").unwrap()["sport"], "football");
        assert_eq!(cache.get("basketball-live").unwrap()["sport"], "basketball");
        assert_eq!(
            cache.topics(),
            vec![Topic::new("basketball-live"), Topic::new("football-live")]
        );
    }
}
