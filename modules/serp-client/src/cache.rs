//! Short-TTL cache for raw SERP queries.
//!
//! Guards against repeated provider calls for the same query within a short
//! window. Capacity eviction is strictly by insertion age — a read never
//! refreshes an entry's age, so the oldest-inserted key is always the one
//! evicted (this is deliberate, not LRU).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::OrganicResult;

struct CacheSlot {
    inserted_at: Instant,
    results: Vec<OrganicResult>,
}

pub struct QueryCache {
    ttl: Duration,
    capacity: usize,
    slots: Mutex<HashMap<String, CacheSlot>>,
}

impl QueryCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<OrganicResult>> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&self, key: String, results: Vec<OrganicResult>) {
        self.insert_at(key, results, Instant::now());
    }

    /// TTL check against an explicit `now`, so expiry is testable without sleeping.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<Vec<OrganicResult>> {
        let mut slots = self.slots.lock().expect("query cache lock poisoned");
        match slots.get(key) {
            Some(slot) if now.duration_since(slot.inserted_at) <= self.ttl => {
                Some(slot.results.clone())
            }
            Some(_) => {
                slots.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert_at(&self, key: String, results: Vec<OrganicResult>, now: Instant) {
        let mut slots = self.slots.lock().expect("query cache lock poisoned");
        slots.insert(
            key,
            CacheSlot {
                inserted_at: now,
                results,
            },
        );

        // Evict oldest-inserted entries until back under capacity.
        while slots.len() > self.capacity {
            let oldest = slots
                .iter()
                .min_by_key(|(_, slot)| slot.inserted_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    slots.remove(&k);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().expect("query cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
