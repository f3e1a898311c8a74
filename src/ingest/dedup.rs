// src/ingest/dedup.rs
//! Insertion-ordered memory of accepted article ids.

use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default, Clone)]
pub struct DedupCache {
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the id was already present; its position is not refreshed.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if !self.members.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// When the cache holds more than `max_size` ids, keep only the newest
    /// `retain` of them. Returns how many ids were evicted.
    pub fn cleanup(&mut self, max_size: usize, retain: usize) -> usize {
        if self.order.len() <= max_size {
            return 0;
        }
        let excess = self.order.len().saturating_sub(retain);
        for old in self.order.drain(..excess) {
            self.members.remove(&old);
        }
        excess
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}
