//! Objects waiting for their GPU resources to be released
//!
//! Holds identifiers only. Drained last-in first-out once the command set
//! that no longer references them has become active.

use crate::render::object::ObjectId;

/// LIFO stack of object ids scheduled for destruction
#[derive(Debug, Default)]
pub struct RemovalQueue {
    ids: Vec<ObjectId>,
}

impl RemovalQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `id`; returns `false` if it was already queued
    pub fn push(&mut self, id: ObjectId) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Whether `id` is scheduled
    pub fn contains(&self, id: ObjectId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of scheduled ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is scheduled
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Take every id, most recent first
    pub fn drain(&mut self) -> impl Iterator<Item = ObjectId> + '_ {
        self.ids.drain(..).rev()
    }
}
