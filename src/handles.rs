//! Handle registry
//!
//! Maps foreign handles to the single proxy the host keeps for each. Two
//! lookups of the same handle hand out clones of one proxy, so identity
//! holds however the object was reached.
//!
//! Entries are never removed. The protocol has no way to tell the foreign
//! side a handle is dead, so both sides keep every object alive for the
//! life of the bridge.

use crate::object::{Object, Resource};
use dashmap::DashMap;

#[derive(Default)]
pub struct HandleRegistry {
    objects: DashMap<String, Object>,
    resources: DashMap<String, Resource>,
}

impl HandleRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The proxy for `handle`, built with `create` on first sight.
    ///
    /// `create` runs under the registry's shard lock and must not touch
    /// the registry itself.
    pub(crate) fn object(&self, handle: &str, create: impl FnOnce() -> Object) -> Object {
        if let Some(existing) = self.objects.get(handle) {
            return existing.clone();
        }
        self.objects
            .entry(handle.to_string())
            .or_insert_with(create)
            .clone()
    }

    pub(crate) fn resource(&self, handle: &str, create: impl FnOnce() -> Resource) -> Resource {
        if let Some(existing) = self.resources.get(handle) {
            return existing.clone();
        }
        self.resources
            .entry(handle.to_string())
            .or_insert_with(create)
            .clone()
    }

    pub fn get(&self, handle: &str) -> Option<Object> {
        self.objects.get(handle).map(|entry| entry.clone())
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.objects.contains_key(handle) || self.resources.contains_key(handle)
    }

    /// Number of live handles, objects and resources together.
    pub fn len(&self) -> usize {
        self.objects.len() + self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
