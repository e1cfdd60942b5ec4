//! Endpoint table keyed by identifier
//!
//! O(1) lookup through a hash map, insertion order kept in a side vector so
//! listings come back in creation order. Removal is O(k) on the order vector.

use crate::core::{Endpoint, EndpointId};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct EndpointTable {
    entries: HashMap<EndpointId, Arc<Endpoint>>,
    order: Vec<EndpointId>,
}

impl EndpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    /// Insert an endpoint under its own id
    ///
    /// Returns the endpoint back if the id is already present.
    pub fn insert(&mut self, endpoint: Arc<Endpoint>) -> Result<(), Arc<Endpoint>> {
        let id = endpoint.id();
        if self.entries.contains_key(&id) {
            return Err(endpoint);
        }
        self.entries.insert(id, endpoint);
        self.order.push(id);
        Ok(())
    }

    #[inline]
    pub fn get(&self, id: EndpointId) -> Option<&Arc<Endpoint>> {
        self.entries.get(&id)
    }

    pub fn remove(&mut self, id: EndpointId) -> Option<Arc<Endpoint>> {
        let endpoint = self.entries.remove(&id)?;
        if let Some(pos) = self.order.iter().position(|entry| *entry == id) {
            self.order.remove(pos);
        }
        Some(endpoint)
    }

    /// Remove every entry, oldest first
    pub fn drain(&mut self) -> Vec<Arc<Endpoint>> {
        let order = std::mem::take(&mut self.order);
        order
            .into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .collect()
    }

    /// Identifiers in insertion order
    pub fn ids(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.order.iter().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
