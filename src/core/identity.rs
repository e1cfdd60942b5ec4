//! Endpoint identifiers and the slot pool they are drawn from
//!
//! Identifiers are small integers in [1, N]. Identifier 0 names the control
//! endpoint and never enters the pool.

use crate::{DeviceError, Result};
use std::fmt;

/// Identifier reserved for the control endpoint
pub const CONTROL_ENDPOINT_ID: EndpointId = EndpointId::from_raw(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EndpointId(u32);

impl EndpointId {
    #[inline(always)]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    #[inline(always)]
    pub const fn as_raw(&self) -> u32 {
        self.0
    }

    #[inline(always)]
    pub const fn is_control(&self) -> bool {
        self.0 == CONTROL_ENDPOINT_ID.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mcdev_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Free,
    Assigned,
}

/// Fixed pool of N identifier slots
///
/// Not internally synchronized: every mutation happens under the control
/// service's structural lock.
#[derive(Debug, Clone)]
pub struct IdentitySet {
    slots: Vec<Slot>,
    assigned: usize,
}

impl IdentitySet {
    /// Create a pool of `capacity` free slots, identifiers 1..=capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::Free; capacity],
            assigned: 0,
        }
    }

    /// Assign the lowest free identifier, `None` when every slot is taken
    pub fn allocate(&mut self) -> Option<EndpointId> {
        let index = self.slots.iter().position(|slot| *slot == Slot::Free)?;
        self.slots[index] = Slot::Assigned;
        self.assigned += 1;
        Some(EndpointId::from_raw(index as u32 + 1))
    }

    /// Return an assigned identifier to the pool
    ///
    /// # Errors
    /// `InvalidArgument` when `id` is outside [1, N], `NotFound` when the slot
    /// is already free.
    pub fn release(&mut self, id: EndpointId) -> Result<()> {
        let index = self.index_of(id)?;
        match self.slots[index] {
            Slot::Free => Err(DeviceError::NotFound(id.as_raw())),
            Slot::Assigned => {
                self.slots[index] = Slot::Free;
                self.assigned -= 1;
                Ok(())
            }
        }
    }

    /// Check that `id` lies in [1, N]
    pub fn validate(&self, id: EndpointId) -> Result<()> {
        self.index_of(id).map(|_| ())
    }

    pub fn is_assigned(&self, id: EndpointId) -> bool {
        self.index_of(id)
            .map(|index| self.slots[index] == Slot::Assigned)
            .unwrap_or(false)
    }

    /// Number of slots (N)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of assigned slots
    #[inline]
    pub fn len(&self) -> usize {
        self.assigned
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.assigned == 0
    }

    /// Assigned identifiers in ascending order
    pub fn assigned(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| **slot == Slot::Assigned)
            .map(|(index, _)| EndpointId::from_raw(index as u32 + 1))
    }

    fn index_of(&self, id: EndpointId) -> Result<usize> {
        let raw = id.as_raw() as usize;
        if raw == 0 || raw > self.slots.len() {
            return Err(DeviceError::InvalidArgument(format!(
                "endpoint id {} outside [1, {}]",
                raw,
                self.slots.len()
            )));
        }
        Ok(raw - 1)
    }
}
