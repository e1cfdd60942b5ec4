//! A data endpoint: identifier plus ring buffer. Revocation state lives in
//! the buffer.

use crate::core::EndpointId;
use crate::hot_path::RingBuffer;
use std::time::Duration;

/// One addressable, independently buffered data channel
#[derive(Debug)]
pub struct Endpoint {
    id: EndpointId,
    buffer: RingBuffer,
}

/// How a teardown finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Every in-flight caller left and the store is released
    Drained,
    /// Callers were still inside when the drain timeout elapsed; the last
    /// one out releases the store
    Deferred { inflight: usize },
    /// Another teardown already ran
    AlreadyRevoked,
}

impl Endpoint {
    pub fn new(id: EndpointId, capacity: usize) -> Self {
        Self {
            id,
            buffer: RingBuffer::for_endpoint(id, capacity),
        }
    }

    #[inline]
    pub fn id(&self) -> EndpointId {
        self.id
    }

    #[inline]
    pub fn buffer(&self) -> &RingBuffer {
        &self.buffer
    }

    #[inline]
    pub fn is_revoked(&self) -> bool {
        self.buffer.is_revoked()
    }

    /// Revoke, wake every waiter, then wait up to `drain_timeout` for
    /// in-flight callers to leave.
    pub fn destroy(&self, drain_timeout: Duration) -> Teardown {
        if !self.buffer.revoke() {
            return Teardown::AlreadyRevoked;
        }

        if self.buffer.wait_drained(drain_timeout) {
            tracing::debug!(endpoint = %self.id, "endpoint drained");
            Teardown::Drained
        } else {
            let inflight = self.buffer.inflight();
            tracing::warn!(
                endpoint = %self.id,
                inflight,
                "drain timed out, store release deferred to last caller"
            );
            Teardown::Deferred { inflight }
        }
    }
}
