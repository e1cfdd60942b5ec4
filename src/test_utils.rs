//! Test utilities shared by the module tests

use crate::control::ControlService;
use crate::hot_path::RingBuffer;
use crate::infrastructure::config::DeviceConfig;
use crossbeam_utils::Backoff;

/// Service with `max_endpoints` slots of `capacity` bytes and a short drain
pub fn small_service(max_endpoints: usize, capacity: usize) -> ControlService {
    ControlService::new(DeviceConfig {
        max_endpoints,
        buffer_capacity: capacity,
        drain_timeout_ms: 2000,
    })
    .expect("valid test config")
}

/// Spin until `count` callers are inside the buffer
///
/// A caller registers under the buffer lock and keeps it until it parks on
/// a condition, so once this returns the caller is waiting.
pub fn wait_for_inflight(buffer: &RingBuffer, count: usize) {
    let backoff = Backoff::new();
    while buffer.inflight() < count {
        backoff.snooze();
    }
}
