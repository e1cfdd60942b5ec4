//! Metrics collection for device monitoring
//!
//! Lock-free counters updated from the data and control paths.
//! Snapshots are taken for reporting.

use crate::DeviceError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Device metrics collector
///
/// Thread-safe counters shared by the control service and every session.
#[derive(Debug)]
pub struct DeviceMetrics {
    /// Endpoints created
    endpoints_created: AtomicU64,
    /// Endpoints destroyed (including shutdown)
    endpoints_destroyed: AtomicU64,
    /// Control operations or opens refused with Busy
    busy_rejections: AtomicU64,
    /// Bytes accepted by writes
    bytes_written: AtomicU64,
    /// Bytes returned by reads
    bytes_read: AtomicU64,
    /// Non-blocking calls that could not proceed
    would_block: AtomicU64,
    /// Blocking calls canceled by an interrupt
    interrupted: AtomicU64,
    /// Calls aborted because their endpoint was revoked
    revoked: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

/// Metrics snapshot for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub endpoints_created: u64,
    pub endpoints_destroyed: u64,
    pub busy_rejections: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub would_block: u64,
    pub interrupted: u64,
    pub revoked: u64,
    pub uptime_seconds: u64,
}

impl DeviceMetrics {
    pub fn new() -> Self {
        Self {
            endpoints_created: AtomicU64::new(0),
            endpoints_destroyed: AtomicU64::new(0),
            busy_rejections: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            would_block: AtomicU64::new(0),
            interrupted: AtomicU64::new(0),
            revoked: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_created(&self) {
        self.endpoints_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_destroyed(&self) {
        self.endpoints_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_busy(&self) {
        self.busy_rejections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_read(&self, bytes: usize) {
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Count data-path failures by kind
    pub fn record_error(&self, err: &DeviceError) {
        let counter = match err {
            DeviceError::WouldBlock => &self.would_block,
            DeviceError::Interrupted => &self.interrupted,
            DeviceError::EndpointRevoked(_) => &self.revoked,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            endpoints_created: self.endpoints_created.load(Ordering::Relaxed),
            endpoints_destroyed: self.endpoints_destroyed.load(Ordering::Relaxed),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            would_block: self.would_block.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
            revoked: self.revoked.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for DeviceMetrics {
    fn default() -> Self {
        Self::new()
    }
}
