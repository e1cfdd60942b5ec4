//! Open handle on a data endpoint
//!
//! A session pins its endpoint (`Arc`) so a concurrent destroy can revoke the
//! endpoint but never pull the buffer out from under an in-flight call.

use crate::core::{Endpoint, EndpointId};
use crate::hot_path::{Interest, Interrupt, OpenMode, Readiness};
use crate::infrastructure::metrics::DeviceMetrics;
use crate::{DeviceError, Result};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Data-path session on one endpoint
#[derive(Debug)]
pub struct Session {
    endpoint: Arc<Endpoint>,
    mode: OpenMode,
    interrupt: Arc<Interrupt>,
    metrics: Arc<DeviceMetrics>,
}

impl Session {
    pub(crate) fn open(
        endpoint: Arc<Endpoint>,
        mode: OpenMode,
        metrics: Arc<DeviceMetrics>,
    ) -> Result<Self> {
        if endpoint.is_revoked() {
            return Err(DeviceError::EndpointRevoked(endpoint.id().as_raw()));
        }
        crate::log_data!(tracing::Level::DEBUG, endpoint = %endpoint.id(), ?mode, "session opened");
        Ok(Self {
            endpoint,
            mode,
            interrupt: Arc::new(Interrupt::new()),
            metrics,
        })
    }

    #[inline]
    pub fn id(&self) -> EndpointId {
        self.endpoint.id()
    }

    #[inline]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Switch between blocking and non-blocking for later calls
    pub fn set_mode(&mut self, mode: OpenMode) {
        self.mode = mode;
    }

    /// Read up to `max_len` bytes; fewer is a success, not an error
    pub fn read(&self, max_len: usize) -> Result<Bytes> {
        let result =
            self.endpoint
                .buffer()
                .read_interruptible(max_len, self.mode, &self.interrupt);
        match &result {
            Ok(bytes) => self.metrics.record_read(bytes.len()),
            Err(err) => self.metrics.record_error(err),
        }
        result
    }

    /// Write as much of `data` as fits, returning the stored count
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let result = self
            .endpoint
            .buffer()
            .write_interruptible(data, self.mode, &self.interrupt);
        match &result {
            Ok(written) => self.metrics.record_write(*written),
            Err(err) => self.metrics.record_error(err),
        }
        result
    }

    /// Wait for readiness; an empty result means the timeout elapsed
    pub fn poll(&self, interest: Interest, timeout: Option<Duration>) -> Result<Readiness> {
        let result = self
            .endpoint
            .buffer()
            .poll(interest, timeout, &self.interrupt);
        if let Err(err) = &result {
            self.metrics.record_error(err);
        }
        result
    }

    pub fn seek(&self, offset: i64) -> Result<u64> {
        self.endpoint.buffer().seek(offset)
    }

    /// Handle that cancels this session's blocked call from another thread
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            signal: self.interrupt.clone(),
            endpoint: self.endpoint.clone(),
        }
    }

    pub fn close(self) {}
}

impl Drop for Session {
    fn drop(&mut self) {
        crate::log_data!(tracing::Level::DEBUG, endpoint = %self.endpoint.id(), "session closed");
    }
}

/// Cancels a blocked read/write/poll of one session
#[derive(Debug, Clone)]
pub struct Interrupter {
    signal: Arc<Interrupt>,
    endpoint: Arc<Endpoint>,
}

impl Interrupter {
    /// Cancel the session's call that is in flight right now; it returns
    /// `Interrupted`. Calls started afterwards are unaffected.
    pub fn interrupt(&self) {
        self.signal.raise();
        self.endpoint.buffer().wake_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::wait_for_inflight;
    use std::thread;

    fn session(capacity: usize, mode: OpenMode) -> (Session, Arc<DeviceMetrics>) {
        let endpoint = Arc::new(Endpoint::new(EndpointId::from_raw(1), capacity));
        let metrics = Arc::new(DeviceMetrics::new());
        let session = Session::open(endpoint, mode, metrics.clone()).unwrap();
        (session, metrics)
    }

    #[test]
    fn test_read_write_records_metrics() {
        let (s, metrics) = session(16, OpenMode::NonBlocking);
        assert_eq!(s.write(b"HELLO").unwrap(), 5);
        assert_eq!(&s.read(16).unwrap()[..], b"HELLO");
        assert!(matches!(s.read(1), Err(DeviceError::WouldBlock)));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.bytes_written, 5);
        assert_eq!(snapshot.bytes_read, 5);
        assert_eq!(snapshot.would_block, 1);
    }

    #[test]
    fn test_interrupter_cancels_blocked_read() {
        let (s, metrics) = session(4, OpenMode::Blocking);
        let s = Arc::new(s);
        let interrupter = s.interrupter();
        let reader = {
            let s = s.clone();
            thread::spawn(move || s.read(4))
        };
        wait_for_inflight(s.endpoint.buffer(), 1);
        interrupter.interrupt();
        assert!(matches!(
            reader.join().unwrap(),
            Err(DeviceError::Interrupted)
        ));
        assert_eq!(metrics.snapshot().interrupted, 1);
    }

    #[test]
    fn test_interrupt_on_idle_session_is_not_sticky() {
        let (s, metrics) = session(4, OpenMode::Blocking);
        let s = Arc::new(s);
        s.interrupter().interrupt();

        let writer = {
            let s = s.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                s.write(b"x")
            })
        };
        assert_eq!(&s.read(4).unwrap()[..], b"x");
        assert_eq!(writer.join().unwrap().unwrap(), 1);
        assert_eq!(metrics.snapshot().interrupted, 0);
    }

    #[test]
    fn test_poll_interrupted_and_revoked() {
        let (s, _) = session(4, OpenMode::Blocking);
        let s = Arc::new(s);
        let poller = {
            let s = s.clone();
            thread::spawn(move || s.poll(Interest::Readable, None))
        };
        wait_for_inflight(s.endpoint.buffer(), 1);
        s.interrupter().interrupt();
        assert!(matches!(
            poller.join().unwrap(),
            Err(DeviceError::Interrupted)
        ));

        let poller = {
            let s = s.clone();
            thread::spawn(move || s.poll(Interest::Readable, Some(Duration::from_secs(30))))
        };
        wait_for_inflight(s.endpoint.buffer(), 1);
        s.endpoint.destroy(Duration::from_secs(5));
        assert!(matches!(
            poller.join().unwrap(),
            Err(DeviceError::EndpointRevoked(1))
        ));
    }

    #[test]
    fn test_set_mode() {
        let (mut s, _) = session(1, OpenMode::Blocking);
        s.set_mode(OpenMode::NonBlocking);
        assert_eq!(s.mode(), OpenMode::NonBlocking);
        assert!(matches!(s.read(1), Err(DeviceError::WouldBlock)));
        assert!(s.seek(0).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_open_revoked_endpoint() {
        let endpoint = Arc::new(Endpoint::new(EndpointId::from_raw(5), 4));
        endpoint.destroy(Duration::ZERO);
        let err = Session::open(endpoint, OpenMode::Blocking, Arc::new(DeviceMetrics::new()))
            .unwrap_err();
        assert!(matches!(err, DeviceError::EndpointRevoked(5)));
    }
}
