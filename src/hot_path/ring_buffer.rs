//! Bounded circular byte buffer with blocking read/write
//!
//! One mutex guards the store, the write cursor and `size`. The read cursor
//! is derived: `(write_pos - size) mod capacity`. Two condition variables
//! carry wakeups: data-available (signaled by writes) and space-available
//! (signaled by reads). A third one, `drained`, lets teardown wait for
//! in-flight callers to leave.
//!
//! Every wait is a re-check loop: a wakeup only means "look again".

use crate::core::EndpointId;
use crate::{DeviceError, Result};
use bytes::{Bytes, BytesMut};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Blocking policy chosen when a session is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Blocking,
    NonBlocking,
}

/// What a poller is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
    Both,
}

/// Readiness reported by `poll`/`readiness`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

impl Readiness {
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.readable && !self.writable
    }

    fn matches(&self, interest: Interest) -> bool {
        match interest {
            Interest::Readable => self.readable,
            Interest::Writable => self.writable,
            Interest::Both => self.readable || self.writable,
        }
    }

    fn filter(self, interest: Interest) -> Self {
        match interest {
            Interest::Readable => Self {
                writable: false,
                ..self
            },
            Interest::Writable => Self {
                readable: false,
                ..self
            },
            Interest::Both => self,
        }
    }
}

/// Cancellation signal for blocked calls
///
/// Raising bumps a generation counter. A call records the generation when it
/// enters the buffer and aborts only if it changes while the call is still
/// inside, so a raise that lands while nothing is blocked is not carried
/// over to a later call.
#[derive(Debug, Default)]
pub struct Interrupt {
    generation: AtomicU64,
}

impl Interrupt {
    pub const fn new() -> Self {
        Self {
            generation: AtomicU64::new(0),
        }
    }

    /// Cancel whatever call is in flight. The caller must wake the buffer's
    /// waiters afterwards (see [`RingBuffer::wake_all`]).
    pub fn raise(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    fn snapshot(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    #[inline]
    fn raised_since(&self, snapshot: u64) -> bool {
        self.generation.load(Ordering::Acquire) != snapshot
    }
}

/// Never raised; used by the non-interruptible entry points
static NO_INTERRUPT: Interrupt = Interrupt::new();

struct State {
    store: Vec<u8>,
    write_pos: usize,
    size: usize,
    revoked: bool,
    /// Callers currently inside read/write/poll
    inflight: usize,
}

impl State {
    #[inline]
    fn readiness(&self, capacity: usize) -> Readiness {
        Readiness {
            readable: self.size > 0,
            writable: self.size < capacity,
        }
    }
}

#[derive(Clone, Copy)]
enum Wait {
    DataAvailable,
    SpaceAvailable,
}

/// Fixed-capacity byte ring shared by the sessions of one endpoint
pub struct RingBuffer {
    owner: EndpointId,
    capacity: usize,
    state: Mutex<State>,
    data_available: Condvar,
    space_available: Condvar,
    drained: Condvar,
}

impl RingBuffer {
    /// Create an unowned buffer of `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self::for_endpoint(EndpointId::from_raw(0), capacity)
    }

    /// Create the buffer backing endpoint `owner`
    pub fn for_endpoint(owner: EndpointId, capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            owner,
            capacity,
            state: Mutex::new(State {
                store: vec![0u8; capacity],
                write_pos: 0,
                size: 0,
                revoked: false,
                inflight: 0,
            }),
            data_available: Condvar::new(),
            space_available: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently buffered
    pub fn len(&self) -> usize {
        self.state.lock().size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-blocking readiness snapshot
    pub fn readiness(&self) -> Readiness {
        self.state.lock().readiness(self.capacity)
    }

    /// Write up to `data.len()` bytes, returning how many were stored
    pub fn write(&self, data: &[u8], mode: OpenMode) -> Result<usize> {
        self.write_interruptible(data, mode, &NO_INTERRUPT)
    }

    /// Read up to `max_len` bytes
    pub fn read(&self, max_len: usize, mode: OpenMode) -> Result<Bytes> {
        self.read_interruptible(max_len, mode, &NO_INTERRUPT)
    }

    /// `write` whose blocking wait aborts with `Interrupted` if `interrupt`
    /// is raised while the call is in flight
    pub fn write_interruptible(
        &self,
        data: &[u8],
        mode: OpenMode,
        interrupt: &Interrupt,
    ) -> Result<usize> {
        let capacity = self.capacity;
        let written = self.transfer(
            Wait::SpaceAvailable,
            mode,
            interrupt,
            data.is_empty(),
            |state| state.size < capacity,
            |state| {
                let n = data.len().min(capacity - state.size);
                let first = n.min(capacity - state.write_pos);
                let wp = state.write_pos;
                state.store[wp..wp + first].copy_from_slice(&data[..first]);
                state.store[..n - first].copy_from_slice(&data[first..n]);
                state.write_pos = (wp + n) % capacity;
                state.size += n;
                n
            },
        )?;

        if written > 0 {
            self.data_available.notify_all();
        }
        tracing::trace!(endpoint = %self.owner, requested = data.len(), written, "write");
        Ok(written)
    }

    /// `read` counterpart of [`RingBuffer::write_interruptible`]
    pub fn read_interruptible(
        &self,
        max_len: usize,
        mode: OpenMode,
        interrupt: &Interrupt,
    ) -> Result<Bytes> {
        let capacity = self.capacity;
        let out = self.transfer(
            Wait::DataAvailable,
            mode,
            interrupt,
            max_len == 0,
            |state| state.size > 0,
            |state| {
                let n = max_len.min(state.size);
                let rp = (state.write_pos + capacity - state.size) % capacity;
                let first = n.min(capacity - rp);
                let mut out = BytesMut::with_capacity(n);
                out.extend_from_slice(&state.store[rp..rp + first]);
                out.extend_from_slice(&state.store[..n - first]);
                state.size -= n;
                out.freeze()
            },
        )?;

        if !out.is_empty() {
            self.space_available.notify_all();
        }
        tracing::trace!(endpoint = %self.owner, requested = max_len, read = out.len(), "read");
        Ok(out)
    }

    /// Wait until the buffer matches `interest`, at most `timeout`
    /// (`None` waits indefinitely). An empty readiness means the timeout
    /// elapsed.
    pub fn poll(
        &self,
        interest: Interest,
        timeout: Option<Duration>,
        interrupt: &Interrupt,
    ) -> Result<Readiness> {
        let deadline = timeout.map(|t| Instant::now() + t);
        // With a non-zero capacity the buffer is always readable or writable,
        // so only single-direction interests can ever wait.
        let wait = match interest {
            Interest::Readable => Wait::DataAvailable,
            _ => Wait::SpaceAvailable,
        };

        let mut state = self.enter()?;
        let armed = interrupt.snapshot();
        let outcome = loop {
            if state.revoked {
                break Err(DeviceError::EndpointRevoked(self.owner.as_raw()));
            }
            let ready = state.readiness(self.capacity);
            if ready.matches(interest) {
                break Ok(ready.filter(interest));
            }
            if interrupt.raised_since(armed) {
                break Err(DeviceError::Interrupted);
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        break Ok(Readiness::default());
                    }
                    let _ = self.condvar(wait).wait_until(&mut state, deadline);
                }
                None => self.condvar(wait).wait(&mut state),
            }
        };
        self.leave(state);
        outcome
    }

    /// Mark the buffer revoked and wake every waiter. Returns `false` if it
    /// was already revoked. Only the owning endpoint revokes.
    pub(crate) fn revoke(&self) -> bool {
        let mut state = self.state.lock();
        if state.revoked {
            return false;
        }
        state.revoked = true;
        if state.inflight == 0 {
            Self::free_store(&mut state);
        }
        drop(state);
        self.wake_all();
        true
    }

    pub fn is_revoked(&self) -> bool {
        self.state.lock().revoked
    }

    /// Wait until no caller is inside the buffer. Returns `false` if callers
    /// were still in flight when `timeout` elapsed; the last of them frees
    /// the store on its way out.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.inflight > 0 {
            if self.drained.wait_until(&mut state, deadline).timed_out() {
                return state.inflight == 0;
            }
        }
        true
    }

    /// Whether the backing store has been released
    pub fn is_freed(&self) -> bool {
        self.state.lock().store.is_empty()
    }

    /// Callers currently inside read/write/poll
    pub fn inflight(&self) -> usize {
        self.state.lock().inflight
    }

    /// Wake every waiter so it re-checks its condition
    ///
    /// Takes the lock first so a waiter between its check and its wait cannot
    /// miss the notification.
    pub fn wake_all(&self) {
        let _state = self.state.lock();
        self.data_available.notify_all();
        self.space_available.notify_all();
    }

    /// Register a caller that stays inside until `release_inflight`
    #[cfg(test)]
    pub(crate) fn hold_inflight(&self) -> Result<()> {
        self.enter().map(drop)
    }

    #[cfg(test)]
    pub(crate) fn release_inflight(&self) {
        self.leave(self.state.lock());
    }

    /// Seeking a stream is meaningless
    pub fn seek(&self, _offset: i64) -> Result<u64> {
        Err(DeviceError::NotSupported("seek"))
    }

    fn transfer<T>(
        &self,
        wait: Wait,
        mode: OpenMode,
        interrupt: &Interrupt,
        empty_request: bool,
        ready: impl Fn(&State) -> bool,
        op: impl FnOnce(&mut State) -> T,
    ) -> Result<T>
    where
        T: Default,
    {
        let mut state = self.enter()?;
        let armed = interrupt.snapshot();
        let outcome = loop {
            if state.revoked {
                break Err(DeviceError::EndpointRevoked(self.owner.as_raw()));
            }
            if empty_request {
                break Ok(T::default());
            }
            if ready(&state) {
                break Ok(op(&mut state));
            }
            if mode == OpenMode::NonBlocking {
                break Err(DeviceError::WouldBlock);
            }
            if interrupt.raised_since(armed) {
                break Err(DeviceError::Interrupted);
            }
            self.condvar(wait).wait(&mut state);
        };
        self.leave(state);
        outcome
    }

    fn enter(&self) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state.lock();
        if state.revoked {
            return Err(DeviceError::EndpointRevoked(self.owner.as_raw()));
        }
        state.inflight += 1;
        Ok(state)
    }

    fn leave(&self, mut state: MutexGuard<'_, State>) {
        state.inflight -= 1;
        if state.revoked && state.inflight == 0 {
            Self::free_store(&mut state);
            self.drained.notify_all();
        }
    }

    fn free_store(state: &mut State) {
        state.store = Vec::new();
        state.size = 0;
        state.write_pos = 0;
    }

    #[inline]
    fn condvar(&self, wait: Wait) -> &Condvar {
        match wait {
            Wait::DataAvailable => &self.data_available,
            Wait::SpaceAvailable => &self.space_available,
        }
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RingBuffer")
            .field("owner", &self.owner)
            .field("capacity", &self.capacity)
            .field("size", &state.size)
            .field("write_pos", &state.write_pos)
            .field("revoked", &state.revoked)
            .field("inflight", &state.inflight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::wait_for_inflight;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_round_trip() {
        let rb = RingBuffer::new(16);
        assert_eq!(rb.write(b"HELLO", OpenMode::Blocking).unwrap(), 5);
        let out = rb.read(16, OpenMode::Blocking).unwrap();
        assert_eq!(&out[..], b"HELLO");
        assert!(rb.is_empty());
    }

    #[test]
    fn test_partial_write() {
        let rb = RingBuffer::new(4);
        assert_eq!(rb.write(b"ABCDE", OpenMode::NonBlocking).unwrap(), 4);
        assert_eq!(rb.len(), 4);
        assert_eq!(&rb.read(16, OpenMode::NonBlocking).unwrap()[..], b"ABCD");
    }

    #[test]
    fn test_partial_read() {
        let rb = RingBuffer::new(8);
        rb.write(b"abcdef", OpenMode::Blocking).unwrap();
        assert_eq!(&rb.read(4, OpenMode::Blocking).unwrap()[..], b"abcd");
        assert_eq!(rb.len(), 2);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let rb = RingBuffer::new(8);
        rb.write(b"123456", OpenMode::Blocking).unwrap();
        rb.read(4, OpenMode::Blocking).unwrap();
        // write cursor at 6, read cursor at 4: this write wraps
        assert_eq!(rb.write(b"ABCDEF", OpenMode::Blocking).unwrap(), 6);
        assert_eq!(rb.len(), 8);
        assert_eq!(&rb.read(8, OpenMode::Blocking).unwrap()[..], b"56ABCDEF");
    }

    #[test]
    fn test_nonblocking_would_block() {
        let rb = RingBuffer::new(2);
        assert!(matches!(
            rb.read(1, OpenMode::NonBlocking),
            Err(DeviceError::WouldBlock)
        ));
        rb.write(b"xy", OpenMode::NonBlocking).unwrap();
        assert!(matches!(
            rb.write(b"z", OpenMode::NonBlocking),
            Err(DeviceError::WouldBlock)
        ));
    }

    #[test]
    fn test_zero_length_requests() {
        let rb = RingBuffer::new(2);
        assert!(rb.read(0, OpenMode::Blocking).unwrap().is_empty());
        rb.write(b"xy", OpenMode::Blocking).unwrap();
        assert_eq!(rb.write(b"", OpenMode::Blocking).unwrap(), 0);
    }

    #[test]
    fn test_seek_not_supported() {
        let rb = RingBuffer::new(2);
        assert!(matches!(rb.seek(0), Err(DeviceError::NotSupported("seek"))));
    }

    #[test]
    fn test_blocking_read_waits_for_writer() {
        let rb = Arc::new(RingBuffer::new(16));
        let reader = {
            let rb = rb.clone();
            thread::spawn(move || rb.read(16, OpenMode::Blocking))
        };
        wait_for_inflight(&rb, 1);
        rb.write(b"late", OpenMode::Blocking).unwrap();
        assert_eq!(&reader.join().unwrap().unwrap()[..], b"late");
    }

    #[test]
    fn test_blocking_write_waits_for_space() {
        let rb = Arc::new(RingBuffer::new(2));
        rb.write(b"ab", OpenMode::Blocking).unwrap();
        let writer = {
            let rb = rb.clone();
            thread::spawn(move || rb.write(b"cd", OpenMode::Blocking))
        };
        wait_for_inflight(&rb, 1);
        assert_eq!(&rb.read(1, OpenMode::Blocking).unwrap()[..], b"a");
        assert_eq!(writer.join().unwrap().unwrap(), 1);
        assert_eq!(&rb.read(2, OpenMode::Blocking).unwrap()[..], b"bc");
    }

    #[test]
    fn test_revoke_wakes_blocked_reader() {
        let rb = Arc::new(RingBuffer::new(4));
        let reader = {
            let rb = rb.clone();
            thread::spawn(move || rb.read(4, OpenMode::Blocking))
        };
        wait_for_inflight(&rb, 1);
        assert!(rb.revoke());
        assert!(!rb.revoke());
        assert!(matches!(
            reader.join().unwrap(),
            Err(DeviceError::EndpointRevoked(_))
        ));
        assert!(rb.wait_drained(Duration::from_secs(1)));
        assert!(rb.is_freed());
    }

    #[test]
    fn test_interrupt_blocked_write() {
        let rb = Arc::new(RingBuffer::new(1));
        rb.write(b"a", OpenMode::Blocking).unwrap();
        let interrupt = Arc::new(Interrupt::new());
        let writer = {
            let rb = rb.clone();
            let interrupt = interrupt.clone();
            thread::spawn(move || rb.write_interruptible(b"b", OpenMode::Blocking, &interrupt))
        };
        wait_for_inflight(&rb, 1);
        interrupt.raise();
        rb.wake_all();
        assert!(matches!(
            writer.join().unwrap(),
            Err(DeviceError::Interrupted)
        ));
        // no partial mutation
        assert_eq!(&rb.read(4, OpenMode::NonBlocking).unwrap()[..], b"a");
    }

    #[test]
    fn test_interrupt_while_idle_does_not_cancel_next_read() {
        let rb = Arc::new(RingBuffer::new(4));
        let interrupt = Interrupt::new();
        interrupt.raise();
        rb.wake_all();

        let writer = {
            let rb = rb.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                rb.write(b"x", OpenMode::Blocking)
            })
        };
        let out = rb
            .read_interruptible(4, OpenMode::Blocking, &interrupt)
            .unwrap();
        assert_eq!(&out[..], b"x");
        assert_eq!(writer.join().unwrap().unwrap(), 1);
    }

    #[test]
    fn test_interrupt_blocked_poll() {
        let rb = Arc::new(RingBuffer::new(4));
        let interrupt = Arc::new(Interrupt::new());
        let poller = {
            let rb = rb.clone();
            let interrupt = interrupt.clone();
            thread::spawn(move || rb.poll(Interest::Readable, None, &interrupt))
        };
        wait_for_inflight(&rb, 1);
        interrupt.raise();
        rb.wake_all();
        assert!(matches!(
            poller.join().unwrap(),
            Err(DeviceError::Interrupted)
        ));
    }

    #[test]
    fn test_revoke_wakes_blocked_poll() {
        let rb = Arc::new(RingBuffer::new(4));
        let poller = {
            let rb = rb.clone();
            thread::spawn(move || rb.poll(Interest::Readable, None, &NO_INTERRUPT))
        };
        wait_for_inflight(&rb, 1);
        rb.revoke();
        assert!(matches!(
            poller.join().unwrap(),
            Err(DeviceError::EndpointRevoked(_))
        ));
        assert!(rb.is_freed());
    }

    #[test]
    fn test_drain_timeout_defers_free_to_last_caller() {
        let rb = RingBuffer::new(4);
        rb.hold_inflight().unwrap();
        assert!(rb.revoke());
        assert!(!rb.wait_drained(Duration::ZERO));
        assert!(!rb.is_freed());

        rb.release_inflight();
        assert_eq!(rb.inflight(), 0);
        assert!(rb.is_freed());
        assert!(rb.wait_drained(Duration::ZERO));
    }

    #[test]
    fn test_poll_readiness_and_timeout() {
        let rb = RingBuffer::new(2);
        let never = Interrupt::new();
        let ready = rb.poll(Interest::Both, None, &never).unwrap();
        assert!(ready.writable && !ready.readable);

        let timed_out = rb
            .poll(Interest::Readable, Some(Duration::from_millis(20)), &never)
            .unwrap();
        assert!(timed_out.is_empty());

        rb.write(b"ab", OpenMode::Blocking).unwrap();
        let ready = rb.poll(Interest::Readable, Some(Duration::ZERO), &never).unwrap();
        assert_eq!(
            ready,
            Readiness {
                readable: true,
                writable: false
            }
        );
    }

    #[test]
    fn test_poll_wakes_on_write() {
        let rb = Arc::new(RingBuffer::new(4));
        let poller = {
            let rb = rb.clone();
            thread::spawn(move || rb.poll(Interest::Readable, None, &NO_INTERRUPT))
        };
        wait_for_inflight(&rb, 1);
        rb.write(b"x", OpenMode::Blocking).unwrap();
        assert!(poller.join().unwrap().unwrap().readable);
    }
}
