//! Data path - per-endpoint buffers and sessions
//!
//! This module contains the code every read/write goes through:
//! - Ring buffer with blocking waits
//! - Sessions and their interrupt handles

pub mod ring_buffer;
pub mod session;

pub use ring_buffer::{Interest, Interrupt, OpenMode, Readiness, RingBuffer};
pub use session::{Interrupter, Session};
