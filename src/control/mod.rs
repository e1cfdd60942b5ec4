//! Control plane
//!
//! - Command decoding (Create / Destroy)
//! - ControlService: identity pool + endpoint table under one exclusive lock
//! - ControlSession: the single open handle on the control endpoint

pub mod command;
pub mod service;
pub mod session;

pub use command::{CommandOutcome, ControlCommand, CMD_CREATE, CMD_DESTROY};
pub use service::ControlService;
pub use session::ControlSession;
