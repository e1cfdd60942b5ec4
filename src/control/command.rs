//! Control commands and their raw encoding
//!
//! Raw form mirrors an ioctl call: an operation code plus one i32 payload.

use crate::core::EndpointId;
use crate::{DeviceError, Result};

/// Operation code for Create
pub const CMD_CREATE: u32 = 1;
/// Operation code for Destroy
pub const CMD_DESTROY: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Allocate an identifier and build a new endpoint
    Create,
    /// Tear down the endpoint with this identifier
    Destroy(EndpointId),
}

/// Result of a successfully executed command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Created(EndpointId),
    Destroyed(EndpointId),
}

impl ControlCommand {
    /// Decode an operation code and payload
    ///
    /// Create ignores its payload. Destroy needs a payload of at least 1;
    /// the upper bound is checked by the service against its slot count.
    pub fn decode(op: u32, payload: i32) -> Result<Self> {
        match op {
            CMD_CREATE => Ok(ControlCommand::Create),
            CMD_DESTROY => {
                if payload < 1 {
                    return Err(DeviceError::InvalidArgument(format!(
                        "destroy target {} must be >= 1",
                        payload
                    )));
                }
                Ok(ControlCommand::Destroy(EndpointId::from_raw(payload as u32)))
            }
            other => Err(DeviceError::InvalidArgument(format!(
                "unknown control operation {}",
                other
            ))),
        }
    }

    /// Operation code and payload for this command
    pub fn encode(&self) -> (u32, i32) {
        match self {
            ControlCommand::Create => (CMD_CREATE, 0),
            ControlCommand::Destroy(id) => (CMD_DESTROY, id.as_raw() as i32),
        }
    }
}

impl CommandOutcome {
    /// Value handed back through the raw interface: the new id for Create,
    /// 0 for Destroy
    pub fn as_raw(&self) -> i32 {
        match self {
            CommandOutcome::Created(id) => id.as_raw() as i32,
            CommandOutcome::Destroyed(_) => 0,
        }
    }
}
