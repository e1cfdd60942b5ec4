//! Session on the control endpoint
//!
//! At most one is open at a time. Plain reads return nothing and plain
//! writes are swallowed; commands go through `execute`/`ioctl`.

use crate::control::{CommandOutcome, ControlCommand, ControlService};
use crate::core::EndpointId;
use crate::Result;
use bytes::Bytes;

pub struct ControlSession<'a> {
    service: &'a ControlService,
}

impl<'a> ControlSession<'a> {
    pub(crate) fn new(service: &'a ControlService) -> Self {
        Self { service }
    }

    pub fn execute(&self, command: ControlCommand) -> Result<CommandOutcome> {
        self.service.execute(command)
    }

    /// Raw entry point: decode `op`/`payload`, execute, and return the new
    /// id for Create or 0 for Destroy
    pub fn ioctl(&self, op: u32, payload: i32) -> Result<i32> {
        let command = ControlCommand::decode(op, payload)?;
        self.execute(command).map(|outcome| outcome.as_raw())
    }

    pub fn create(&self) -> Result<EndpointId> {
        self.service.create()
    }

    pub fn destroy(&self, id: EndpointId) -> Result<()> {
        self.service.destroy(id)
    }

    /// The control endpoint carries no data: always end-of-stream
    pub fn read(&self, _max_len: usize) -> Result<Bytes> {
        Ok(Bytes::new())
    }

    /// Accepts and discards everything
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        Ok(data.len())
    }

    pub fn close(self) {}
}

impl Drop for ControlSession<'_> {
    fn drop(&mut self) {
        self.service.close_control();
    }
}
