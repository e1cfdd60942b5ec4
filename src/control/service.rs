//! Control service - owns the identity pool and the endpoint table
//!
//! Structural changes (create/destroy) run under one exclusive lock taken
//! with `try_lock`: a second caller gets `Busy` instead of queueing. The
//! table sits behind its own RwLock so session opens can look endpoints up
//! while a destroy drains, and it is only ever written with the control lock
//! held.

use crate::control::{CommandOutcome, ControlCommand, ControlSession};
use crate::core::{Endpoint, EndpointId, EndpointTable, IdentitySet, Teardown};
use crate::hot_path::{OpenMode, Session};
use crate::infrastructure::config::{ConfigError, DeviceConfig};
use crate::infrastructure::metrics::DeviceMetrics;
use crate::{log_control, DeviceError, Result};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Level;

pub struct ControlService {
    config: DeviceConfig,
    /// Structural lock; guards the identity pool
    identities: Mutex<IdentitySet>,
    endpoints: RwLock<EndpointTable>,
    control_session_open: AtomicBool,
    metrics: Arc<DeviceMetrics>,
}

impl ControlService {
    /// Build a service with no endpoints
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for a zero endpoint count or buffer
    /// capacity.
    pub fn new(config: DeviceConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        tracing::info!(
            max_endpoints = config.max_endpoints,
            buffer_capacity = config.buffer_capacity,
            "control service started"
        );
        Ok(Self {
            identities: Mutex::new(IdentitySet::new(config.max_endpoints)),
            endpoints: RwLock::new(EndpointTable::with_capacity(config.max_endpoints)),
            control_session_open: AtomicBool::new(false),
            metrics: Arc::new(DeviceMetrics::new()),
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    #[inline]
    pub fn metrics(&self) -> &Arc<DeviceMetrics> {
        &self.metrics
    }

    /// Run one control command
    pub fn execute(&self, command: ControlCommand) -> Result<CommandOutcome> {
        match command {
            ControlCommand::Create => self.create().map(CommandOutcome::Created),
            ControlCommand::Destroy(id) => self.destroy(id).map(|_| CommandOutcome::Destroyed(id)),
        }
    }

    /// Allocate the lowest free identifier and build its endpoint
    pub fn create(&self) -> Result<EndpointId> {
        let mut identities = self.lock_control()?;
        let id = identities.allocate().ok_or_else(|| {
            log_control!(Level::WARN, live = identities.len(), "no free endpoint identifier");
            DeviceError::ResourceExhausted
        })?;

        let endpoint = Arc::new(Endpoint::new(id, self.config.buffer_capacity));
        if self.endpoints.write().insert(endpoint).is_err() {
            identities.release(id)?;
            return Err(DeviceError::InvalidArgument(format!(
                "endpoint {} already registered",
                id
            )));
        }

        self.metrics.record_created();
        log_control!(Level::INFO, endpoint = %id, "endpoint created");
        Ok(id)
    }

    /// Remove endpoint `id` and run its teardown
    ///
    /// The control lock stays held through the drain, which is bounded by
    /// `drain_timeout_ms`.
    pub fn destroy(&self, id: EndpointId) -> Result<()> {
        let mut identities = self.lock_control()?;
        identities.validate(id)?;

        let endpoint = self
            .endpoints
            .write()
            .remove(id)
            .ok_or(DeviceError::NotFound(id.as_raw()))?;
        identities.release(id)?;

        self.teardown(&endpoint);
        Ok(())
    }

    /// Open a data session on endpoint `id`
    pub fn open(&self, id: EndpointId, mode: OpenMode) -> Result<Session> {
        if id.is_control() {
            return Err(DeviceError::InvalidArgument(
                "identifier 0 is the control endpoint".to_string(),
            ));
        }
        let endpoint = self
            .endpoints
            .read()
            .get(id)
            .cloned()
            .ok_or(DeviceError::NotFound(id.as_raw()))?;
        Session::open(endpoint, mode, self.metrics.clone())
    }

    /// Open the control endpoint; only one control session may be open
    pub fn open_control(&self) -> Result<ControlSession<'_>> {
        if self
            .control_session_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.metrics.record_busy();
            log_control!(Level::DEBUG, "control session already open");
            return Err(DeviceError::Busy);
        }
        log_control!(Level::DEBUG, "control session opened");
        Ok(ControlSession::new(self))
    }

    pub(crate) fn close_control(&self) {
        self.control_session_open.store(false, Ordering::Release);
        log_control!(Level::DEBUG, "control session closed");
    }

    /// Live identifiers in creation order
    pub fn live_ids(&self) -> Vec<EndpointId> {
        self.endpoints.read().ids().collect()
    }

    /// Number of live endpoints
    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes reserved by live endpoint buffers
    pub fn memory_size(&self) -> usize {
        self.len() * self.config.buffer_capacity
    }

    /// Destroy every live endpoint, oldest first
    ///
    /// Waits for the control lock instead of failing fast. Returns how many
    /// endpoints were torn down.
    pub fn shutdown(&self) -> usize {
        let mut identities = self.identities.lock();
        let drained = self.endpoints.write().drain();
        for endpoint in &drained {
            if let Err(err) = identities.release(endpoint.id()) {
                tracing::error!(endpoint = %endpoint.id(), %err, "identity out of sync");
            }
            self.teardown(endpoint);
        }
        if !drained.is_empty() {
            log_control!(Level::INFO, count = drained.len(), "shutdown destroyed endpoints");
        }
        drained.len()
    }

    fn teardown(&self, endpoint: &Endpoint) {
        match endpoint.destroy(self.config.drain_timeout()) {
            Teardown::Drained => {
                self.metrics.record_destroyed();
                log_control!(Level::INFO, endpoint = %endpoint.id(), "endpoint destroyed")
            }
            Teardown::Deferred { inflight } => {
                self.metrics.record_destroyed();
                log_control!(
                    Level::WARN,
                    endpoint = %endpoint.id(),
                    inflight,
                    "endpoint destroyed, store release deferred"
                )
            }
            Teardown::AlreadyRevoked => {
                log_control!(Level::WARN, endpoint = %endpoint.id(), "endpoint already revoked")
            }
        }
    }

    pub(crate) fn lock_control(&self) -> Result<MutexGuard<'_, IdentitySet>> {
        self.identities.try_lock().ok_or_else(|| {
            self.metrics.record_busy();
            log_control!(Level::DEBUG, "control operation refused: busy");
            DeviceError::Busy
        })
    }
}

impl Drop for ControlService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
