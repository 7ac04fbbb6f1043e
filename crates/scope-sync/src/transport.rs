use std::sync::Arc;

use async_trait::async_trait;

use scope_core::store::MemoryStore;
use scope_core::{DeviceId, EventId, EventRecord, EventStore, VectorClock};

// ---------------------------------------------------------------------------
// Transport contract
// ---------------------------------------------------------------------------

/// Failure surfaced by a transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network failure talking to {device}: {detail}")]
    Network { device: DeviceId, detail: String },
    #[error("device {device} is not reachable through this transport")]
    InvalidDevice { device: DeviceId },
}

/// Moves event batches between this device and a remote one. Addressing,
/// framing and authentication live behind this boundary; the orchestrator
/// only sees typed batches and acks.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Deliver local events to `device`; returns the ids the remote
    /// acknowledged durably storing.
    async fn send_events(
        &self,
        device: &DeviceId,
        events: &[EventRecord],
    ) -> Result<Vec<EventId>, TransportError>;

    /// Fetch the remote's events not yet covered by `since`.
    async fn receive_events(
        &self,
        device: &DeviceId,
        since: &VectorClock,
    ) -> Result<Vec<EventRecord>, TransportError>;
}

// ---------------------------------------------------------------------------
// Loopback transport
// ---------------------------------------------------------------------------

/// In-process transport wired straight to a remote device's store. Used by
/// the tests and by local same-machine sync; a network transport implements
/// the same trait elsewhere.
pub struct LoopbackTransport {
    remote_device: DeviceId,
    remote_store: Arc<MemoryStore>,
}

impl LoopbackTransport {
    pub fn new(remote_device: DeviceId, remote_store: Arc<MemoryStore>) -> Self {
        Self {
            remote_device,
            remote_store,
        }
    }

    fn check_device(&self, device: &DeviceId) -> Result<(), TransportError> {
        if device != &self.remote_device {
            return Err(TransportError::InvalidDevice {
                device: device.clone(),
            });
        }
        Ok(())
    }

    fn network_err(&self, e: impl std::fmt::Display) -> TransportError {
        TransportError::Network {
            device: self.remote_device.clone(),
            detail: e.to_string(),
        }
    }
}

#[async_trait]
impl SyncTransport for LoopbackTransport {
    async fn send_events(
        &self,
        device: &DeviceId,
        events: &[EventRecord],
    ) -> Result<Vec<EventId>, TransportError> {
        self.check_device(device)?;
        let mut acked = Vec::with_capacity(events.len());
        for event in events {
            let known = self
                .remote_store
                .contains(event.event_id)
                .await
                .map_err(|e| self.network_err(e))?;
            if !known {
                self.remote_store
                    .append(event.clone())
                    .await
                    .map_err(|e| self.network_err(e))?;
            }
            acked.push(event.event_id);
        }
        Ok(acked)
    }

    async fn receive_events(
        &self,
        device: &DeviceId,
        since: &VectorClock,
    ) -> Result<Vec<EventRecord>, TransportError> {
        self.check_device(device)?;
        self.remote_store
            .events_ahead_of(since)
            .await
            .map_err(|e| self.network_err(e))
    }
}
