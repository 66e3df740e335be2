//! Seam to the platform's wearable SDK.
//!
//! The subsystem consumes this surface; it never implements transport
//! itself. A build without wearable support simply wires `None` for the
//! bridge and every operation degrades to a no-op.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity of a discovered wearable. Replaced wholesale on each discovery
/// event; there is no incremental merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub display_name: String,
    pub model_name: String,
    /// Paired previously but the pairing handshake is no longer valid.
    #[serde(default)]
    pub needs_repairing: bool,
}

/// Derived link status. Never persisted: computed from the latest device
/// list plus the last successful message round-trip.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Offline,
    /// Bluetooth-reachable, but the companion app is not foregrounded.
    Online,
    NeedsPairing,
    /// The companion app acknowledged a handshake.
    Connected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAck {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanionAppStatus {
    pub is_installed: bool,
    pub version: u32,
}

/// Native wearable bridge surface, consumed but not implemented here.
///
/// Every method is best-effort: a rejection means the message (or query)
/// was not handed to the transport, nothing more. Delivery is never
/// guaranteed and a pending call cannot be aborted, only ignored.
#[async_trait]
pub trait WearableBridge: Send + Sync {
    /// Opens the platform device picker. Side effect only; a selection
    /// arrives later as a [`BridgeEvent::DevicesUpdated`].
    fn request_device_selection(&self);

    async fn list_connected_devices(&self) -> Result<Vec<Device>>;

    async fn send_message(
        &self,
        payload: serde_json::Value,
        target_app_id: &str,
    ) -> Result<DeliveryAck>;

    async fn companion_app_status(&self, target_app_id: &str) -> Result<CompanionAppStatus>;
}

/// Asynchronous events surfaced by the native bridge. The embedder feeds
/// these into [`crate::WearableSync::dispatch_bridge_event`].
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    DevicesUpdated {
        devices: Vec<Device>,
    },
    DeviceStatusChanged {
        device_id: String,
        status: ConnectionStatus,
    },
    MessageReceived {
        message: serde_json::Value,
        app_id: String,
    },
}
