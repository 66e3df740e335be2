use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::watch;

use crate::bridge::{ConnectionStatus, Device, WearableBridge};

use super::store::ConnectionStore;

/// Maintains the most recent known device list and the derived
/// [`ConnectionStatus`]. Sole writer of the [`ConnectionStore`].
pub struct DeviceConnectionTracker {
    bridge: Option<Arc<dyn WearableBridge>>,
    store: Arc<ConnectionStore>,
    target_app_id: String,
}

impl DeviceConnectionTracker {
    pub fn new(
        bridge: Option<Arc<dyn WearableBridge>>,
        store: Arc<ConnectionStore>,
        target_app_id: impl Into<String>,
    ) -> Self {
        Self {
            bridge,
            store,
            target_app_id: target_app_id.into(),
        }
    }

    /// Opens the platform device picker. Side effect only; a selection
    /// surfaces later through [`Self::on_devices_updated`].
    pub fn request_device_selection(&self) {
        if let Some(bridge) = &self.bridge {
            bridge.request_device_selection();
        }
    }

    /// Best-effort device snapshot. A missing bridge or a bridge error
    /// yields an empty list; wearable features are optional, never a
    /// failure of the caller's flow.
    pub async fn list_devices(&self) -> Vec<Device> {
        let Some(bridge) = &self.bridge else {
            return Vec::new();
        };

        match bridge.list_connected_devices().await {
            Ok(devices) => {
                self.store.set_devices(devices.clone());
                devices
            }
            Err(err) => {
                warn!("device list unavailable: {err:#}");
                Vec::new()
            }
        }
    }

    pub fn on_devices_updated(&self, devices: Vec<Device>) {
        debug!("device list updated: {} device(s)", devices.len());
        self.store.set_devices(devices);
    }

    pub fn on_device_status_changed(&self, device_id: &str, status: ConnectionStatus) {
        self.store.set_device_status(device_id, status);
    }

    /// Probes the companion app; an installed companion counts as the
    /// pairing handshake.
    pub async fn refresh_companion_status(&self) {
        let Some(bridge) = &self.bridge else {
            return;
        };

        match bridge.companion_app_status(&self.target_app_id).await {
            Ok(status) if status.is_installed => self.store.mark_handshake(),
            Ok(status) => debug!(
                "companion app not installed (reported version {})",
                status.version
            ),
            Err(err) => warn!("companion status probe failed: {err:#}"),
        }
    }

    /// Called by the message channel after an acked send; a successful
    /// round-trip is proof the companion app is alive.
    pub fn note_round_trip(&self) {
        self.store.mark_handshake();
    }

    pub fn status(&self) -> ConnectionStatus {
        self.store.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.store.watch_status()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use crate::bridge::{CompanionAppStatus, DeliveryAck};

    use super::*;

    struct FakeBridge {
        devices: Mutex<Result<Vec<Device>>>,
        companion_installed: bool,
    }

    impl FakeBridge {
        fn with_devices(devices: Vec<Device>) -> Self {
            Self {
                devices: Mutex::new(Ok(devices)),
                companion_installed: true,
            }
        }

        fn failing() -> Self {
            Self {
                devices: Mutex::new(Err(anyhow::anyhow!("bridge unavailable"))),
                companion_installed: false,
            }
        }
    }

    #[async_trait]
    impl WearableBridge for FakeBridge {
        fn request_device_selection(&self) {}

        async fn list_connected_devices(&self) -> Result<Vec<Device>> {
            match &*self.devices.lock().unwrap() {
                Ok(devices) => Ok(devices.clone()),
                Err(_) => bail!("bridge unavailable"),
            }
        }

        async fn send_message(
            &self,
            _payload: serde_json::Value,
            _target_app_id: &str,
        ) -> Result<DeliveryAck> {
            Ok(DeliveryAck { success: true })
        }

        async fn companion_app_status(&self, _target_app_id: &str) -> Result<CompanionAppStatus> {
            Ok(CompanionAppStatus {
                is_installed: self.companion_installed,
                version: 3,
            })
        }
    }

    fn device(id: &str) -> Device {
        Device {
            id: id.to_string(),
            display_name: "Garmin Instinct".to_string(),
            model_name: "instinct-2".to_string(),
            needs_repairing: false,
        }
    }

    fn tracker_with(bridge: Option<Arc<dyn WearableBridge>>) -> DeviceConnectionTracker {
        let store = Arc::new(ConnectionStore::new(bridge.is_some()));
        DeviceConnectionTracker::new(bridge, store, "range-companion")
    }

    #[tokio::test]
    async fn empty_list_with_ready_bridge_is_needs_pairing_not_offline() {
        let tracker = tracker_with(Some(Arc::new(FakeBridge::with_devices(Vec::new()))));

        assert!(tracker.list_devices().await.is_empty());
        assert_eq!(tracker.status(), ConnectionStatus::NeedsPairing);
    }

    #[tokio::test]
    async fn missing_bridge_degrades_to_offline_without_error() {
        let tracker = tracker_with(None);

        assert!(tracker.list_devices().await.is_empty());
        assert_eq!(tracker.status(), ConnectionStatus::Offline);

        // side-effect-only calls must be harmless too
        tracker.request_device_selection();
        tracker.refresh_companion_status().await;
        assert_eq!(tracker.status(), ConnectionStatus::Offline);
    }

    #[tokio::test]
    async fn bridge_error_yields_empty_list_and_no_panic() {
        let tracker = tracker_with(Some(Arc::new(FakeBridge::failing())));
        assert!(tracker.list_devices().await.is_empty());
    }

    #[tokio::test]
    async fn discovered_device_without_handshake_is_online() {
        let tracker = tracker_with(Some(Arc::new(FakeBridge::with_devices(Vec::new()))));
        tracker.on_devices_updated(vec![device("w1")]);
        assert_eq!(tracker.status(), ConnectionStatus::Online);
    }

    #[tokio::test]
    async fn repair_needed_overrides_presence() {
        let tracker = tracker_with(Some(Arc::new(FakeBridge::with_devices(Vec::new()))));
        let mut broken = device("w1");
        broken.needs_repairing = true;
        tracker.on_devices_updated(vec![broken]);
        assert_eq!(tracker.status(), ConnectionStatus::NeedsPairing);
    }

    #[tokio::test]
    async fn round_trip_promotes_to_connected() {
        let tracker = tracker_with(Some(Arc::new(FakeBridge::with_devices(Vec::new()))));
        tracker.on_devices_updated(vec![device("w1")]);
        tracker.note_round_trip();
        assert_eq!(tracker.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn companion_probe_counts_as_handshake() {
        let tracker = tracker_with(Some(Arc::new(FakeBridge::with_devices(Vec::new()))));
        tracker.on_devices_updated(vec![device("w1")]);
        tracker.refresh_companion_status().await;
        assert_eq!(tracker.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn replacing_the_device_resets_the_handshake() {
        let tracker = tracker_with(Some(Arc::new(FakeBridge::with_devices(Vec::new()))));
        tracker.on_devices_updated(vec![device("w1")]);
        tracker.note_round_trip();
        assert_eq!(tracker.status(), ConnectionStatus::Connected);

        tracker.on_devices_updated(vec![device("w2")]);
        assert_eq!(tracker.status(), ConnectionStatus::Online);
    }

    #[tokio::test]
    async fn status_event_demotes_connected_link() {
        let tracker = tracker_with(Some(Arc::new(FakeBridge::with_devices(Vec::new()))));
        tracker.on_devices_updated(vec![device("w1")]);
        tracker.note_round_trip();

        tracker.on_device_status_changed("w1", ConnectionStatus::Online);
        assert_eq!(tracker.status(), ConnectionStatus::Online);
    }

    #[tokio::test]
    async fn watch_observes_transitions() {
        let tracker = tracker_with(Some(Arc::new(FakeBridge::with_devices(Vec::new()))));
        let rx = tracker.watch_status();
        assert_eq!(*rx.borrow(), ConnectionStatus::NeedsPairing);

        tracker.on_devices_updated(vec![device("w1")]);
        assert_eq!(*rx.borrow(), ConnectionStatus::Online);
    }
}
