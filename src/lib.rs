//! Wearable session-sync subsystem for a range training tracker.
//!
//! Four pieces, wired together by [`WearableSync`]:
//! device presence tracking ([`device::DeviceConnectionTracker`]), the
//! message channel to the companion app ([`channel::MessageChannel`]), the
//! per-session sync controller ([`sync::SessionSyncController`]), and the
//! once-per-launch orphaned-session recovery pass
//! ([`recovery::OrphanedSessionRecovery`]).
//!
//! The native transport and the session table are external collaborators,
//! consumed through the [`bridge::WearableBridge`] and
//! [`store::SessionStore`] traits. A build without wearable support passes
//! `None` for the bridge; every feature then degrades to phone-only
//! behavior instead of failing.

pub mod bridge;
pub mod channel;
pub mod device;
pub mod models;
pub mod recovery;
pub mod store;
pub mod sync;
pub mod utils;

use std::sync::Arc;

use bridge::{BridgeEvent, WearableBridge};
use channel::MessageChannel;
use device::{ConnectionStore, DeviceConnectionTracker};
use recovery::OrphanedSessionRecovery;
use store::SessionStore;
use sync::{SessionSyncController, SessionSyncParams};

/// Initialize logging (reads RUST_LOG env var).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

/// Assembled subsystem. Built once at app startup and shared behind `Arc`s;
/// per-session controllers are minted from it as sessions start.
pub struct WearableSync {
    tracker: Arc<DeviceConnectionTracker>,
    channel: Arc<MessageChannel>,
    recovery: Arc<OrphanedSessionRecovery>,
}

impl WearableSync {
    /// `bridge` is `None` on platforms/builds without wearable support.
    /// `target_app_id` identifies the companion app on the device side.
    pub fn new(
        bridge: Option<Arc<dyn WearableBridge>>,
        sessions: Arc<dyn SessionStore>,
        target_app_id: &str,
    ) -> Self {
        let connection = Arc::new(ConnectionStore::new(bridge.is_some()));
        let tracker = Arc::new(DeviceConnectionTracker::new(
            bridge.clone(),
            connection,
            target_app_id,
        ));
        let channel = Arc::new(MessageChannel::new(
            bridge,
            tracker.clone(),
            target_app_id,
        ));
        let recovery = Arc::new(OrphanedSessionRecovery::new(sessions));

        Self {
            tracker,
            channel,
            recovery,
        }
    }

    pub fn tracker(&self) -> &Arc<DeviceConnectionTracker> {
        &self.tracker
    }

    pub fn channel(&self) -> &Arc<MessageChannel> {
        &self.channel
    }

    pub fn recovery(&self) -> &Arc<OrphanedSessionRecovery> {
        &self.recovery
    }

    /// Entry point for the native bridge's event stream. The embedder
    /// forwards every bridge event here; this fans out to the tracker and
    /// the message channel.
    pub fn dispatch_bridge_event(&self, event: BridgeEvent) {
        match event {
            BridgeEvent::DevicesUpdated { devices } => self.tracker.on_devices_updated(devices),
            BridgeEvent::DeviceStatusChanged { device_id, status } => {
                self.tracker.on_device_status_changed(&device_id, status)
            }
            BridgeEvent::MessageReceived { message, app_id } => {
                self.channel.handle_message_received(message, &app_id)
            }
        }
    }

    /// Builds the sync controller for a session that is starting right
    /// now. Control is decided here, from the live derived status and the
    /// user's tracking choice, and stays fixed for the session's lifetime.
    pub fn session_controller(&self, params: SessionSyncParams) -> Arc<SessionSyncController> {
        Arc::new(SessionSyncController::new(
            self.channel.clone(),
            self.tracker.status(),
            params,
        ))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::bridge::{CompanionAppStatus, ConnectionStatus, DeliveryAck, Device};
    use crate::models::Session;

    use super::*;

    #[derive(Default)]
    struct FakeBridge {
        sent: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl WearableBridge for FakeBridge {
        fn request_device_selection(&self) {}

        async fn list_connected_devices(&self) -> Result<Vec<Device>> {
            Ok(Vec::new())
        }

        async fn send_message(
            &self,
            payload: serde_json::Value,
            _target_app_id: &str,
        ) -> Result<DeliveryAck> {
            self.sent.lock().unwrap().push(payload);
            Ok(DeliveryAck { success: true })
        }

        async fn companion_app_status(&self, _target_app_id: &str) -> Result<CompanionAppStatus> {
            Ok(CompanionAppStatus {
                is_installed: true,
                version: 1,
            })
        }
    }

    struct EmptyStore;

    #[async_trait]
    impl SessionStore for EmptyStore {
        async fn list_active_sessions_for_current_user(&self) -> Result<Vec<Session>> {
            Ok(Vec::new())
        }

        async fn end_session(&self, _id: &str) -> Result<()> {
            Ok(())
        }

        async fn delete_session(&self, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn watch(id: &str) -> Device {
        Device {
            id: id.to_string(),
            display_name: "watch".to_string(),
            model_name: "m1".to_string(),
            needs_repairing: false,
        }
    }

    #[tokio::test]
    async fn bridge_events_flow_through_the_router() {
        let subsystem = WearableSync::new(
            Some(Arc::new(FakeBridge::default())),
            Arc::new(EmptyStore),
            "range-companion",
        );
        assert_eq!(subsystem.tracker().status(), ConnectionStatus::NeedsPairing);

        subsystem.dispatch_bridge_event(BridgeEvent::DevicesUpdated {
            devices: vec![watch("w1")],
        });
        assert_eq!(subsystem.tracker().status(), ConnectionStatus::Online);

        subsystem.dispatch_bridge_event(BridgeEvent::DeviceStatusChanged {
            device_id: "w1".to_string(),
            status: ConnectionStatus::Connected,
        });
        assert_eq!(subsystem.tracker().status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn controller_control_snapshot_is_taken_at_start() {
        let subsystem = WearableSync::new(
            Some(Arc::new(FakeBridge::default())),
            Arc::new(EmptyStore),
            "range-companion",
        );
        subsystem.dispatch_bridge_event(BridgeEvent::DevicesUpdated {
            devices: vec![watch("w1")],
        });
        subsystem.tracker().note_round_trip();

        let controller = subsystem.session_controller(SessionSyncParams {
            session_id: "s-1".to_string(),
            drill: None,
            wearable_tracking_requested: true,
        });
        assert!(controller.effective_control());

        // the watch dropping out later does not revoke control
        subsystem.dispatch_bridge_event(BridgeEvent::DevicesUpdated { devices: vec![] });
        assert_eq!(subsystem.tracker().status(), ConnectionStatus::NeedsPairing);
        assert!(controller.effective_control());
    }

    #[tokio::test]
    async fn inbound_messages_route_to_the_channel() {
        let subsystem = WearableSync::new(
            Some(Arc::new(FakeBridge::default())),
            Arc::new(EmptyStore),
            "range-companion",
        );
        let seen = Arc::new(Mutex::new(0u32));
        let sink = seen.clone();
        subsystem
            .channel()
            .set_handler(Box::new(move |_| *sink.lock().unwrap() += 1));

        subsystem.dispatch_bridge_event(BridgeEvent::MessageReceived {
            message: serde_json::json!({ "shotsRecorded": 1, "shotTimestamps": [] }),
            app_id: "range-companion".to_string(),
        });

        assert_eq!(*seen.lock().unwrap(), 1);
    }
}
