use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Result};
use log::{debug, warn};

use crate::bridge::{ConnectionStatus, DeliveryAck, WearableBridge};
use crate::device::DeviceConnectionTracker;
use crate::models::SessionTelemetry;

use super::wire::OutboundMessage;

pub type TelemetryHandler = Box<dyn Fn(SessionTelemetry) + Send + Sync>;

type HandlerSlot = Option<Arc<dyn Fn(SessionTelemetry) + Send + Sync>>;

/// Bidirectional, correlation-based message channel to the companion app.
///
/// Sends never retry and never block the caller beyond the bridge handoff.
/// Inbound telemetry goes to a single mutable handler slot: the last
/// registration silently wins, so consumers must pair [`set_handler`] with
/// [`clear_handler`] over their own lifetime or a stale consumer keeps
/// receiving deliveries. Session filtering is deliberately left to the
/// subscriber.
///
/// [`set_handler`]: MessageChannel::set_handler
/// [`clear_handler`]: MessageChannel::clear_handler
pub struct MessageChannel {
    bridge: Option<Arc<dyn WearableBridge>>,
    tracker: Arc<DeviceConnectionTracker>,
    target_app_id: String,
    handler: Mutex<HandlerSlot>,
}

impl MessageChannel {
    pub fn new(
        bridge: Option<Arc<dyn WearableBridge>>,
        tracker: Arc<DeviceConnectionTracker>,
        target_app_id: impl Into<String>,
    ) -> Self {
        Self {
            bridge,
            tracker,
            target_app_id: target_app_id.into(),
            handler: Mutex::new(None),
        }
    }

    /// Serializes and forwards a message through the native bridge.
    ///
    /// Rejects when the bridge is absent or no device is reachable
    /// (`Offline`/`NeedsPairing`); `Online` is enough to attempt delivery
    /// since the companion may foreground on receipt. An acked send is
    /// reported to the tracker as a completed round-trip.
    pub async fn send(&self, message: &OutboundMessage) -> Result<DeliveryAck> {
        let Some(bridge) = &self.bridge else {
            bail!("wearable bridge unavailable");
        };

        match self.tracker.status() {
            ConnectionStatus::Offline | ConnectionStatus::NeedsPairing => {
                bail!("no wearable device connected");
            }
            ConnectionStatus::Online | ConnectionStatus::Connected => {}
        }

        let payload = serde_json::to_value(message)?;
        let ack = bridge.send_message(payload, &self.target_app_id).await?;

        if ack.success {
            self.tracker.note_round_trip();
        } else {
            debug!("{} send was not acknowledged", message.kind());
        }

        Ok(ack)
    }

    /// Installs the inbound telemetry handler. Last registration wins.
    pub fn set_handler(&self, handler: TelemetryHandler) {
        let mut slot = self.lock_handler();
        if slot.is_some() {
            debug!("telemetry handler replaced; previous consumer detached");
        }
        *slot = Some(Arc::from(handler));
    }

    pub fn clear_handler(&self) {
        *self.lock_handler() = None;
    }

    /// Entry point for the bridge's `onMessageReceived` event. Messages
    /// addressed to a foreign companion app or that fail to parse as
    /// telemetry are dropped here.
    pub fn handle_message_received(&self, message: serde_json::Value, app_id: &str) {
        if app_id != self.target_app_id {
            debug!("dropping message for foreign app id {app_id}");
            return;
        }

        let telemetry: SessionTelemetry = match serde_json::from_value(message) {
            Ok(telemetry) => telemetry,
            Err(err) => {
                warn!("unparseable companion message: {err}");
                return;
            }
        };

        // Clone the handler out of the slot before invoking so a handler
        // that re-registers or clears does not deadlock on the slot lock.
        let handler = self.lock_handler().clone();
        match handler {
            Some(handler) => handler(telemetry),
            None => debug!("telemetry arrived with no registered handler"),
        }
    }

    fn lock_handler(&self) -> MutexGuard<'_, HandlerSlot> {
        match self.handler.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
