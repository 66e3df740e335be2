use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use tokio::{task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::bridge::ConnectionStatus;
use crate::channel::{MessageChannel, OutboundMessage};
use crate::models::{DrillConfig, SessionTelemetry};

use super::state::{SyncState, TelemetryWait};

/// How long to wait for the wearable's final telemetry after `END_SESSION`
/// before proceeding with phone-only data.
const TELEMETRY_WAIT: time::Duration = time::Duration::from_millis(5000);

pub type TelemetryCallback = Box<dyn Fn(SessionTelemetry) + Send + Sync>;

type CallbackSlot = Option<Arc<dyn Fn(SessionTelemetry) + Send + Sync>>;

#[derive(Debug, Clone)]
pub struct SessionSyncParams {
    pub session_id: String,
    pub drill: Option<DrillConfig>,
    /// The user explicitly chose wearable tracking for this session.
    pub wearable_tracking_requested: bool,
}

struct WaitGuard {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives the watch side of one active session.
///
/// `effective_control` is computed exactly once at construction: the
/// derived status must be `Connected` and the user must have chosen
/// wearable tracking. The choice is fixed for the session's lifetime; a
/// watch that connects mid-session does not get control, and one that
/// drops out does not lose it (sends just degrade).
///
/// Bridge failures never escape this type: a failed send is logged and the
/// session continues phone-only.
pub struct SessionSyncController {
    channel: Arc<MessageChannel>,
    session_id: String,
    drill: Option<DrillConfig>,
    effective_control: bool,
    state: Mutex<SyncState>,
    wait_guard: Mutex<Option<WaitGuard>>,
    on_telemetry: Mutex<CallbackSlot>,
}

impl SessionSyncController {
    pub fn new(
        channel: Arc<MessageChannel>,
        status_at_start: ConnectionStatus,
        params: SessionSyncParams,
    ) -> Self {
        let effective_control =
            params.wearable_tracking_requested && status_at_start == ConnectionStatus::Connected;

        Self {
            channel,
            session_id: params.session_id,
            drill: params.drill,
            effective_control,
            state: Mutex::new(SyncState::new()),
            wait_guard: Mutex::new(None),
            on_telemetry: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn effective_control(&self) -> bool {
        self.effective_control
    }

    pub fn is_waiting_for_telemetry(&self) -> bool {
        self.lock_state().telemetry_wait == TelemetryWait::Waiting
    }

    /// Registers the callback that receives matching telemetry (live shots
    /// during the session and the final payload).
    pub fn set_on_telemetry(&self, callback: TelemetryCallback) {
        *self.lock(&self.on_telemetry) = Some(Arc::from(callback));
    }

    /// Subscribes this controller to the channel. Pair with [`detach`] at
    /// teardown; the channel slot is single-consumer.
    ///
    /// [`detach`]: SessionSyncController::detach
    pub fn attach(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.channel.set_handler(Box::new(move |telemetry| {
            if let Some(controller) = weak.upgrade() {
                controller.handle_telemetry(telemetry);
            }
        }));
    }

    /// Mount-time entry point: subscribes to the channel and performs the
    /// one-shot auto-sync. With control and a configured drill this sends
    /// `SYNC_DRILL` then `START_SESSION` exactly once per controller
    /// instance; re-invocation (a re-render) is a no-op.
    pub async fn activate(self: &Arc<Self>) {
        self.attach();

        if !self.effective_control {
            return;
        }
        let Some(drill) = self.drill.clone() else {
            return;
        };
        if !self.lock_state().begin_auto_sync() {
            return;
        }

        let drill_name = drill.name.clone();
        self.send_or_degrade(OutboundMessage::SyncDrill { drill }).await;
        self.send_or_degrade(OutboundMessage::StartSession {
            session_id: self.session_id.clone(),
            drill_name: Some(drill_name),
        })
        .await;
    }

    /// Pushes the drill to the watch. Manual calls re-send even after the
    /// automatic sync; the one-shot gate binds the automatic path only.
    pub async fn sync_drill(&self, drill: &DrillConfig) {
        if !self.effective_control {
            return;
        }
        self.lock_state().mark_drill_synced();
        self.send_or_degrade(OutboundMessage::SyncDrill {
            drill: drill.clone(),
        })
        .await;
    }

    pub async fn start_tracking(&self, drill_name: Option<String>) {
        if !self.effective_control {
            return;
        }
        self.send_or_degrade(OutboundMessage::StartSession {
            session_id: self.session_id.clone(),
            drill_name,
        })
        .await;
    }

    /// Fire-and-forget end-of-session telemetry request.
    ///
    /// Without control this is a synchronous no-op: no message, no wait
    /// state — a phone-only session must never block on the wearable. With
    /// control it arms a 5000 ms timer and issues `END_SESSION` in the
    /// background; telemetry arriving first fires the callback, the timer
    /// firing first clears the wait silently.
    pub fn request_final_telemetry(self: &Arc<Self>) {
        if !self.effective_control {
            return;
        }
        if !self.lock_state().begin_wait() {
            debug!(
                "final telemetry already requested for session {}",
                self.session_id
            );
            return;
        }

        let sender = Arc::clone(self);
        tokio::spawn(async move {
            sender
                .send_or_degrade(OutboundMessage::EndSession {
                    session_id: sender.session_id.clone(),
                })
                .await;
        });

        let token = CancellationToken::new();
        let wait_token = token.clone();
        let waiter = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = wait_token.cancelled() => {}
                _ = time::sleep(TELEMETRY_WAIT) => {
                    if waiter.lock_state().expire_wait() {
                        debug!(
                            "no final telemetry for session {} within {:?}; continuing phone-only",
                            waiter.session_id, TELEMETRY_WAIT
                        );
                    }
                }
            }
        });

        self.replace_wait_guard(Some(WaitGuard { token, handle }));
    }

    /// Unsubscribes from the channel and abandons any pending wait.
    pub fn detach(&self) {
        self.channel.clear_handler();
        self.replace_wait_guard(None);
    }

    fn handle_telemetry(&self, telemetry: SessionTelemetry) {
        if !telemetry.matches_session(&self.session_id) {
            debug!(
                "dropping telemetry tagged {:?}; active session is {}",
                telemetry.session_id, self.session_id
            );
            return;
        }

        let resolved_wait = {
            let mut state = self.lock_state();
            match state.telemetry_wait {
                TelemetryWait::Closed => {
                    debug!(
                        "discarding telemetry for closed session {}",
                        self.session_id
                    );
                    return;
                }
                TelemetryWait::Waiting => state.resolve_wait(),
                TelemetryWait::Idle => false,
            }
        };

        if resolved_wait {
            // Stop the pending timeout; the payload won the race.
            if let Some(guard) = self.lock(&self.wait_guard).take() {
                guard.token.cancel();
            }
        }

        // Invoke outside the slot lock so a callback that re-registers
        // does not deadlock.
        let callback = self.lock(&self.on_telemetry).clone();
        if let Some(callback) = callback {
            callback(telemetry);
        }
    }

    async fn send_or_degrade(&self, message: OutboundMessage) {
        let kind = message.kind();
        match self.channel.send(&message).await {
            Ok(ack) if ack.success => {}
            Ok(_) => debug!("{kind} not acknowledged by companion app"),
            Err(err) => warn!("{kind} send failed, continuing phone-only: {err:#}"),
        }
    }

    fn replace_wait_guard(&self, next: Option<WaitGuard>) {
        let mut slot = self.lock(&self.wait_guard);
        if let Some(previous) = slot.take() {
            previous.token.cancel();
            previous.handle.abort();
        }
        *slot = next;
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.lock(&self.state)
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for SessionSyncController {
    fn drop(&mut self) {
        if let Some(guard) = self.lock(&self.wait_guard).take() {
            guard.token.cancel();
            guard.handle.abort();
        }
    }
}
