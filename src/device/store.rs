use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;

use crate::bridge::{ConnectionStatus, Device};

/// Process-wide device/link state.
///
/// Single writer: [`super::DeviceConnectionTracker`] owns every mutation
/// (the crate-private setters). Everything else reads through [`status`],
/// [`devices`], or a [`watch_status`] subscription.
///
/// [`status`]: ConnectionStore::status
/// [`devices`]: ConnectionStore::devices
/// [`watch_status`]: ConnectionStore::watch_status
pub struct ConnectionStore {
    state: Mutex<ConnectionState>,
    status_tx: watch::Sender<ConnectionStatus>,
}

#[derive(Debug, Default)]
struct ConnectionState {
    bridge_ready: bool,
    devices: Vec<Device>,
    last_status_event: Option<ConnectionStatus>,
    handshake_acked: bool,
}

impl ConnectionStore {
    /// `bridge_ready` is whether a native bridge is present at all; a
    /// build without one never leaves `Offline`.
    pub fn new(bridge_ready: bool) -> Self {
        let state = ConnectionState {
            bridge_ready,
            ..ConnectionState::default()
        };
        let (status_tx, _) = watch::channel(derive_status(&state));

        Self {
            state: Mutex::new(state),
            status_tx,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    pub fn devices(&self) -> Vec<Device> {
        self.lock().devices.clone()
    }

    /// Subscribe to derived-status transitions.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Wholesale replacement of the device list. A change in the set of
    /// device ids invalidates the companion handshake and any per-device
    /// status event; the new device must re-handshake.
    pub(crate) fn set_devices(&self, devices: Vec<Device>) {
        self.mutate(|state| {
            let same_ids = state.devices.len() == devices.len()
                && state
                    .devices
                    .iter()
                    .zip(devices.iter())
                    .all(|(old, new)| old.id == new.id);

            if !same_ids {
                state.handshake_acked = false;
                state.last_status_event = None;
            }
            state.devices = devices;
        });
    }

    pub(crate) fn set_device_status(&self, device_id: &str, status: ConnectionStatus) {
        self.mutate(|state| {
            if !state.devices.iter().any(|d| d.id == device_id) {
                log::debug!("status event for unknown device {device_id}: {status:?}");
            }
            state.last_status_event = Some(status);
            if status != ConnectionStatus::Connected {
                state.handshake_acked = false;
            }
        });
    }

    pub(crate) fn mark_handshake(&self) {
        self.mutate(|state| state.handshake_acked = true);
    }

    fn mutate(&self, f: impl FnOnce(&mut ConnectionState)) {
        let derived = {
            let mut state = self.lock();
            f(&mut state);
            derive_status(&state)
        };
        self.status_tx.send_if_modified(|current| {
            if *current == derived {
                false
            } else {
                *current = derived;
                true
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn derive_status(state: &ConnectionState) -> ConnectionStatus {
    if state.devices.is_empty() {
        // Empty-but-ready reads as "nothing paired yet", not as a broken
        // link. Bridge absent (never ready) is the only true Offline here.
        return if state.bridge_ready {
            ConnectionStatus::NeedsPairing
        } else {
            ConnectionStatus::Offline
        };
    }

    if state.devices.iter().any(|d| d.needs_repairing) {
        return ConnectionStatus::NeedsPairing;
    }

    if state.handshake_acked {
        return ConnectionStatus::Connected;
    }

    state
        .last_status_event
        .unwrap_or(ConnectionStatus::Online)
}
