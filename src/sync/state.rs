//! One-shot guards for the session sync controller, written as explicit
//! state machines so the contracts are testable in isolation.

/// Guards the automatic drill push: `NotSynced -> Synced`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrillSyncState {
    NotSynced,
    Synced,
}

/// Final-telemetry wait: `Idle -> Waiting -> Closed`.
///
/// `Closed` is terminal and enforces the at-most-one-final-payload rule:
/// late or duplicate telemetry for a closed session is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryWait {
    Idle,
    Waiting,
    Closed,
}

#[derive(Debug)]
pub struct SyncState {
    pub drill_sync: DrillSyncState,
    pub telemetry_wait: TelemetryWait,
}

impl SyncState {
    pub fn new() -> Self {
        Self {
            drill_sync: DrillSyncState::NotSynced,
            telemetry_wait: TelemetryWait::Idle,
        }
    }

    /// Claims the one-shot auto-sync. Returns `true` exactly once.
    pub fn begin_auto_sync(&mut self) -> bool {
        match self.drill_sync {
            DrillSyncState::NotSynced => {
                self.drill_sync = DrillSyncState::Synced;
                true
            }
            DrillSyncState::Synced => false,
        }
    }

    /// Manual drill sends also settle the gate so a later re-render does
    /// not trigger the automatic push again.
    pub fn mark_drill_synced(&mut self) {
        self.drill_sync = DrillSyncState::Synced;
    }

    /// Arms the final-telemetry wait. Returns `false` when a wait is
    /// already pending or the session is closed.
    pub fn begin_wait(&mut self) -> bool {
        match self.telemetry_wait {
            TelemetryWait::Idle => {
                self.telemetry_wait = TelemetryWait::Waiting;
                true
            }
            TelemetryWait::Waiting | TelemetryWait::Closed => false,
        }
    }

    /// Telemetry arrived while waiting. Returns `true` when this call won
    /// the race against the timeout.
    pub fn resolve_wait(&mut self) -> bool {
        match self.telemetry_wait {
            TelemetryWait::Waiting => {
                self.telemetry_wait = TelemetryWait::Closed;
                true
            }
            TelemetryWait::Idle | TelemetryWait::Closed => false,
        }
    }

    /// The timeout fired first. Returns `true` when a wait was actually
    /// pending.
    pub fn expire_wait(&mut self) -> bool {
        match self.telemetry_wait {
            TelemetryWait::Waiting => {
                self.telemetry_wait = TelemetryWait::Closed;
                true
            }
            TelemetryWait::Idle | TelemetryWait::Closed => false,
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}
