pub mod controller;
pub mod state;

pub use controller::{SessionSyncController, SessionSyncParams, TelemetryCallback};
pub use state::{DrillSyncState, SyncState, TelemetryWait};
