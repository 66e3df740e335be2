pub mod drill;
pub mod session;
pub mod telemetry;

pub use drill::DrillConfig;
pub use session::{Session, SessionStatus};
pub use telemetry::SessionTelemetry;
