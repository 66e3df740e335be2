pub mod channel;
pub mod wire;

pub use channel::{MessageChannel, TelemetryHandler};
pub use wire::OutboundMessage;
