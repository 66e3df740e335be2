pub mod store;
pub mod tracker;

pub use store::ConnectionStore;
pub use tracker::DeviceConnectionTracker;
