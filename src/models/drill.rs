use serde::{Deserialize, Serialize};

/// Drill configuration pushed to the wearable. Immutable once sent for a
/// given session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrillConfig {
    pub name: String,
    pub rounds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_seconds: Option<u32>,
}
