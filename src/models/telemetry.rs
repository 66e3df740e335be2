use serde::{Deserialize, Serialize};

/// Shot telemetry reported by the wearable's companion app.
///
/// `session_id` is `None` on untagged payloads from older companion builds;
/// the sync controller treats those as addressed to its own session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTelemetry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub shots_recorded: u32,
    /// Epoch milliseconds, one entry per detected shot.
    #[serde(default)]
    pub shot_timestamps: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
}

impl SessionTelemetry {
    /// Whether this payload may be delivered to a controller tracking
    /// `session_id`. Untagged payloads match any session.
    pub fn matches_session(&self, session_id: &str) -> bool {
        match &self.session_id {
            Some(tagged) => tagged == session_id,
            None => true,
        }
    }
}
