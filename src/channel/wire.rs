use serde::{Deserialize, Serialize};

use crate::models::DrillConfig;

/// Application-level messages carried inside the bridge's generic payload.
///
/// The link is unordered best-effort delivery: the wearable may process or
/// acknowledge these in any order, and a send that was accepted by the
/// transport can still be lost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "SYNC_DRILL")]
    SyncDrill { drill: DrillConfig },

    #[serde(rename = "START_SESSION", rename_all = "camelCase")]
    StartSession {
        session_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        drill_name: Option<String>,
    },

    #[serde(rename = "END_SESSION", rename_all = "camelCase")]
    EndSession { session_id: String },
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::SyncDrill { .. } => "SYNC_DRILL",
            OutboundMessage::StartSession { .. } => "START_SESSION",
            OutboundMessage::EndSession { .. } => "END_SESSION",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_messages_carry_the_wire_tag() {
        let msg = OutboundMessage::StartSession {
            session_id: "s-1".to_string(),
            drill_name: Some("Bill Drill".to_string()),
        };
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["type"], "START_SESSION");
        assert_eq!(value["sessionId"], "s-1");
        assert_eq!(value["drillName"], "Bill Drill");
    }

    #[test]
    fn drill_payload_omits_unset_optionals() {
        let msg = OutboundMessage::SyncDrill {
            drill: DrillConfig {
                name: "El Presidente".to_string(),
                rounds: 12,
                distance_meters: Some(10.0),
                time_limit_seconds: None,
            },
        };
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["type"], "SYNC_DRILL");
        assert_eq!(value["drill"]["rounds"], 12);
        assert!(value["drill"].get("timeLimitSeconds").is_none());
    }
}
