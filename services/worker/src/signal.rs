//! Defines the signaling protocol between the worker and the room server.

use govi_core::room::SubscriptionMode;
use serde::{Deserialize, Serialize};

/// Messages sent from the worker to the room server.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientSignal {
    /// Requests membership in a room. Must be the first message.
    Join {
        room: String,
        subscription: SubscriptionMode,
    },
    /// A frame of agent audio (base64 encoded PCM16 at the room rate).
    Audio { data: String },
    /// Leaves the room and ends the connection.
    Leave,
}

/// Messages sent from the room server to the worker.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerSignal {
    /// Confirms room membership. Arrives exactly once, before any other
    /// signal.
    Joined { room: String },
    /// A remote participant became present in the room.
    ParticipantJoined { identity: String },
    /// A remote participant left the room.
    ParticipantLeft { identity: String },
    /// A frame of subscribed remote audio (base64 encoded PCM16 at the
    /// room rate).
    Audio { participant: String, data: String },
    /// The server closed the room.
    Closed { reason: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_serializes_with_snake_case_tag() {
        let join = ClientSignal::Join {
            room: "govlab-demo".to_string(),
            subscription: SubscriptionMode::AudioOnly,
        };
        let json = serde_json::to_string(&join).unwrap();
        assert!(json.contains("\"type\":\"join\""));
        assert!(json.contains("\"subscription\":\"audio_only\""));
    }

    #[test]
    fn participant_joined_deserializes() {
        let json = r#"{"type":"participant_joined","identity":"user-42"}"#;
        let signal: ServerSignal = serde_json::from_str(json).unwrap();
        assert_eq!(
            signal,
            ServerSignal::ParticipantJoined {
                identity: "user-42".to_string()
            }
        );
    }

    #[test]
    fn audio_frame_round_trips() {
        let frame = ServerSignal::Audio {
            participant: "user-42".to_string(),
            data: "AAAA".to_string(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        let back: ServerSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn closed_allows_missing_reason() {
        let json = r#"{"type":"closed","reason":null}"#;
        let signal: ServerSignal = serde_json::from_str(json).unwrap();
        assert_eq!(signal, ServerSignal::Closed { reason: None });
    }

    #[test]
    fn unknown_signal_type_is_rejected() {
        let json = r#"{"type":"totally_unknown"}"#;
        let result: Result<ServerSignal, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
