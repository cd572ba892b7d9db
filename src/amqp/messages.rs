//! AMQP message definitions, routing keys, and fact decoding

use crate::error::{OrchestrationError, Result};
use crate::types::*;

/// Exchange carrying matchmaking facts
pub const MATCH_EVENTS_EXCHANGE: &str = "chess.match_events";
/// Exchange carrying game facts, inbound and outbound
pub const GAME_EVENTS_EXCHANGE: &str = "chess.game_events";

/// Queue bound to the matchmaking exchange for this service
pub const USERS_MATCHED_QUEUE: &str = "orchestration.users_matched";
/// Queue bound to the game-events exchange for this service
pub const GAME_EVENTS_QUEUE: &str = "orchestration.game_events";

/// Routing keys for consumed facts
pub const USERS_MATCHED_ROUTING_KEY: &str = "users.matched";
pub const PLAYER_MOVED_ROUTING_KEY: &str = "game.player.moved";
pub const PLAYER_LEFT_ROUTING_KEY: &str = "game.player.left";
pub const PLAYER_DISCONNECTED_ROUTING_KEY: &str = "game.player.disconnected";
pub const PLAYER_CONNECTED_ROUTING_KEY: &str = "game.player.connected";

/// Routing keys for emitted events
pub const GAME_CREATED_ROUTING_KEY: &str = "game.created";
pub const MOVE_APPROVED_ROUTING_KEY: &str = "game.move.approved";
pub const GAME_ENDED_ROUTING_KEY: &str = "game.ended";

/// Inbound fact routing keys the game-events queue binds to. The wildcard
/// subscription covers every game this instance owns.
pub const GAME_FACT_BINDINGS: &[&str] = &[
    PLAYER_MOVED_ROUTING_KEY,
    PLAYER_LEFT_ROUTING_KEY,
    PLAYER_DISCONNECTED_ROUTING_KEY,
    PLAYER_CONNECTED_ROUTING_KEY,
];

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            OrchestrationError::InternalError {
                message: format!("failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            OrchestrationError::InternalError {
                message: format!("failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

fn payload<T: serde::Serialize + serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let envelope: MessageEnvelope<T> = MessageEnvelope::from_bytes(bytes)?;
    Ok(envelope.payload)
}

/// Decode an inbound delivery into a fact. Unknown routing keys yield
/// `Ok(None)` — a no-op for the dispatcher, never a crash. Malformed
/// payloads for known keys are an error the consumer logs and drops.
pub fn decode_fact(routing_key: &str, bytes: &[u8]) -> Result<Option<Fact>> {
    let fact = match routing_key {
        USERS_MATCHED_ROUTING_KEY => Some(Fact::UsersMatched(payload(bytes)?)),
        PLAYER_MOVED_ROUTING_KEY => Some(Fact::PlayerMoved(payload(bytes)?)),
        PLAYER_LEFT_ROUTING_KEY => Some(Fact::PlayerLeft(payload(bytes)?)),
        PLAYER_DISCONNECTED_ROUTING_KEY => Some(Fact::PlayerDisconnected(payload(bytes)?)),
        PLAYER_CONNECTED_ROUTING_KEY => Some(Fact::PlayerConnected(payload(bytes)?)),
        _ => None,
    };
    Ok(fact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::current_timestamp;

    fn matched_fact() -> UsersMatched {
        UsersMatched {
            user1: MatchedUser {
                id: "alice".to_string(),
                score: 1500,
            },
            user2: MatchedUser {
                id: "bob".to_string(),
                score: 1400,
            },
            match_id: uuid::Uuid::new_v4(),
            timestamp: current_timestamp(),
        }
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope =
            MessageEnvelope::new(matched_fact(), USERS_MATCHED_ROUTING_KEY.to_string());
        let bytes = envelope.to_bytes().unwrap();
        let decoded: MessageEnvelope<UsersMatched> =
            MessageEnvelope::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.routing_key, USERS_MATCHED_ROUTING_KEY);
        assert_eq!(decoded.correlation_id, envelope.correlation_id);
        assert_eq!(decoded.payload.user1.id, "alice");
    }

    #[test]
    fn test_decode_users_matched_fact() {
        let envelope =
            MessageEnvelope::new(matched_fact(), USERS_MATCHED_ROUTING_KEY.to_string());
        let bytes = envelope.to_bytes().unwrap();

        match decode_fact(USERS_MATCHED_ROUTING_KEY, &bytes).unwrap() {
            Some(Fact::UsersMatched(m)) => assert_eq!(m.user2.score, 1400),
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_routing_key_is_noop() {
        let result = decode_fact("game.spectator.joined", b"{}").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_malformed_payload_is_error() {
        assert!(decode_fact(PLAYER_MOVED_ROUTING_KEY, b"not json").is_err());
    }

    #[test]
    fn test_move_fact_wire_field_name() {
        let fact = GamePlayerMoved {
            game_id: uuid::Uuid::new_v4(),
            player_id: "alice".to_string(),
            mv: "e2e4".to_string(),
            timestamp: current_timestamp(),
        };
        let json = serde_json::to_value(&fact).unwrap();
        assert_eq!(json["move"], "e2e4");
    }
}
