use serde::{Deserialize, Serialize};

use crate::game::events::{
    BoltExhausted, BoltFired, DomainEvent, EventPayload, PlayerAction, ScoreIncreased, ScoreUpdated,
    ShipJoined, Topic,
};
use crate::game::id::{EntityId, IdError};

/// Commands a client can issue for its ship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Enter the game with a display name
    Join { name: String, variant: u8 },
    /// (Re)appear in the arena
    Spawn,
    /// Thrust impulse plus an optional heading request
    Move { dx: f64, dy: f64, angle: Option<f64> },
    Fire,
    Leave,
}

/// Messages from client to server, addressed to the sender's ship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub ship: EntityId,
    pub command: Command,
}

/// Absolute motion state of a ship
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShipMotion {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub thrust_angle: f64,
    pub velocity: f64,
    pub timestamp: u64,
}

impl From<&PlayerAction> for ShipMotion {
    fn from(action: &PlayerAction) -> Self {
        Self {
            x: action.x,
            y: action.y,
            angle: action.angle,
            thrust_angle: action.thrust_angle,
            velocity: action.velocity,
            timestamp: action.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipSnapshot {
    pub id: EntityId,
    pub name: Option<String>,
    pub variant: u8,
    pub spawned: bool,
    pub motion: ShipMotion,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoltSnapshot {
    pub id: EntityId,
    pub owner: EntityId,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub speed: f64,
    pub start_ts: u64,
    pub ttl_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarrierSnapshot {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub id: EntityId,
    pub score: i64,
}

/// Full world view sent to a newly joined client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub timestamp: u64,
    pub ships: Vec<ShipSnapshot>,
    pub bolts: Vec<BoltSnapshot>,
    pub ranking: Vec<RankedEntry>,
    pub barriers: Vec<BarrierSnapshot>,
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    ShipJoined { id: EntityId, name: String, variant: u8 },
    ShipLeft { id: EntityId },
    ShipMoved { id: EntityId, motion: ShipMotion },
    ShipSpawned { id: EntityId, motion: ShipMotion },
    ShipDestroyed { id: EntityId, by: Option<EntityId> },
    BoltFired(BoltSnapshot),
    BoltExhausted { id: EntityId, owner: EntityId },
    /// Ranked top-N
    Scoreboard { entries: Vec<RankedEntry> },
    /// Bolts the receiving ship may still fire
    Ammo { available: u32 },
    /// Expanding ring hazard started at (x, y)
    Shockwave {
        x: f64,
        y: f64,
        distance: f64,
        duration_ms: u64,
        start_ts: u64,
    },
    Snapshot(WorldSnapshot),
    /// Command refused (e.g. empty name)
    Rejected { reason: String },
}

/// Who receives a client-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    /// Directed to a single ship's client
    Only(EntityId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub audience: Audience,
    pub message: ServerMessage,
}

impl Outgoing {
    pub fn broadcast(message: ServerMessage) -> Self {
        Self {
            audience: Audience::Everyone,
            message,
        }
    }

    pub fn directed(to: EntityId, message: ServerMessage) -> Self {
        Self {
            audience: Audience::Only(to),
            message,
        }
    }
}

/// Broker record: one domain event as it travels between nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    pub topic: String,
    pub key: String,
    pub timestamp: u64,
    pub payload: Option<Vec<u8>>,
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),
    #[error(transparent)]
    BadKey(#[from] IdError),
    #[error("payload on topic {topic} does not match")]
    Mismatch { topic: &'static str },
    #[error("missing payload on topic {0}")]
    MissingPayload(&'static str),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);

impl WireRecord {
    /// Payload bytes carry only the topic's own payload type
    pub fn from_event(event: &DomainEvent) -> Result<Self, WireError> {
        if !event.is_well_formed() {
            return Err(match event.payload {
                None => WireError::MissingPayload(event.topic.name()),
                Some(_) => WireError::Mismatch {
                    topic: event.topic.name(),
                },
            });
        }
        let payload = match &event.payload {
            None => None,
            Some(EventPayload::Joined(p)) => Some(encode(p)?),
            Some(EventPayload::Action(p)) => Some(encode(p)?),
            Some(EventPayload::Fired(p)) => Some(encode(p)?),
            Some(EventPayload::Exhausted(p)) => Some(encode(p)?),
            Some(EventPayload::ScoreIncreased(p)) => Some(encode(p)?),
            Some(EventPayload::ScoreUpdated(p)) => Some(encode(p)?),
        };
        Ok(Self {
            topic: event.topic.name().to_string(),
            key: event.key.as_str().to_string(),
            timestamp: event.timestamp,
            payload,
        })
    }

    pub fn into_event(self) -> Result<DomainEvent, WireError> {
        let topic = Topic::from_name(&self.topic).ok_or(WireError::UnknownTopic(self.topic))?;
        let key = EntityId::parse(&self.key)?;
        let payload = match self.payload {
            None if topic.allows_tombstone() => None,
            None => return Err(WireError::MissingPayload(topic.name())),
            Some(bytes) => Some(match topic {
                Topic::Join => EventPayload::Joined(decode::<ShipJoined>(&bytes)?),
                Topic::PlayerAction => EventPayload::Action(decode::<PlayerAction>(&bytes)?),
                Topic::BoltLifecycle => EventPayload::Fired(decode::<BoltFired>(&bytes)?),
                Topic::BoltAction => EventPayload::Exhausted(decode::<BoltExhausted>(&bytes)?),
                Topic::ScoreControl => EventPayload::ScoreIncreased(decode::<ScoreIncreased>(&bytes)?),
                Topic::ScoreUpdate => EventPayload::ScoreUpdated(decode::<ScoreUpdated>(&bytes)?),
            }),
        };
        Ok(DomainEvent {
            topic,
            key,
            timestamp: self.timestamp,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::ActionKind;

    #[test]
    fn test_client_message_join() {
        let ship = EntityId::generate();
        let msg = ClientMessage {
            ship,
            command: Command::Join {
                name: "TestPlayer".to_string(),
                variant: 3,
            },
        };
        let encoded = encode(&msg).unwrap();
        let decoded: ClientMessage = decode(&encoded).unwrap();
        assert_eq!(decoded.ship, ship);
        match decoded.command {
            Command::Join { name, variant } => {
                assert_eq!(name, "TestPlayer");
                assert_eq!(variant, 3);
            }
            _ => panic!("Wrong command"),
        }
    }

    #[test]
    fn test_wire_record_player_action() {
        let ship = EntityId::generate();
        let event = DomainEvent::action(
            ship,
            PlayerAction {
                kind: ActionKind::Moved,
                x: 0.25,
                y: 0.75,
                angle: 1.0,
                thrust_angle: 0.5,
                velocity: 0.1,
                timestamp: 1234,
                by: None,
            },
        );
        let record = WireRecord::from_event(&event).unwrap();
        assert_eq!(record.topic, "player-action");
        assert_eq!(record.key, ship.as_str());

        let bytes = encode(&record).unwrap();
        let back: WireRecord = decode(&bytes).unwrap();
        assert_eq!(back.into_event().unwrap(), event);
    }

    #[test]
    fn test_wire_record_tombstone() {
        let ship = EntityId::generate();
        let record = WireRecord::from_event(&DomainEvent::left(ship, 99)).unwrap();
        assert!(record.payload.is_none());
        let event = record.into_event().unwrap();
        assert_eq!(event.topic, Topic::Join);
        assert_eq!(event.timestamp, 99);
        assert!(event.payload.is_none());
    }

    #[test]
    fn test_wire_record_rejects_unknown_topic() {
        let record = WireRecord {
            topic: "chat".to_string(),
            key: EntityId::generate().to_string(),
            timestamp: 1,
            payload: None,
        };
        assert!(matches!(record.into_event(), Err(WireError::UnknownTopic(_))));
    }

    #[test]
    fn test_wire_record_rejects_bad_key() {
        let record = WireRecord {
            topic: "join".to_string(),
            key: "nope".to_string(),
            timestamp: 1,
            payload: None,
        };
        assert!(matches!(record.into_event(), Err(WireError::BadKey(_))));
    }

    #[test]
    fn test_wire_record_rejects_missing_payload() {
        let record = WireRecord {
            topic: "bolt-lifecycle".to_string(),
            key: EntityId::generate().to_string(),
            timestamp: 1,
            payload: None,
        };
        assert!(matches!(record.into_event(), Err(WireError::MissingPayload(_))));
    }

    #[test]
    fn test_wire_record_rejects_garbage_payload() {
        let record = WireRecord {
            topic: "join".to_string(),
            key: EntityId::generate().to_string(),
            timestamp: 1,
            payload: Some(vec![0xff]),
        };
        assert!(matches!(record.into_event(), Err(WireError::Decode(_))));
    }

    #[test]
    fn test_server_message_snapshot() {
        let id = EntityId::generate();
        let msg = ServerMessage::Snapshot(WorldSnapshot {
            timestamp: 10,
            ships: vec![ShipSnapshot {
                id,
                name: Some("a".into()),
                variant: 1,
                spawned: true,
                motion: ShipMotion {
                    x: 0.1,
                    y: 0.2,
                    angle: 0.0,
                    thrust_angle: 0.0,
                    velocity: 0.0,
                    timestamp: 10,
                },
            }],
            bolts: vec![],
            ranking: vec![RankedEntry { id, score: 2 }],
            barriers: vec![BarrierSnapshot {
                x1: 0.0,
                y1: 0.0,
                x2: 0.1,
                y2: 0.1,
            }],
        });
        let decoded: ServerMessage = decode(&encode(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_invalid_decode() {
        let garbage = vec![0xff, 0xff, 0xff];
        let result: Result<ServerMessage, _> = decode(&garbage);
        assert!(result.is_err());
    }
}
