//! Domain events and replication topics
//!
//! Every state change that must reach other nodes is expressed as a
//! `DomainEvent` on one of a closed set of topics, keyed by the entity it is
//! about. A missing payload is a logical delete of that key on that topic.

use serde::{Deserialize, Serialize};

use crate::game::id::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Topic {
    Join = 0,
    PlayerAction = 1,
    BoltLifecycle = 2,
    BoltAction = 3,
    ScoreControl = 4,
    ScoreUpdate = 5,
}

impl Topic {
    pub const COUNT: usize = 6;

    pub const ALL: [Topic; Topic::COUNT] = [
        Topic::Join,
        Topic::PlayerAction,
        Topic::BoltLifecycle,
        Topic::BoltAction,
        Topic::ScoreControl,
        Topic::ScoreUpdate,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Broker topic name
    pub fn name(self) -> &'static str {
        match self {
            Topic::Join => "join",
            Topic::PlayerAction => "player-action",
            Topic::BoltLifecycle => "bolt-lifecycle",
            Topic::BoltAction => "bolt-action",
            Topic::ScoreControl => "score-control",
            Topic::ScoreUpdate => "score-update",
        }
    }

    pub fn from_name(name: &str) -> Option<Topic> {
        Topic::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Whether an absent payload is meaningful on this topic
    pub fn allows_tombstone(self) -> bool {
        matches!(self, Topic::Join | Topic::ScoreControl | Topic::ScoreUpdate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipJoined {
    pub name: String,
    pub variant: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Moved,
    Spawned,
    Destroyed,
}

/// Absolute ship state at `timestamp`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerAction {
    pub kind: ActionKind,
    pub x: f64,
    pub y: f64,
    /// Heading the ship faces
    pub angle: f64,
    /// Direction of travel
    pub thrust_angle: f64,
    /// Speed along `thrust_angle`
    pub velocity: f64,
    pub timestamp: u64,
    /// Attacker, for `Destroyed`
    pub by: Option<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoltFired {
    pub owner: EntityId,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub speed: f64,
    pub start_ts: u64,
    pub ttl_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoltExhausted {
    pub owner: EntityId,
    /// Ship the bolt struck, if any
    pub hit: Option<EntityId>,
}

/// Keyed by the player receiving the points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreIncreased {
    pub delta: i64,
    pub timestamp: u64,
    /// Entity whose destruction earned the points; dedups redeliveries
    pub cause: EntityId,
}

/// A player's ledger total. Nodes keep the update with the greatest `version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreUpdated {
    pub score: i64,
    /// Newest increment or reset folded in
    pub as_of: u64,
    /// Last reset folded in (0 if none)
    pub reset_at: u64,
    /// Increments counted since that reset
    pub entries: u32,
}

impl ScoreUpdated {
    /// Total order in which a ledger only ever moves forward
    pub fn version(&self) -> (u64, u64, u32, i64) {
        (self.reset_at, self.as_of, self.entries, self.score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Joined(ShipJoined),
    Action(PlayerAction),
    Fired(BoltFired),
    Exhausted(BoltExhausted),
    ScoreIncreased(ScoreIncreased),
    ScoreUpdated(ScoreUpdated),
}

impl EventPayload {
    pub fn topic(&self) -> Topic {
        match self {
            EventPayload::Joined(_) => Topic::Join,
            EventPayload::Action(_) => Topic::PlayerAction,
            EventPayload::Fired(_) => Topic::BoltLifecycle,
            EventPayload::Exhausted(_) => Topic::BoltAction,
            EventPayload::ScoreIncreased(_) => Topic::ScoreControl,
            EventPayload::ScoreUpdated(_) => Topic::ScoreUpdate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub topic: Topic,
    /// Routing key: the entity the event is about
    pub key: EntityId,
    /// Emitting tick time; orders payload-absent events
    pub timestamp: u64,
    pub payload: Option<EventPayload>,
}

impl DomainEvent {
    fn with_payload(key: EntityId, timestamp: u64, payload: EventPayload) -> Self {
        Self {
            topic: payload.topic(),
            key,
            timestamp,
            payload: Some(payload),
        }
    }

    fn tombstone(topic: Topic, key: EntityId, timestamp: u64) -> Self {
        Self {
            topic,
            key,
            timestamp,
            payload: None,
        }
    }

    pub fn joined(ship: EntityId, name: String, variant: u8, timestamp: u64) -> Self {
        Self::with_payload(ship, timestamp, EventPayload::Joined(ShipJoined { name, variant }))
    }

    pub fn left(ship: EntityId, timestamp: u64) -> Self {
        Self::tombstone(Topic::Join, ship, timestamp)
    }

    pub fn action(ship: EntityId, action: PlayerAction) -> Self {
        Self::with_payload(ship, action.timestamp, EventPayload::Action(action))
    }

    pub fn fired(bolt: EntityId, fired: BoltFired) -> Self {
        Self::with_payload(bolt, fired.start_ts, EventPayload::Fired(fired))
    }

    pub fn exhausted(bolt: EntityId, exhausted: BoltExhausted, timestamp: u64) -> Self {
        Self::with_payload(bolt, timestamp, EventPayload::Exhausted(exhausted))
    }

    pub fn score_increased(player: EntityId, delta: i64, cause: EntityId, timestamp: u64) -> Self {
        Self::with_payload(
            player,
            timestamp,
            EventPayload::ScoreIncreased(ScoreIncreased {
                delta,
                timestamp,
                cause,
            }),
        )
    }

    pub fn score_reset(player: EntityId, timestamp: u64) -> Self {
        Self::tombstone(Topic::ScoreControl, player, timestamp)
    }

    pub fn score_updated(player: EntityId, update: ScoreUpdated) -> Self {
        Self::with_payload(player, update.as_of, EventPayload::ScoreUpdated(update))
    }

    pub fn score_removed(player: EntityId, timestamp: u64) -> Self {
        Self::tombstone(Topic::ScoreUpdate, player, timestamp)
    }

    /// Payload matches the topic, and a missing payload is allowed there
    pub fn is_well_formed(&self) -> bool {
        match &self.payload {
            Some(payload) => payload.topic() == self.topic,
            None => self.topic.allows_tombstone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_names_round_trip() {
        for topic in Topic::ALL {
            assert_eq!(Topic::from_name(topic.name()), Some(topic));
        }
        assert_eq!(Topic::from_name("chat"), None);
    }

    #[test]
    fn test_topic_indices_are_dense() {
        for (i, topic) in Topic::ALL.iter().enumerate() {
            assert_eq!(topic.index(), i);
        }
    }

    #[test]
    fn test_constructors_pick_topic() {
        let id = EntityId::generate();
        assert_eq!(DomainEvent::joined(id, "a".into(), 0, 1).topic, Topic::Join);
        assert_eq!(DomainEvent::left(id, 1).topic, Topic::Join);
        assert_eq!(DomainEvent::score_reset(id, 1).topic, Topic::ScoreControl);
        assert_eq!(DomainEvent::score_removed(id, 1).topic, Topic::ScoreUpdate);
        assert_eq!(
            DomainEvent::score_increased(id, 1, EntityId::generate(), 5).topic,
            Topic::ScoreControl
        );
    }

    #[test]
    fn test_well_formed() {
        let id = EntityId::generate();
        assert!(DomainEvent::left(id, 1).is_well_formed());
        let update = ScoreUpdated {
            score: 3,
            as_of: 10,
            reset_at: 0,
            entries: 3,
        };
        assert!(DomainEvent::score_updated(id, update).is_well_formed());

        let bad_tombstone = DomainEvent {
            topic: Topic::PlayerAction,
            key: id,
            timestamp: 1,
            payload: None,
        };
        assert!(!bad_tombstone.is_well_formed());

        let mismatched = DomainEvent {
            topic: Topic::BoltAction,
            key: id,
            timestamp: 1,
            payload: Some(EventPayload::ScoreUpdated(update)),
        };
        assert!(!mismatched.is_well_formed());
    }
}
