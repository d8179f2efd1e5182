//! Apply-side dispatch
//!
//! One handler per topic, indexed by `Topic::index`. Local emissions and
//! broker deliveries both come through here, so a handler must tolerate
//! seeing the same event more than once and in any order. Each returns
//! whether the event changed anything.

use crate::game::context::GameContext;
use crate::game::events::{DomainEvent, EventPayload, Topic};
use crate::game::world::Entities;

pub type Handler = fn(&mut Entities, &mut GameContext, &DomainEvent) -> bool;

pub struct HandlerTable {
    handlers: [Handler; Topic::COUNT],
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerTable {
    pub fn new() -> Self {
        Self {
            handlers: Topic::ALL.map(handler_for),
        }
    }

    pub fn apply(&self, entities: &mut Entities, ctx: &mut GameContext, event: &DomainEvent) -> bool {
        if !event.is_well_formed() {
            tracing::warn!("Discarding malformed {} event for {}", event.topic.name(), event.key);
            return false;
        }
        let applied = (self.handlers[event.topic.index()])(entities, ctx, event);
        if !applied {
            tracing::trace!(
                "Ignored stale or duplicate {} event for {}",
                event.topic.name(),
                event.key
            );
        }
        applied
    }
}

fn handler_for(topic: Topic) -> Handler {
    match topic {
        Topic::Join => apply_join,
        Topic::PlayerAction => apply_player_action,
        Topic::BoltLifecycle => apply_bolt_lifecycle,
        Topic::BoltAction => apply_bolt_action,
        Topic::ScoreControl => apply_score_control,
        Topic::ScoreUpdate => apply_score_update,
    }
}

fn apply_join(entities: &mut Entities, ctx: &mut GameContext, event: &DomainEvent) -> bool {
    match &event.payload {
        Some(EventPayload::Joined(joined)) => entities.ships.apply_joined(event.key, joined, event.timestamp, ctx),
        None => entities.ships.apply_left(event.key, ctx),
        Some(_) => false,
    }
}

fn apply_player_action(entities: &mut Entities, ctx: &mut GameContext, event: &DomainEvent) -> bool {
    match &event.payload {
        Some(EventPayload::Action(action)) => entities.ships.apply_action(event.key, action, ctx),
        _ => false,
    }
}

fn apply_bolt_lifecycle(entities: &mut Entities, ctx: &mut GameContext, event: &DomainEvent) -> bool {
    match &event.payload {
        Some(EventPayload::Fired(fired)) => entities.bolts.apply_fired(event.key, fired, &mut entities.ships, ctx),
        _ => false,
    }
}

fn apply_bolt_action(entities: &mut Entities, ctx: &mut GameContext, event: &DomainEvent) -> bool {
    match &event.payload {
        Some(EventPayload::Exhausted(exhausted)) => entities.bolts.apply_exhausted(event.key, exhausted, ctx),
        _ => false,
    }
}

fn apply_score_control(entities: &mut Entities, ctx: &mut GameContext, event: &DomainEvent) -> bool {
    // Departed players earn nothing more
    if entities.ships.is_departed(&event.key) {
        return false;
    }
    match &event.payload {
        Some(EventPayload::ScoreIncreased(increase)) => {
            entities
                .scoreboard
                .apply_control(event.key, Some(increase), event.timestamp, ctx)
        }
        None => entities.scoreboard.apply_control(event.key, None, event.timestamp, ctx),
        Some(_) => false,
    }
}

fn apply_score_update(entities: &mut Entities, _ctx: &mut GameContext, event: &DomainEvent) -> bool {
    match &event.payload {
        Some(EventPayload::ScoreUpdated(update)) => {
            entities.scoreboard.apply_update(event.key, Some(update), event.timestamp)
        }
        None => entities.scoreboard.apply_update(event.key, None, event.timestamp),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::game::context::test_support::context;
    use crate::game::id::EntityId;

    #[test]
    fn test_table_order_matches_topics() {
        let table = HandlerTable::new();
        for topic in Topic::ALL {
            assert_eq!(
                table.handlers[topic.index()] as usize,
                handler_for(topic) as usize,
                "{}",
                topic.name()
            );
        }
    }

    #[test]
    fn test_malformed_event_is_rejected() {
        let mut ctx = context(SimConfig::default());
        let mut entities = Entities::new(&ctx.config);
        let event = DomainEvent {
            topic: Topic::PlayerAction,
            key: EntityId::generate(),
            timestamp: 1,
            payload: None,
        };
        assert!(!HandlerTable::new().apply(&mut entities, &mut ctx, &event));
    }

    #[test]
    fn test_join_then_left() {
        let mut ctx = context(SimConfig::default());
        let mut entities = Entities::new(&ctx.config);
        let table = HandlerTable::new();
        let id = EntityId::generate();

        assert!(table.apply(&mut entities, &mut ctx, &DomainEvent::joined(id, "ace".into(), 1, 10)));
        assert!(entities.ships.contains(&id));
        assert!(table.apply(&mut entities, &mut ctx, &DomainEvent::left(id, 20)));
        assert!(!entities.ships.contains(&id));
        // Score for a departed player is ignored
        let late = DomainEvent::score_increased(id, 1, EntityId::generate(), 30);
        assert!(!table.apply(&mut entities, &mut ctx, &late));
    }
}
