//! Game session - runs the fixed-period tick loop and moves its output to the
//! broker and to connected clients

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::game::clock::GameClock;
use crate::game::inbox::InboxSender;
use crate::game::ships::PlayerDirectory;
use crate::game::world::{Game, TickOutput};
use crate::net::batcher::{ClientBatch, ClientBatcher};
use crate::net::loopback::LoopbackBroker;

/// How often the loop logs a status line
const STATS_INTERVAL: Duration = Duration::from_secs(30);

/// A game plus the plumbing around one node's tick loop
pub struct GameSession {
    game: Game,
    clock: GameClock,
    broker: LoopbackBroker,
    batcher: ClientBatcher,
    clients: mpsc::UnboundedSender<ClientBatch>,
}

impl GameSession {
    pub fn new(
        game: Game,
        clock: GameClock,
        broker: LoopbackBroker,
        clients: mpsc::UnboundedSender<ClientBatch>,
    ) -> Self {
        let config = game.config();
        let batcher = ClientBatcher::new(config.client_batch_size, config.client_batch_timeout_ms);
        Self {
            game,
            clock,
            broker,
            batcher,
            clients,
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn inbox(&self) -> InboxSender {
        self.game.inbox()
    }

    pub fn directory(&self) -> PlayerDirectory {
        self.game.directory()
    }

    /// Tick at the clock's current time
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now_ms();
        self.tick_at(now)
    }

    /// Tick at `now`, publish the domain events and queue client messages.
    /// Returns the number of events published.
    pub fn tick_at(&mut self, now: u64) -> usize {
        let TickOutput { domain, client, .. } = self.game.tick(now);

        let published = match self.broker.publish(&domain) {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to publish {} events: {}", domain.len(), e);
                0
            }
        };

        for outgoing in client {
            if let Some(batches) = self.batcher.push(outgoing, now) {
                self.deliver(batches);
            }
        }
        if let Some(batches) = self.batcher.poll(now) {
            self.deliver(batches);
        }
        published
    }

    fn deliver(&mut self, batches: Vec<ClientBatch>) {
        for batch in batches {
            if self.clients.send(batch).is_err() {
                debug!("No client writer attached, dropping batch");
            }
        }
    }

    pub fn status_line(&self) -> String {
        let ships = self.game.ships();
        format!(
            "tick {}, {} ships ({} local), {} bolts, {} ranked | Perf: {}",
            self.game.tick_count(),
            ships.len(),
            ships.local_count(),
            self.game.bolts().len(),
            self.game.scoreboard().ranking().len(),
            self.game.performance().status_message()
        )
    }
}

/// Start the tick loop on the tokio runtime. The loop owns the session and
/// runs until the task is aborted.
pub fn start_game_loop(mut session: GameSession) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period_ms = session.game.config().tick_period_ms;
        let mut ticker = interval(Duration::from_millis(period_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Game loop started, {} ms per tick", period_ms);
        let start = Instant::now();
        let mut last_stats = start;
        let mut last_over_budget = 0;

        loop {
            ticker.tick().await;
            session.tick();

            let over_budget = session.game.performance().over_budget_ticks();
            if over_budget > last_over_budget && session.game.performance().status().is_over_budget() {
                warn!(
                    "Simulation over budget ({} slow ticks): {}",
                    over_budget,
                    session.game.performance().status_message()
                );
            }
            last_over_budget = over_budget;

            if last_stats.elapsed() >= STATS_INTERVAL {
                last_stats = Instant::now();
                info!("Game: {}s, {}", start.elapsed().as_secs(), session.status_line());
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::game::id::EntityId;
    use crate::net::protocol::{Audience, ClientMessage, Command, ServerMessage};

    fn session(config: SimConfig) -> (GameSession, mpsc::UnboundedReceiver<ClientBatch>) {
        let game = Game::new(config);
        let mut broker = LoopbackBroker::new();
        broker.subscribe(game.inbox());
        let (tx, rx) = mpsc::unbounded_channel();
        (GameSession::new(game, GameClock::with_offset(0), broker, tx), rx)
    }

    fn join(session: &GameSession, ship: EntityId) {
        session
            .inbox()
            .command(ClientMessage {
                ship,
                command: Command::Join {
                    name: "pilot".to_string(),
                    variant: 0,
                },
            })
            .unwrap();
    }

    #[test]
    fn test_tick_publishes_and_batches() {
        let mut config = SimConfig::default();
        config.client_batch_timeout_ms = 0;
        let (mut session, mut rx) = session(config);
        let ship = EntityId::generate();
        join(&session, ship);

        assert_eq!(session.tick_at(1_000), 1);
        let mut messages = Vec::new();
        while let Ok(batch) = rx.try_recv() {
            messages.extend(batch.messages.into_iter().map(|m| (batch.audience, m)));
        }
        assert!(messages
            .iter()
            .any(|(_, m)| matches!(m, ServerMessage::ShipJoined { id, .. } if *id == ship)));
        assert!(messages
            .iter()
            .any(|(a, m)| *a == Audience::Only(ship) && matches!(m, ServerMessage::Snapshot(_))));

        // The echo of our own join comes back through the broker and is a no-op
        assert_eq!(session.tick_at(1_050), 0);
        assert_eq!(session.directory().count(), 1);
    }

    #[test]
    fn test_batches_wait_for_timeout() {
        let mut config = SimConfig::default();
        config.client_batch_timeout_ms = 100;
        let (mut session, mut rx) = session(config);
        join(&session, EntityId::generate());

        session.tick_at(1_000);
        assert!(rx.try_recv().is_err());
        session.tick_at(1_050);
        assert!(rx.try_recv().is_err());
        session.tick_at(1_100);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_status_line() {
        let (session, _rx) = session(SimConfig::default());
        assert!(session.status_line().starts_with("tick 0, 0 ships"));
    }

    #[tokio::test]
    async fn test_loop_delivers_to_clients() {
        let mut config = SimConfig::default();
        config.tick_period_ms = 10;
        config.client_batch_timeout_ms = 0;
        let (session, mut rx) = session(config);
        let ship = EntityId::generate();
        join(&session, ship);

        let handle = start_game_loop(session);
        let batch = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("loop produced no output")
            .expect("channel closed");
        assert!(!batch.messages.is_empty());
        handle.abort();
    }
}
