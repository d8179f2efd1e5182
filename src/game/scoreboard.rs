//! Distributed leaderboard
//!
//! Two layers. The *ledger* folds "score-control" events (increments and
//! resets) per player, keyed by (timestamp, cause) so redeliveries count
//! once and a reset drops everything older than itself. Each ledger change
//! emits a derived "score-update" carrying the total and a version that only
//! grows as the ledger absorbs more history. *Standings* keep the highest
//! version seen, and the ranked top-N is rebuilt from them on a fixed cadence.
//!
//! Standings are ordered by that version, not by a per-player update
//! timestamp: two nodes can emit updates for one player in the same
//! millisecond, and the version still tells which one saw more of the ledger.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use rustc_hash::FxHashSet;

use crate::game::context::GameContext;
use crate::game::events::{DomainEvent, ScoreIncreased, ScoreUpdated};
use crate::game::id::EntityId;
use crate::net::protocol::{RankedEntry, ServerMessage};

#[derive(Debug, Default)]
struct Ledger {
    /// Last reset; increments older than this are void
    floor: Option<u64>,
    entries: BTreeMap<(u64, EntityId), i64>,
}

impl Ledger {
    fn total(&self) -> i64 {
        self.entries.values().sum()
    }

    fn summary(&self) -> ScoreUpdated {
        let floor = self.floor.unwrap_or(0);
        let newest = self.entries.keys().next_back().map_or(0, |(ts, _)| *ts);
        ScoreUpdated {
            score: self.total(),
            as_of: newest.max(floor),
            reset_at: floor,
            entries: self.entries.len() as u32,
        }
    }

    fn increase(&mut self, increase: &ScoreIncreased) -> bool {
        if self.floor.is_some_and(|floor| increase.timestamp < floor) {
            return false;
        }
        let key = (increase.timestamp, increase.cause);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, increase.delta);
        true
    }

    fn reset(&mut self, at: u64) -> bool {
        if self.floor.is_some_and(|floor| at <= floor) {
            return false;
        }
        self.floor = Some(at);
        self.entries.retain(|(ts, _), _| *ts >= at);
        true
    }
}

pub struct Scoreboard {
    ledgers: HashMap<EntityId, Ledger>,
    standings: HashMap<EntityId, ScoreUpdated>,
    /// Removal time per departed player
    removed: HashMap<EntityId, u64>,
    dirty: FxHashSet<EntityId>,
    ranking: Vec<RankedEntry>,
    size: usize,
    flush_ms: u64,
    last_flush: u64,
}

impl Scoreboard {
    pub fn new(size: usize, flush_ms: u64) -> Self {
        Self {
            ledgers: HashMap::new(),
            standings: HashMap::new(),
            removed: HashMap::new(),
            dirty: FxHashSet::default(),
            ranking: Vec::with_capacity(size + 1),
            size,
            flush_ms,
            last_flush: 0,
        }
    }

    /// Current top-N as of the last flush
    pub fn ranking(&self) -> &[RankedEntry] {
        &self.ranking
    }

    pub fn score(&self, player: &EntityId) -> Option<i64> {
        self.standings.get(player).map(|s| s.score)
    }

    pub fn player_count(&self) -> usize {
        self.standings.len()
    }

    /// Emit an increment for `player`, attributed to `cause`
    pub fn update_score(player: EntityId, delta: i64, cause: EntityId, ctx: &mut GameContext) {
        ctx.emit(DomainEvent::score_increased(player, delta, cause, ctx.now));
    }

    fn is_removed_since(&self, player: &EntityId, timestamp: u64) -> bool {
        self.removed.get(player).is_some_and(|removed| timestamp <= *removed)
    }

    pub(crate) fn apply_control(
        &mut self,
        player: EntityId,
        increase: Option<&ScoreIncreased>,
        timestamp: u64,
        ctx: &mut GameContext,
    ) -> bool {
        let ts = increase.map_or(timestamp, |i| i.timestamp);
        if self.is_removed_since(&player, ts) {
            return false;
        }
        let ledger = self.ledgers.entry(player).or_default();
        let changed = match increase {
            Some(increase) => ledger.increase(increase),
            None => ledger.reset(timestamp),
        };
        if changed {
            ctx.emit(DomainEvent::score_updated(player, ledger.summary()));
        }
        changed
    }

    pub(crate) fn apply_update(&mut self, player: EntityId, update: Option<&ScoreUpdated>, timestamp: u64) -> bool {
        match update {
            Some(update) => {
                if self.is_removed_since(&player, update.as_of) {
                    return false;
                }
                if let Some(current) = self.standings.get(&player) {
                    if update.version() <= current.version() {
                        return false;
                    }
                }
                self.standings.insert(player, *update);
            }
            None => {
                if self.is_removed_since(&player, timestamp) {
                    return false;
                }
                self.removed.insert(player, timestamp);
                self.ledgers.remove(&player);
                if self.standings.get(&player).is_some_and(|s| s.as_of <= timestamp) {
                    self.standings.remove(&player);
                }
            }
        }
        self.dirty.insert(player);
        true
    }

    /// Fold pending changes into the ranking and broadcast it, at most once
    /// per flush interval. Returns whether a broadcast went out.
    pub fn update(&mut self, ctx: &mut GameContext) -> bool {
        if self.dirty.is_empty() || ctx.now < self.last_flush + self.flush_ms {
            return false;
        }
        self.last_flush = ctx.now;

        let mut rebuild = false;
        for player in self.dirty.drain() {
            let position = self.ranking.iter().position(|e| e.id == player);
            match (self.standings.get(&player), position) {
                (Some(standing), Some(at)) => {
                    rebuild |= standing.score < self.ranking[at].score;
                    self.ranking[at].score = standing.score;
                }
                (Some(standing), None) => self.ranking.push(RankedEntry {
                    id: player,
                    score: standing.score,
                }),
                (None, Some(at)) => {
                    self.ranking.remove(at);
                    rebuild = true;
                }
                (None, None) => {}
            }
        }
        // A drop can let someone outside the old top-N back in
        if rebuild {
            self.ranking = self
                .standings
                .iter()
                .map(|(id, s)| RankedEntry { id: *id, score: s.score })
                .collect();
        }
        self.ranking.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        self.ranking.truncate(self.size);

        ctx.outbox.broadcast(ServerMessage::Scoreboard {
            entries: self.ranking.clone(),
        });
        true
    }
}
