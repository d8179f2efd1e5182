pub mod arena;
pub mod barrier;
pub mod bolt;
pub mod clock;
pub mod collision;
pub mod constants;
pub mod context;
pub mod events;
pub mod id;
pub mod inbox;
pub mod performance;
pub mod physics_queue;
pub mod position;
pub mod replication;
pub mod respawn;
pub mod scheduler;
pub mod scoreboard;
pub mod ship;
pub mod ships;
pub mod shockwave;
pub mod spatial;
pub mod world;

pub use world::{Entities, Game, GameError, TickOutput};
