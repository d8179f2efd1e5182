//! Boltline Server Library
//!
//! Server-side simulation core for a multiplayer arena shooter. Every node
//! runs the same fixed-timestep simulation and keeps in step with the others
//! by exchanging domain events through a pub/sub broker that may duplicate,
//! drop or reorder them.

pub mod config;
pub mod game;
pub mod net;
pub mod util;
