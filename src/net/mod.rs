pub mod batcher;
pub mod game_session;
pub mod loopback;
pub mod protocol;
