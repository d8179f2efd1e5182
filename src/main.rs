use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use boltline_server::config::SimConfig;
use boltline_server::game::clock::GameClock;
use boltline_server::game::Game;
use boltline_server::net::batcher::ClientBatch;
use boltline_server::net::game_session::{start_game_loop, GameSession};
use boltline_server::net::loopback::LoopbackBroker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Boltline Server v{}", env!("CARGO_PKG_VERSION"));

    let config = SimConfig::load_or_default();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    info!(
        "Configuration loaded: {} ms ticks, seed {}, respawn {:?}",
        config.tick_period_ms, config.world_seed, config.respawn
    );

    let game = Game::new(config);
    info!("World generated with {} barriers", game.barriers().len());

    // Single-node run: the broker echoes this node's events back to itself
    let mut broker = LoopbackBroker::new();
    broker.subscribe(game.inbox());

    let (clients_tx, mut clients_rx) = mpsc::unbounded_channel::<ClientBatch>();
    let writer = tokio::spawn(async move {
        while let Some(batch) = clients_rx.recv().await {
            match batch.encode() {
                Ok(frame) => debug!("{:?}: {} messages, {} bytes", batch.audience, batch.messages.len(), frame.len()),
                Err(e) => error!("Failed to encode client batch: {}", e),
            }
        }
    });

    let session = GameSession::new(game, GameClock::start(), broker, clients_tx);
    let game_loop = start_game_loop(session);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    game_loop.abort();
    writer.abort();
    info!("Server stopped");

    Ok(())
}
