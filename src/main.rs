//! Tank Arena Demo
//!
//! Runs a room of bot-driven peers over the in-process mesh and checks
//! that they converge on one maze.
//!
//! Usage: `tank-arena [peers] [seconds]`

use std::time::Duration;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tank_arena::{
    core::hash::short_hex,
    game::input::KeyTracker,
    network::driver::Clock,
    Coordinator, GameConfig, GameSize, InputState, LocalMesh, PeerDriver, PeerId, SystemClock,
    VERSION,
};

/// Screens handed out to bots in join order.
const BOT_SCREENS: [GameSize; 4] = [
    GameSize::new(1280.0, 720.0),
    GameSize::new(800.0, 600.0),
    GameSize::new(1920.0, 1080.0),
    GameSize::new(1024.0, 768.0),
];

/// Ticks between bot key changes.
const BOT_REACTION_TICKS: u32 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    let mut args = std::env::args().skip(1);
    let peers: usize = match args.next() {
        Some(arg) => arg.parse().context("peers must be a number")?,
        None => 3,
    };
    let seconds: u64 = match args.next() {
        Some(arg) => arg.parse().context("seconds must be a number")?,
        None => 10,
    };
    if peers == 0 {
        bail!("need at least one peer");
    }

    let config = GameConfig::from_env().context("Failed to load config")?;

    info!("Tank Arena v{}", VERSION);
    info!("Tick Rate: {} Hz", config.network.tick_rate);
    info!("Running {} peers for {} seconds", peers, seconds);

    let mesh = LocalMesh::new();
    let mut handles = Vec::with_capacity(peers);

    for index in 0..peers {
        let peer_id = PeerId::generate();
        let (endpoint, events) = mesh.join(peer_id.clone());
        let screen = BOT_SCREENS[index % BOT_SCREENS.len()];
        let coordinator = Coordinator::new(peer_id.clone(), screen, config.clone(), SystemClock.now_ms());
        let mut driver = PeerDriver::new(coordinator, endpoint, events, SystemClock);

        let input = bot_input(index as u64);
        let duration = Duration::from_secs(seconds);
        handles.push(tokio::spawn(async move {
            if let Err(e) = driver.run_for(duration, input).await {
                warn!("Peer {} stopped early: {}", peer_id, e);
            }
            driver.into_coordinator()
        }));
    }

    let mut coordinators = Vec::with_capacity(peers);
    for handle in handles {
        coordinators.push(handle.await.context("Peer task panicked")?);
    }

    // Print final results
    info!("=== Room State ===");
    let mut fingerprints = Vec::new();
    for coordinator in &coordinators {
        let fingerprint = coordinator.maze().map(|m| m.fingerprint());
        info!(
            "Peer {}: {} remotes, authority {:?}, phase {:?}, maze {}",
            coordinator.local_id(),
            coordinator.remotes().len(),
            coordinator.authority().map(|p| p.to_string()),
            coordinator.phase(),
            fingerprint.as_ref().map_or_else(|| "none".to_string(), short_hex),
        );
        fingerprints.push(fingerprint);
    }

    fingerprints.sort();
    fingerprints.dedup();
    if fingerprints.len() == 1 && fingerprints[0].is_some() {
        info!("CONVERGED: every peer holds the same maze");
    } else {
        warn!("DIVERGED: {} distinct mazes in the room", fingerprints.len());
    }

    Ok(())
}

/// Random key presses, re-rolled every few ticks.
fn bot_input(seed: u64) -> impl FnMut(&Coordinator) -> InputState + Send + 'static {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut keys = KeyTracker::new();
    let mut ticks = 0u32;

    move |coordinator: &Coordinator| {
        let tank = coordinator.local_tank();
        let Some(bindings) = tank.controls.as_ref().filter(|_| tank.is_active()) else {
            keys.clear();
            return InputState::idle();
        };
        if ticks % BOT_REACTION_TICKS == 0 {
            keys.clear();
            for key in [&bindings.up, &bindings.down, &bindings.left, &bindings.right, &bindings.shoot] {
                if rng.gen_bool(0.4) {
                    keys.press(key.as_str());
                }
            }
        }
        ticks = ticks.wrapping_add(1);
        tank.resolve_input(&keys)
    }
}
