//! Peer Coordinator
//!
//! Owns everything one peer knows about the room: the local tank, the
//! remote roster, every live bullet, the held maze and the round phase.
//! Inbound messages and ticks mutate this state; outbound messages are
//! queued in an outbox that the driver flushes to the transport.
//!
//! Conflicting shared state converges by "apply if newer": a maze is
//! replaced only by one with a later `time`, and every handler tolerates
//! duplicates and reordering.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::core::hash::short_hex;
use crate::core::rng::{fresh_seed, seed_from_peer_id};
use crate::core::vec2::Vec2;
use crate::game::bullet::{Bullet, BulletId};
use crate::game::election::{elect_authority, AuthorityCandidate};
use crate::game::input::InputState;
use crate::game::maze::{GameSize, Maze, Wall};
use crate::game::round::{check_round_over, outcome_message, RoundEntry, RoundPhase};
use crate::game::tank::{ControlOutcome, Tank};
use crate::network::protocol::{MazePayload, PeerMessage, ProtocolError, WallRef};
use crate::network::room::PeerId;
use crate::network::timers::{Timer, TimerQueue};

/// A queued outbound message.
#[derive(Clone, Debug, PartialEq)]
pub struct Outbound {
    /// Unicast target, or `None` to broadcast
    pub to: Option<PeerId>,
    /// Message body
    pub message: PeerMessage,
}

/// One peer's view of the room.
pub struct Coordinator {
    config: GameConfig,
    local: Tank,
    remotes: BTreeMap<PeerId, Tank>,
    bullets: Vec<Bullet>,
    maze: Option<Maze>,
    /// Size of the world currently played (the held maze's size)
    game_size: GameSize,
    /// Local screen, normalized
    screen: GameSize,
    phase: RoundPhase,
    timers: TimerQueue,
    failed_authorities: BTreeSet<PeerId>,
    round: u64,
    last_ping_sent: u64,
    outbox: Vec<Outbound>,
}

impl Coordinator {
    /// Create a coordinator and start the first round.
    ///
    /// Alone in the room the local peer is its own authority, so this
    /// generates a maze right away.
    pub fn new(local_id: PeerId, screen: GameSize, config: GameConfig, now: u64) -> Self {
        let screen = screen.clamped(config.world.min_size, config.world.max_size);
        let center = Vec2::new(screen.width / 2.0, screen.height / 2.0);
        let local = Tank::new_local(local_id, center, screen, now);

        let mut coordinator = Self {
            config,
            local,
            remotes: BTreeMap::new(),
            bullets: Vec::new(),
            maze: None,
            game_size: screen,
            screen,
            phase: RoundPhase::NoMaze { waiting_for: None },
            timers: TimerQueue::new(),
            failed_authorities: BTreeSet::new(),
            round: 0,
            last_ping_sent: now,
            outbox: Vec::new(),
        };
        coordinator.start_new_round(now);
        coordinator
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Local peer id.
    pub fn local_id(&self) -> &PeerId {
        self.local.peer_id()
    }

    /// Local tank.
    pub fn local_tank(&self) -> &Tank {
        &self.local
    }

    /// Remote tanks by peer.
    pub fn remotes(&self) -> &BTreeMap<PeerId, Tank> {
        &self.remotes
    }

    /// Any known tank, local included.
    pub fn tank(&self, peer_id: &PeerId) -> Option<&Tank> {
        if peer_id == self.local.peer_id() {
            Some(&self.local)
        } else {
            self.remotes.get(peer_id)
        }
    }

    /// Live bullets.
    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    /// Held maze.
    pub fn maze(&self) -> Option<&Maze> {
        self.maze.as_ref()
    }

    /// Round phase.
    pub fn phase(&self) -> &RoundPhase {
        &self.phase
    }

    /// Banner text, empty unless the round is over.
    pub fn win_message(&self) -> &str {
        self.phase.message()
    }

    /// Size of the world being played.
    pub fn game_size(&self) -> GameSize {
        self.game_size
    }

    /// Peers that failed to deliver a maze since the last one arrived.
    pub fn failed_authorities(&self) -> &BTreeSet<PeerId> {
        &self.failed_authorities
    }

    /// Configuration in use.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Current maze authority over the whole roster.
    pub fn authority(&self) -> Option<PeerId> {
        elect_authority(&self.candidates(), &self.failed_authorities)
    }

    /// Take every queued outbound message.
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    fn candidates(&self) -> Vec<AuthorityCandidate> {
        std::iter::once(&self.local)
            .chain(self.remotes.values())
            .map(|tank| AuthorityCandidate {
                peer_id: tank.peer_id().clone(),
                screen: tank.player.original_screen_size,
                created_at: tank.original_creation_time,
            })
            .collect()
    }

    fn is_local_authority(&self) -> bool {
        self.authority().as_ref() == Some(self.local.peer_id())
    }

    fn broadcast(&mut self, message: PeerMessage) {
        self.outbox.push(Outbound { to: None, message });
    }

    fn send_to(&mut self, peer: &PeerId, message: PeerMessage) {
        self.outbox.push(Outbound {
            to: Some(peer.clone()),
            message,
        });
    }

    fn new_user_message(&self) -> PeerMessage {
        PeerMessage::NewUser {
            x: self.local.position.x,
            y: self.local.position.y,
            angle: self.local.angle,
            screen: self.screen,
            original_creation_time: self.local.original_creation_time,
            seed: self.maze.as_ref().map(|m| m.seed),
        }
    }

    // =========================================================================
    // ROUND LIFECYCLE
    // =========================================================================

    /// Reset the round and either generate a maze (as authority) or wait for one.
    pub fn start_new_round(&mut self, now: u64) {
        self.round += 1;
        self.reset_round_state();
        self.maze = None;

        match self.authority() {
            Some(authority) if &authority == self.local.peer_id() => {
                let maze = Maze::generate(
                    self.screen,
                    self.config.wall.size,
                    fresh_seed(),
                    self.config.wall.density,
                    now,
                );
                info!(
                    "Round {}: generated maze seed={} walls={} fp={}",
                    self.round,
                    maze.seed,
                    maze.walls.len(),
                    short_hex(&maze.fingerprint())
                );
                self.broadcast(PeerMessage::NewMaze {
                    maze: MazePayload::from_maze(&maze),
                });
                self.install_maze(maze);
            }
            Some(authority) => {
                info!("Round {}: waiting for maze from {}", self.round, authority);
                self.timers.schedule(
                    now + self.config.network.maze_wait_ms,
                    Timer::MazeWait {
                        authority: authority.clone(),
                        round: self.round,
                    },
                );
                self.phase = RoundPhase::NoMaze {
                    waiting_for: Some(authority),
                };
                self.relocate_local();
            }
            None => {
                self.phase = RoundPhase::NoMaze { waiting_for: None };
                self.relocate_local();
            }
        }
    }

    fn reset_round_state(&mut self) {
        self.bullets.clear();
        self.local.revive();
        for tank in self.remotes.values_mut() {
            tank.revive();
        }
        self.timers.cancel(&Timer::RoundRestart);
    }

    fn install_maze(&mut self, maze: Maze) {
        self.game_size = maze.size;
        self.maze = Some(maze);
        self.failed_authorities.clear();
        self.phase = RoundPhase::Active;
        self.relocate_local();
    }

    /// Move the local tank to its spawn cell in the held maze.
    fn relocate_local(&mut self) {
        match &self.maze {
            Some(maze) => {
                let (position, angle) =
                    maze.spawn_point(self.config.wall.size, seed_from_peer_id(self.local.peer_id().as_str()));
                self.local.position = position;
                self.local.angle = angle;
                if !self.local.move_out(&maze.walls, maze.size, &self.config) {
                    warn!("Spawn point for {} stays inside a wall", self.local.peer_id());
                }
            }
            None => {
                self.local.position = Vec2::new(self.game_size.width / 2.0, self.game_size.height / 2.0);
                self.local.move_out(&[], self.game_size, &self.config);
            }
        }
    }

    fn on_game_over(&mut self, winner: PeerId, now: u64) {
        let color = self.tank(&winner).map_or(self.local.color, |t| t.color);
        let outcome = outcome_message(&winner, color, self.local.peer_id(), self.remotes.len());
        if outcome.local_won {
            self.broadcast(PeerMessage::GameOver {
                winner: self.local.peer_id().clone(),
            });
        }
        info!("Round {} over: {} ({})", self.round, outcome.message, winner);

        self.phase = RoundPhase::RoundOver {
            winner: outcome.winner,
            message: outcome.message,
        };
        if !self.timers.is_pending(&Timer::RoundRestart) {
            self.timers
                .schedule(now + self.config.round.restart_delay_ms, Timer::RoundRestart);
        }
    }

    fn round_entries(&self) -> Vec<RoundEntry> {
        std::iter::once(&self.local)
            .chain(self.remotes.values())
            .map(|tank| RoundEntry {
                peer_id: tank.peer_id().clone(),
                active: tank.is_active(),
            })
            .collect()
    }

    fn process_timers(&mut self, now: u64) {
        for timer in self.timers.due(now) {
            match timer {
                Timer::RoundRestart => {
                    if self.phase.is_over() {
                        self.start_new_round(now);
                    }
                }
                Timer::MazeWait { authority, round } => {
                    // A maze arrived or a newer round started: nothing to do
                    if self.maze.is_some() || round != self.round {
                        continue;
                    }
                    warn!("Authority {} sent no maze in time", authority);
                    self.failed_authorities.insert(authority);
                    let failed = self
                        .failed_authorities
                        .iter()
                        .filter(|peer| self.remotes.contains_key(*peer))
                        .count();
                    if failed >= self.remotes.len() {
                        warn!("No reachable authority ({} failed); waiting for a maze", failed);
                        self.phase = RoundPhase::NoMaze { waiting_for: None };
                    } else {
                        self.start_new_round(now);
                    }
                }
            }
        }
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Advance one frame.
    pub fn tick(&mut self, input: &InputState, now: u64) {
        self.process_timers(now);
        if let Some(maze) = self.maze.as_mut() {
            maze.expire_highlights(now);
        }

        if self.phase.is_active() {
            if let Some(winner) = check_round_over(&self.round_entries(), self.local.peer_id()) {
                self.on_game_over(winner, now);
            }
        }

        if !self.phase.is_over() {
            self.simulate(input, now);
        }

        self.maintain_liveness(now);
    }

    fn simulate(&mut self, input: &InputState, now: u64) {
        let outcome = match self.maze.as_mut() {
            Some(maze) => self.local.update_controls(
                input,
                &mut self.bullets,
                &mut maze.walls,
                self.game_size,
                now,
                &self.config,
            ),
            None => ControlOutcome::default(),
        };
        if outcome.shot.is_some() {
            self.broadcast(PeerMessage::Shoot);
        }
        if !outcome.walls_updated.is_empty() {
            let walls_updated = outcome
                .walls_updated
                .iter()
                .map(|&wall_index| WallRef { wall_index })
                .collect();
            self.broadcast(PeerMessage::WallColorChange { walls_updated });
        }

        let walls: &[Wall] = self.maze.as_ref().map_or(&[][..], |m| m.walls.as_slice());
        let size = self.game_size;
        let bullet_config = &self.config.bullet;
        self.bullets.retain_mut(|b| b.update(walls, size, now, bullet_config));

        self.broadcast(PeerMessage::Move {
            x: self.local.position.x,
            y: self.local.position.y,
            angle: self.local.angle,
        });

        self.check_local_hit();
    }

    fn check_local_hit(&mut self) {
        if !self.local.is_active() {
            return;
        }
        let Some(index) = self
            .bullets
            .iter()
            .position(|b| self.local.check_collision_with_bullet(b, &self.config))
        else {
            return;
        };

        self.local.eliminate();
        let bullet = &mut self.bullets[index];
        bullet.expire();
        let id = bullet.id.clone();
        info!("Local tank {} hit by {}#{}", self.local.peer_id(), id.owner, id.seq);

        let local_id = self.local.peer_id().clone();
        self.bullets.retain(|b| b.owner() != &local_id);
        self.broadcast(PeerMessage::Eliminated {
            bullet_id: id.seq,
            shooter: Some(id.owner),
        });
    }

    fn maintain_liveness(&mut self, now: u64) {
        if now.saturating_sub(self.last_ping_sent) >= self.config.network.ping_interval_ms {
            self.last_ping_sent = now;
            let (seed, maze_time) = match &self.maze {
                Some(maze) => (Some(maze.seed), Some(maze.time)),
                None => (None, None),
            };
            self.broadcast(PeerMessage::Ping { seed, maze_time });
        }

        let timeout = self.config.network.ping_timeout_ms;
        let silent: Vec<PeerId> = self
            .remotes
            .iter()
            .filter(|(_, tank)| now.saturating_sub(tank.player.last_ping) > timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for peer in silent {
            info!("Purged silent peer {}", peer);
            self.forget_peer(&peer, now);
        }
    }

    /// Drop a remote and re-elect at once if we were waiting on it.
    fn forget_peer(&mut self, peer: &PeerId, now: u64) {
        self.remotes.remove(peer);
        self.failed_authorities.remove(peer);

        let awaited = matches!(&self.phase, RoundPhase::NoMaze { waiting_for: Some(p) } if p == peer);
        if awaited && self.maze.is_none() {
            info!("Awaited authority {} is gone; re-electing", peer);
            self.start_new_round(now);
        }
    }

    // =========================================================================
    // ROOM EVENTS
    // =========================================================================

    /// A peer became reachable: introduce ourselves.
    pub fn handle_peer_join(&mut self, peer: &PeerId) {
        info!("{} joined", peer);
        let hello = self.new_user_message();
        self.send_to(peer, hello);
    }

    /// A peer went away.
    pub fn handle_peer_leave(&mut self, peer: &PeerId, now: u64) {
        if self.remotes.contains_key(peer) {
            info!("{} left", peer);
        }
        self.forget_peer(peer, now);
    }

    /// Decode, validate and apply a raw payload.
    ///
    /// Errors are logged and returned; state is left untouched.
    pub fn handle_raw(&mut self, from: &PeerId, payload: &str, now: u64) -> Result<(), ProtocolError> {
        let message = match PeerMessage::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping message from {}: {}", from, e);
                return Err(e);
            }
        };
        self.handle_message(from, message, now)
    }

    /// Apply a decoded message.
    pub fn handle_message(&mut self, from: &PeerId, message: PeerMessage, now: u64) -> Result<(), ProtocolError> {
        if from == self.local.peer_id() {
            debug!("Ignoring echoed {}", message.kind());
            return Ok(());
        }

        match message {
            PeerMessage::Move { x, y, angle } => {
                if let Some(tank) = self.remotes.get_mut(from) {
                    tank.position = Vec2::new(x, y);
                    tank.angle = angle;
                }
                Ok(())
            }
            PeerMessage::Shoot => {
                if let Some(tank) = self.remotes.get_mut(from) {
                    tank.shoot(&mut self.bullets, now, &self.config);
                }
                Ok(())
            }
            PeerMessage::WallColorChange { walls_updated } => {
                self.handle_wall_color_change(from, &walls_updated, now)
            }
            PeerMessage::NewMaze { maze } => {
                self.handle_new_maze(from, maze);
                Ok(())
            }
            PeerMessage::NewUser {
                x,
                y,
                angle,
                screen,
                original_creation_time,
                ..
            } => {
                self.handle_new_user(from, Vec2::new(x, y), angle, screen, original_creation_time, now);
                Ok(())
            }
            PeerMessage::GameOver { winner } => {
                let known = winner != *self.local.peer_id() && self.remotes.contains_key(&winner);
                if known && !matches!(self.phase, RoundPhase::NoMaze { .. }) {
                    self.on_game_over(winner, now);
                }
                Ok(())
            }
            PeerMessage::Eliminated { bullet_id, shooter } => {
                self.handle_eliminated(from, bullet_id, shooter);
                Ok(())
            }
            PeerMessage::Ping { seed, maze_time } => {
                self.handle_ping(from, seed, maze_time, now);
                Ok(())
            }
        }
    }

    fn handle_wall_color_change(
        &mut self,
        from: &PeerId,
        walls_updated: &[WallRef],
        now: u64,
    ) -> Result<(), ProtocolError> {
        let Some(maze) = self.maze.as_mut() else {
            return Ok(());
        };
        let Some(color) = self.remotes.get(from).map(|t| t.color) else {
            return Ok(());
        };
        if let Some(bad) = walls_updated.iter().find(|w| w.wall_index >= maze.walls.len()) {
            let err = ProtocolError::UnknownWall {
                index: bad.wall_index,
                walls: maze.walls.len(),
            };
            warn!("Dropping wall highlight from {}: {}", from, err);
            return Err(err);
        }

        let until = now + self.config.wall.highlight_ms;
        for wall in walls_updated {
            maze.walls[wall.wall_index].highlight(color, until);
        }
        Ok(())
    }

    fn handle_new_maze(&mut self, from: &PeerId, payload: MazePayload) {
        if !self.remotes.contains_key(from) {
            debug!("Ignoring maze from unknown peer {}", from);
            return;
        }

        let time = payload.time.unwrap_or(0);
        let size = payload
            .size
            .clamped(self.config.world.min_size, self.config.world.max_size);

        // The elected authority wins equal-time conflicts
        let from_authority = self.authority().as_ref() == Some(from);

        if let Some(current) = self.maze.as_mut() {
            if time < current.time || (time == current.time && !from_authority) {
                debug!("Rejected stale maze from {} ({} <= {})", from, time, current.time);
                return;
            }
            if current.same_layout(payload.seed, size) {
                current.time = time;
                return;
            }
        }

        let maze = Maze::generate(size, self.config.wall.size, payload.seed, self.config.wall.density, time);
        if !payload.walls.is_empty() && payload.walls.len() != maze.walls.len() {
            warn!(
                "Maze from {} lists {} walls, regenerated {}",
                from,
                payload.walls.len(),
                maze.walls.len()
            );
        }
        info!(
            "Accepted maze from {} seed={} walls={} fp={}",
            from,
            maze.seed,
            maze.walls.len(),
            short_hex(&maze.fingerprint())
        );

        self.reset_round_state();
        self.install_maze(maze);
    }

    fn handle_new_user(
        &mut self,
        from: &PeerId,
        position: Vec2,
        angle: f64,
        screen: GameSize,
        created_at: u64,
        now: u64,
    ) {
        // The reply below triggers the sender's own handler; known peers end the exchange
        if self.remotes.contains_key(from) {
            return;
        }

        let hello = self.new_user_message();
        self.send_to(from, hello);

        let screen = screen.clamped(self.config.world.min_size, self.config.world.max_size);
        let tank = Tank::new_remote(from.clone(), position, angle, screen, created_at, now);
        info!("Registered {} tank for {}", tank.color.as_str(), from);
        self.remotes.insert(from.clone(), tank);

        if self.is_local_authority() {
            if let Some(maze) = self.maze.as_mut() {
                maze.time = maze.time.max(now);
                let payload = MazePayload::from_maze(maze);
                debug!("Sending maze to newcomer {}", from);
                self.send_to(from, PeerMessage::NewMaze { maze: payload });
            }
        }
    }

    fn handle_eliminated(&mut self, from: &PeerId, bullet_id: u64, shooter: Option<PeerId>) {
        let Some(tank) = self.remotes.get_mut(from) else {
            return;
        };
        tank.eliminate();
        info!("{} eliminated by bullet {}", from, bullet_id);

        let hit = |id: &BulletId| match &shooter {
            Some(owner) => id.owner == *owner && id.seq == bullet_id,
            None => id.seq == bullet_id,
        };
        self.bullets.retain(|b| b.owner() != from && !hit(&b.id));
    }

    fn handle_ping(&mut self, from: &PeerId, seed: Option<f64>, maze_time: Option<u64>, now: u64) {
        let Some(tank) = self.remotes.get_mut(from) else {
            return;
        };
        tank.player.last_ping = now;

        let is_authority = self.is_local_authority();
        let Some(maze) = &self.maze else {
            return;
        };
        let stale = match (seed, maze_time) {
            (Some(seed), Some(time)) => {
                time < maze.time
                    || (time == maze.time && is_authority && seed.to_bits() != maze.seed.to_bits())
            }
            _ => true,
        };
        if stale {
            debug!("{} holds a stale maze; resending", from);
            let payload = MazePayload::from_maze(maze);
            self.send_to(from, PeerMessage::NewMaze { maze: payload });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::maze::Color;
    use crate::game::tank::TankStatus;

    const SMALL: GameSize = GameSize::new(800.0, 600.0);
    const LARGE: GameSize = GameSize::new(1920.0, 1080.0);

    fn coordinator(id: &str, screen: GameSize, now: u64) -> Coordinator {
        let mut c = Coordinator::new(PeerId::from(id), screen, GameConfig::default(), now);
        c.drain_outbox();
        c
    }

    fn new_user(screen: GameSize, created_at: u64) -> PeerMessage {
        PeerMessage::NewUser {
            x: 50.0,
            y: 50.0,
            angle: 0.0,
            screen,
            original_creation_time: created_at,
            seed: None,
        }
    }

    fn register(c: &mut Coordinator, id: &str, screen: GameSize, created_at: u64, now: u64) {
        c.handle_message(&PeerId::from(id), new_user(screen, created_at), now).unwrap();
        c.drain_outbox();
    }

    /// Deliver queued messages between two coordinators until both go quiet.
    fn pump(a: &mut Coordinator, b: &mut Coordinator, now: u64) {
        for _ in 0..16 {
            let from_a = a.drain_outbox();
            let from_b = b.drain_outbox();
            if from_a.is_empty() && from_b.is_empty() {
                return;
            }
            for out in from_a {
                if out.to.as_ref().map_or(true, |to| to == b.local_id()) {
                    let raw = out.message.to_json().unwrap();
                    let from = a.local_id().clone();
                    b.handle_raw(&from, &raw, now).unwrap();
                }
            }
            for out in from_b {
                if out.to.as_ref().map_or(true, |to| to == a.local_id()) {
                    let raw = out.message.to_json().unwrap();
                    let from = b.local_id().clone();
                    a.handle_raw(&from, &raw, now).unwrap();
                }
            }
        }
        panic!("message exchange did not settle");
    }

    fn has_message(out: &[Outbound], pred: impl Fn(&Outbound) -> bool) -> bool {
        out.iter().any(pred)
    }

    #[test]
    fn test_solo_peer_generates_maze() {
        let mut c = Coordinator::new(PeerId::from("solo"), SMALL, GameConfig::default(), 100);
        assert!(c.phase().is_active());
        let maze = c.maze().unwrap();
        assert_eq!(maze.time, 100);
        assert_eq!(maze.size, SMALL);
        assert!(!c.local_tank().collides(&maze.walls));

        let out = c.drain_outbox();
        assert!(has_message(&out, |o| o.to.is_none() && matches!(o.message, PeerMessage::NewMaze { .. })));
    }

    #[test]
    fn test_screen_normalized() {
        let c = coordinator("tiny", GameSize::new(100.0, 5_000.0), 0);
        assert_eq!(c.game_size(), GameSize::new(320.0, 1080.0));
    }

    #[test]
    fn test_handshake_converges_on_authority_maze() {
        let mut a = coordinator("a", SMALL, 0);
        let mut b = coordinator("b", LARGE, 10);
        let a_seed = a.maze().unwrap().seed;

        a.handle_peer_join(&PeerId::from("b"));
        b.handle_peer_join(&PeerId::from("a"));
        pump(&mut a, &mut b, 20);

        assert!(a.remotes().contains_key(&PeerId::from("b")));
        assert!(b.remotes().contains_key(&PeerId::from("a")));
        assert_eq!(a.authority(), Some(PeerId::from("a")));
        assert_eq!(b.authority(), Some(PeerId::from("a")));

        let (ma, mb) = (a.maze().unwrap(), b.maze().unwrap());
        assert_eq!(mb.seed, a_seed);
        assert_eq!(ma.fingerprint(), mb.fingerprint());
        assert_eq!(ma.time, 20);
        assert_eq!(mb.time, 20);
        assert_eq!(b.game_size(), SMALL);
    }

    #[test]
    fn test_duplicate_new_user_not_answered() {
        let mut c = coordinator("me", SMALL, 0);
        c.handle_message(&PeerId::from("p"), new_user(LARGE, 5), 10).unwrap();
        let first = c.drain_outbox();
        assert!(has_message(&first, |o| matches!(o.message, PeerMessage::NewUser { .. })));

        c.handle_message(&PeerId::from("p"), new_user(LARGE, 5), 11).unwrap();
        assert!(c.drain_outbox().is_empty());
        assert_eq!(c.remotes().len(), 1);
    }

    #[test]
    fn test_authority_sends_restamped_maze_to_newcomer() {
        let mut c = coordinator("me", SMALL, 0);
        c.handle_message(&PeerId::from("late"), new_user(LARGE, 500), 900).unwrap();
        let out = c.drain_outbox();

        let sent = out.iter().find_map(|o| match (&o.to, &o.message) {
            (Some(to), PeerMessage::NewMaze { maze }) if to.as_str() == "late" => Some(maze.clone()),
            _ => None,
        });
        let sent = sent.unwrap();
        assert_eq!(sent.time, Some(900));
        assert_eq!(c.maze().unwrap().time, 900);
        assert_eq!(c.remotes()[&PeerId::from("late")].original_creation_time, 500);
    }

    #[test]
    fn test_stale_new_maze_rejected() {
        let mut c = coordinator("me", LARGE, 1_000);
        register(&mut c, "p", LARGE, 2_000, 1_000);
        let before = c.maze().unwrap().clone();

        let stale = PeerMessage::NewMaze {
            maze: MazePayload {
                seed: 0.777,
                walls: Vec::new(),
                time: Some(500),
                size: SMALL,
            },
        };
        c.handle_message(&PeerId::from("p"), stale, 1_100).unwrap();

        let after = c.maze().unwrap();
        assert_eq!(after.fingerprint(), before.fingerprint());
        assert_eq!(after.time, before.time);
        assert_eq!(after.seed, before.seed);
    }

    #[test]
    fn test_equal_time_conflict_goes_to_authority() {
        let mut c = coordinator("me", LARGE, 1_000);
        register(&mut c, "small", SMALL, 0, 1_000);
        register(&mut c, "big", LARGE, 5_000, 1_000);
        let held = c.maze().unwrap().time;

        let from_big = PeerMessage::NewMaze {
            maze: MazePayload { seed: 0.41, walls: Vec::new(), time: Some(held), size: LARGE },
        };
        c.handle_message(&PeerId::from("big"), from_big, 1_100).unwrap();
        assert_ne!(c.maze().unwrap().seed, 0.41);

        let from_authority = PeerMessage::NewMaze {
            maze: MazePayload { seed: 0.42, walls: Vec::new(), time: Some(held), size: SMALL },
        };
        c.handle_message(&PeerId::from("small"), from_authority, 1_100).unwrap();
        assert_eq!(c.maze().unwrap().seed, 0.42);
    }

    #[test]
    fn test_authority_resyncs_equal_time_conflict() {
        let mut c = coordinator("me", SMALL, 1_000);
        register(&mut c, "p", LARGE, 0, 1_000);
        let maze = c.maze().unwrap().clone();

        let same = PeerMessage::Ping { seed: Some(maze.seed), maze_time: Some(maze.time) };
        c.handle_message(&PeerId::from("p"), same, 1_500).unwrap();
        assert!(c.drain_outbox().is_empty());

        let other = PeerMessage::Ping { seed: Some(0.9), maze_time: Some(maze.time) };
        c.handle_message(&PeerId::from("p"), other, 1_600).unwrap();
        assert!(has_message(&c.drain_outbox(), |o| matches!(o.message, PeerMessage::NewMaze { .. })));
    }

    #[test]
    fn test_new_maze_from_unknown_peer_ignored() {
        let mut c = coordinator("me", LARGE, 1_000);
        let before = c.maze().unwrap().seed;
        let msg = PeerMessage::NewMaze {
            maze: MazePayload { seed: 0.5, walls: Vec::new(), time: Some(9_999), size: SMALL },
        };
        c.handle_message(&PeerId::from("stranger"), msg, 1_100).unwrap();
        assert_eq!(c.maze().unwrap().seed, before);
    }

    #[test]
    fn test_same_layout_only_refreshes_time() {
        let mut c = coordinator("me", LARGE, 1_000);
        register(&mut c, "p", SMALL, 0, 1_000);
        let seed = c.maze().unwrap().seed;
        let position = c.local_tank().position;

        let msg = PeerMessage::NewMaze {
            maze: MazePayload { seed, walls: Vec::new(), time: Some(5_000), size: LARGE },
        };
        c.handle_message(&PeerId::from("p"), msg, 1_200).unwrap();
        assert_eq!(c.maze().unwrap().time, 5_000);
        assert_eq!(c.local_tank().position, position);
    }

    #[test]
    fn test_move_idempotent_and_unknown_ignored() {
        let mut c = coordinator("me", SMALL, 0);
        register(&mut c, "p", LARGE, 0, 0);

        let mv = PeerMessage::Move { x: 123.0, y: 45.0, angle: 1.5 };
        c.handle_message(&PeerId::from("p"), mv.clone(), 10).unwrap();
        let once = c.remotes()[&PeerId::from("p")].clone();
        c.handle_message(&PeerId::from("p"), mv.clone(), 11).unwrap();
        let twice = &c.remotes()[&PeerId::from("p")];
        assert_eq!(once.position, twice.position);
        assert_eq!(once.angle, twice.angle);

        c.handle_message(&PeerId::from("ghost"), mv, 12).unwrap();
        assert!(c.tank(&PeerId::from("ghost")).is_none());
    }

    #[test]
    fn test_remote_shot_simulated_locally() {
        let mut c = coordinator("me", SMALL, 0);
        register(&mut c, "p", LARGE, 0, 0);
        c.handle_message(&PeerId::from("p"), PeerMessage::Move { x: 100.0, y: 100.0, angle: 0.0 }, 5)
            .unwrap();
        c.handle_message(&PeerId::from("p"), PeerMessage::Shoot, 10).unwrap();

        assert_eq!(c.bullets().len(), 1);
        assert_eq!(c.bullets()[0].owner(), &PeerId::from("p"));
        assert_eq!(c.bullets()[0].position, Vec2::new(140.0, 100.0));
    }

    #[test]
    fn test_three_tanks_sole_survivor_wins() {
        let mut c = coordinator("me", SMALL, 0);
        register(&mut c, "p", LARGE, 0, 0);
        register(&mut c, "q", LARGE, 0, 0);

        for id in ["p", "q"] {
            let msg = PeerMessage::Eliminated { bullet_id: 0, shooter: None };
            c.handle_message(&PeerId::from(id), msg, 50).unwrap();
        }
        c.tick(&InputState::idle(), 100);

        assert!(c.phase().is_over());
        assert_eq!(c.win_message(), "You Win!");
        let out = c.drain_outbox();
        assert!(has_message(&out, |o| {
            matches!(&o.message, PeerMessage::GameOver { winner } if winner.as_str() == "me")
        }));

        // Display runs out; the local authority starts the next round
        c.tick(&InputState::idle(), 3_100);
        assert!(c.phase().is_active());
        assert_eq!(c.maze().unwrap().time, 3_100);
        assert!(c.remotes().values().all(|t| t.status == TankStatus::Active));
    }

    #[test]
    fn test_restart_timer_armed_once() {
        let mut c = coordinator("me", SMALL, 0);
        register(&mut c, "p", LARGE, 0, 0);
        register(&mut c, "q", LARGE, 0, 0);
        c.handle_message(&PeerId::from("p"), PeerMessage::Eliminated { bullet_id: 0, shooter: None }, 1)
            .unwrap();
        c.handle_message(&PeerId::from("q"), PeerMessage::Eliminated { bullet_id: 0, shooter: None }, 1)
            .unwrap();
        c.tick(&InputState::idle(), 100);
        // A late announcement from another peer does not re-arm the timer
        c.handle_message(&PeerId::from("p"), PeerMessage::GameOver { winner: PeerId::from("p") }, 2_000)
            .unwrap();
        let color = c.remotes()[&PeerId::from("p")].color;
        assert_eq!(c.win_message(), format!("You Lose!(the {} tank wins)", color.as_str()));

        c.tick(&InputState::idle(), 3_100);
        assert!(c.phase().is_active());
    }

    #[test]
    fn test_solo_elimination_does_not_end_round() {
        let mut c = coordinator("me", SMALL, 0);
        let at = c.local_tank().position;
        c.bullets.push(Bullet::new(
            BulletId { owner: PeerId::from("ghost"), seq: 3 },
            at,
            Vec2::RIGHT,
            0.0,
            Color::Red,
            10,
        ));
        c.tick(&InputState::idle(), 20);

        assert_eq!(c.local_tank().status, TankStatus::Eliminated);
        let out = c.drain_outbox();
        assert!(has_message(&out, |o| o.message
            == PeerMessage::Eliminated { bullet_id: 3, shooter: Some(PeerId::from("ghost")) }));

        c.tick(&InputState::idle(), 40);
        assert!(c.phase().is_active());
        assert!(c.bullets().is_empty());
    }

    #[test]
    fn test_local_hit_removes_own_bullets() {
        let mut c = coordinator("me", SMALL, 0);
        register(&mut c, "p", LARGE, 0, 0);
        register(&mut c, "q", LARGE, 0, 0);
        let at = c.local_tank().position;
        let far = Vec2::new(at.x + 400.0, at.y);
        c.bullets.push(Bullet::new(BulletId { owner: PeerId::from("me"), seq: 0 }, far, Vec2::RIGHT, 0.0, Color::Blue, 10));
        c.bullets.push(Bullet::new(BulletId { owner: PeerId::from("q"), seq: 0 }, far, Vec2::RIGHT, 0.0, Color::Red, 10));
        c.bullets.push(Bullet::new(BulletId { owner: PeerId::from("p"), seq: 1 }, at, Vec2::RIGHT, 0.0, Color::Red, 10));
        c.tick(&InputState::idle(), 20);

        assert_eq!(c.local_tank().status, TankStatus::Eliminated);
        // Own bullet gone, the hitting bullet expired, the bystander kept
        assert!(c.bullets().iter().all(|b| b.owner().as_str() != "me"));
        c.tick(&InputState::idle(), 40);
        assert_eq!(c.bullets().len(), 1);
        assert_eq!(c.bullets()[0].owner(), &PeerId::from("q"));
    }

    #[test]
    fn test_remote_elimination_drops_bullets() {
        let mut c = coordinator("me", SMALL, 0);
        register(&mut c, "p", LARGE, 0, 0);
        register(&mut c, "q", LARGE, 0, 0);
        let spot = Vec2::new(5.0, 5.0);
        c.bullets.push(Bullet::new(BulletId { owner: PeerId::from("p"), seq: 0 }, spot, Vec2::RIGHT, 0.0, Color::Red, 10));
        c.bullets.push(Bullet::new(BulletId { owner: PeerId::from("q"), seq: 7 }, spot, Vec2::RIGHT, 0.0, Color::Red, 10));
        c.bullets.push(Bullet::new(BulletId { owner: PeerId::from("q"), seq: 8 }, spot, Vec2::RIGHT, 0.0, Color::Red, 10));

        let msg = PeerMessage::Eliminated { bullet_id: 7, shooter: Some(PeerId::from("q")) };
        c.handle_message(&PeerId::from("p"), msg, 20).unwrap();

        assert_eq!(c.remotes()[&PeerId::from("p")].status, TankStatus::Eliminated);
        let left: Vec<_> = c.bullets().iter().map(|b| b.id.seq).collect();
        assert_eq!(left, vec![8]);
    }

    #[test]
    fn test_maze_wait_failure_then_give_up() {
        let mut c = coordinator("me", LARGE, 0);
        register(&mut c, "a", SMALL, 10, 0);
        register(&mut c, "b", GameSize::new(1024.0, 768.0), 20, 0);

        c.start_new_round(100);
        assert_eq!(c.phase(), &RoundPhase::NoMaze { waiting_for: Some(PeerId::from("a")) });

        // Keep both remotes alive through the waits
        for id in ["a", "b"] {
            c.handle_message(&PeerId::from(id), PeerMessage::Ping { seed: None, maze_time: None }, 3_000)
                .unwrap();
        }
        c.tick(&InputState::idle(), 3_100);
        assert!(c.failed_authorities().contains(&PeerId::from("a")));
        assert_eq!(c.phase(), &RoundPhase::NoMaze { waiting_for: Some(PeerId::from("b")) });

        c.tick(&InputState::idle(), 6_100);
        assert_eq!(c.failed_authorities().len(), 2);
        assert_eq!(c.phase(), &RoundPhase::NoMaze { waiting_for: None });
        assert!(c.maze().is_none());
    }

    #[test]
    fn test_awaited_authority_leaving_reelects() {
        let mut c = coordinator("me", LARGE, 0);
        register(&mut c, "a", SMALL, 10, 0);
        register(&mut c, "b", GameSize::new(1024.0, 768.0), 20, 0);

        c.start_new_round(100);
        assert_eq!(c.phase(), &RoundPhase::NoMaze { waiting_for: Some(PeerId::from("a")) });

        // The next authority is asked without waiting out the timeout
        c.handle_peer_leave(&PeerId::from("a"), 200);
        assert_eq!(c.phase(), &RoundPhase::NoMaze { waiting_for: Some(PeerId::from("b")) });
        assert!(c.failed_authorities().is_empty());

        // The wait armed for a belongs to an older round
        c.tick(&InputState::idle(), 3_100);
        assert_eq!(c.phase(), &RoundPhase::NoMaze { waiting_for: Some(PeerId::from("b")) });

        // Alone now: the local peer generates
        c.handle_peer_leave(&PeerId::from("b"), 3_150);
        assert!(c.phase().is_active());
        let maze = c.maze().unwrap();
        assert_eq!(maze.time, 3_150);
        assert_eq!(maze.size, LARGE);
        let out = c.drain_outbox();
        assert!(has_message(&out, |o| o.to.is_none() && matches!(o.message, PeerMessage::NewMaze { .. })));
    }

    #[test]
    fn test_departed_failed_authority_not_counted() {
        let mut c = coordinator("me", LARGE, 0);
        register(&mut c, "a", SMALL, 10, 0);
        register(&mut c, "b", GameSize::new(1024.0, 768.0), 20, 0);
        register(&mut c, "c", GameSize::new(1280.0, 720.0), 30, 0);

        c.start_new_round(100);
        c.tick(&InputState::idle(), 3_100);
        assert_eq!(c.phase(), &RoundPhase::NoMaze { waiting_for: Some(PeerId::from("b")) });

        c.handle_peer_leave(&PeerId::from("a"), 3_200);
        assert!(c.failed_authorities().is_empty());
        assert_eq!(c.phase(), &RoundPhase::NoMaze { waiting_for: Some(PeerId::from("b")) });

        // b times out too; c is still reachable and gets asked
        c.tick(&InputState::idle(), 6_100);
        assert_eq!(c.failed_authorities().len(), 1);
        assert_eq!(c.phase(), &RoundPhase::NoMaze { waiting_for: Some(PeerId::from("c")) });
        assert_eq!(c.authority(), Some(PeerId::from("c")));
    }

    #[test]
    fn test_maze_arrival_clears_failures() {
        let mut c = coordinator("me", LARGE, 0);
        register(&mut c, "a", SMALL, 10, 0);
        register(&mut c, "b", GameSize::new(1024.0, 768.0), 20, 0);
        c.start_new_round(100);
        c.tick(&InputState::idle(), 3_100);
        assert_eq!(c.failed_authorities().len(), 1);

        let msg = PeerMessage::NewMaze {
            maze: MazePayload { seed: 0.3, walls: Vec::new(), time: Some(3_200), size: GameSize::new(1024.0, 768.0) },
        };
        c.handle_message(&PeerId::from("b"), msg, 3_200).unwrap();
        assert!(c.phase().is_active());
        assert!(c.failed_authorities().is_empty());
        assert_eq!(c.game_size(), GameSize::new(1024.0, 768.0));

        // The outstanding wait for b is stale now
        c.tick(&InputState::idle(), 6_100);
        assert!(c.phase().is_active());
    }

    #[test]
    fn test_newer_maze_ends_round_over_display() {
        let mut c = coordinator("me", LARGE, 0);
        register(&mut c, "a", SMALL, 0, 0);
        register(&mut c, "b", SMALL, 5, 0);
        c.handle_message(&PeerId::from("a"), PeerMessage::GameOver { winner: PeerId::from("a") }, 50)
            .unwrap();
        assert!(c.phase().is_over());

        let next = PeerMessage::NewMaze {
            maze: MazePayload { seed: 0.22, walls: Vec::new(), time: Some(80), size: SMALL },
        };
        c.handle_message(&PeerId::from("a"), next, 80).unwrap();
        assert!(c.phase().is_active());
        assert_eq!(c.maze().unwrap().seed, 0.22);
        assert_eq!(c.win_message(), "");

        // The cancelled restart never fires
        c.tick(&InputState::idle(), 3_100);
        assert_eq!(c.maze().unwrap().seed, 0.22);
        assert_eq!(c.maze().unwrap().time, 80);
    }

    #[test]
    fn test_ping_resync_for_stale_sender() {
        let mut c = coordinator("me", SMALL, 1_000);
        register(&mut c, "p", LARGE, 0, 1_000);
        let held = c.maze().unwrap().time;

        c.handle_message(&PeerId::from("p"), PeerMessage::Ping { seed: None, maze_time: None }, 2_000)
            .unwrap();
        let out = c.drain_outbox();
        assert!(has_message(&out, |o| {
            o.to.as_ref().map(|p| p.as_str()) == Some("p") && matches!(o.message, PeerMessage::NewMaze { .. })
        }));

        let current = PeerMessage::Ping { seed: Some(0.1), maze_time: Some(held) };
        c.handle_message(&PeerId::from("p"), current, 2_100).unwrap();
        assert!(c.drain_outbox().is_empty());
        assert_eq!(c.remotes()[&PeerId::from("p")].player.last_ping, 2_100);
    }

    #[test]
    fn test_self_clocked_ping_and_purge() {
        let mut c = coordinator("me", SMALL, 0);
        register(&mut c, "p", LARGE, 0, 0);
        register(&mut c, "q", LARGE, 0, 0);

        c.tick(&InputState::idle(), 9_999);
        assert!(!has_message(&c.drain_outbox(), |o| matches!(o.message, PeerMessage::Ping { .. })));
        c.handle_message(&PeerId::from("q"), PeerMessage::Ping { seed: None, maze_time: None }, 10_000)
            .unwrap();
        c.drain_outbox();

        // Throttled host: a single late tick still pings and purges
        c.tick(&InputState::idle(), 15_001);
        let out = c.drain_outbox();
        assert!(has_message(&out, |o| matches!(o.message, PeerMessage::Ping { seed: Some(_), maze_time: Some(_) })));
        assert!(!c.remotes().contains_key(&PeerId::from("p")));
        assert!(c.remotes().contains_key(&PeerId::from("q")));
    }

    #[test]
    fn test_wall_color_change_applies_sender_color() {
        let mut c = coordinator("me", SMALL, 0);
        register(&mut c, "p", LARGE, 0, 0);
        let walls = c.maze().unwrap().walls.len();
        assert!(walls > 0);

        let msg = PeerMessage::WallColorChange { walls_updated: vec![WallRef { wall_index: 0 }] };
        c.handle_message(&PeerId::from("p"), msg.clone(), 100).unwrap();
        let color = c.remotes()[&PeerId::from("p")].color;
        assert_eq!(c.maze().unwrap().walls[0].display_color(), color);

        // Duplicate is harmless; highlight reverts after its duration
        c.handle_message(&PeerId::from("p"), msg, 100).unwrap();
        c.tick(&InputState::idle(), 400);
        assert_eq!(c.maze().unwrap().walls[0].display_color(), Color::Gray);

        let bad = PeerMessage::WallColorChange { walls_updated: vec![WallRef { wall_index: walls }] };
        assert!(matches!(
            c.handle_message(&PeerId::from("p"), bad, 500),
            Err(ProtocolError::UnknownWall { .. })
        ));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let mut c = coordinator("me", SMALL, 0);
        assert!(matches!(
            c.handle_raw(&PeerId::from("p"), "{\"type\":", 10),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(c.handle_raw(&PeerId::from("p"), r#"{"type":"shoot"}"#, 10).is_ok());
        assert!(c.bullets().is_empty());
    }

    #[test]
    fn test_peer_join_and_leave() {
        let mut c = coordinator("me", SMALL, 0);
        c.handle_peer_join(&PeerId::from("p"));
        let out = c.drain_outbox();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Some(PeerId::from("p")));

        register(&mut c, "p", LARGE, 0, 0);
        c.handle_peer_leave(&PeerId::from("p"), 10);
        assert!(c.remotes().is_empty());
    }
}
