//! Tanks
//!
//! A tank is either driven by local input or mirrored from MOVE/SHOOT
//! announcements. Elimination is a status, never a removal: eliminated
//! tanks stay in the roster and keep their hit-shape.

use serde::{Serialize, Deserialize};

use crate::config::GameConfig;
use crate::core::geometry::{point_in_rotated_rectangle, point_in_triangle};
use crate::core::vec2::Vec2;
use crate::game::bullet::{Bullet, BulletId};
use crate::game::input::{ControlBindings, InputState, KeyTracker};
use crate::game::maze::{collides_with_walls, Color, GameSize, Wall};
use crate::game::teleport::{find_group_end, scan, TeleportParams, TravelDirection};
use crate::network::room::PeerId;

/// Tank status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TankStatus {
    /// Driving and shooting
    #[default]
    Active,
    /// Hit this round; ignores input until the next round
    Eliminated,
}

/// Network identity of a tank's peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Peer identifier
    pub peer_id: PeerId,
    /// Screen size declared at join, normalized
    pub original_screen_size: GameSize,
    /// Last liveness signal (ms)
    pub last_ping: u64,
}

/// Result of one control update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ControlOutcome {
    /// Bullet fired this tick
    pub shot: Option<BulletId>,
    /// Indices of walls traversed (and highlighted) this tick
    pub walls_updated: Vec<usize>,
}

/// A tank.
#[derive(Clone, Debug)]
pub struct Tank {
    /// Centre
    pub position: Vec2,
    /// Facing angle (radians)
    pub angle: f64,
    /// Body colour
    pub color: Color,
    /// Round status
    pub status: TankStatus,
    /// Peer identity
    pub player: Player,
    /// Creation time (ms), the election tie-break
    pub original_creation_time: u64,
    /// Mirrored from the network
    pub is_remote: bool,
    /// Key bindings for a locally driven tank
    pub controls: Option<ControlBindings>,
    last_shot_time: Option<u64>,
    shot_seq: u64,
}

impl Tank {
    /// Create the locally driven tank.
    pub fn new_local(peer_id: PeerId, position: Vec2, screen: GameSize, now: u64) -> Self {
        Self {
            position,
            angle: 0.0,
            color: Color::Blue,
            status: TankStatus::Active,
            player: Player {
                peer_id,
                original_screen_size: screen,
                last_ping: now,
            },
            original_creation_time: now,
            is_remote: false,
            controls: Some(ControlBindings::default()),
            last_shot_time: None,
            shot_seq: 0,
        }
    }

    /// Create a tank mirrored from a peer's handshake.
    pub fn new_remote(
        peer_id: PeerId,
        position: Vec2,
        angle: f64,
        screen: GameSize,
        created_at: u64,
        now: u64,
    ) -> Self {
        let color = Color::for_peer(peer_id.as_str());
        Self {
            position,
            angle,
            color,
            status: TankStatus::Active,
            player: Player {
                peer_id,
                original_screen_size: screen,
                last_ping: now,
            },
            original_creation_time: created_at,
            is_remote: true,
            controls: None,
            last_shot_time: None,
            shot_seq: 0,
        }
    }

    /// Peer identifier.
    #[inline]
    pub fn peer_id(&self) -> &PeerId {
        &self.player.peer_id
    }

    /// Check if still in play this round.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == TankStatus::Active
    }

    /// Mark as hit.
    pub fn eliminate(&mut self) {
        self.status = TankStatus::Eliminated;
    }

    /// Reset for a new round.
    pub fn revive(&mut self) {
        self.status = TankStatus::Active;
    }

    /// Read held keys through this tank's bindings.
    ///
    /// A tank without bindings always reads idle.
    pub fn resolve_input(&self, keys: &KeyTracker) -> InputState {
        self.controls
            .as_ref()
            .map_or_else(InputState::idle, |bindings| keys.state(bindings))
    }

    /// Apply one tick of held controls.
    ///
    /// Eliminated tanks and tanks without bindings ignore input.
    pub fn update_controls(
        &mut self,
        input: &InputState,
        bullets: &mut Vec<Bullet>,
        walls: &mut [Wall],
        size: GameSize,
        now: u64,
        config: &GameConfig,
    ) -> ControlOutcome {
        let mut outcome = ControlOutcome::default();
        if !self.is_active() || self.is_remote || self.controls.is_none() {
            return outcome;
        }

        // Candidate from the pre-turn heading; the turn always applies
        let facing = Vec2::from_angle(self.angle);
        let mut candidate = self.position;
        if input.forward {
            candidate = candidate + facing.scale(config.tank.speed);
        }
        if input.backward {
            candidate = candidate - facing.scale(config.tank.speed);
        }
        self.angle += input.turn_direction() * config.tank.rotation_step;

        let corrected = candidate + self.bounds_correction(candidate, size, config);

        if !collides_with_walls(candidate, walls) || collides_with_walls(self.position, walls) {
            self.position = corrected;
        } else {
            let params = TeleportParams {
                probe_step: config.probe_step(),
                max_angle: Some(config.teleport.max_angle),
                max_probes: config.teleport.max_probes,
            };
            if let Some(traversal) =
                find_group_end(self.angle, candidate, walls, size, input.backward, &params)
            {
                self.position = traversal.end + self.bounds_correction(traversal.end, size, config);
                let until = now + config.wall.highlight_ms;
                for &index in &traversal.walls {
                    walls[index].highlight(self.color, until);
                }
                outcome.walls_updated = traversal.walls;
            }
        }

        // Shot after the move, from the resulting pose
        if input.shoot {
            outcome.shot = self.shoot(bullets, now, config);
        }

        outcome
    }

    /// Fire one bullet if allowed. Returns its id.
    ///
    /// No-op while eliminated, inside the cooldown, or at the bullet cap.
    pub fn shoot(&mut self, bullets: &mut Vec<Bullet>, now: u64, config: &GameConfig) -> Option<BulletId> {
        if !self.is_active() {
            return None;
        }
        if let Some(last) = self.last_shot_time {
            if now.saturating_sub(last) <= config.tank.shoot_cooldown_ms {
                return None;
            }
        }
        if self.own_bullet_count(bullets) >= config.tank.max_bullets {
            return None;
        }

        let facing = Vec2::from_angle(self.angle);
        let muzzle = self.position + facing.scale(config.tank.size / 2.0 + config.tank.turret_size);
        let id = BulletId {
            owner: self.player.peer_id.clone(),
            seq: self.shot_seq,
        };
        self.shot_seq += 1;
        self.last_shot_time = Some(now);

        bullets.push(Bullet::new(
            id.clone(),
            muzzle,
            facing,
            config.bullet.speed,
            self.color,
            now,
        ));
        Some(id)
    }

    /// Number of live bullets this tank owns.
    pub fn own_bullet_count(&self, bullets: &[Bullet]) -> usize {
        bullets.iter().filter(|b| b.owner() == self.peer_id()).count()
    }

    /// Check if the centre point is strictly inside a wall.
    #[inline]
    pub fn collides(&self, walls: &[Wall]) -> bool {
        collides_with_walls(self.position, walls)
    }

    /// Body corners at `center`, rotated by the current heading.
    pub fn body_corners(&self, center: Vec2, config: &GameConfig) -> [Vec2; 4] {
        let half = config.tank.size / 2.0;
        [
            Vec2::new(center.x - half, center.y - half),
            Vec2::new(center.x + half, center.y - half),
            Vec2::new(center.x + half, center.y + half),
            Vec2::new(center.x - half, center.y + half),
        ]
        .map(|corner| corner.rotate_around(center, self.angle))
    }

    /// Turret triangle at `center`: two front corners and the tip.
    pub fn turret_triangle(&self, center: Vec2, config: &GameConfig) -> [Vec2; 3] {
        let half = config.tank.size / 2.0;
        [
            Vec2::new(center.x + half, center.y + half),
            Vec2::new(center.x + half, center.y - half),
            Vec2::new(center.x + half + config.tank.turret_size, center.y),
        ]
        .map(|vertex| vertex.rotate_around(center, self.angle))
    }

    /// Minimal translation pulling the body and turret tip at `center` back into the world.
    pub fn bounds_correction(&self, center: Vec2, size: GameSize, config: &GameConfig) -> Vec2 {
        let corners = self.body_corners(center, config);
        let tip = self.turret_triangle(center, config)[2];

        let mut min = Vec2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for point in corners.iter().chain(std::iter::once(&tip)) {
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }

        let pull = |lo: f64, hi: f64, limit: f64| {
            if lo < 0.0 {
                -lo
            } else if hi > limit {
                limit - hi
            } else {
                0.0
            }
        };

        Vec2::new(pull(min.x, max.x, size.width), pull(min.y, max.y, size.height))
    }

    /// Resolve a spawn placement: snap into bounds, then out of any wall.
    ///
    /// Tries all four cardinal traversals with the alignment gate disabled
    /// and takes the nearest landing. Returns false if none succeeds.
    pub fn move_out(&mut self, walls: &[Wall], size: GameSize, config: &GameConfig) -> bool {
        self.position = self.position + self.bounds_correction(self.position, size, config);
        if !self.collides(walls) {
            return true;
        }

        let params = TeleportParams {
            probe_step: config.probe_step(),
            max_angle: None,
            max_probes: config.teleport.max_probes,
        };

        let mut best: Option<Vec2> = None;
        for direction in TravelDirection::ALL {
            if let Some(traversal) = scan(direction, self.position, walls, size, &params) {
                let closer = best.map_or(true, |b| {
                    traversal.end.distance(self.position) < b.distance(self.position)
                });
                if closer {
                    best = Some(traversal.end);
                }
            }
        }

        match best {
            Some(end) => {
                self.position = end;
                true
            }
            None => false,
        }
    }

    /// Check if a bullet's centre lies in the body or the turret.
    pub fn check_collision_with_bullet(&self, bullet: &Bullet, config: &GameConfig) -> bool {
        let corners = self.body_corners(self.position, config);
        if point_in_rotated_rectangle(bullet.position, &corners) {
            return true;
        }
        let [a, b, c] = self.turret_triangle(self.position, config);
        point_in_triangle(bullet.position, a, b, c)
    }
}
