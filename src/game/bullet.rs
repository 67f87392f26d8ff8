//! Bullets
//!
//! A bullet is simulated independently on every peer from the SHOOT
//! announcement; no bullet state crosses the wire.

use serde::{Serialize, Deserialize};

use crate::config::BulletConfig;
use crate::core::geometry::reflect_vector;
use crate::core::vec2::Vec2;
use crate::game::maze::{Color, GameSize, Wall};
use crate::network::room::PeerId;

/// Bullet identity: the owner plus the owner's shot sequence number.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BulletId {
    /// Firing tank's peer
    pub owner: PeerId,
    /// Owner's shot counter at fire time
    pub seq: u64,
}

/// A moving, reflecting, fading projectile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bullet {
    /// Identity
    pub id: BulletId,
    /// Centre
    pub position: Vec2,
    /// Per-tick displacement
    pub velocity: Vec2,
    /// Opacity in `[min_alpha, 1]`
    pub alpha: f64,
    /// Fire time (ms). Zero forces expiry on the next update.
    pub creation_time: u64,
    /// Owner's colour
    pub color: Color,
}

impl Bullet {
    /// Create a bullet heading along `direction` (unit vector) at `speed`.
    pub fn new(id: BulletId, position: Vec2, direction: Vec2, speed: f64, color: Color, now: u64) -> Self {
        Self {
            id,
            position,
            velocity: direction.scale(speed),
            alpha: 1.0,
            creation_time: now,
            color,
        }
    }

    /// Owner's peer id.
    #[inline]
    pub fn owner(&self) -> &PeerId {
        &self.id.owner
    }

    /// Age in seconds at `now`.
    #[inline]
    pub fn age_secs(&self, now: u64) -> f64 {
        now.saturating_sub(self.creation_time) as f64 / 1000.0
    }

    /// Force expiry on the next update (confirmed hit).
    #[inline]
    pub fn expire(&mut self) {
        self.creation_time = 0;
    }

    /// Advance one tick. Returns whether the bullet is still alive.
    pub fn update(&mut self, walls: &[Wall], size: GameSize, now: u64, config: &BulletConfig) -> bool {
        self.position = self.position + self.velocity;

        let age = self.age_secs(now);
        if age > config.fade_start_secs {
            let span = config.lifetime_secs - config.fade_start_secs;
            let fade = (config.lifetime_secs - age) / span;
            self.alpha = fade.max(config.min_alpha).min(self.alpha);
        }

        self.reflect_edges(size);
        self.reflect_walls(walls, config.size / 2.0);

        age < config.lifetime_secs
    }

    /// Axis-aligned bounce off the world edges.
    fn reflect_edges(&mut self, size: GameSize) {
        if self.position.x <= 0.0 || self.position.x >= size.width {
            self.velocity.x = -self.velocity.x;
        }
        if self.position.y <= 0.0 || self.position.y >= size.height {
            self.velocity.y = -self.velocity.y;
        }
    }

    /// Reflect off every wall whose box overlaps the bullet's box.
    fn reflect_walls(&mut self, walls: &[Wall], half: f64) {
        let left = self.position.x - half;
        let right = self.position.x + half;
        let top = self.position.y - half;
        let bottom = self.position.y + half;

        for wall in walls {
            if right > wall.x && left < wall.right() && bottom > wall.y && top < wall.bottom() {
                let normal = struck_side_normal(left, right, top, bottom, wall);
                self.velocity = reflect_vector(self.velocity, normal);
            }
        }
    }
}

/// Normal of the wall side with the smallest penetration depth.
///
/// Comparison order left, right, top, bottom; the first strict winner is taken.
fn struck_side_normal(left: f64, right: f64, top: f64, bottom: f64, wall: &Wall) -> Vec2 {
    let left_depth = (right - wall.x).abs();
    let right_depth = (left - wall.right()).abs();
    let top_depth = (bottom - wall.y).abs();
    let bottom_depth = (top - wall.bottom()).abs();

    if left_depth < right_depth && left_depth < top_depth && left_depth < bottom_depth {
        Vec2::LEFT
    } else if right_depth < top_depth && right_depth < bottom_depth {
        Vec2::RIGHT
    } else if top_depth < bottom_depth {
        Vec2::UP
    } else {
        Vec2::DOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SIZE: GameSize = GameSize::new(800.0, 600.0);

    fn bullet(position: Vec2, velocity: Vec2, now: u64) -> Bullet {
        let mut b = Bullet::new(
            BulletId { owner: PeerId::from("p1"), seq: 0 },
            position,
            Vec2::RIGHT,
            1.0,
            Color::Blue,
            now,
        );
        b.velocity = velocity;
        b
    }

    #[test]
    fn test_moves_by_velocity() {
        let config = BulletConfig::default();
        let mut b = bullet(Vec2::new(100.0, 100.0), Vec2::new(5.0, -2.0), 0);
        assert!(b.update(&[], SIZE, 16, &config));
        assert_eq!(b.position, Vec2::new(105.0, 98.0));
        assert_eq!(b.alpha, 1.0);
    }

    #[test]
    fn test_head_on_wall_from_left() {
        let config = BulletConfig::default();
        let wall = Wall::new(200.0, 100.0, 100.0, 100.0);
        // After moving, the bullet's right edge penetrates the wall's left side by 2
        let mut b = bullet(Vec2::new(192.0, 150.0), Vec2::new(5.0, 0.0), 0);
        b.update(&[wall], SIZE, 10, &config);
        assert_eq!(b.velocity, Vec2::new(-5.0, 0.0));
    }

    #[test]
    fn test_wall_reflection_keeps_tangent() {
        let config = BulletConfig::default();
        let wall = Wall::new(200.0, 100.0, 100.0, 100.0);
        let mut b = bullet(Vec2::new(191.0, 150.0), Vec2::new(5.0, 1.5), 0);
        b.update(&[wall], SIZE, 10, &config);
        assert_eq!(b.velocity.x, -5.0);
        assert_eq!(b.velocity.y, 1.5);
    }

    #[test]
    fn test_wall_reflection_from_top() {
        let config = BulletConfig::default();
        let wall = Wall::new(200.0, 100.0, 100.0, 100.0);
        let mut b = bullet(Vec2::new(250.0, 92.0), Vec2::new(0.5, 5.0), 0);
        b.update(&[wall], SIZE, 10, &config);
        assert_eq!(b.velocity, Vec2::new(0.5, -5.0));
    }

    #[test]
    fn test_edge_bounce() {
        let config = BulletConfig::default();
        let mut b = bullet(Vec2::new(798.0, 300.0), Vec2::new(5.0, 0.0), 0);
        b.update(&[], SIZE, 10, &config);
        assert_eq!(b.velocity.x, -5.0);

        let mut b = bullet(Vec2::new(400.0, 2.0), Vec2::new(0.0, -5.0), 0);
        b.update(&[], SIZE, 10, &config);
        assert_eq!(b.velocity.y, 5.0);
    }

    #[test]
    fn test_lifetime_boundary() {
        let config = BulletConfig::default();
        let mut b = bullet(Vec2::new(400.0, 300.0), Vec2::ZERO, 1_000);
        assert!(b.update(&[], SIZE, 1_000 + 2_699, &config));
        assert!(!b.update(&[], SIZE, 1_000 + 2_700, &config));
    }

    #[test]
    fn test_forced_expiry() {
        let config = BulletConfig::default();
        let mut b = bullet(Vec2::new(400.0, 300.0), Vec2::ZERO, 50_000);
        b.expire();
        assert!(!b.update(&[], SIZE, 50_001, &config));
    }

    #[test]
    fn test_fade_reaches_floor() {
        let config = BulletConfig::default();
        let mut b = bullet(Vec2::new(400.0, 300.0), Vec2::ZERO, 0);
        b.update(&[], SIZE, 2_350, &config);
        assert!((b.alpha - 0.5).abs() < 1e-9);
        b.update(&[], SIZE, 2_690, &config);
        assert_eq!(b.alpha, config.min_alpha);
    }

    proptest! {
        #[test]
        fn prop_alpha_monotonic_and_floored(mut steps in proptest::collection::vec(0u64..200, 1..40)) {
            let config = BulletConfig::default();
            steps.sort_unstable();
            let mut b = bullet(Vec2::new(400.0, 300.0), Vec2::ZERO, 0);
            let mut last_alpha = 1.0;
            let mut now = 2_000;
            for step in steps {
                now += step;
                let alive = b.update(&[], SIZE, now, &config);
                prop_assert!(b.alpha <= last_alpha);
                if alive {
                    prop_assert!(b.alpha >= config.min_alpha);
                }
                last_alpha = b.alpha;
            }
        }
    }
}
