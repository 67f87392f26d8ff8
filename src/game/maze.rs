//! Maze Geometry
//!
//! Deterministic grid of square wall cells generated from a seed.
//! Two peers holding the same seed and size hold bit-identical walls in
//! the same order, which is what lets a `wallIndex` on the wire name the
//! same wall everywhere.

use serde::{Serialize, Deserialize};

use crate::core::geometry::point_in_rect;
use crate::core::hash::{Fingerprint, GeometryHasher};
use crate::core::rng::{cell_random, seed_from_peer_id, SeededRng};
use crate::core::vec2::Vec2;

// =============================================================================
// GAME SIZE
// =============================================================================

/// World bounds in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSize {
    /// Width in pixels
    pub width: f64,
    /// Height in pixels
    pub height: f64,
}

impl GameSize {
    /// Create a size.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Normalize into the `[min, max]` envelope.
    ///
    /// Non-finite components collapse to the minimum; peers may declare
    /// anything.
    pub fn clamped(self, min: GameSize, max: GameSize) -> Self {
        let fix = |v: f64, lo: f64, hi: f64| if v.is_finite() { v.clamp(lo, hi) } else { lo };
        Self {
            width: fix(self.width, min.width, max.width),
            height: fix(self.height, min.height, max.height),
        }
    }

    /// Sum of both edges, the authority election key.
    #[inline]
    pub fn extent(&self) -> f64 {
        self.width + self.height
    }

    /// Check whether a point lies within the bounds, keeping `margin` from every edge.
    #[inline]
    pub fn contains_with_margin(&self, point: Vec2, margin: f64) -> bool {
        point.x >= margin
            && point.x <= self.width - margin
            && point.y >= margin
            && point.y <= self.height - margin
    }
}

// =============================================================================
// COLOR
// =============================================================================

/// Display colours shared by tanks and walls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// Wall default
    Gray,
    /// Local tank
    Blue,
    /// Remote palette
    Red,
    /// Remote palette
    Green,
    /// Remote palette
    Yellow,
    /// Remote palette
    Purple,
    /// Remote palette
    Orange,
    /// Remote palette
    Pink,
}

impl Color {
    /// Colours handed out to remote tanks.
    pub const REMOTE_PALETTE: [Color; 6] = [
        Color::Red,
        Color::Green,
        Color::Yellow,
        Color::Purple,
        Color::Orange,
        Color::Pink,
    ];

    /// Stable remote colour for a peer, identical across reconnects.
    pub fn for_peer(peer_id: &str) -> Self {
        let seed = seed_from_peer_id(peer_id) as u64;
        Self::REMOTE_PALETTE[(seed % Self::REMOTE_PALETTE.len() as u64) as usize]
    }

    /// Lowercase name, as rendered.
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Gray => "gray",
            Color::Blue => "blue",
            Color::Red => "red",
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Purple => "purple",
            Color::Orange => "orange",
            Color::Pink => "pink",
        }
    }
}

// =============================================================================
// WALL
// =============================================================================

/// One axis-aligned wall cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wall {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
    /// Colour when not highlighted
    pub original_color: Color,
    /// Transient highlight colour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_color: Option<Color>,
    /// When the highlight reverts (ms)
    #[serde(skip)]
    pub highlight_until: Option<u64>,
}

impl Wall {
    /// Create a gray wall.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            original_color: Color::Gray,
            current_color: None,
            highlight_until: None,
        }
    }

    /// Right edge.
    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Centre point.
    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive containment (edges count).
    #[inline]
    pub fn covers(&self, point: Vec2) -> bool {
        point_in_rect(point, self.x, self.y, self.width, self.height)
    }

    /// Strict interior containment (edges do not count).
    #[inline]
    pub fn contains_strict(&self, point: Vec2) -> bool {
        point.x > self.x && point.x < self.right() && point.y > self.y && point.y < self.bottom()
    }

    /// Colour to draw right now.
    #[inline]
    pub fn display_color(&self) -> Color {
        self.current_color.unwrap_or(self.original_color)
    }

    /// Highlight until `until`. A later call overwrites colour and deadline.
    pub fn highlight(&mut self, color: Color, until: u64) {
        self.current_color = Some(color);
        self.highlight_until = Some(until);
    }

    /// Revert the highlight once its deadline has passed.
    pub fn expire_highlight(&mut self, now: u64) {
        if let Some(until) = self.highlight_until {
            if now >= until {
                self.current_color = None;
                self.highlight_until = None;
            }
        }
    }
}

/// Check whether a point is strictly inside any wall.
pub fn collides_with_walls(point: Vec2, walls: &[Wall]) -> bool {
    walls.iter().any(|wall| wall.contains_strict(point))
}

// =============================================================================
// GENERATION
// =============================================================================

/// Generate walls for a world.
///
/// Cells are `floor(width / cell) × floor(height / cell)`; trailing
/// partial cells stay empty. Scan order is column-major and fixed.
pub fn generate_maze(size: GameSize, cell_size: f64, seed: f64, density: f64) -> Vec<Wall> {
    let mut walls = Vec::new();
    if !(cell_size > 0.0) {
        return walls;
    }

    let columns = (size.width / cell_size).floor().max(0.0) as u32;
    let rows = (size.height / cell_size).floor().max(0.0) as u32;

    for i in 0..columns {
        for j in 0..rows {
            if cell_random(seed, i, j) < density {
                walls.push(Wall::new(
                    i as f64 * cell_size,
                    j as f64 * cell_size,
                    cell_size,
                    cell_size,
                ));
            }
        }
    }

    walls
}

// =============================================================================
// MAZE
// =============================================================================

/// A generated maze instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Maze {
    /// Generation seed
    pub seed: f64,
    /// Walls in generation order
    pub walls: Vec<Wall>,
    /// Logical creation time (ms); newer wins
    pub time: u64,
    /// World size the maze was generated for
    pub size: GameSize,
}

impl Maze {
    /// Generate a maze.
    pub fn generate(size: GameSize, cell_size: f64, seed: f64, density: f64, time: u64) -> Self {
        Self {
            seed,
            walls: generate_maze(size, cell_size, seed, density),
            time,
            size,
        }
    }

    /// Same seed and same size (and therefore the same walls).
    #[inline]
    pub fn same_layout(&self, seed: f64, size: GameSize) -> bool {
        self.seed.to_bits() == seed.to_bits() && self.size == size
    }

    /// SHA-256 over wall geometry.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = GeometryHasher::for_maze();
        hasher.update_u32(self.walls.len() as u32);
        for wall in &self.walls {
            hasher.update_f64(wall.x);
            hasher.update_f64(wall.y);
            hasher.update_f64(wall.width);
            hasher.update_f64(wall.height);
        }
        hasher.finalize()
    }

    /// Revert every expired highlight.
    pub fn expire_highlights(&mut self, now: u64) {
        for wall in &mut self.walls {
            wall.expire_highlight(now);
        }
    }

    /// Centres of grid cells that hold no wall, in scan order.
    pub fn empty_cells(&self, cell_size: f64) -> Vec<Vec2> {
        if !(cell_size > 0.0) {
            return Vec::new();
        }
        let columns = (self.size.width / cell_size).floor().max(0.0) as u32;
        let rows = (self.size.height / cell_size).floor().max(0.0) as u32;

        let mut cells = Vec::new();
        for i in 0..columns {
            for j in 0..rows {
                let center = Vec2::new(
                    (i as f64 + 0.5) * cell_size,
                    (j as f64 + 0.5) * cell_size,
                );
                if !self.walls.iter().any(|w| w.covers(center)) {
                    cells.push(center);
                }
            }
        }
        cells
    }

    /// Reproducible spawn point and heading for a peer in this maze.
    ///
    /// Falls back to the world centre when every cell is walled.
    pub fn spawn_point(&self, cell_size: f64, peer_seed: f64) -> (Vec2, f64) {
        let mut rng = SeededRng::new(self.seed * 7919.0 + peer_seed);
        let cells = self.empty_cells(cell_size);
        let position = rng
            .choose(&cells)
            .copied()
            .unwrap_or(Vec2::new(self.size.width / 2.0, self.size.height / 2.0));
        (position, rng.next_angle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SIZE: GameSize = GameSize::new(800.0, 600.0);

    #[test]
    fn test_maze_determinism() {
        let a = generate_maze(SIZE, 100.0, 0.5, 0.3);
        let b = generate_maze(SIZE, 100.0, 0.5, 0.3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = Maze::generate(SIZE, 100.0, 0.123, 0.3, 1);
        let b = Maze::generate(SIZE, 100.0, 0.789, 0.3, 1);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_walls_on_grid() {
        let walls = generate_maze(GameSize::new(850.0, 630.0), 100.0, 0.77, 0.3);
        for wall in &walls {
            assert_eq!(wall.x % 100.0, 0.0);
            assert_eq!(wall.y % 100.0, 0.0);
            // Partial trailing cells are never covered
            assert!(wall.right() <= 800.0);
            assert!(wall.bottom() <= 600.0);
        }
    }

    #[test]
    fn test_scan_order_column_major() {
        let walls = generate_maze(SIZE, 100.0, 0.31, 0.3);
        for pair in walls.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.x < b.x || (a.x == b.x && a.y < b.y));
        }
    }

    #[test]
    fn test_density_extremes() {
        assert!(generate_maze(SIZE, 100.0, 0.5, 0.0).is_empty());
        assert_eq!(generate_maze(SIZE, 100.0, 0.5, 1.0).len(), 48);
        assert!(generate_maze(SIZE, 0.0, 0.5, 0.3).is_empty());
    }

    #[test]
    fn test_highlight_last_write_wins() {
        let mut wall = Wall::new(0.0, 0.0, 10.0, 10.0);
        wall.highlight(Color::Red, 300);
        wall.highlight(Color::Green, 500);

        wall.expire_highlight(300);
        assert_eq!(wall.display_color(), Color::Green);

        wall.expire_highlight(500);
        assert_eq!(wall.display_color(), Color::Gray);
        assert!(wall.highlight_until.is_none());
    }

    #[test]
    fn test_size_clamp() {
        let min = GameSize::new(320.0, 240.0);
        let max = GameSize::new(1920.0, 1080.0);
        assert_eq!(GameSize::new(10_000.0, 10.0).clamped(min, max), GameSize::new(1920.0, 240.0));
        assert_eq!(GameSize::new(f64::NAN, 500.0).clamped(min, max), GameSize::new(320.0, 500.0));
    }

    #[test]
    fn test_spawn_point_in_empty_cell() {
        let maze = Maze::generate(SIZE, 100.0, 0.42, 0.3, 1);
        let (pos, angle) = maze.spawn_point(100.0, 17.0);
        assert!(!collides_with_walls(pos, &maze.walls));
        assert!((0.0..std::f64::consts::TAU).contains(&angle));
        assert_eq!(maze.spawn_point(100.0, 17.0).0, pos);
    }

    #[test]
    fn test_wall_serialization_shape() {
        let mut wall = Wall::new(100.0, 200.0, 100.0, 100.0);
        let json = serde_json::to_string(&wall).unwrap();
        assert!(json.contains("\"originalColor\":\"gray\""));
        assert!(!json.contains("currentColor"));

        wall.highlight(Color::Pink, 10);
        let json = serde_json::to_string(&wall).unwrap();
        assert!(json.contains("\"currentColor\":\"pink\""));
    }

    #[test]
    fn test_peer_colors_from_palette() {
        let c = Color::for_peer("some-peer");
        assert!(Color::REMOTE_PALETTE.contains(&c));
        assert_eq!(c, Color::for_peer("some-peer"));
    }

    proptest! {
        #[test]
        fn prop_generation_is_deterministic(
            seed in 0.0f64..1.0,
            width in 320.0f64..1920.0,
            height in 240.0f64..1080.0,
        ) {
            let size = GameSize::new(width, height);
            let a = Maze::generate(size, 100.0, seed, 0.3, 0);
            let b = Maze::generate(size, 100.0, seed, 0.3, 99);
            prop_assert_eq!(a.fingerprint(), b.fingerprint());
            prop_assert_eq!(a.walls, b.walls);
        }
    }
}
