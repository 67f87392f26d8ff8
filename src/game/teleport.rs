//! Wall-Teleport
//!
//! A tank driving straight into a narrow run of walls is walked through
//! it in one step. The scan probes a short step ahead of the current end
//! point along one cardinal direction, hopping across each wall it finds.
//! Obstructions only grazed at a steep angle abort the maneuver.

use std::f64::consts::PI;

use crate::core::geometry::angle_between;
use crate::core::vec2::Vec2;
use crate::game::maze::{GameSize, Wall};

/// Cardinal travel bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TravelDirection {
    /// +X
    Right,
    /// -X
    Left,
    /// +Y (screen down)
    Down,
    /// -Y (screen up)
    Up,
}

impl TravelDirection {
    /// Classify a heading by its dominant axis.
    ///
    /// Exact diagonals (|cos| == |sin|) have no dominant axis and return `None`.
    pub fn classify(angle: f64) -> Option<Self> {
        let (sin, cos) = angle.sin_cos();
        if cos.abs() > sin.abs() {
            Some(if cos > 0.0 { Self::Right } else { Self::Left })
        } else if sin.abs() > cos.abs() {
            Some(if sin > 0.0 { Self::Down } else { Self::Up })
        } else {
            None
        }
    }

    /// Unit offset along this direction.
    #[inline]
    pub fn unit(self) -> Vec2 {
        match self {
            Self::Right => Vec2::RIGHT,
            Self::Left => Vec2::LEFT,
            Self::Down => Vec2::DOWN,
            Self::Up => Vec2::UP,
        }
    }

    /// All four, in a fixed order.
    pub const ALL: [TravelDirection; 4] = [Self::Right, Self::Down, Self::Left, Self::Up];
}

/// Parameters of one scan.
#[derive(Clone, Copy, Debug)]
pub struct TeleportParams {
    /// Probe offset ahead of the end point (tank size / 16)
    pub probe_step: f64,
    /// Maximum alignment angle in radians; `None` disables the gate
    pub max_angle: Option<f64>,
    /// Iteration bound
    pub max_probes: usize,
}

/// A successful traversal.
#[derive(Clone, Debug, PartialEq)]
pub struct Traversal {
    /// Where the tank lands
    pub end: Vec2,
    /// Indices of traversed walls, in crossing order
    pub walls: Vec<usize>,
}

/// Find where a traversal starting at `start` would land.
///
/// Returns `None` when the heading is misaligned with a wall, when no
/// wall lies ahead, or when the landing point leaves the world (keeping a
/// probe-step margin).
pub fn find_group_end(
    angle: f64,
    start: Vec2,
    walls: &[Wall],
    size: GameSize,
    moving_backward: bool,
    params: &TeleportParams,
) -> Option<Traversal> {
    let heading = if moving_backward { angle + PI } else { angle };
    let direction = TravelDirection::classify(heading)?;
    scan(direction, start, walls, size, params)
}

/// Scan along an explicit cardinal direction.
pub fn scan(
    direction: TravelDirection,
    start: Vec2,
    walls: &[Wall],
    size: GameSize,
    params: &TeleportParams,
) -> Option<Traversal> {
    let step = params.probe_step;
    let unit = direction.unit();
    let mut end = start;
    let mut group = Vec::new();

    for _ in 0..params.max_probes {
        let probe = end + unit.scale(step);
        let Some(index) = walls.iter().position(|wall| wall.covers(probe)) else {
            break;
        };
        let wall = &walls[index];

        if let Some(max_angle) = params.max_angle {
            // Zero-length means the end point sits on the wall centre: aligned
            let angle = angle_between(unit, wall.center() - end).unwrap_or(0.0);
            if angle > max_angle {
                return None;
            }
        }

        group.push(index);
        match direction {
            TravelDirection::Right => end.x = wall.right() + step,
            TravelDirection::Left => end.x = wall.x - step,
            TravelDirection::Down => end.y = wall.bottom() + step,
            TravelDirection::Up => end.y = wall.y - step,
        }
    }

    if group.is_empty() || !size.contains_with_margin(end, step) {
        return None;
    }

    Some(Traversal { end, walls: group })
}
