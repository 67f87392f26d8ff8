//! Geometry Utilities
//!
//! Pure, stateless helpers shared by bullet reflection and tank hit-shapes.

use super::vec2::Vec2;

/// Rotate `point` around `center` by `angle` radians.
#[inline]
pub fn rotate_point(point: Vec2, center: Vec2, angle: f64) -> Vec2 {
    point.rotate_around(center, angle)
}

/// Separating Axis Theorem test of a point against a (possibly rotated) rectangle.
///
/// `corners` must be in winding order; the two edge axes are
/// `corners[1] - corners[0]` and `corners[3] - corners[0]`. The point is
/// inside when its projection lies within the corners' projected range on both.
pub fn point_in_rotated_rectangle(point: Vec2, corners: &[Vec2; 4]) -> bool {
    let axes = [corners[1] - corners[0], corners[3] - corners[0]];

    for axis in axes {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for corner in corners {
            let proj = corner.dot(axis);
            min = min.min(proj);
            max = max.max(proj);
        }

        let p = point.dot(axis);
        if p < min || p > max {
            return false;
        }
    }

    true
}

/// Barycentric sign test: is `point` inside (or on the edge of) triangle `abc`?
pub fn point_in_triangle(point: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let sign = |p1: Vec2, p2: Vec2, p3: Vec2| {
        (p1.x - p3.x) * (p2.y - p3.y) - (p2.x - p3.x) * (p1.y - p3.y)
    };

    let d1 = sign(point, a, b);
    let d2 = sign(point, b, c);
    let d3 = sign(point, c, a);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;

    !(has_neg && has_pos)
}

/// Specular reflection `v' = v - 2(v·n)n`. `normal` must be unit length.
#[inline]
pub fn reflect_vector(v: Vec2, normal: Vec2) -> Vec2 {
    let dot = v.dot(normal);
    Vec2::new(v.x - 2.0 * dot * normal.x, v.y - 2.0 * dot * normal.y)
}

/// Clamp `value` into `[min, max]`.
#[inline]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Vec2, b: Vec2) -> f64 {
    a.distance(b)
}

/// Inclusive axis-aligned rectangle containment.
#[inline]
pub fn point_in_rect(point: Vec2, x: f64, y: f64, width: f64, height: f64) -> bool {
    point.x >= x && point.x <= x + width && point.y >= y && point.y <= y + height
}

/// Angle in radians between two vectors, or `None` if either is zero-length.
pub fn angle_between(a: Vec2, b: Vec2) -> Option<f64> {
    let a = a.try_normalize()?;
    let b = b.try_normalize()?;
    Some(a.dot(b).clamp(-1.0, 1.0).acos())
}
