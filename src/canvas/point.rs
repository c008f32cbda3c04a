//! A single sampled brush position.

use serde::{Deserialize, Serialize};

/// One sample of the brush tip.
///
/// Coordinates are normalized to the canvas (0.0 = left/top, 1.0 =
/// right/bottom). Points are immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position in [0, 1].
    pub x: f32,
    /// Vertical position in [0, 1].
    pub y: f32,
    /// Seconds since the session started.
    pub timestamp: f64,
    /// Brush width in pixels.
    pub thickness: f32,
}

impl Point {
    /// Creates a point, clamping coordinates onto the canvas.
    ///
    /// Non-finite values are kept as-is so validation can reject them.
    pub fn new(x: f32, y: f32, timestamp: f64, thickness: f32) -> Self {
        let clamp = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { v };
        Self {
            x: clamp(x),
            y: clamp(y),
            timestamp,
            thickness,
        }
    }

    /// Returns true if every field is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.timestamp.is_finite()
            && self.thickness.is_finite()
    }

    /// Returns true if the coordinates lie on the canvas.
    pub fn in_bounds(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    /// Euclidean distance to another point in normalized units.
    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_clamps_coordinates() {
        let p = Point::new(1.5, -0.2, 0.0, 10.0);
        assert_eq!(p.x, 1.0);
        assert_eq!(p.y, 0.0);
        assert!(p.in_bounds());
        assert!(!Point::new(f32::NAN, 0.5, 0.0, 10.0).is_finite());
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0, 0.0, 5.0);
        let b = Point::new(0.3, 0.4, 1.0, 5.0);
        assert!((a.distance_to(&b) - 0.5).abs() < 1e-6);
    }
}
