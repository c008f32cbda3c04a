//! Stroke representation.
//!
//! A stroke is the ordered list of points drawn between a pen-down and a
//! pen-up, together with the instrument and colour it was drawn with.

use super::point::Point;
use crate::music::Instrument;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a stroke.
///
/// Random v4 ids stay unique across sessions, so strokes from different
/// saved projects never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrokeId(Uuid);

impl StrokeId {
    /// Generates a new unique stroke ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StrokeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StrokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A drawn stroke.
///
/// Points are kept in recording order with non-decreasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Unique identifier for this stroke.
    pub id: StrokeId,

    /// Instrument the stroke was drawn with.
    pub instrument: Instrument,

    /// Display colour as RGB.
    pub color: [u8; 3],

    points: Vec<Point>,
}

impl Stroke {
    /// Creates an empty stroke.
    ///
    /// # Arguments
    ///
    /// * `instrument` - Instrument used to voice the stroke
    /// * `color` - Display colour as RGB
    pub fn new(instrument: Instrument, color: [u8; 3]) -> Self {
        Self::with_id(StrokeId::new(), instrument, color)
    }

    /// Creates an empty stroke with a known id.
    pub fn with_id(id: StrokeId, instrument: Instrument, color: [u8; 3]) -> Self {
        Self {
            id,
            instrument,
            color,
            points: Vec::new(),
        }
    }

    /// Appends a point without validation.
    pub(crate) fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Removes the most recently appended point.
    pub(crate) fn pop(&mut self) -> Option<Point> {
        self.points.pop()
    }

    /// Returns all points in recording order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Returns the last point, if any.
    pub fn last_point(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Returns the number of points in the stroke.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Timestamp of the first point, or 0.0 for an empty stroke.
    pub fn start_time(&self) -> f64 {
        self.points.first().map(|p| p.timestamp).unwrap_or(0.0)
    }

    /// Timestamp of the last point, or 0.0 for an empty stroke.
    pub fn end_time(&self) -> f64 {
        self.points.last().map(|p| p.timestamp).unwrap_or(0.0)
    }

    /// Time between the first and last point in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time() - self.start_time()
    }

    /// Mean horizontal position, or 0.5 for an empty stroke.
    pub fn average_x(&self) -> f32 {
        if self.points.is_empty() {
            return 0.5;
        }
        self.points.iter().map(|p| p.x).sum::<f32>() / self.points.len() as f32
    }

    /// Checks the ordering and range invariants.
    ///
    /// # Returns
    ///
    /// A description of the first violation, or None if the stroke is sound
    pub fn validate(&self) -> Option<String> {
        let mut previous: Option<f64> = None;
        for (index, point) in self.points.iter().enumerate() {
            if !point.is_finite() {
                return Some(format!("stroke {} point {} is not finite", self.id, index));
            }
            if !point.in_bounds() {
                return Some(format!("stroke {} point {} is off the canvas", self.id, index));
            }
            if previous.is_some_and(|t| point.timestamp < t) {
                return Some(format!(
                    "stroke {} point {} goes back in time",
                    self.id, index
                ));
            }
            previous = Some(point.timestamp);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(xs: &[(f32, f64)]) -> Stroke {
        let mut stroke = Stroke::new(Instrument::Piano, Instrument::Piano.color());
        for &(x, t) in xs {
            stroke.push(Point::new(x, 0.5, t, 10.0));
        }
        stroke
    }

    #[test]
    fn test_stroke_timing() {
        let s = stroke(&[(0.1, 1.0), (0.2, 1.5), (0.6, 2.25)]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.start_time(), 1.0);
        assert_eq!(s.end_time(), 2.25);
        assert_eq!(s.duration(), 1.25);
        assert!((s.average_x() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_empty_stroke_defaults() {
        let s = stroke(&[]);
        assert!(s.is_empty());
        assert_eq!(s.duration(), 0.0);
        assert_eq!(s.average_x(), 0.5);
        assert!(s.validate().is_none());
    }

    #[test]
    fn test_validate_rejects_time_reversal() {
        let s = stroke(&[(0.1, 2.0), (0.2, 1.0)]);
        assert!(s.validate().is_some());
    }

    #[test]
    fn test_stroke_ids_unique() {
        assert_ne!(StrokeId::new(), StrokeId::new());
    }
}
