//! Gesture frames consumed by the live-input path.
//!
//! Hand tracking and classification happen outside the engine; this module
//! only defines the typed frame the tracker hands over.

use serde::{Deserialize, Serialize};

/// Classified hand pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    /// No hand, or an unrecognized pose.
    #[default]
    None,
    /// Index finger extended: the brush is down.
    Draw,
    /// Index and middle fingers extended: the brush is lifted.
    Select,
    /// Closed hand: stop playback or mute live notes.
    Fist,
    /// All fingers extended: switch instrument.
    OpenPalm,
}

/// One tracker update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureFrame {
    pub gesture: Gesture,
    /// Fingertip in normalized canvas coordinates, when a hand is visible.
    pub tip: Option<(f32, f32)>,
    /// Classifier confidence in [0, 1].
    pub confidence: f32,
    /// Seconds since the session started.
    pub time: f64,
}

impl GestureFrame {
    /// Creates a fully confident frame.
    pub fn new(gesture: Gesture, tip: Option<(f32, f32)>, time: f64) -> Self {
        Self {
            gesture,
            tip,
            confidence: 1.0,
            time,
        }
    }

    /// A drawing frame at `(x, y)`.
    pub fn draw(x: f32, y: f32, time: f64) -> Self {
        Self::new(Gesture::Draw, Some((x, y)), time)
    }

    /// Sets the classifier confidence.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// The gesture to act on, treating low-confidence frames as no hand.
    pub fn effective_gesture(&self, min_confidence: f32) -> Gesture {
        if self.confidence.is_finite() && self.confidence >= min_confidence {
            self.gesture
        } else {
            Gesture::None
        }
    }
}
