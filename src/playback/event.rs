//! Note events exchanged between the mapper, sequencer and mixer.

use crate::audio::Waveform;
use serde::{Deserialize, Serialize};

/// Where a note came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteSource {
    /// Triggered by the live drawing path.
    Live,
    /// Replayed from a saved project.
    Sequenced,
    /// Produced by the accompaniment generator.
    Accompaniment,
}

/// A request to sound one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Trigger time in beats from the start of playback (0 for live notes).
    pub time: f64,
    /// MIDI note number.
    pub pitch: u8,
    /// Sounding length in seconds.
    pub duration: f32,
    /// Note velocity (0-127).
    pub velocity: u8,
    pub waveform: Waveform,
    pub source: NoteSource,
    /// Canvas position the note was derived from, if any (normalized).
    pub position: Option<(f32, f32)>,
}

impl NoteEvent {
    /// Creates an event with no canvas position.
    pub fn new(
        time: f64,
        pitch: u8,
        duration: f32,
        velocity: u8,
        waveform: Waveform,
        source: NoteSource,
    ) -> Self {
        Self {
            time,
            pitch: pitch.min(127),
            duration,
            velocity: velocity.min(127),
            waveform,
            source,
            position: None,
        }
    }

    /// Attaches the canvas position the note was derived from.
    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Some((x, y));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_event_clamping() {
        let event = NoteEvent::new(0.0, 200, 0.2, 255, Waveform::Sine, NoteSource::Live);
        assert_eq!(event.pitch, 127);
        assert_eq!(event.velocity, 127);
        assert_eq!(event.position, None);
        assert_eq!(event.at(0.25, 0.5).position, Some((0.25, 0.5)));
    }
}
