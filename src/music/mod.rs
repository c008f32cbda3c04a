//! Musical primitives shared by the live and playback paths.
//!
//! This module provides pitch naming, equal-temperament tuning, tempo
//! conversions, scales, instruments, and the spatial mapping that turns
//! canvas coordinates into notes.

mod instrument;
mod mapping;
mod scale;

pub use instrument::Instrument;
pub use mapping::SpatialMapper;
pub use scale::Scale;

/// Standard note names for display purposes.
/// Maps a pitch class (0-11) to its name.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Reference tuning pitch (A4) in Hz.
pub const TUNING_HZ: f64 = 440.0;

/// MIDI note number of the reference tuning pitch.
pub const TUNING_NOTE: u8 = 69;

/// Default tempo in beats per minute.
pub const DEFAULT_BPM: u32 = 120;

/// Slowest tempo accepted for playback.
pub const MIN_BPM: u32 = 60;

/// Fastest tempo accepted for playback.
pub const MAX_BPM: u32 = 200;

/// Default scale root (middle C).
pub const DEFAULT_ROOT: u8 = 60;

/// Converts a MIDI note number to a human-readable note name with octave.
///
/// # Arguments
///
/// * `note` - MIDI note number (0-127)
///
/// # Returns
///
/// String representation like "C4" or "F#5"
///
/// # Examples
///
/// ```
/// use gesturetone::music::note_to_name;
///
/// assert_eq!(note_to_name(60), "C4");
/// ```
pub fn note_to_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1; // MIDI octave convention
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Converts a note name to MIDI note number.
///
/// # Arguments
///
/// * `name` - Note name like "C4" or "F#5"
///
/// # Returns
///
/// MIDI note number (0-127) or None if invalid
pub fn name_to_note(name: &str) -> Option<u8> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let octave_start = name.chars().position(|c| c.is_ascii_digit() || c == '-')?;

    let note_part = &name[..octave_start];
    let octave_part = &name[octave_start..];

    let note_index = NOTE_NAMES.iter().position(|&n| n == note_part)?;
    let octave: i16 = octave_part.parse().ok()?;

    let midi_note = (octave + 1) * 12 + note_index as i16;
    u8::try_from(midi_note).ok().filter(|n| *n <= 127)
}

/// Converts a MIDI note number to its frequency in Hz.
///
/// Uses twelve-tone equal temperament referenced to A4 = 440 Hz.
pub fn note_to_freq(note: u8) -> f64 {
    TUNING_HZ * 2f64.powf((note as f64 - TUNING_NOTE as f64) / 12.0)
}

/// Converts a duration in beats to seconds at the given tempo.
pub fn beats_to_seconds(beats: f64, bpm: u32) -> f64 {
    beats * 60.0 / bpm.max(1) as f64
}

/// Converts a duration in seconds to beats at the given tempo.
pub fn seconds_to_beats(seconds: f64, bpm: u32) -> f64 {
    seconds * bpm as f64 / 60.0
}

/// Clamps a requested playback tempo to the supported range.
pub fn clamp_bpm(bpm: u32) -> u32 {
    bpm.clamp(MIN_BPM, MAX_BPM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_to_name() {
        assert_eq!(note_to_name(60), "C4");
        assert_eq!(note_to_name(69), "A4");
        assert_eq!(note_to_name(0), "C-1");
        assert_eq!(note_to_name(127), "G9");
    }

    #[test]
    fn test_name_to_note() {
        assert_eq!(name_to_note("C4"), Some(60));
        assert_eq!(name_to_note("F#5"), Some(78));
        assert_eq!(name_to_note("C-1"), Some(0));
        assert_eq!(name_to_note("H2"), None);
        assert_eq!(name_to_note("G10"), None);
    }

    #[test]
    fn test_note_to_freq() {
        assert!((note_to_freq(69) - 440.0).abs() < 1e-9);
        assert!((note_to_freq(81) - 880.0).abs() < 1e-9);
        assert!((note_to_freq(60) - 261.625_565).abs() < 1e-3);
    }

    #[test]
    fn test_beat_conversions() {
        // At 120 BPM, one beat = 0.5 seconds
        assert!((beats_to_seconds(1.0, 120) - 0.5).abs() < 1e-12);
        assert!((seconds_to_beats(0.5, 120) - 1.0).abs() < 1e-12);
        assert_eq!(clamp_bpm(10), MIN_BPM);
        assert_eq!(clamp_bpm(500), MAX_BPM);
        assert_eq!(clamp_bpm(128), 128);
    }
}
