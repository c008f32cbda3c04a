//! Engine configuration.
//!
//! Every tunable of the engine lives here. All sections deserialize with
//! defaults, so a config file only needs the values it overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Output sample rate (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// Interleaved output channels (stereo).
pub const CHANNELS: u16 = 2;

/// Top-level configuration for an engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub mapping: MappingConfig,
    pub envelope: AdsrConfig,
    pub mixer: MixerConfig,
    pub sequencer: SequencerConfig,
    pub accompaniment: AccompanimentConfig,
    pub preview: PreviewConfig,
    /// Maximum number of undoable commands kept by the stroke store.
    pub history_limit: usize,
    /// Gesture frames below this confidence are treated as "no hand".
    pub min_confidence: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            mapping: MappingConfig::default(),
            envelope: AdsrConfig::default(),
            mixer: MixerConfig::default(),
            sequencer: SequencerConfig::default(),
            accompaniment: AccompanimentConfig::default(),
            preview: PreviewConfig::default(),
            history_limit: 512,
            min_confidence: 0.5,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the configuration to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if file reading or parsing fails
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Ranges used by the spatial mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Lowest melodic note (C3).
    pub min_note: u8,
    /// Highest melodic note (C6).
    pub max_note: u8,
    /// Shortest note duration in seconds (bottom of the canvas).
    pub min_duration: f32,
    /// Longest note duration in seconds (top of the canvas).
    pub max_duration: f32,
    pub min_velocity: u8,
    pub max_velocity: u8,
    /// Thinnest brush, in pixels.
    pub min_thickness: f32,
    /// Thickest brush, in pixels.
    pub max_thickness: f32,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            min_note: 48,
            max_note: 84,
            min_duration: 0.1,
            max_duration: 0.5,
            min_velocity: 30,
            max_velocity: 127,
            min_thickness: 3.0,
            max_thickness: 30.0,
        }
    }
}

/// Attack/decay/sustain/release envelope settings. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsrConfig {
    pub attack: f32,
    pub decay: f32,
    pub sustain_level: f32,
    pub release: f32,
}

impl Default for AdsrConfig {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.05,
            sustain_level: 0.7,
            release: 0.1,
        }
    }
}

/// Mixer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Maximum simultaneously active voices.
    pub polyphony: usize,
    /// Fade applied to stolen or force-stopped voices, in seconds.
    pub fast_release: f32,
    /// Per-voice peak level before velocity scaling.
    pub voice_gain: f32,
    /// Gain applied to the summed mix before soft clipping.
    pub master_gain: f32,
    /// Frames rendered per block by the audio output.
    pub block_frames: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            polyphony: 16,
            fast_release: 0.005,
            voice_gain: 0.8,
            master_gain: 0.5,
            block_frames: 256,
        }
    }
}

/// Playback scheduling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Length of one left-to-right sweep in beats (4 s at 120 BPM).
    pub scan_beats: f64,
    /// Minimum horizontal distance between scanned points (normalized).
    pub min_scan_gap: f32,
    /// Same-pitch scan events closer than this (beats) are merged.
    pub duplicate_window: f64,
    /// Approximate number of points sampled from each stroke in timeline mode.
    pub timeline_samples: usize,
    /// Interval between scheduler ticks, in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            scan_beats: 8.0,
            min_scan_gap: 1.0 / 32.0,
            duplicate_window: 0.2,
            timeline_samples: 8,
            tick_interval_ms: 10,
        }
    }
}

/// Accompaniment voicing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccompanimentConfig {
    pub drum_velocity: u8,
    pub bass_velocity: u8,
    pub chord_velocity: u8,
    /// Metronome velocity at full level.
    pub metronome_velocity: u8,
    /// Fraction of a beat that bass and chord notes sound for.
    pub note_length: f32,
}

impl Default for AccompanimentConfig {
    fn default() -> Self {
        Self {
            drum_velocity: 100,
            bass_velocity: 90,
            chord_velocity: 60,
            metronome_velocity: 100,
            note_length: 0.9,
        }
    }
}

/// Gating for live preview notes while drawing.
///
/// A preview note fires when enough time has passed since the last one, or
/// when the tip has moved far enough and a shorter floor interval has passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Seconds after which a preview note may always fire.
    pub min_interval: f64,
    /// Normalized distance that allows an early note.
    pub min_distance: f32,
    /// Floor interval for distance-triggered notes, in seconds.
    pub distance_interval: f64,
    /// A repeated pitch is suppressed within this many seconds.
    pub repeat_window: f64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            min_interval: 0.08,
            min_distance: 0.047,
            distance_interval: 0.02,
            repeat_window: 0.15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let json = r#"{ "mixer": { "polyphony": 8 }, "history_limit": 20 }"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.mixer.polyphony, 8);
        assert_eq!(config.history_limit, 20);
        // Untouched fields keep their defaults
        assert_eq!(config.mixer.block_frames, 256);
        assert_eq!(config.sample_rate, SAMPLE_RATE);
        assert_eq!(config.mapping, MappingConfig::default());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = EngineConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }
}
