//! Beat-locked drum, bass, chord and metronome accompaniment.
//!
//! The generator has no clock of its own. The sequencer reports its position
//! in beats and the generator emits the notes for every whole beat crossed
//! since the previous call, so accompaniment can never drift from the melody.

use super::event::{NoteEvent, NoteSource};
use crate::audio::Waveform;
use crate::config::AccompanimentConfig;
use crate::music::beats_to_seconds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Beats per drum pattern cycle.
pub const PATTERN_PERIOD: u64 = 4;

const KICK: (u8, f32, Waveform) = (36, 0.25, Waveform::Sine);
const SNARE: (u8, f32, Waveform) = (50, 0.12, Waveform::Triangle);
const HI_HAT: (u8, f32, Waveform) = (96, 0.05, Waveform::Square);

/// Metronome clicks: accented on the first beat of each bar.
const CLICK_HIGH: (u8, f32) = (86, 0.05);
const CLICK_LOW: (u8, f32) = (79, 0.04);

/// Default metronome level.
pub const DEFAULT_METRONOME_LEVEL: f32 = 0.5;

/// Percussion pattern played by the drum part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrumPattern {
    /// Kick on beats 1 and 3, hi-hat on every beat.
    #[default]
    Basic,
    /// Kick on 1 and 3, snare on 2 and 4, hi-hat on every beat.
    Rock,
    /// Kick and hi-hat on every beat.
    FourOnFloor,
}

/// One drum voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hit {
    Kick,
    Snare,
    HiHat,
}

impl DrumPattern {
    pub const ALL: [DrumPattern; 3] = [
        DrumPattern::Basic,
        DrumPattern::Rock,
        DrumPattern::FourOnFloor,
    ];

    fn hits(self, slot: u64) -> &'static [Hit] {
        match (self, slot % PATTERN_PERIOD) {
            (DrumPattern::Basic, 0 | 2) => &[Hit::Kick, Hit::HiHat],
            (DrumPattern::Basic, _) => &[Hit::HiHat],
            (DrumPattern::Rock, 0 | 2) => &[Hit::Kick, Hit::HiHat],
            (DrumPattern::Rock, _) => &[Hit::Snare, Hit::HiHat],
            (DrumPattern::FourOnFloor, _) => &[Hit::Kick, Hit::HiHat],
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            DrumPattern::Basic => "basic",
            DrumPattern::Rock => "rock",
            DrumPattern::FourOnFloor => "four_on_floor",
        }
    }
}

impl fmt::Display for DrumPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for DrumPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DrumPattern::ALL
            .into_iter()
            .find(|p| p.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown drum pattern '{}'", s))
    }
}

/// Preset combinations of the accompaniment parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccompanimentLevel {
    /// Everything off.
    Off,
    /// Drums only.
    Low,
    /// Drums and bass.
    High,
}

impl FromStr for AccompanimentLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(AccompanimentLevel::Off),
            "low" => Ok(AccompanimentLevel::Low),
            "high" => Ok(AccompanimentLevel::High),
            other => Err(format!("unknown accompaniment level '{}'", other)),
        }
    }
}

/// Which accompaniment parts play, and the drum pattern they use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccompanimentParts {
    pub drums: bool,
    pub bass: bool,
    pub chords: bool,
    pub metronome: bool,
    pub pattern: DrumPattern,
}

impl From<AccompanimentLevel> for AccompanimentParts {
    fn from(level: AccompanimentLevel) -> Self {
        let (drums, bass) = match level {
            AccompanimentLevel::Off => (false, false),
            AccompanimentLevel::Low => (true, false),
            AccompanimentLevel::High => (true, true),
        };
        Self {
            drums,
            bass,
            ..Self::default()
        }
    }
}

/// Emits accompaniment notes on whole beats.
#[derive(Debug, Clone)]
pub struct AccompanimentGenerator {
    config: AccompanimentConfig,
    drums: bool,
    bass: bool,
    chords: bool,
    metronome: bool,
    /// Metronome loudness, 0.0 to 1.0.
    metronome_level: f32,
    pattern: DrumPattern,
    /// Index of the next beat to emit.
    next_beat: u64,
    root: u8,
    /// Lowest melody note; bass sits an octave below it.
    melody_floor: u8,
}

impl AccompanimentGenerator {
    /// Creates a generator with every part disabled.
    ///
    /// # Arguments
    ///
    /// * `config` - Velocities and note lengths
    /// * `root` - Scale root the bass and chords follow
    /// * `melody_floor` - Lowest note of the melody range
    pub fn new(config: AccompanimentConfig, root: u8, melody_floor: u8) -> Self {
        Self {
            config,
            drums: false,
            bass: false,
            chords: false,
            metronome: false,
            metronome_level: DEFAULT_METRONOME_LEVEL,
            pattern: DrumPattern::default(),
            next_beat: 0,
            root: root.min(127),
            melody_floor: melody_floor.min(127),
        }
    }

    pub fn set_drums(&mut self, enabled: bool) {
        self.drums = enabled;
    }

    pub fn set_bass(&mut self, enabled: bool) {
        self.bass = enabled;
    }

    pub fn set_chords(&mut self, enabled: bool) {
        self.chords = enabled;
    }

    pub fn set_metronome(&mut self, enabled: bool) {
        self.metronome = enabled;
    }

    /// Sets the metronome loudness, clamped to 0.0..=1.0.
    pub fn set_metronome_level(&mut self, level: f32) {
        self.metronome_level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            DEFAULT_METRONOME_LEVEL
        };
    }

    pub fn metronome_level(&self) -> f32 {
        self.metronome_level
    }

    pub fn drums_enabled(&self) -> bool {
        self.drums
    }

    pub fn bass_enabled(&self) -> bool {
        self.bass
    }

    pub fn chords_enabled(&self) -> bool {
        self.chords
    }

    pub fn metronome_enabled(&self) -> bool {
        self.metronome
    }

    /// Returns true if any part is enabled.
    pub fn is_active(&self) -> bool {
        self.drums || self.bass || self.chords || self.metronome
    }

    /// Applies a preset. Chords are left off by every preset; the metronome
    /// is not touched.
    pub fn set_level(&mut self, level: AccompanimentLevel) {
        let parts = AccompanimentParts::from(level);
        self.drums = parts.drums;
        self.bass = parts.bass;
        self.chords = false;
    }

    /// Current part selection.
    pub fn parts(&self) -> AccompanimentParts {
        AccompanimentParts {
            drums: self.drums,
            bass: self.bass,
            chords: self.chords,
            metronome: self.metronome,
            pattern: self.pattern,
        }
    }

    /// Replaces the part selection and pattern.
    pub fn set_parts(&mut self, parts: AccompanimentParts) {
        self.drums = parts.drums;
        self.bass = parts.bass;
        self.chords = parts.chords;
        self.metronome = parts.metronome;
        self.pattern = parts.pattern;
    }

    pub fn pattern(&self) -> DrumPattern {
        self.pattern
    }

    pub fn set_pattern(&mut self, pattern: DrumPattern) {
        self.pattern = pattern;
    }

    /// Changes the scale root followed by bass and chords.
    pub fn set_root(&mut self, root: u8) {
        self.root = root.min(127);
    }

    /// Index of the next beat that will be emitted.
    pub fn next_beat(&self) -> u64 {
        self.next_beat
    }

    /// Restarts the beat clock at beat 0.
    pub fn reset(&mut self) {
        self.next_beat = 0;
    }

    /// Emits notes for every whole beat at or before `position` beats.
    ///
    /// Beats are consumed even when every part is disabled, so enabling a
    /// part mid-playback starts on the next beat rather than replaying
    /// missed ones.
    ///
    /// # Arguments
    ///
    /// * `position` - Playback position in beats
    /// * `bpm` - Tempo used to size note durations
    pub fn advance_to(&mut self, position: f64, bpm: u32) -> Vec<NoteEvent> {
        let mut events = Vec::new();
        while position.is_finite() && self.next_beat as f64 <= position {
            let beat = self.next_beat;
            self.next_beat += 1;
            self.beat_events(beat, bpm, &mut events);
        }
        events
    }

    fn beat_events(&self, beat: u64, bpm: u32, events: &mut Vec<NoteEvent>) {
        let time = beat as f64;
        let beat_secs = beats_to_seconds(1.0, bpm) as f32;

        if self.drums {
            for hit in self.pattern.hits(beat) {
                let ((pitch, duration, waveform), velocity) = match hit {
                    Hit::Kick => (KICK, self.config.drum_velocity),
                    Hit::Snare => (SNARE, self.config.drum_velocity),
                    Hit::HiHat => (HI_HAT, self.config.drum_velocity / 2),
                };
                events.push(NoteEvent::new(
                    time,
                    pitch,
                    duration,
                    velocity,
                    waveform,
                    NoteSource::Accompaniment,
                ));
            }
        }

        if self.bass {
            events.push(NoteEvent::new(
                time,
                self.bass_note(),
                beat_secs * self.config.note_length,
                self.config.bass_velocity,
                Waveform::Sine,
                NoteSource::Accompaniment,
            ));
        }

        if self.chords {
            let duration = beat_secs * self.config.note_length;
            for interval in [0u8, 4, 7] {
                events.push(NoteEvent::new(
                    time,
                    self.root.saturating_add(interval).min(127),
                    duration,
                    self.config.chord_velocity,
                    Waveform::Triangle,
                    NoteSource::Accompaniment,
                ));
            }
        }

        if self.metronome {
            let (pitch, duration) = if beat % PATTERN_PERIOD == 0 {
                CLICK_HIGH
            } else {
                CLICK_LOW
            };
            let velocity =
                (self.config.metronome_velocity as f32 * self.metronome_level).round() as u8;
            if velocity > 0 {
                events.push(NoteEvent::new(
                    time,
                    pitch,
                    duration,
                    velocity,
                    Waveform::Sine,
                    NoteSource::Accompaniment,
                ));
            }
        }
    }

    /// Scale root pitch class, one octave below the melody range.
    fn bass_note(&self) -> u8 {
        let pitch_class = self.root % 12;
        let octave_base = (self.melody_floor / 12) * 12;
        (octave_base + pitch_class).saturating_sub(12)
    }
}
