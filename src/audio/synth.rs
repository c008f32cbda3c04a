//! Procedural note synthesis.
//!
//! Renders one note into a finite mono buffer: oscillator, ADSR envelope,
//! velocity scaling and clipping. Rendering is a pure function of its
//! inputs, which is what makes saved projects replay identically.

use super::envelope::Envelope;
use super::Waveform;
use crate::config::{AdsrConfig, EngineConfig};
use crate::music::note_to_freq;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

/// Renders note buffers from pitch, duration, velocity and waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSynthesizer {
    sample_rate: u32,
    envelope: AdsrConfig,
    voice_gain: f32,
}

impl VoiceSynthesizer {
    pub fn new(sample_rate: u32, envelope: AdsrConfig, voice_gain: f32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            envelope,
            voice_gain: voice_gain.clamp(0.0, 1.0),
        }
    }

    /// Builds a synthesizer from engine settings.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.sample_rate, config.envelope, config.mixer.voice_gain)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples a note of `duration` seconds occupies.
    pub fn samples_for(&self, duration: f32) -> usize {
        if duration.is_finite() && duration > 0.0 {
            (duration as f64 * self.sample_rate as f64).round() as usize
        } else {
            0
        }
    }

    /// Plans the envelope for a note of `samples` length.
    pub fn envelope_for(&self, samples: usize) -> Envelope {
        Envelope::plan(&self.envelope, samples, self.sample_rate)
    }

    /// Renders one note.
    ///
    /// # Arguments
    ///
    /// * `pitch` - MIDI note number
    /// * `duration` - Note length in seconds
    /// * `velocity` - Note velocity (0-127)
    /// * `waveform` - Oscillator shape
    ///
    /// # Returns
    ///
    /// Mono samples in [-1, 1], `round(duration * sample_rate)` long and
    /// ending at zero
    pub fn synthesize(&self, pitch: u8, duration: f32, velocity: u8, waveform: Waveform) -> Vec<f32> {
        let samples = self.samples_for(duration);
        let freq = note_to_freq(pitch.min(127));
        let amplitude = velocity.min(127) as f64 / 127.0 * self.voice_gain as f64;
        let rate = self.sample_rate as f64;

        self.envelope_for(samples)
            .gains()
            .enumerate()
            .map(|(n, gain)| {
                let t = n as f64 / rate;
                let value = waveform.sample(freq, t) * gain as f64 * amplitude;
                value.clamp(-1.0, 1.0) as f32
            })
            .collect()
    }
}

/// Cache key for a rendered note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteKey {
    pub pitch: u8,
    pub samples: usize,
    pub velocity: u8,
    pub waveform: Waveform,
}

/// Shared cache of rendered notes.
///
/// Buffers are immutable once rendered, so voices share them through `Arc`.
#[derive(Debug)]
pub struct NoteCache {
    synth: VoiceSynthesizer,
    buffers: Mutex<HashMap<NoteKey, Arc<[f32]>>>,
    capacity: usize,
}

impl NoteCache {
    /// Creates a cache holding at most `capacity` buffers.
    pub fn new(synth: VoiceSynthesizer, capacity: usize) -> Self {
        Self {
            synth,
            buffers: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    pub fn synth(&self) -> &VoiceSynthesizer {
        &self.synth
    }

    /// Returns the buffer for a note, rendering it on a miss.
    ///
    /// Rendering happens outside the cache lock.
    pub fn get(&self, pitch: u8, duration: f32, velocity: u8, waveform: Waveform) -> Arc<[f32]> {
        let key = NoteKey {
            pitch,
            samples: self.synth.samples_for(duration),
            velocity,
            waveform,
        };
        if let Some(buffer) = self.lookup(&key) {
            return buffer;
        }

        let buffer: Arc<[f32]> = self.synth.synthesize(pitch, duration, velocity, waveform).into();
        self.insert(key, Arc::clone(&buffer));
        buffer
    }

    /// Renders a batch of notes in parallel and stores them.
    ///
    /// Notes already cached, and repeats within the batch, are skipped.
    ///
    /// # Returns
    ///
    /// The number of buffers rendered
    pub fn prewarm(&self, notes: &[(u8, f32, u8, Waveform)]) -> usize {
        let mut seen = HashSet::new();
        let missing: Vec<(NoteKey, f32)> = notes
            .iter()
            .map(|&(pitch, duration, velocity, waveform)| {
                let key = NoteKey {
                    pitch,
                    samples: self.synth.samples_for(duration),
                    velocity,
                    waveform,
                };
                (key, duration)
            })
            .filter(|(key, _)| seen.insert(*key) && self.lookup(key).is_none())
            .collect();

        let rendered: Vec<(NoteKey, Arc<[f32]>)> = missing
            .into_par_iter()
            .map(|(key, duration)| {
                let buffer: Arc<[f32]> = self
                    .synth
                    .synthesize(key.pitch, duration, key.velocity, key.waveform)
                    .into();
                (key, buffer)
            })
            .collect();

        let count = rendered.len();
        for (key, buffer) in rendered {
            self.insert(key, buffer);
        }
        count
    }

    /// Number of cached buffers.
    pub fn len(&self) -> usize {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &NoteKey) -> Option<Arc<[f32]>> {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn insert(&self, key: NoteKey, buffer: Arc<[f32]>) {
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if buffers.len() >= self.capacity && !buffers.contains_key(&key) {
            buffers.clear();
        }
        buffers.insert(key, buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth() -> VoiceSynthesizer {
        VoiceSynthesizer::new(44100, AdsrConfig::default(), 0.8)
    }

    #[test]
    fn test_synthesize_length_and_tail() {
        let synth = synth();
        for duration in [0.1f32, 0.25, 0.5, 0.0123] {
            let buffer = synth.synthesize(60, duration, 100, Waveform::Sine);
            let expected = (duration as f64 * 44100.0).round() as usize;
            assert!((buffer.len() as i64 - expected as i64).abs() <= 1);
            assert_eq!(*buffer.last().unwrap(), 0.0);
        }
    }

    #[test]
    fn test_synthesize_zero_duration() {
        assert!(synth().synthesize(60, 0.0, 100, Waveform::Square).is_empty());
        assert!(synth().synthesize(60, f32::NAN, 100, Waveform::Square).is_empty());
    }

    #[test]
    fn test_synthesize_deterministic() {
        let synth = synth();
        for waveform in [
            Waveform::Sine,
            Waveform::Square,
            Waveform::Sawtooth,
            Waveform::Triangle,
        ] {
            let a = synth.synthesize(64, 0.3, 90, waveform);
            let b = synth.synthesize(64, 0.3, 90, waveform);
            let a_bits: Vec<u32> = a.iter().map(|s| s.to_bits()).collect();
            let b_bits: Vec<u32> = b.iter().map(|s| s.to_bits()).collect();
            assert_eq!(a_bits, b_bits);
        }
    }

    #[test]
    fn test_velocity_scales_output() {
        let synth = synth();
        let loud = synth.synthesize(69, 0.2, 127, Waveform::Square);
        let quiet = synth.synthesize(69, 0.2, 32, Waveform::Square);
        let peak = |b: &[f32]| b.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak(&loud) > peak(&quiet) * 3.0);
        assert!(peak(&loud) <= 1.0);
        assert!(synth.synthesize(69, 0.2, 0, Waveform::Sine).iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_cache_shares_buffers() {
        let cache = NoteCache::new(synth(), 64);
        let a = cache.get(60, 0.2, 100, Waveform::Sine);
        let b = cache.get(60, 0.2, 100, Waveform::Sine);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        let warmed = cache.prewarm(&[
            (62, 0.2, 100, Waveform::Sine),
            (64, 0.2, 100, Waveform::Triangle),
        ]);
        assert_eq!(warmed, 2);
        assert_eq!(cache.len(), 3);

        // Cached notes and duplicates are not rendered again
        let warmed = cache.prewarm(&[
            (60, 0.2, 100, Waveform::Sine),
            (65, 0.2, 100, Waveform::Sine),
            (65, 0.2, 100, Waveform::Sine),
        ]);
        assert_eq!(warmed, 1);
        assert_eq!(cache.len(), 4);
    }
}
