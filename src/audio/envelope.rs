//! ADSR amplitude envelope laid out over a fixed note length.
//!
//! Notes have a known duration, so the envelope is planned up front: attack
//! and decay take their configured lengths (truncated if the note is too
//! short), release is truncated to whatever is left, and sustain fills the
//! remainder. The final sample of every envelope is exactly zero.

use crate::config::AdsrConfig;

/// Envelope phase of a sounding voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Attack,
    Decay,
    Sustain,
    Release,
    Complete,
}

/// Segment lengths, in samples, for one note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    attack: usize,
    decay: usize,
    sustain: usize,
    release: usize,
    /// Configured (untruncated) attack and decay lengths; ramps keep their
    /// slope when truncated.
    full_attack: usize,
    full_decay: usize,
    sustain_level: f32,
}

impl Envelope {
    /// Plans an envelope covering exactly `total` samples.
    pub fn plan(config: &AdsrConfig, total: usize, sample_rate: u32) -> Self {
        let to_samples = |secs: f32| -> usize {
            if secs.is_finite() && secs > 0.0 {
                (secs as f64 * sample_rate as f64).round() as usize
            } else {
                0
            }
        };
        let full_attack = to_samples(config.attack);
        let full_decay = to_samples(config.decay);
        let full_release = to_samples(config.release);

        let mut attack = full_attack.min(total);
        let mut decay = full_decay.min(total - attack);
        let mut release = full_release.min(total - attack - decay);

        // Reserve one sample so the note always lands on zero. It comes out
        // of sustain when there is any, else out of the ramps.
        if release == 0 && total > 0 {
            release = 1;
            if attack + decay == total {
                if decay > 0 {
                    decay -= 1;
                } else {
                    attack -= 1;
                }
            }
        }

        Self {
            attack,
            decay,
            sustain: total - attack - decay - release,
            release,
            full_attack,
            full_decay,
            sustain_level: config.sustain_level.clamp(0.0, 1.0),
        }
    }

    /// Total length in samples.
    pub fn len(&self) -> usize {
        self.attack + self.decay + self.sustain + self.release
    }

    /// Returns true for a zero-length envelope.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sustain segment length in samples.
    pub fn sustain_samples(&self) -> usize {
        self.sustain
    }

    /// Release segment length in samples.
    pub fn release_samples(&self) -> usize {
        self.release
    }

    /// Which stage the sample at `index` belongs to.
    pub fn stage_at(&self, index: usize) -> EnvelopeStage {
        let decay_start = self.attack;
        let sustain_start = decay_start + self.decay;
        let release_start = sustain_start + self.sustain;
        if index < decay_start {
            EnvelopeStage::Attack
        } else if index < sustain_start {
            EnvelopeStage::Decay
        } else if index < release_start {
            EnvelopeStage::Sustain
        } else if index < self.len() {
            EnvelopeStage::Release
        } else {
            EnvelopeStage::Complete
        }
    }

    /// Iterates the gain of every sample.
    pub fn gains(&self) -> EnvelopeGains {
        EnvelopeGains {
            envelope: *self,
            index: 0,
            level: 0.0,
            release_from: 0.0,
        }
    }

    fn attack_level(&self, k: usize) -> f32 {
        (k + 1) as f32 / self.full_attack.max(1) as f32
    }

    fn decay_level(&self, k: usize) -> f32 {
        let progress = (k + 1) as f32 / self.full_decay.max(1) as f32;
        1.0 - (1.0 - self.sustain_level) * progress
    }
}

/// Per-sample gain iterator returned by [`Envelope::gains`].
#[derive(Debug, Clone)]
pub struct EnvelopeGains {
    envelope: Envelope,
    index: usize,
    level: f32,
    release_from: f32,
}

impl Iterator for EnvelopeGains {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let env = &self.envelope;
        if self.index >= env.len() {
            return None;
        }

        let sustain_start = env.attack + env.decay;
        let release_start = sustain_start + env.sustain;
        let i = self.index;

        let level = if i < env.attack {
            env.attack_level(i)
        } else if i < sustain_start {
            env.decay_level(i - env.attack)
        } else if i < release_start {
            env.sustain_level
        } else {
            if i == release_start {
                // Release ramps down from wherever the earlier stages left off.
                self.release_from = self.level;
            }
            let k = i - release_start;
            self.release_from * (env.release - 1 - k) as f32 / env.release as f32
        };

        self.level = level;
        self.index += 1;
        Some(level)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.envelope.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EnvelopeGains {}
