//! Polyphonic mixer.
//!
//! The mixer owns every sounding voice. Triggers render (or fetch) the note
//! buffer before taking the lock, so the critical section is limited to
//! admitting the voice and, when the polyphony cap is reached, moving the
//! oldest voice into a short fade-out.

use super::synth::{NoteCache, VoiceSynthesizer};
use super::voice::{Voice, VoiceHandle};
use crate::config::EngineConfig;
use crate::playback::NoteEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

/// Maximum rendered notes kept in the cache.
const CACHE_CAPACITY: usize = 2048;

/// Level below which the mix passes through untouched.
const SOFT_CLIP_KNEE: f32 = 0.75;

/// Snapshot of mixer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixerStats {
    /// Voices currently counted against the polyphony cap.
    pub active: usize,
    /// Stolen or stopped voices still fading out.
    pub releasing: usize,
    /// Voices stolen since creation.
    pub steals: u64,
    /// Highest active count ever observed.
    pub peak_active: usize,
    /// Audio blocks replaced by silence because the lock was busy.
    pub underruns: u64,
}

/// State guarded by the mixer lock.
#[derive(Debug, Default)]
struct MixerState {
    /// Active voices, oldest first.
    active: VecDeque<Voice>,
    /// Voices fading out after a steal or stop.
    releasing: Vec<Voice>,
    /// Frames rendered so far.
    clock: u64,
    next_handle: u64,
    steals: u64,
    peak_active: usize,
    /// Mono scratch buffer reused across blocks.
    scratch: Vec<f32>,
}

/// Sums active voices into an interleaved 16-bit stream.
#[derive(Debug)]
pub struct Mixer {
    cache: NoteCache,
    state: Mutex<MixerState>,
    polyphony: usize,
    fast_release: usize,
    master_gain: f32,
    underruns: AtomicU64,
}

impl Mixer {
    /// Creates a mixer from engine settings.
    pub fn new(config: &EngineConfig) -> Self {
        let synth = VoiceSynthesizer::from_config(config);
        let fast_release = synth.samples_for(config.mixer.fast_release).max(1);
        Self {
            cache: NoteCache::new(synth, CACHE_CAPACITY),
            state: Mutex::new(MixerState::default()),
            polyphony: config.mixer.polyphony.max(1),
            fast_release,
            master_gain: config.mixer.master_gain.max(0.0),
            underruns: AtomicU64::new(0),
        }
    }

    /// Returns the polyphony cap.
    pub fn polyphony(&self) -> usize {
        self.polyphony
    }

    /// Returns the note cache.
    pub fn cache(&self) -> &NoteCache {
        &self.cache
    }

    /// Starts a voice for `event`.
    ///
    /// If the polyphony cap is reached, the oldest active voice is stolen:
    /// it stops counting as active and fades out over the fast-release time.
    ///
    /// # Returns
    ///
    /// A handle identifying the new voice
    pub fn trigger(&self, event: &NoteEvent) -> VoiceHandle {
        let buffer = self
            .cache
            .get(event.pitch, event.duration, event.velocity, event.waveform);
        let envelope = self.cache.synth().envelope_for(buffer.len());

        let mut state = self.lock();
        state.next_handle += 1;
        let handle = VoiceHandle::new(state.next_handle);

        if buffer.is_empty() {
            return handle;
        }

        while state.active.len() >= self.polyphony {
            let Some(mut oldest) = state.active.pop_front() else {
                break;
            };
            tracing::debug!(
                stolen = oldest.handle().as_u64(),
                pitch = oldest.pitch(),
                "Polyphony cap reached, stealing oldest voice"
            );
            oldest.force_release(self.fast_release);
            state.steals += 1;
            state.releasing.push(oldest);
        }

        let voice = Voice::new(
            handle,
            event.pitch,
            event.velocity,
            event.waveform,
            event.source,
            state.clock,
            buffer,
            envelope,
        );
        state.active.push_back(voice);
        state.peak_active = state.peak_active.max(state.active.len());
        handle
    }

    /// Fades out every active voice.
    pub fn stop_all(&self) {
        let mut state = self.lock();
        let fast_release = self.fast_release;
        let stopped: Vec<Voice> = state
            .active
            .drain(..)
            .map(|mut voice| {
                voice.force_release(fast_release);
                voice
            })
            .collect();
        state.releasing.extend(stopped);
        for voice in &mut state.releasing {
            voice.force_release(fast_release);
        }
    }

    /// Renders one interleaved block, waiting for the lock if needed.
    ///
    /// `out.len()` must be a multiple of `channels`.
    pub fn render(&self, out: &mut [i16], channels: usize) {
        let mut state = self.lock();
        self.mix_into(&mut state, out, channels);
    }

    /// Renders one interleaved block without blocking.
    ///
    /// If another context holds the lock, the block is filled with silence
    /// and counted as an underrun.
    ///
    /// # Returns
    ///
    /// true if the block was mixed, false if silence was emitted
    pub fn try_render(&self, out: &mut [i16], channels: usize) -> bool {
        let mut state = match self.state.try_lock() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                out.fill(0);
                self.underruns.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };
        self.mix_into(&mut state, out, channels);
        true
    }

    /// Number of voices counted against the polyphony cap.
    pub fn active_voice_count(&self) -> usize {
        self.lock().active.len()
    }

    /// Returns true if nothing is sounding.
    pub fn is_silent(&self) -> bool {
        let state = self.lock();
        state.active.is_empty() && state.releasing.is_empty()
    }

    /// Returns the current counters.
    pub fn stats(&self) -> MixerStats {
        let state = self.lock();
        MixerStats {
            active: state.active.len(),
            releasing: state.releasing.len(),
            steals: state.steals,
            peak_active: state.peak_active,
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MixerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mix_into(&self, state: &mut MixerState, out: &mut [i16], channels: usize) {
        let channels = channels.max(1);
        let frames = out.len() / channels;

        let MixerState {
            active,
            releasing,
            scratch,
            ..
        } = &mut *state;
        scratch.clear();
        scratch.resize(frames, 0.0);

        for voice in active.iter_mut().chain(releasing.iter_mut()) {
            for sample in scratch.iter_mut() {
                if voice.is_finished() {
                    break;
                }
                *sample += voice.next_sample();
            }
        }

        for (frame, value) in out.chunks_mut(channels).zip(scratch.iter()) {
            let sample = to_i16(soft_clip(value * self.master_gain));
            frame.fill(sample);
        }
        // Trailing partial frame, if any
        let whole = frames * channels;
        out[whole..].fill(0);

        active.retain(|voice| !voice.is_finished());
        releasing.retain(|voice| !voice.is_finished());
        state.clock += frames as u64;
    }
}

/// Smoothly compresses levels above the knee so the output never exceeds
/// full scale and has no slope discontinuity.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    let magnitude = x.abs();
    if magnitude <= SOFT_CLIP_KNEE {
        return x;
    }
    let headroom = 1.0 - SOFT_CLIP_KNEE;
    let over = (magnitude - SOFT_CLIP_KNEE) / headroom;
    x.signum() * (SOFT_CLIP_KNEE + headroom * over.tanh())
}

#[inline]
fn to_i16(x: f32) -> i16 {
    (x.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
