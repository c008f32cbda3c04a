//! A single sounding note owned by the mixer.

use super::envelope::{Envelope, EnvelopeStage};
use super::Waveform;
use crate::playback::NoteSource;
use std::sync::Arc;

/// Identifies a voice admitted by the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceHandle(u64);

impl VoiceHandle {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Linear fade-out applied when a voice is stolen or stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fade {
    remaining: usize,
    length: usize,
}

/// Runtime state of one note.
///
/// Plays a pre-rendered buffer from start to end. A forced release replaces
/// the remaining tail with a short linear fade.
#[derive(Debug, Clone)]
pub struct Voice {
    handle: VoiceHandle,
    pitch: u8,
    velocity: u8,
    waveform: Waveform,
    source: NoteSource,
    start: u64,
    buffer: Arc<[f32]>,
    envelope: Envelope,
    position: usize,
    fade: Option<Fade>,
}

impl Voice {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        handle: VoiceHandle,
        pitch: u8,
        velocity: u8,
        waveform: Waveform,
        source: NoteSource,
        start: u64,
        buffer: Arc<[f32]>,
        envelope: Envelope,
    ) -> Self {
        Self {
            handle,
            pitch,
            velocity,
            waveform,
            source,
            start,
            buffer,
            envelope,
            position: 0,
            fade: None,
        }
    }

    pub fn handle(&self) -> VoiceHandle {
        self.handle
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn source(&self) -> NoteSource {
        self.source
    }

    /// Mixer clock (in frames) at which this voice was admitted.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Current envelope stage. Forced releases report `Release`.
    pub fn stage(&self) -> EnvelopeStage {
        if self.is_finished() {
            EnvelopeStage::Complete
        } else if self.fade.is_some() {
            EnvelopeStage::Release
        } else {
            self.envelope.stage_at(self.position)
        }
    }

    /// Samples left before this voice completes.
    pub fn remaining(&self) -> usize {
        let natural = self.buffer.len().saturating_sub(self.position);
        match self.fade {
            Some(fade) => natural.min(fade.remaining),
            None => natural,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    /// Starts a fast fade over at most `samples` samples.
    ///
    /// Already-fading voices keep the shorter of the two fades.
    pub fn force_release(&mut self, samples: usize) {
        let length = samples.max(1).min(self.remaining());
        if length == 0 {
            return;
        }
        match self.fade {
            Some(fade) if fade.remaining <= length => {}
            _ => {
                self.fade = Some(Fade {
                    remaining: length,
                    length,
                })
            }
        }
    }

    /// Produces the next sample, or 0.0 once finished.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.is_finished() {
            return 0.0;
        }
        let mut value = self.buffer[self.position];
        self.position += 1;

        if let Some(fade) = self.fade.as_mut() {
            fade.remaining -= 1;
            value *= fade.remaining as f32 / fade.length as f32;
        }
        value
    }
}
