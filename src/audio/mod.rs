//! Procedural synthesis, mixing and audio output.
//!
//! This module provides:
//! - Oscillators and ADSR envelopes for single notes
//! - A note cache shared by all voices
//! - A polyphonic mixer with oldest-first voice stealing
//! - Real-time output via rodio and offline WAV export via hound

mod envelope;
pub mod export;
mod mixer;
pub mod output;
mod synth;
mod voice;
mod waveform;

pub use envelope::{Envelope, EnvelopeStage};
pub use export::{export_to_wav, render_project};
pub use mixer::{soft_clip, Mixer, MixerStats};
pub use output::{AudioOutput, MixerSource};
pub use synth::{NoteCache, NoteKey, VoiceSynthesizer};
pub use voice::{Voice, VoiceHandle};
pub use waveform::Waveform;
