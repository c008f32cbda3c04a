//! Real-time audio output.
//!
//! Streams the mixer to the default output device through rodio. The device
//! callback pulls fixed-size blocks and never waits on the mixer lock; if the
//! lock is busy the block is played as silence.

use super::Mixer;
use crate::config::EngineConfig;
use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamHandle, Source};
use std::sync::Arc;
use std::time::Duration;

/// Audio source that pulls interleaved blocks from the mixer.
/// Implements rodio's Source trait for playback.
pub struct MixerSource {
    mixer: Arc<Mixer>,
    /// Interleaved block, `block_frames * channels` samples.
    buffer: Vec<i16>,
    /// Next sample to hand out.
    pos: usize,
    channels: u16,
    sample_rate: u32,
}

impl MixerSource {
    /// Creates a source reading from `mixer`.
    ///
    /// # Arguments
    ///
    /// * `mixer` - The mixer to stream
    /// * `config` - Sample rate, channel count and block size
    pub fn new(mixer: Arc<Mixer>, config: &EngineConfig) -> Self {
        let channels = config.channels.max(1);
        let len = config.mixer.block_frames.max(1) * channels as usize;
        Self {
            mixer,
            buffer: vec![0; len],
            pos: len, // Start at end to trigger first render
            channels,
            sample_rate: config.sample_rate,
        }
    }
}

impl Iterator for MixerSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.pos >= self.buffer.len() {
            self.mixer
                .try_render(&mut self.buffer, self.channels as usize);
            self.pos = 0;
        }
        let sample = self.buffer[self.pos];
        self.pos += 1;
        Some(sample)
    }
}

impl Source for MixerSource {
    fn current_frame_len(&self) -> Option<usize> {
        None // Continuous stream
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None // Infinite stream
    }
}

/// An open output device playing the mixer.
///
/// Audio stops when this is dropped.
pub struct AudioOutput {
    /// Audio output stream (must be kept alive).
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
}

impl AudioOutput {
    /// Opens the default output device and starts streaming.
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available or playback cannot start
    pub fn open(mixer: Arc<Mixer>, config: &EngineConfig) -> Result<Self> {
        let (stream, stream_handle) =
            OutputStream::try_default().context("Failed to open audio output")?;

        let source = MixerSource::new(mixer, config);
        stream_handle
            .play_raw(source.convert_samples())
            .context("Failed to start audio playback")?;

        tracing::info!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            block_frames = config.mixer.block_frames,
            "Audio output started"
        );
        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Waveform;
    use crate::playback::{NoteEvent, NoteSource};

    #[test]
    fn test_source_is_silent_without_voices() {
        let config = EngineConfig::default();
        let mixer = Arc::new(Mixer::new(&config));
        let source = MixerSource::new(mixer, &config);
        assert_eq!(source.channels(), 2);
        assert!(source.take(2048).all(|s| s == 0));
    }

    #[test]
    fn test_source_streams_triggered_note() {
        let config = EngineConfig::default();
        let mixer = Arc::new(Mixer::new(&config));
        let source = MixerSource::new(Arc::clone(&mixer), &config);
        mixer.trigger(&NoteEvent::new(
            0.0,
            69,
            0.2,
            100,
            Waveform::Sine,
            NoteSource::Live,
        ));
        let peak = source.take(4096).map(|s| s.unsigned_abs()).max().unwrap_or(0);
        assert!(peak > 0);
    }
}
