//! Audio export functionality.
//!
//! Renders a project offline through the same sequencer and mixer used for
//! live playback, then writes the result to a WAV file.

use super::Mixer;
use crate::canvas::Project;
use crate::config::EngineConfig;
use crate::playback::{AccompanimentParts, PlaybackMode, Sequencer};
use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Longest release tail rendered after the last note, in seconds.
const MAX_TAIL_SECONDS: f64 = 2.0;

/// Samples written between progress callbacks.
const WRITE_CHUNK: usize = 4096;

/// Renders a project to interleaved 16-bit samples.
///
/// # Arguments
///
/// * `project` - The project to render
/// * `config` - Engine settings (sample rate, mixer, sequencer)
/// * `mode` - Scan or timeline layout
/// * `accompaniment` - Accompaniment parts to play along
///
/// # Errors
///
/// Returns error if the project has nothing to play
pub fn render_project(
    project: &Project,
    config: &EngineConfig,
    mode: PlaybackMode,
    accompaniment: AccompanimentParts,
) -> Result<Vec<i16>> {
    let channels = config.channels.max(1) as usize;
    let frames = config.mixer.block_frames.max(1);
    let block_duration = Duration::from_secs_f64(frames as f64 / config.sample_rate as f64);
    let max_tail = (MAX_TAIL_SECONDS * config.sample_rate as f64) as usize;

    let mut sequencer = Sequencer::new(config);
    sequencer.accompaniment_mut().set_parts(accompaniment);
    sequencer
        .start(Arc::new(project.clone()), mode, project.bpm)
        .context("Nothing to render")?;

    let mixer = Mixer::new(config);
    let notes: Vec<_> = sequencer
        .events()
        .iter()
        .map(|e| (e.pitch, e.duration, e.velocity, e.waveform))
        .collect();
    mixer.cache().prewarm(&notes);

    let mut block = vec![0i16; frames * channels];
    let mut samples = Vec::new();
    let mut tail = 0usize;
    loop {
        if sequencer.is_playing() {
            for event in sequencer.tick(block_duration).events {
                mixer.trigger(&event);
            }
        }
        mixer.render(&mut block, channels);
        samples.extend_from_slice(&block);

        if !sequencer.is_playing() {
            tail += frames;
            if mixer.is_silent() || tail >= max_tail {
                break;
            }
        }
    }

    tracing::info!(
        seconds = samples.len() as f64 / (channels as f64 * config.sample_rate as f64),
        "Rendered project"
    );
    Ok(samples)
}

/// Exports a project to a 16-bit WAV file.
///
/// # Arguments
///
/// * `project` - The project to export
/// * `config` - Engine settings
/// * `mode` - Scan or timeline layout
/// * `accompaniment` - Accompaniment parts to play along
/// * `output_path` - Path for the output WAV file
/// * `progress_callback` - Optional callback for progress updates (0.0 to 1.0)
///
/// # Errors
///
/// Returns error if:
/// - The project has nothing to play
/// - Output file cannot be created or written
pub fn export_to_wav<P, F>(
    project: &Project,
    config: &EngineConfig,
    mode: PlaybackMode,
    accompaniment: AccompanimentParts,
    output_path: P,
    mut progress_callback: Option<F>,
) -> Result<()>
where
    P: AsRef<Path>,
    F: FnMut(f32),
{
    let samples = render_project(project, config, mode, accompaniment)?;

    let spec = WavSpec {
        channels: config.channels.max(1),
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(output_path.as_ref(), spec).with_context(|| {
        format!(
            "Failed to create output WAV file: {}",
            output_path.as_ref().display()
        )
    })?;

    let total = samples.len().max(1);
    for (i, chunk) in samples.chunks(WRITE_CHUNK).enumerate() {
        for &sample in chunk {
            writer.write_sample(sample)?;
        }
        if let Some(ref mut callback) = progress_callback {
            let written = (i * WRITE_CHUNK + chunk.len()).min(total);
            callback(written as f32 / total as f32);
        }
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Point, Stroke};
    use crate::music::Instrument;
    use crate::playback::AccompanimentLevel;

    fn project() -> Project {
        let mut stroke = Stroke::new(Instrument::Piano, Instrument::Piano.color());
        for i in 0..4 {
            stroke.push(Point::new(0.1 + 0.05 * i as f32, 0.5, 0.1 * i as f64, 10.0));
        }
        let mut project = Project::new("Export");
        project.add_stroke(stroke);
        project
    }

    #[test]
    fn test_render_has_sound_and_ends() {
        let config = EngineConfig::default();
        let samples =
            render_project(&project(), &config, PlaybackMode::Scan, AccompanimentParts::default())
                .unwrap();
        assert!(!samples.is_empty());
        assert_eq!(samples.len() % config.channels as usize, 0);
        assert!(samples.iter().any(|&s| s != 0));
        // Last event is near beat 2; with the tail this stays well under 5 s
        let frames = samples.len() / config.channels as usize;
        assert!(frames < 5 * config.sample_rate as usize);
    }

    #[test]
    fn test_render_empty_project_fails() {
        let config = EngineConfig::default();
        let result = render_project(
            &Project::new("Empty"),
            &config,
            PlaybackMode::Scan,
            AccompanimentParts::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_export_writes_wav() {
        let config = EngineConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawing.wav");
        let mut last_progress = 0.0;
        export_to_wav(
            &project(),
            &config,
            PlaybackMode::Timeline,
            AccompanimentLevel::High.into(),
            &path,
            Some(|p: f32| last_progress = p),
        )
        .unwrap();
        assert!((last_progress - 1.0).abs() < 1e-6);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 44100);
        assert!(reader.len() > 0);
    }

    #[test]
    fn test_render_identical_after_json_round_trip() {
        let config = EngineConfig::default();
        let parts = AccompanimentParts {
            chords: true,
            ..AccompanimentParts::from(AccompanimentLevel::High)
        };
        let original = project();
        let reloaded = Project::from_json(&original.to_json().unwrap()).unwrap();

        let a = render_project(&original, &config, PlaybackMode::Scan, parts).unwrap();
        let b = render_project(&reloaded, &config, PlaybackMode::Scan, parts).unwrap();
        assert_eq!(a, b);
    }
}
