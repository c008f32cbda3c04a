//! Project playback.
//!
//! The sequencer turns a saved project into a time-ordered list of note
//! events when playback starts, then releases them as its position advances.
//! Position is kept in beats and advanced by measured elapsed time, so late
//! or irregular ticks never drop or repeat an event: a cursor walks the list
//! and every event at or before the position fires exactly once.

use super::accompaniment::AccompanimentGenerator;
use super::event::{NoteEvent, NoteSource};
use crate::canvas::{Point, Project, Stroke};
use crate::config::{EngineConfig, MappingConfig, SequencerConfig};
use crate::error::{EngineError, Result};
use crate::music::{clamp_bpm, SpatialMapper, DEFAULT_BPM, DEFAULT_ROOT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// How recorded strokes are laid out in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// A scan line sweeps left to right; horizontal position sets the time.
    #[default]
    Scan,
    /// Points play back at (quantized) recording times.
    Timeline,
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackMode::Scan => f.write_str("scan"),
            PlaybackMode::Timeline => f.write_str("timeline"),
        }
    }
}

impl FromStr for PlaybackMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scan" => Ok(PlaybackMode::Scan),
            "timeline" => Ok(PlaybackMode::Timeline),
            other => Err(format!("unknown playback mode '{}'", other)),
        }
    }
}

/// Represents the current playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Not playing, position reset to start.
    #[default]
    Stopped,
    /// Currently playing.
    Playing,
    /// Paused at current position.
    Paused,
}

/// Result of advancing the sequencer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// Events due since the previous tick, in firing order.
    pub events: Vec<NoteEvent>,
    /// True if this tick crossed the final event and playback ended.
    pub finished: bool,
}

/// Replays a project as note events.
#[derive(Debug)]
pub struct Sequencer {
    config: SequencerConfig,
    mapping: MappingConfig,
    accompaniment: AccompanimentGenerator,
    project: Option<Arc<Project>>,
    mode: PlaybackMode,
    state: PlaybackState,
    bpm: u32,
    /// Scheduled melody events sorted by time.
    events: Vec<NoteEvent>,
    /// Index of the next event to fire.
    cursor: usize,
    /// Playback position in beats.
    position: f64,
}

impl Sequencer {
    /// Creates a stopped sequencer.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.sequencer.clone(),
            mapping: config.mapping.clone(),
            accompaniment: AccompanimentGenerator::new(
                config.accompaniment.clone(),
                DEFAULT_ROOT,
                config.mapping.min_note,
            ),
            project: None,
            mode: PlaybackMode::default(),
            state: PlaybackState::Stopped,
            bpm: DEFAULT_BPM,
            events: Vec::new(),
            cursor: 0,
            position: 0.0,
        }
    }

    /// Starts playing a project from the beginning.
    ///
    /// Any playback in progress is replaced.
    ///
    /// # Arguments
    ///
    /// * `project` - Project to replay
    /// * `mode` - Scan or timeline layout
    /// * `bpm` - Playback tempo, clamped to the supported range
    ///
    /// # Errors
    ///
    /// `EmptyProject` if the project has no strokes (or no points); the
    /// sequencer state is unchanged in that case
    pub fn start(&mut self, project: Arc<Project>, mode: PlaybackMode, bpm: u32) -> Result<()> {
        if project.is_empty() {
            return Err(EngineError::EmptyProject);
        }

        let mapper = SpatialMapper::new(self.mapping.clone(), project.scale, project.root_note);
        let events = match mode {
            PlaybackMode::Scan => self.scan_events(&project, &mapper),
            PlaybackMode::Timeline => self.timeline_events(&project, &mapper),
        };
        if events.is_empty() {
            return Err(EngineError::EmptyProject);
        }

        self.bpm = clamp_bpm(bpm);
        self.mode = mode;
        self.events = events;
        self.cursor = 0;
        self.position = 0.0;
        self.accompaniment.set_root(project.root_note);
        self.accompaniment.reset();
        self.project = Some(project);
        self.state = PlaybackState::Playing;

        tracing::info!(
            mode = %mode,
            bpm = self.bpm,
            events = self.events.len(),
            "Playback started"
        );
        Ok(())
    }

    /// Freezes playback at the current position.
    ///
    /// # Returns
    ///
    /// true if the sequencer was playing
    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        self.state = PlaybackState::Paused;
        true
    }

    /// Continues from the paused position.
    ///
    /// # Returns
    ///
    /// true if the sequencer was paused
    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }
        self.state = PlaybackState::Playing;
        true
    }

    /// Pauses when playing, resumes when paused.
    pub fn toggle_pause(&mut self) -> PlaybackState {
        match self.state {
            PlaybackState::Playing => {
                self.pause();
            }
            PlaybackState::Paused => {
                self.resume();
            }
            PlaybackState::Stopped => {}
        }
        self.state
    }

    /// Stops playback and drops every pending event.
    ///
    /// Safe to call in any state. No event is returned by `tick` after this
    /// until the next `start`.
    pub fn stop(&mut self) {
        if self.state != PlaybackState::Stopped {
            tracing::info!(fired = self.cursor, "Playback stopped");
        }
        self.reset();
    }

    /// Advances playback by `elapsed` wall-clock time.
    ///
    /// # Returns
    ///
    /// The melody and accompaniment events now due, and whether playback
    /// just reached its end
    pub fn tick(&mut self, elapsed: Duration) -> TickOutcome {
        if self.state != PlaybackState::Playing {
            return TickOutcome::default();
        }

        self.position += elapsed.as_secs_f64() * self.bpm as f64 / 60.0;

        let start = self.cursor;
        while self
            .events
            .get(self.cursor)
            .is_some_and(|e| e.time <= self.position)
        {
            self.cursor += 1;
        }
        let mut events: Vec<NoteEvent> = self.events[start..self.cursor].to_vec();

        // Accompaniment runs until the final melody event.
        let horizon = self.position.min(self.end_time());
        let backing = self.accompaniment.advance_to(horizon, self.bpm);
        if !backing.is_empty() {
            events.extend(backing);
            // Stable: melody first among events sharing a time.
            events.sort_by(|a, b| a.time.total_cmp(&b.time));
        }

        let finished = self.cursor >= self.events.len();
        if finished {
            tracing::info!(events = self.events.len(), "Playback reached the end");
            self.reset();
        }
        TickOutcome { events, finished }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Playback tempo in use.
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Playback position in beats.
    pub fn position_beats(&self) -> f64 {
        self.position
    }

    /// Horizontal position of the scan line in [0, 1].
    ///
    /// In timeline mode this is the fraction of the way to the final event.
    pub fn scan_x(&self) -> f32 {
        let span = match self.mode {
            PlaybackMode::Scan => self.config.scan_beats,
            PlaybackMode::Timeline => self.end_time(),
        };
        if span <= 0.0 {
            return 0.0;
        }
        (self.position / span).clamp(0.0, 1.0) as f32
    }

    /// Percentage of the way to the final event.
    pub fn progress(&self) -> f32 {
        if self.events.is_empty() {
            return 0.0;
        }
        let end = self.end_time();
        if end <= 0.0 {
            return if self.cursor > 0 { 100.0 } else { 0.0 };
        }
        ((self.position / end) * 100.0).clamp(0.0, 100.0) as f32
    }

    /// Number of scheduled melody events.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Number of melody events fired so far.
    pub fn fired_count(&self) -> usize {
        self.cursor
    }

    /// Scheduled melody events in firing order.
    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    /// The project being played, if any.
    pub fn project(&self) -> Option<&Arc<Project>> {
        self.project.as_ref()
    }

    pub fn accompaniment(&self) -> &AccompanimentGenerator {
        &self.accompaniment
    }

    pub fn accompaniment_mut(&mut self) -> &mut AccompanimentGenerator {
        &mut self.accompaniment
    }

    fn end_time(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.time)
    }

    fn reset(&mut self) {
        self.state = PlaybackState::Stopped;
        self.position = 0.0;
        self.cursor = 0;
        self.events.clear();
        self.project = None;
        self.accompaniment.reset();
    }

    /// Lays points out by horizontal position.
    ///
    /// Points are visited left to right. A point closer than `min_scan_gap`
    /// to the last kept point is skipped, as is a repeat of the same stroke's
    /// previous pitch within `duplicate_window` beats. Strokes never merge
    /// into each other.
    fn scan_events(&self, project: &Project, mapper: &SpatialMapper) -> Vec<NoteEvent> {
        let mut points: Vec<(usize, usize, &Stroke, &Point)> = project
            .strokes()
            .iter()
            .enumerate()
            .flat_map(|(index, stroke)| {
                stroke.points().iter().map(move |point| (index, stroke, point))
            })
            .enumerate()
            .map(|(order, (index, stroke, point))| (order, index, stroke, point))
            .collect();
        // Stable: equal x keeps recording order.
        points.sort_by(|a, b| a.3.x.total_cmp(&b.3.x));

        let gap = self.config.min_scan_gap.max(0.0);
        let mut scheduled: Vec<(usize, NoteEvent)> = Vec::new();
        let mut last_x: Option<f32> = None;
        // Last kept (pitch, time) per stroke.
        let mut last_note: Vec<Option<(u8, f64)>> = vec![None; project.strokes().len()];

        for (order, index, stroke, point) in points {
            if last_x.is_some_and(|x| (point.x - x).abs() < gap) {
                continue;
            }
            let time = project.quantize.apply(point.x as f64 * self.config.scan_beats);
            let pitch = mapper.map_pitch(point.x, 1.0);
            if let Some((previous_pitch, previous_time)) = last_note[index] {
                if previous_pitch == pitch
                    && (time - previous_time).abs() < self.config.duplicate_window
                {
                    continue;
                }
            }

            scheduled.push((order, self.note_for(mapper, stroke, point, time, pitch)));
            last_note[index] = Some((pitch, time));
            last_x = Some(point.x);
        }

        order_events(scheduled)
    }

    /// Lays points out by their recorded timestamps.
    ///
    /// Each stroke contributes roughly `timeline_samples` points. Times are
    /// measured from the earliest point in the project.
    fn timeline_events(&self, project: &Project, mapper: &SpatialMapper) -> Vec<NoteEvent> {
        let origin = project
            .strokes()
            .iter()
            .filter_map(|s| s.points().first())
            .map(|p| p.timestamp)
            .fold(f64::INFINITY, f64::min);
        let beats_per_second = clamp_bpm(project.bpm) as f64 / 60.0;
        let samples = self.config.timeline_samples.max(1);

        let mut scheduled: Vec<(usize, NoteEvent)> = Vec::new();
        let mut order = 0usize;
        for stroke in project.strokes() {
            let step = (stroke.len() / samples).max(1);
            for (index, point) in stroke.points().iter().enumerate() {
                order += 1;
                if index % step != 0 {
                    continue;
                }
                let seconds = (point.timestamp - origin).max(0.0);
                let time = project.quantize.apply(seconds * beats_per_second);
                let pitch = mapper.map_pitch(point.x, 1.0);
                scheduled.push((order, self.note_for(mapper, stroke, point, time, pitch)));
            }
        }

        order_events(scheduled)
    }

    fn note_for(
        &self,
        mapper: &SpatialMapper,
        stroke: &Stroke,
        point: &Point,
        time: f64,
        pitch: u8,
    ) -> NoteEvent {
        NoteEvent::new(
            time,
            pitch,
            mapper.map_duration(point.y, 1.0),
            mapper.map_velocity(point.thickness),
            stroke.instrument.waveform(),
            NoteSource::Sequenced,
        )
        .at(point.x, point.y)
    }
}

/// Sorts by time, breaking ties by recording order.
fn order_events(mut scheduled: Vec<(usize, NoteEvent)>) -> Vec<NoteEvent> {
    scheduled.sort_by(|(order_a, a), (order_b, b)| {
        a.time.total_cmp(&b.time).then(order_a.cmp(order_b))
    });
    scheduled.into_iter().map(|(_, event)| event).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Quantize;
    use crate::music::Instrument;

    fn stroke(points: &[(f32, f32, f64)]) -> Stroke {
        let mut stroke = Stroke::new(Instrument::Piano, Instrument::Piano.color());
        for &(x, y, t) in points {
            stroke.push(Point::new(x, y, t, 12.0));
        }
        stroke
    }

    fn three_strokes() -> Arc<Project> {
        let mut project = Project::new("Scan");
        project.quantize = Quantize::Off;
        project.add_stroke(stroke(&[(0.50, 0.5, 0.0), (0.10, 0.5, 0.1)]));
        project.add_stroke(stroke(&[(0.75, 0.2, 1.0), (0.30, 0.2, 1.1)]));
        project.add_stroke(stroke(&[(0.90, 0.8, 2.0)]));
        Arc::new(project)
    }

    fn sequencer() -> Sequencer {
        Sequencer::new(&EngineConfig::default())
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_empty_project_rejected() {
        let mut seq = sequencer();
        let result = seq.start(Arc::new(Project::new("Empty")), PlaybackMode::Scan, 120);
        assert!(matches!(result, Err(EngineError::EmptyProject)));
        assert_eq!(seq.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_scan_fires_each_event_once_in_x_order() {
        let project = three_strokes();
        let mapper = SpatialMapper::new(MappingConfig::default(), project.scale, project.root_note);
        let mut seq = sequencer();
        seq.start(Arc::clone(&project), PlaybackMode::Scan, 120).unwrap();

        let expected: Vec<(f64, u8)> = [0.10f32, 0.30, 0.50, 0.75, 0.90]
            .iter()
            .map(|x| (*x as f64 * 8.0, mapper.map_pitch(*x, 1.0)))
            .collect();
        assert_eq!(seq.event_count(), expected.len());

        // Irregular tick lengths, including zero and a long stall
        let mut fired = Vec::new();
        let mut finished = false;
        for step in [0u64, 7, 130, 3, 900, 0, 45, 1200, 16, 16, 2000].iter().cycle().take(40) {
            let outcome = seq.tick(ms(*step));
            fired.extend(outcome.events.into_iter().map(|e| (e.time, e.pitch)));
            if outcome.finished {
                finished = true;
                break;
            }
        }
        assert!(finished);
        assert_eq!(fired.len(), expected.len());
        for ((time, pitch), (want_time, want_pitch)) in fired.iter().zip(expected.iter()) {
            assert!((time - want_time).abs() < 1e-6);
            assert_eq!(pitch, want_pitch);
        }
        assert_eq!(seq.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_scan_thins_close_points() {
        let mut project = Project::new("Dense");
        project.add_stroke(stroke(&[(0.10, 0.5, 0.0), (0.11, 0.5, 0.1), (0.12, 0.5, 0.2)]));
        let mut seq = sequencer();
        seq.start(Arc::new(project), PlaybackMode::Scan, 120).unwrap();
        assert_eq!(seq.event_count(), 1);
    }

    #[test]
    fn test_identical_times_keep_recording_order() {
        // Recorded right-most first; both land on beat 4 of the eighth grid
        let mut project = Project::new("Ties");
        project.add_stroke(stroke(&[(0.52, 0.1, 0.0)]));
        let mut second = Stroke::new(Instrument::Strings, Instrument::Strings.color());
        second.push(Point::new(0.50, 0.9, 1.0, 12.0));
        project.add_stroke(second);

        let mut seq = sequencer();
        seq.config.min_scan_gap = 0.0;
        seq.start(Arc::new(project), PlaybackMode::Scan, 120).unwrap();

        let events = seq.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time, 4.0);
        assert_eq!(events[1].time, 4.0);
        assert_eq!(events[0].pitch, events[1].pitch);
        assert_eq!(events[0].waveform, Instrument::Piano.waveform());
        assert_eq!(events[1].waveform, Instrument::Strings.waveform());
    }

    #[test]
    fn test_repeats_merge_within_a_stroke_only() {
        let mut one = Project::new("One stroke");
        one.add_stroke(stroke(&[(0.500, 0.5, 0.0), (0.505, 0.5, 0.1)]));
        let mapper = SpatialMapper::new(MappingConfig::default(), one.scale, one.root_note);
        assert_eq!(mapper.map_pitch(0.500, 1.0), mapper.map_pitch(0.505, 1.0));
        let mut two = Project::new("Two strokes");
        two.add_stroke(stroke(&[(0.500, 0.5, 0.0)]));
        two.add_stroke(stroke(&[(0.505, 0.5, 1.0)]));

        let mut seq = sequencer();
        seq.config.min_scan_gap = 0.0;
        seq.start(Arc::new(one), PlaybackMode::Scan, 120).unwrap();
        assert_eq!(seq.event_count(), 1);
        seq.stop();
        seq.start(Arc::new(two), PlaybackMode::Scan, 120).unwrap();
        assert_eq!(seq.event_count(), 2);
    }

    #[test]
    fn test_position_monotonic_frozen_and_reset() {
        let mut seq = sequencer();
        seq.start(three_strokes(), PlaybackMode::Scan, 120).unwrap();

        let mut last = seq.position_beats();
        for _ in 0..10 {
            seq.tick(ms(50));
            assert!(seq.position_beats() >= last);
            last = seq.position_beats();
        }
        assert!((last - 1.0).abs() < 1e-9);

        assert!(seq.pause());
        let frozen = seq.position_beats();
        let outcome = seq.tick(ms(5000));
        assert!(outcome.events.is_empty());
        assert_eq!(seq.position_beats(), frozen);
        assert_eq!(seq.state(), PlaybackState::Paused);

        assert!(seq.resume());
        seq.tick(ms(100));
        assert!(seq.position_beats() > frozen);

        seq.stop();
        assert_eq!(seq.position_beats(), 0.0);
        assert_eq!(seq.state(), PlaybackState::Stopped);
        assert!(seq.tick(ms(10_000)).events.is_empty());
    }

    #[test]
    fn test_stop_is_not_finished() {
        let mut seq = sequencer();
        seq.start(three_strokes(), PlaybackMode::Scan, 120).unwrap();
        seq.tick(ms(100));
        seq.stop();
        let outcome = seq.tick(ms(100));
        assert!(!outcome.finished);
        assert_eq!(seq.fired_count(), 0);
    }

    #[test]
    fn test_toggle_pause() {
        let mut seq = sequencer();
        assert_eq!(seq.toggle_pause(), PlaybackState::Stopped);
        seq.start(three_strokes(), PlaybackMode::Scan, 120).unwrap();
        assert_eq!(seq.toggle_pause(), PlaybackState::Paused);
        assert_eq!(seq.toggle_pause(), PlaybackState::Playing);
    }

    #[test]
    fn test_bpm_scales_position_and_is_clamped() {
        let mut seq = sequencer();
        seq.start(three_strokes(), PlaybackMode::Scan, 1000).unwrap();
        assert_eq!(seq.bpm(), 200);
        seq.tick(ms(300));
        assert!((seq.position_beats() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_accompaniment_follows_beats() {
        let mut seq = sequencer();
        seq.accompaniment_mut().set_bass(true);
        seq.start(three_strokes(), PlaybackMode::Scan, 120).unwrap();

        let outcome = seq.tick(Duration::ZERO);
        assert_eq!(
            outcome
                .events
                .iter()
                .filter(|e| e.source == NoteSource::Accompaniment)
                .count(),
            1
        );
        let mut backing = 1;
        loop {
            let outcome = seq.tick(ms(250));
            backing += outcome
                .events
                .iter()
                .filter(|e| e.source == NoteSource::Accompaniment)
                .count();
            if outcome.finished {
                break;
            }
        }
        // Final event at 0.9 * 8 = 7.2 beats: beats 0..=7
        assert_eq!(backing, 8);
    }

    #[test]
    fn test_timeline_mode_uses_recording_time() {
        let mut seq = sequencer();
        seq.start(three_strokes(), PlaybackMode::Timeline, 120).unwrap();
        let times: Vec<f64> = seq.events().iter().map(|e| e.time).collect();
        // Quantize off; project bpm 120 => 2 beats per second
        let expected = [0.0, 0.2, 2.0, 2.2, 4.0];
        for (time, want) in times.iter().zip(expected.iter()) {
            assert!((time - want).abs() < 1e-9);
        }
        assert_eq!(seq.progress(), 0.0);
        seq.tick(ms(1000));
        assert!((seq.progress() - 50.0).abs() < 1e-3);
    }
}
