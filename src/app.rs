//! Engine context and event handling.
//!
//! This module defines the application state that coordinates the stroke
//! store, the mixer and the sequencer. It is the single object the live
//! input, scheduling and audio contexts share; every piece of mutable state
//! sits behind its own short-lived lock.
//!
//! Lock order is `live` before `store` or `sequencer`; the store and the
//! sequencer are never held together.

use crate::audio::Mixer;
use crate::canvas::{Point, Project, StrokeId, StrokeStore};
use crate::config::{EngineConfig, PreviewConfig};
use crate::error::Result;
use crate::gesture::{Gesture, GestureFrame};
use crate::music::{note_to_name, Instrument, SpatialMapper};
use crate::notify::{AccompanimentPart, Notification, Notifier, PlaybackStatus};
use crate::playback::{
    AccompanimentLevel, AccompanimentParts, DrumPattern, NoteEvent, NoteSource, PlaybackMode, PlaybackState,
    Sequencer, TickOutcome,
};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default brush width in pixels.
pub const DEFAULT_THICKNESS: f32 = 10.0;

/// Project file format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveFormat {
    /// JSON project file (human-readable).
    #[default]
    Json,
    /// Binary project file (compact).
    Binary,
}

impl SaveFormat {
    /// Picks the format for a path: `.bin` is binary, anything else JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") => SaveFormat::Binary,
            _ => SaveFormat::Json,
        }
    }
}

/// Time and distance gate for live preview notes.
#[derive(Debug, Clone, Default)]
struct PreviewGate {
    last_time: Option<f64>,
    last_position: (f32, f32),
    last_pitch: Option<u8>,
}

impl PreviewGate {
    /// Decides whether a preview note may fire now, recording it if so.
    fn admit(&mut self, config: &PreviewConfig, time: f64, position: (f32, f32), pitch: u8) -> bool {
        let elapsed = self.last_time.map_or(f64::INFINITY, |t| time - t);
        let dx = position.0 - self.last_position.0;
        let dy = position.1 - self.last_position.1;
        let distance = (dx * dx + dy * dy).sqrt();

        let due = elapsed >= config.min_interval
            || (distance >= config.min_distance && elapsed >= config.distance_interval);
        if !due {
            return false;
        }
        if self.last_pitch == Some(pitch) && elapsed < config.repeat_window {
            return false;
        }

        self.last_time = Some(time);
        self.last_position = position;
        self.last_pitch = Some(pitch);
        true
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// State owned by the live-input context.
#[derive(Debug)]
struct LiveInput {
    /// Stroke being drawn by the current Draw gesture.
    stroke: Option<StrokeId>,
    instrument: Instrument,
    thickness: f32,
    /// Whether drawing produces preview notes.
    sound_enabled: bool,
    /// Gesture from the previous frame; one-shot gestures act on change.
    last_gesture: Gesture,
    preview: PreviewGate,
}

/// The engine context.
///
/// Shared by reference (usually inside an `Arc`) between the live-input,
/// scheduling and audio-output contexts.
#[derive(Debug)]
pub struct App {
    config: EngineConfig,
    store: Mutex<StrokeStore>,
    mixer: Arc<Mixer>,
    sequencer: Mutex<Sequencer>,
    live: Mutex<LiveInput>,
    notifier: Notifier,
}

impl App {
    /// Creates an engine with an empty drawing.
    ///
    /// # Arguments
    ///
    /// * `config` - Engine settings
    /// * `notifier` - Destination for outbound notifications
    pub fn new(config: EngineConfig, notifier: Notifier) -> Self {
        let store = StrokeStore::new(config.history_limit, notifier.clone());
        let mixer = Arc::new(Mixer::new(&config));
        let sequencer = Sequencer::new(&config);
        Self {
            store: Mutex::new(store),
            mixer,
            sequencer: Mutex::new(sequencer),
            live: Mutex::new(LiveInput {
                stroke: None,
                instrument: Instrument::default(),
                thickness: DEFAULT_THICKNESS,
                sound_enabled: true,
                last_gesture: Gesture::None,
                preview: PreviewGate::default(),
            }),
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The mixer, for the audio-output context.
    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    // ---- Live input ----

    /// Applies one gesture frame.
    ///
    /// While a project is playing, drawing is disabled and only a fist
    /// (stop) is honoured.
    ///
    /// # Errors
    ///
    /// `InvalidPoint` if a drawing frame carries an unusable position
    pub fn handle_frame(&self, frame: &GestureFrame) -> Result<()> {
        let gesture = frame.effective_gesture(self.config.min_confidence);
        let mut live = self.live();
        let onset = gesture != live.last_gesture;
        live.last_gesture = gesture;

        if self.sequencer().state() != PlaybackState::Stopped {
            self.end_live_stroke(&mut live);
            if gesture == Gesture::Fist && onset {
                self.stop_playback();
            }
            return Ok(());
        }

        match gesture {
            Gesture::Draw => match frame.tip {
                Some((x, y)) => self.draw_at(&mut live, x, y, frame.time)?,
                None => self.end_live_stroke(&mut live),
            },
            Gesture::Select | Gesture::None => self.end_live_stroke(&mut live),
            Gesture::Fist => {
                self.end_live_stroke(&mut live);
                if onset {
                    live.sound_enabled = !live.sound_enabled;
                    tracing::info!(enabled = live.sound_enabled, "Live sound toggled");
                    self.notifier.send(Notification::LiveSoundToggled {
                        enabled: live.sound_enabled,
                    });
                }
            }
            Gesture::OpenPalm => {
                self.end_live_stroke(&mut live);
                if onset {
                    let next = live.instrument.next();
                    Self::change_instrument(&mut live, next, &self.notifier);
                }
            }
        }
        Ok(())
    }

    /// Selects the brush instrument. Takes effect on the next stroke.
    pub fn set_instrument(&self, instrument: Instrument) {
        let mut live = self.live();
        Self::change_instrument(&mut live, instrument, &self.notifier);
    }

    pub fn instrument(&self) -> Instrument {
        self.live().instrument
    }

    /// Sets the brush width in pixels.
    pub fn set_thickness(&self, thickness: f32) {
        let mapping = &self.config.mapping;
        if thickness.is_finite() {
            self.live().thickness = thickness.clamp(mapping.min_thickness, mapping.max_thickness);
        }
    }

    pub fn thickness(&self) -> f32 {
        self.live().thickness
    }

    /// Enables or disables live preview notes.
    pub fn set_sound_enabled(&self, enabled: bool) {
        self.live().sound_enabled = enabled;
        self.notifier.send(Notification::LiveSoundToggled { enabled });
    }

    pub fn sound_enabled(&self) -> bool {
        self.live().sound_enabled
    }

    fn change_instrument(live: &mut LiveInput, instrument: Instrument, notifier: &Notifier) {
        live.instrument = instrument;
        tracing::info!(instrument = %instrument, "Instrument changed");
        notifier.send(Notification::InstrumentChanged { instrument });
    }

    fn draw_at(&self, live: &mut LiveInput, x: f32, y: f32, time: f64) -> Result<()> {
        let mut store = self.store();
        let open = store.open_stroke().map(|s| s.id);
        let id = match live.stroke {
            Some(id) if open == Some(id) => id,
            _ => {
                let id = store.begin_stroke(live.instrument, live.instrument.color());
                live.stroke = Some(id);
                live.preview.reset();
                id
            }
        };

        let point = Point::new(x, y, time, live.thickness);
        store.append_point(id, point)?;

        if !live.sound_enabled {
            return Ok(());
        }
        let settings = store.settings();
        let mapper = SpatialMapper::new(
            self.config.mapping.clone(),
            settings.scale,
            settings.root_note,
        );
        drop(store);

        let pitch = mapper.map_pitch(point.x, 1.0);
        if !live
            .preview
            .admit(&self.config.preview, time, (point.x, point.y), pitch)
        {
            return Ok(());
        }
        let event = NoteEvent::new(
            0.0,
            pitch,
            mapper.map_duration(point.y, 1.0),
            mapper.map_velocity(point.thickness),
            live.instrument.waveform(),
            NoteSource::Live,
        )
        .at(point.x, point.y);
        self.play(&event);
        Ok(())
    }

    fn end_live_stroke(&self, live: &mut LiveInput) {
        let Some(id) = live.stroke.take() else {
            return;
        };
        let mut store = self.store();
        // The stroke may already be closed by an undo or a clear.
        if store.open_stroke().map(|s| s.id) == Some(id) {
            if let Err(e) = store.end_stroke(id) {
                tracing::warn!(error = %e, "Failed to end live stroke");
            }
        }
    }

    /// Sends a note to the mixer and reports it.
    fn play(&self, event: &NoteEvent) {
        self.mixer.trigger(event);
        let (x, y) = match event.position {
            Some((x, y)) => (Some(x), Some(y)),
            None => (None, None),
        };
        self.notifier.send(Notification::NoteTriggered {
            pitch: event.pitch,
            name: note_to_name(event.pitch),
            velocity: event.velocity,
            source: event.source,
            x,
            y,
        });
    }

    // ---- Drawing history ----

    /// Undoes the last drawing command.
    pub fn undo(&self) -> bool {
        let mut live = self.live();
        live.stroke = None;
        self.store().undo()
    }

    /// Redoes the last undone drawing command.
    pub fn redo(&self) -> bool {
        let mut live = self.live();
        live.stroke = None;
        self.store().redo()
    }

    /// Removes every stroke (undoable).
    pub fn clear(&self) {
        let mut live = self.live();
        live.stroke = None;
        self.store().clear();
        self.mixer.stop_all();
    }

    /// Number of completed strokes.
    pub fn stroke_count(&self) -> usize {
        self.store().stroke_count()
    }

    /// Copies the completed drawing into a project.
    pub fn snapshot(&self) -> Project {
        self.store().snapshot()
    }

    /// Runs `f` with mutable access to the drawing's settings.
    pub fn update_settings<F: FnOnce(&mut Project)>(&self, f: F) {
        f(self.store().settings_mut());
    }

    // ---- Playback ----

    /// Starts replaying the current drawing.
    ///
    /// # Arguments
    ///
    /// * `mode` - Scan or timeline layout
    /// * `bpm` - Playback tempo; defaults to the project tempo
    ///
    /// # Errors
    ///
    /// `EmptyProject` if nothing has been drawn
    pub fn start_playback(&self, mode: PlaybackMode, bpm: Option<u32>) -> Result<()> {
        let project = {
            let mut live = self.live();
            self.end_live_stroke(&mut live);
            self.snapshot()
        };
        self.start_project(Arc::new(project), mode, bpm)
    }

    /// Starts replaying a given project without touching the drawing.
    pub fn start_project(
        &self,
        project: Arc<Project>,
        mode: PlaybackMode,
        bpm: Option<u32>,
    ) -> Result<()> {
        let bpm = bpm.unwrap_or(project.bpm);
        let mut sequencer = self.sequencer();
        sequencer.start(project, mode, bpm)?;

        // Render every scheduled note up front so ticks only hit the cache.
        let notes: Vec<_> = sequencer
            .events()
            .iter()
            .map(|e| (e.pitch, e.duration, e.velocity, e.waveform))
            .collect();
        let rendered = self.mixer.cache().prewarm(&notes);
        tracing::debug!(rendered, "Pre-rendered playback notes");

        self.notify_playback(&sequencer, PlaybackStatus::Started);
        Ok(())
    }

    /// Pauses playback. Returns false if nothing was playing.
    pub fn pause_playback(&self) -> bool {
        let mut sequencer = self.sequencer();
        let paused = sequencer.pause();
        if paused {
            self.notify_playback(&sequencer, PlaybackStatus::Paused);
        }
        paused
    }

    /// Resumes paused playback. Returns false if nothing was paused.
    pub fn resume_playback(&self) -> bool {
        let mut sequencer = self.sequencer();
        let resumed = sequencer.resume();
        if resumed {
            self.notify_playback(&sequencer, PlaybackStatus::Resumed);
        }
        resumed
    }

    /// Stops playback and silences every voice.
    ///
    /// Once this returns, no further sequenced note reaches the mixer.
    pub fn stop_playback(&self) {
        let mut sequencer = self.sequencer();
        let was_active = sequencer.state() != PlaybackState::Stopped;
        sequencer.stop();
        self.mixer.stop_all();
        if was_active {
            self.notify_playback(&sequencer, PlaybackStatus::Stopped);
        }
    }

    /// Advances playback by `elapsed` and triggers every due note.
    ///
    /// Notes are handed to the mixer while the sequencer lock is held, so a
    /// concurrent `stop_playback` cannot interleave with delivery.
    pub fn tick(&self, elapsed: Duration) -> TickOutcome {
        let mut sequencer = self.sequencer();
        let outcome = sequencer.tick(elapsed);
        for event in &outcome.events {
            self.play(event);
        }
        if outcome.finished {
            self.notifier.send(Notification::Playback {
                state: PlaybackStatus::Ended,
                scan_x: 1.0,
                progress: 100.0,
            });
        }
        outcome
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.sequencer().state()
    }

    /// Scan line position in [0, 1].
    pub fn scan_x(&self) -> f32 {
        self.sequencer().scan_x()
    }

    /// Playback progress as a percentage.
    pub fn progress(&self) -> f32 {
        self.sequencer().progress()
    }

    fn notify_playback(&self, sequencer: &Sequencer, state: PlaybackStatus) {
        self.notifier.send(Notification::Playback {
            state,
            scan_x: sequencer.scan_x(),
            progress: sequencer.progress(),
        });
    }

    // ---- Accompaniment ----

    pub fn set_drums(&self, enabled: bool) {
        self.sequencer().accompaniment_mut().set_drums(enabled);
        self.notify_part(AccompanimentPart::Drums, enabled);
    }

    pub fn set_bass(&self, enabled: bool) {
        self.sequencer().accompaniment_mut().set_bass(enabled);
        self.notify_part(AccompanimentPart::Bass, enabled);
    }

    pub fn set_chords(&self, enabled: bool) {
        self.sequencer().accompaniment_mut().set_chords(enabled);
        self.notify_part(AccompanimentPart::Chords, enabled);
    }

    pub fn set_metronome(&self, enabled: bool) {
        self.sequencer().accompaniment_mut().set_metronome(enabled);
        self.notify_part(AccompanimentPart::Metronome, enabled);
    }

    /// Sets the metronome loudness (0.0 to 1.0).
    pub fn set_metronome_level(&self, level: f32) {
        self.sequencer()
            .accompaniment_mut()
            .set_metronome_level(level);
    }

    /// Applies an accompaniment preset and reports every part.
    pub fn set_accompaniment_level(&self, level: AccompanimentLevel) {
        let (drums, bass, chords) = {
            let mut sequencer = self.sequencer();
            let accompaniment = sequencer.accompaniment_mut();
            accompaniment.set_level(level);
            (
                accompaniment.drums_enabled(),
                accompaniment.bass_enabled(),
                accompaniment.chords_enabled(),
            )
        };
        self.notify_part(AccompanimentPart::Drums, drums);
        self.notify_part(AccompanimentPart::Bass, bass);
        self.notify_part(AccompanimentPart::Chords, chords);
    }

    pub fn set_drum_pattern(&self, pattern: DrumPattern) {
        self.sequencer().accompaniment_mut().set_pattern(pattern);
    }

    /// Replaces the accompaniment selection and reports every part.
    pub fn set_accompaniment_parts(&self, parts: AccompanimentParts) {
        self.sequencer().accompaniment_mut().set_parts(parts);
        self.notify_part(AccompanimentPart::Drums, parts.drums);
        self.notify_part(AccompanimentPart::Bass, parts.bass);
        self.notify_part(AccompanimentPart::Chords, parts.chords);
        self.notify_part(AccompanimentPart::Metronome, parts.metronome);
    }

    /// Current accompaniment selection.
    pub fn accompaniment_parts(&self) -> AccompanimentParts {
        self.sequencer().accompaniment().parts()
    }

    fn notify_part(&self, part: AccompanimentPart, enabled: bool) {
        tracing::info!(?part, enabled, "Accompaniment toggled");
        self.notifier
            .send(Notification::AccompanimentToggled { part, enabled });
    }

    // ---- Persistence ----

    /// Saves the completed drawing (JSON, or binary for `.bin`).
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn save_project<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let project = self.snapshot();
        match SaveFormat::from_path(path) {
            SaveFormat::Json => project.save_to_file(path)?,
            SaveFormat::Binary => project.save_to_binary(path)?,
        }
        tracing::info!(path = %path.display(), strokes = project.stroke_count(), "Saved project");
        Ok(())
    }

    /// Loads a project file, replacing the drawing and stopping playback.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is malformed; the current
    /// drawing is kept in that case
    pub fn load_project<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let project = match SaveFormat::from_path(path) {
            SaveFormat::Json => Project::load_from_file(path),
            SaveFormat::Binary => Project::load_from_binary(path),
        }
        .inspect_err(|e| tracing::warn!(path = %path.display(), error = %e, "Load failed"))?;

        self.install_project(project)
    }

    /// Replaces the drawing with `project` and stops playback.
    pub fn install_project(&self, project: Project) -> Result<()> {
        self.stop_playback();
        let mut live = self.live();
        live.stroke = None;
        self.store().load(project)
    }

    fn store(&self) -> MutexGuard<'_, StrokeStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sequencer(&self) -> MutexGuard<'_, Sequencer> {
        self.sequencer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> MutexGuard<'_, LiveInput> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
