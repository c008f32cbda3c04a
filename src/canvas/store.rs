//! Mutable drawing state with undo/redo.
//!
//! The store owns the completed strokes, the stroke currently being drawn,
//! and the command history. Every successful mutation, undo and redo emits a
//! `HistoryChanged` notification; the store does not know who listens.

use super::point::Point;
use super::project::Project;
use super::stroke::{Stroke, StrokeId};
use crate::error::{EngineError, Result};
use crate::history::{Command, HistoryManager};
use crate::music::Instrument;
use crate::notify::{Notification, Notifier};

/// Drawing state shared by the live-input and loading paths.
#[derive(Debug)]
pub struct StrokeStore {
    /// Completed strokes in recording order.
    strokes: Vec<Stroke>,
    /// Stroke currently being drawn.
    open: Option<Stroke>,
    history: HistoryManager,
    /// Project settings (bpm, scale, ...) carried into snapshots.
    settings: Project,
    notifier: Notifier,
}

impl StrokeStore {
    /// Creates an empty store.
    ///
    /// # Arguments
    ///
    /// * `history_limit` - Maximum number of undoable commands
    /// * `notifier` - Destination for change notifications
    pub fn new(history_limit: usize, notifier: Notifier) -> Self {
        Self {
            strokes: Vec::new(),
            open: None,
            history: HistoryManager::new(history_limit),
            settings: Project::default(),
            notifier,
        }
    }

    /// Opens a new stroke, ending any stroke still open.
    ///
    /// # Returns
    ///
    /// The id of the new stroke
    pub fn begin_stroke(&mut self, instrument: Instrument, color: [u8; 3]) -> StrokeId {
        if let Some(open) = self.open.as_ref().map(|s| s.id) {
            self.close_open(open);
        }

        let id = StrokeId::new();
        let command = Command::BeginStroke {
            id,
            instrument,
            color,
        };
        self.apply(&command);
        self.commit(command);
        id
    }

    /// Appends a point to the open stroke.
    ///
    /// # Errors
    ///
    /// * `InvalidStroke` if `id` is not the open stroke
    /// * `InvalidPoint` if the point is not finite, lies off the canvas, or
    ///   is earlier than the previous point
    ///
    /// Nothing changes on error.
    pub fn append_point(&mut self, id: StrokeId, point: Point) -> Result<()> {
        let open = self
            .open
            .as_ref()
            .filter(|s| s.id == id)
            .ok_or(EngineError::InvalidStroke(id))?;

        if !point.is_finite() {
            return Err(EngineError::InvalidPoint(format!(
                "non-finite point {:?}",
                point
            )));
        }
        if !point.in_bounds() {
            return Err(EngineError::InvalidPoint(format!(
                "point ({}, {}) is off the canvas",
                point.x, point.y
            )));
        }
        if let Some(last) = open.last_point() {
            if point.timestamp < last.timestamp {
                return Err(EngineError::InvalidPoint(format!(
                    "timestamp {} is earlier than {}",
                    point.timestamp, last.timestamp
                )));
            }
        }

        let command = Command::AppendPoint { id, point };
        self.apply(&command);
        self.commit(command);
        Ok(())
    }

    /// Closes the open stroke.
    ///
    /// A stroke with no points is discarded instead of being kept.
    ///
    /// # Errors
    ///
    /// `InvalidStroke` if `id` is not the open stroke
    pub fn end_stroke(&mut self, id: StrokeId) -> Result<()> {
        if self.open.as_ref().map(|s| s.id) != Some(id) {
            return Err(EngineError::InvalidStroke(id));
        }
        self.close_open(id);
        Ok(())
    }

    /// Removes every stroke. Does nothing if the store is already empty.
    pub fn clear(&mut self) {
        if let Some(open) = self.open.as_ref().map(|s| s.id) {
            self.close_open(open);
        }
        if self.strokes.is_empty() {
            return;
        }
        let command = Command::Clear {
            strokes: self.strokes.clone(),
        };
        self.apply(&command);
        self.commit(command);
    }

    /// Reverts the most recent command.
    ///
    /// # Returns
    ///
    /// false if there was nothing to undo
    pub fn undo(&mut self) -> bool {
        let Some(command) = self.history.undo().cloned() else {
            return false;
        };
        tracing::debug!(command = command.description(), "Undo");
        self.revert(&command);
        self.notify();
        true
    }

    /// Re-applies the most recently undone command.
    ///
    /// # Returns
    ///
    /// false if there was nothing to redo
    pub fn redo(&mut self) -> bool {
        let Some(command) = self.history.redo().cloned() else {
            return false;
        };
        tracing::debug!(command = command.description(), "Redo");
        self.apply(&command);
        self.notify();
        true
    }

    /// Completed strokes in recording order.
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// The stroke currently being drawn, if any.
    pub fn open_stroke(&self) -> Option<&Stroke> {
        self.open.as_ref()
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    /// Total points across completed and open strokes.
    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(Stroke::len).sum::<usize>()
            + self.open.as_ref().map_or(0, Stroke::len)
    }

    /// Returns true if there are no strokes, open or completed.
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.open.is_none()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    /// Project settings used for snapshots.
    pub fn settings(&self) -> &Project {
        &self.settings
    }

    /// Mutable project settings (bpm, scale, name, ...).
    pub fn settings_mut(&mut self) -> &mut Project {
        &mut self.settings
    }

    /// Copies the completed strokes into a standalone project.
    ///
    /// The open stroke is not included.
    pub fn snapshot(&self) -> Project {
        let mut project = self.settings.clone();
        project.set_strokes(self.strokes.clone());
        project
    }

    /// Replaces the drawing with a project's strokes and resets history.
    ///
    /// # Errors
    ///
    /// `MalformedProject` if the project fails validation; the store is left
    /// untouched in that case
    pub fn load(&mut self, project: Project) -> Result<()> {
        project.validate()?;

        let mut settings = project;
        let strokes = settings.take_strokes();
        tracing::info!(
            name = %settings.name,
            strokes = strokes.len(),
            "Loaded project into stroke store"
        );

        self.settings = settings;
        self.strokes = strokes;
        self.open = None;
        self.history.clear();
        self.notify();
        Ok(())
    }

    /// Ends the open stroke, discarding it if it has no points.
    fn close_open(&mut self, id: StrokeId) {
        let command = match self.open.as_ref() {
            Some(stroke) if stroke.is_empty() => Command::DiscardStroke {
                stroke: stroke.clone(),
            },
            Some(_) => Command::EndStroke { id },
            None => return,
        };
        self.apply(&command);
        self.commit(command);
    }

    fn commit(&mut self, command: Command) {
        self.history.record(command);
        self.notify();
    }

    fn apply(&mut self, command: &Command) {
        match command {
            Command::BeginStroke {
                id,
                instrument,
                color,
            } => {
                self.open = Some(Stroke::with_id(*id, *instrument, *color));
            }
            Command::AppendPoint { point, .. } => {
                if let Some(stroke) = self.open.as_mut() {
                    stroke.push(*point);
                }
            }
            Command::EndStroke { .. } => {
                if let Some(stroke) = self.open.take() {
                    self.strokes.push(stroke);
                }
            }
            Command::DiscardStroke { .. } => {
                self.open = None;
            }
            Command::Clear { .. } => {
                self.strokes.clear();
            }
        }
    }

    fn revert(&mut self, command: &Command) {
        match command {
            Command::BeginStroke { .. } => {
                self.open = None;
            }
            Command::AppendPoint { .. } => {
                if let Some(stroke) = self.open.as_mut() {
                    stroke.pop();
                }
            }
            Command::EndStroke { .. } => {
                self.open = self.strokes.pop();
            }
            Command::DiscardStroke { stroke } => {
                self.open = Some(stroke.clone());
            }
            Command::Clear { strokes } => {
                self.strokes = strokes.clone();
            }
        }
    }

    fn notify(&self) {
        self.notifier.send(Notification::HistoryChanged {
            strokes: self.strokes.len(),
            undo_depth: self.history.undo_depth(),
            redo_depth: self.history.redo_depth(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StrokeStore {
        StrokeStore::new(512, Notifier::detached())
    }

    fn point(x: f32, t: f64) -> Point {
        Point::new(x, 0.5, t, 10.0)
    }

    fn draw(store: &mut StrokeStore, xs: &[f32]) -> StrokeId {
        let id = store.begin_stroke(Instrument::Piano, Instrument::Piano.color());
        for (i, x) in xs.iter().enumerate() {
            store.append_point(id, point(*x, i as f64 * 0.1)).unwrap();
        }
        store.end_stroke(id).unwrap();
        id
    }

    #[test]
    fn test_draw_stroke() {
        let mut store = store();
        draw(&mut store, &[0.1, 0.2, 0.3]);
        assert_eq!(store.stroke_count(), 1);
        assert_eq!(store.point_count(), 3);
        assert!(store.open_stroke().is_none());
        // begin + 3 appends + end
        assert_eq!(store.undo_depth(), 5);
    }

    #[test]
    fn test_append_to_closed_stroke_rejected() {
        let mut store = store();
        let id = draw(&mut store, &[0.1]);
        let depth = store.undo_depth();
        assert!(matches!(
            store.append_point(id, point(0.2, 1.0)),
            Err(EngineError::InvalidStroke(_))
        ));
        assert!(matches!(
            store.append_point(StrokeId::new(), point(0.2, 1.0)),
            Err(EngineError::InvalidStroke(_))
        ));
        assert_eq!(store.undo_depth(), depth);
        assert_eq!(store.point_count(), 1);
    }

    #[test]
    fn test_invalid_points_rejected() {
        let mut store = store();
        let id = store.begin_stroke(Instrument::Synth, Instrument::Synth.color());
        store.append_point(id, point(0.5, 1.0)).unwrap();
        assert!(matches!(
            store.append_point(id, point(0.6, 0.5)),
            Err(EngineError::InvalidPoint(_))
        ));
        assert!(matches!(
            store.append_point(id, Point::new(f32::NAN, 0.5, 2.0, 10.0)),
            Err(EngineError::InvalidPoint(_))
        ));
        assert_eq!(store.point_count(), 1);
    }

    #[test]
    fn test_end_stroke_errors_when_not_open() {
        let mut store = store();
        assert!(store.end_stroke(StrokeId::new()).is_err());
    }

    #[test]
    fn test_empty_stroke_discarded() {
        let mut store = store();
        let id = store.begin_stroke(Instrument::Guitar, Instrument::Guitar.color());
        store.end_stroke(id).unwrap();
        assert_eq!(store.stroke_count(), 0);
        assert!(store.is_empty());

        // Undoing the discard reopens the empty stroke
        assert!(store.undo());
        assert_eq!(store.open_stroke().map(|s| s.id), Some(id));
    }

    #[test]
    fn test_begin_closes_open_stroke() {
        let mut store = store();
        let first = store.begin_stroke(Instrument::Piano, [0, 0, 0]);
        store.append_point(first, point(0.1, 0.0)).unwrap();
        let second = store.begin_stroke(Instrument::Drums, [0, 0, 0]);
        assert_eq!(store.stroke_count(), 1);
        assert_eq!(store.strokes()[0].id, first);
        assert_eq!(store.open_stroke().map(|s| s.id), Some(second));
    }

    #[test]
    fn test_appends_then_undos_restore_empty() {
        let mut store = store();
        draw(&mut store, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        draw(&mut store, &[0.7, 0.8]);

        let mutations = store.undo_depth();
        for _ in 0..mutations {
            assert!(store.undo());
        }
        assert!(store.is_empty());
        assert_eq!(store.point_count(), 0);
        assert!(!store.undo());
    }

    #[test]
    fn test_append_undo_removes_point() {
        let mut store = store();
        let id = store.begin_stroke(Instrument::Piano, [0, 0, 0]);
        for i in 0..4 {
            store.append_point(id, point(0.1 * i as f32, i as f64)).unwrap();
        }
        for _ in 0..4 {
            assert!(store.undo());
        }
        let open = store.open_stroke().unwrap();
        assert_eq!(open.id, id);
        assert!(open.is_empty());
    }

    #[test]
    fn test_undo_redo_restores_state() {
        let mut store = store();
        draw(&mut store, &[0.1, 0.2]);
        draw(&mut store, &[0.3, 0.4, 0.5]);
        let before = store.snapshot();

        assert!(store.undo());
        assert!(store.redo());
        assert_eq!(store.snapshot().strokes(), before.strokes());

        store.clear();
        assert_eq!(store.stroke_count(), 0);
        assert!(store.undo());
        assert_eq!(store.snapshot().strokes(), before.strokes());
        assert!(store.redo());
        assert_eq!(store.stroke_count(), 0);
        assert!(!store.redo());
    }

    #[test]
    fn test_new_mutation_discards_redo() {
        let mut store = store();
        draw(&mut store, &[0.1]);
        store.undo();
        assert_eq!(store.redo_depth(), 1);
        draw(&mut store, &[0.2]);
        assert_eq!(store.redo_depth(), 0);
        assert!(!store.redo());
    }

    #[test]
    fn test_clear_when_empty_is_noop() {
        let mut store = store();
        store.clear();
        assert_eq!(store.undo_depth(), 0);
    }

    #[test]
    fn test_notifications_report_depths() {
        let (notifier, receiver) = Notifier::channel();
        let mut store = StrokeStore::new(512, notifier);
        draw(&mut store, &[0.1]);
        store.undo();

        let last = receiver.try_iter().last().unwrap();
        assert_eq!(
            last,
            Notification::HistoryChanged {
                strokes: 0,
                undo_depth: 2,
                redo_depth: 1,
            }
        );
    }

    #[test]
    fn test_load_replaces_and_resets_history() {
        let mut source = store();
        draw(&mut source, &[0.1, 0.9]);
        let mut project = source.snapshot();
        project.name = "Loaded".to_string();

        let mut store = store();
        draw(&mut store, &[0.5]);
        store.load(project.clone()).unwrap();
        assert_eq!(store.strokes(), project.strokes());
        assert_eq!(store.settings().name, "Loaded");
        assert_eq!(store.undo_depth(), 0);
        assert!(!store.undo());
    }

    #[test]
    fn test_load_rejects_malformed_without_changes() {
        let mut store = store();
        draw(&mut store, &[0.5]);
        let mut project = Project::new("Bad");
        project.bpm = 10;
        assert!(matches!(
            store.load(project),
            Err(EngineError::MalformedProject(_))
        ));
        assert_eq!(store.stroke_count(), 1);
        assert_eq!(store.undo_depth(), 3);
    }
}
