//! Undo/redo history for the stroke store.
//!
//! History is an append-only log of reversible commands with a cursor.
//! Commands before the cursor are applied; commands after it have been
//! undone and can be redone. Recording a new command truncates everything
//! after the cursor, so history never branches.

use crate::canvas::{Point, Stroke, StrokeId};
use crate::music::Instrument;
use std::collections::VecDeque;

/// One reversible change to the stroke store.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A new stroke was opened.
    BeginStroke {
        id: StrokeId,
        instrument: Instrument,
        color: [u8; 3],
    },
    /// A point was appended to the open stroke.
    AppendPoint { id: StrokeId, point: Point },
    /// The open stroke was closed and became part of the drawing.
    EndStroke { id: StrokeId },
    /// The open stroke was closed with no points and dropped.
    DiscardStroke { stroke: Stroke },
    /// All completed strokes were removed.
    Clear { strokes: Vec<Stroke> },
}

impl Command {
    /// Short label used in log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Command::BeginStroke { .. } => "begin stroke",
            Command::AppendPoint { .. } => "append point",
            Command::EndStroke { .. } => "end stroke",
            Command::DiscardStroke { .. } => "discard stroke",
            Command::Clear { .. } => "clear",
        }
    }
}

/// Bounded command log with an undo cursor.
#[derive(Debug)]
pub struct HistoryManager {
    commands: VecDeque<Command>,
    /// Number of applied commands; everything at or past it is redoable.
    cursor: usize,
    limit: usize,
}

impl HistoryManager {
    /// Creates an empty history holding at most `limit` commands.
    pub fn new(limit: usize) -> Self {
        Self {
            commands: VecDeque::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Records a command that has just been applied.
    ///
    /// Any undone commands are discarded. When the log is full, the oldest
    /// command is dropped and can no longer be undone.
    pub fn record(&mut self, command: Command) {
        self.commands.truncate(self.cursor);
        self.commands.push_back(command);
        self.cursor += 1;

        while self.commands.len() > self.limit {
            self.commands.pop_front();
            self.cursor -= 1;
        }
    }

    /// Moves the cursor back one command.
    ///
    /// # Returns
    ///
    /// The command to revert, or None if nothing can be undone
    pub fn undo(&mut self) -> Option<&Command> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.commands.get(self.cursor)
    }

    /// Moves the cursor forward one command.
    ///
    /// # Returns
    ///
    /// The command to re-apply, or None if nothing can be redone
    pub fn redo(&mut self) -> Option<&Command> {
        let command = self.commands.get(self.cursor)?;
        self.cursor += 1;
        Some(command)
    }

    /// Number of commands that can be undone.
    pub fn undo_depth(&self) -> usize {
        self.cursor
    }

    /// Number of commands that can be redone.
    pub fn redo_depth(&self) -> usize {
        self.commands.len() - self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.undo_depth() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.redo_depth() > 0
    }

    /// Clears all history.
    ///
    /// Called when a project is loaded.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end(id: StrokeId) -> Command {
        Command::EndStroke { id }
    }

    #[test]
    fn test_history_record_and_undo() {
        let mut history = HistoryManager::new(8);
        let id = StrokeId::new();
        history.record(end(id));

        assert!(history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.undo(), Some(&end(id)));
        assert!(!history.can_undo());
        assert_eq!(history.redo_depth(), 1);
        assert_eq!(history.undo(), None);
    }

    #[test]
    fn test_history_limit_drops_oldest() {
        let mut history = HistoryManager::new(4);
        let ids: Vec<StrokeId> = (0..6).map(|_| StrokeId::new()).collect();
        for id in &ids {
            history.record(end(*id));
        }
        assert_eq!(history.undo_depth(), 4);

        let undone: Vec<Command> = std::iter::from_fn(|| history.undo().cloned()).collect();
        assert_eq!(undone.len(), 4);
        assert_eq!(undone[0], end(ids[5]));
        assert_eq!(undone[3], end(ids[2]));
    }

    #[test]
    fn test_new_command_truncates_redo() {
        let mut history = HistoryManager::new(8);
        for _ in 0..3 {
            history.record(end(StrokeId::new()));
        }
        history.undo();
        history.undo();
        assert_eq!(history.undo_depth(), 1);
        assert_eq!(history.redo_depth(), 2);

        history.record(end(StrokeId::new()));
        assert_eq!(history.undo_depth(), 2);
        assert_eq!(history.redo_depth(), 0);
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_multi_level_undo_redo() {
        let mut history = HistoryManager::new(8);
        let ids: Vec<StrokeId> = (0..4).map(|_| StrokeId::new()).collect();
        for id in &ids {
            history.record(end(*id));
        }
        for _ in 0..4 {
            assert!(history.undo().is_some());
        }
        for id in &ids {
            assert_eq!(history.redo(), Some(&end(*id)));
        }
        assert_eq!(history.undo_depth(), 4);
        assert_eq!(history.redo_depth(), 0);
    }
}
