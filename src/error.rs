//! Error types for engine operations.

use crate::canvas::StrokeId;
use thiserror::Error;

/// Errors surfaced by the stroke store, project I/O and sequencer.
///
/// Polyphony overflow, clock drift, empty undo/redo and audio underruns are
/// recovered internally and never appear here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The stroke id does not name the stroke currently being drawn.
    #[error("stroke {0} is not open")]
    InvalidStroke(StrokeId),

    /// A point was rejected (non-finite coordinates or time going backwards).
    #[error("invalid point: {0}")]
    InvalidPoint(String),

    /// Playback was requested for a project with no strokes.
    #[error("project has no strokes to play")]
    EmptyProject,

    /// A project file failed to parse or validate.
    #[error("malformed project: {0}")]
    MalformedProject(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
