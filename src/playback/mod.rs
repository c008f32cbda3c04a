//! Playback scheduling.
//!
//! This module provides:
//! - Note events shared by every trigger path
//! - The sequencer that replays saved projects
//! - Beat-locked drum, bass and chord accompaniment

mod accompaniment;
mod event;
mod sequencer;

pub use accompaniment::{
    AccompanimentGenerator, AccompanimentLevel, AccompanimentParts, DrumPattern, PATTERN_PERIOD,
};
pub use event::{NoteEvent, NoteSource};
pub use sequencer::{PlaybackMode, PlaybackState, Sequencer, TickOutcome};
