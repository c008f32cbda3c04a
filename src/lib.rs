//! gesturetone - A gesture-driven music engine.
//!
//! Turns a stream of hand-gesture coordinates into strokes and notes,
//! keeps an undoable drawing, and replays it as a scan-line performance
//! with optional drum, bass and chord accompaniment.

pub mod app;
pub mod audio;
pub mod canvas;
pub mod config;
pub mod error;
pub mod gesture;
pub mod history;
pub mod music;
pub mod notify;
pub mod playback;
pub mod scheduler;

// Re-export commonly used types
pub use app::App;
pub use audio::{export_to_wav, Mixer};
pub use canvas::{Point, Project, Stroke, StrokeId, StrokeStore};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use notify::{Notification, Notifier};
pub use scheduler::Scheduler;
