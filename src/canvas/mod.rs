//! Drawing data structures.
//!
//! This module provides the types for points, strokes and saved projects,
//! plus the undoable store the live-input path draws into.

mod point;
mod project;
mod store;
mod stroke;

pub use point::Point;
pub use project::{Project, Quantize, PROJECT_SCHEMA_VERSION};
pub use store::StrokeStore;
pub use stroke::{Stroke, StrokeId};
