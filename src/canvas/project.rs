//! Saved drawing container.
//!
//! A project is the immutable record of a finished drawing: its strokes in
//! recording order plus the musical settings needed to replay it. Projects
//! are persisted as pretty JSON or compact bincode.

use super::stroke::{Stroke, StrokeId};
use crate::error::{EngineError, Result};
use crate::music::{Scale, DEFAULT_BPM, DEFAULT_ROOT, MAX_BPM, MIN_BPM};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current project file schema version.
pub const PROJECT_SCHEMA_VERSION: u32 = 1;

/// Default canvas size in pixels.
pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;

/// Rhythmic grid that playback times snap to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantize {
    Off,
    Quarter,
    #[default]
    Eighth,
    Sixteenth,
}

impl Quantize {
    /// Grid size in beats, or None when quantization is off.
    pub fn grid_beats(self) -> Option<f64> {
        match self {
            Quantize::Off => None,
            Quantize::Quarter => Some(1.0),
            Quantize::Eighth => Some(0.5),
            Quantize::Sixteenth => Some(0.25),
        }
    }

    /// Snaps a time in beats to the nearest grid line.
    pub fn apply(self, beats: f64) -> f64 {
        match self.grid_beats() {
            Some(grid) => (beats / grid).round() * grid,
            None => beats,
        }
    }
}

impl fmt::Display for Quantize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Quantize::Off => "off",
            Quantize::Quarter => "1/4",
            Quantize::Eighth => "1/8",
            Quantize::Sixteenth => "1/16",
        };
        f.write_str(label)
    }
}

impl FromStr for Quantize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Quantize::Off),
            "1/4" | "quarter" => Ok(Quantize::Quarter),
            "1/8" | "eighth" => Ok(Quantize::Eighth),
            "1/16" | "sixteenth" => Ok(Quantize::Sixteenth),
            other => Err(format!("unknown quantize grid '{}'", other)),
        }
    }
}

/// A saved drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// File schema version.
    pub version: u32,

    /// Project name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Tempo in beats per minute.
    pub bpm: u32,

    /// Scale notes are snapped to.
    #[serde(default)]
    pub scale: Scale,

    /// Root note of the scale.
    #[serde(default = "default_root")]
    pub root_note: u8,

    /// Playback quantization grid.
    #[serde(default)]
    pub quantize: Quantize,

    /// Canvas width in pixels (display metadata).
    #[serde(default = "default_width")]
    pub width: u32,

    /// Canvas height in pixels (display metadata).
    #[serde(default = "default_height")]
    pub height: u32,

    /// Creation time as seconds since the Unix epoch.
    #[serde(default)]
    pub created_at: u64,

    /// Strokes in recording order.
    strokes: Vec<Stroke>,
}

fn default_name() -> String {
    "Untitled".to_string()
}

fn default_root() -> u8 {
    DEFAULT_ROOT
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

impl Project {
    /// Creates an empty project with default settings.
    ///
    /// # Arguments
    ///
    /// * `name` - Project name
    ///
    /// # Returns
    ///
    /// A new Project at 120 BPM in the pentatonic scale rooted on C4
    pub fn new(name: impl Into<String>) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            version: PROJECT_SCHEMA_VERSION,
            name: name.into(),
            bpm: DEFAULT_BPM,
            scale: Scale::default(),
            root_note: DEFAULT_ROOT,
            quantize: Quantize::default(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            created_at,
            strokes: Vec::new(),
        }
    }

    /// Appends a stroke, keeping recording order.
    pub fn add_stroke(&mut self, stroke: Stroke) -> StrokeId {
        let id = stroke.id;
        self.strokes.push(stroke);
        id
    }

    /// Replaces every stroke, keeping the project settings.
    pub(crate) fn set_strokes(&mut self, strokes: Vec<Stroke>) {
        self.strokes = strokes;
    }

    /// Moves the strokes out, leaving the settings with none.
    pub(crate) fn take_strokes(&mut self) -> Vec<Stroke> {
        std::mem::take(&mut self.strokes)
    }

    /// Returns all strokes in recording order.
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    /// Total number of points across all strokes.
    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(Stroke::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// Total duration in seconds: the latest timestamp of any point.
    pub fn duration(&self) -> f64 {
        self.strokes
            .iter()
            .flat_map(|s| s.points())
            .map(|p| p.timestamp)
            .fold(0.0, f64::max)
    }

    /// Checks every invariant a loaded project must satisfy.
    ///
    /// # Errors
    ///
    /// Returns `MalformedProject` describing the first violation
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 || self.version > PROJECT_SCHEMA_VERSION {
            return Err(EngineError::MalformedProject(format!(
                "unsupported schema version {}",
                self.version
            )));
        }
        if !(MIN_BPM..=MAX_BPM).contains(&self.bpm) {
            return Err(EngineError::MalformedProject(format!(
                "bpm {} outside {}..={}",
                self.bpm, MIN_BPM, MAX_BPM
            )));
        }
        if self.root_note > 127 {
            return Err(EngineError::MalformedProject(format!(
                "root note {} out of range",
                self.root_note
            )));
        }

        let mut seen = HashSet::with_capacity(self.strokes.len());
        for stroke in &self.strokes {
            if !seen.insert(stroke.id) {
                return Err(EngineError::MalformedProject(format!(
                    "duplicate stroke id {}",
                    stroke.id
                )));
            }
            if let Some(problem) = stroke.validate() {
                return Err(EngineError::MalformedProject(problem));
            }
        }
        Ok(())
    }

    /// Serializes the project to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses and validates a project from JSON.
    ///
    /// # Errors
    ///
    /// Returns `MalformedProject` if parsing or validation fails
    pub fn from_json(json: &str) -> Result<Self> {
        let project: Project = serde_json::from_str(json)
            .map_err(|e| EngineError::MalformedProject(e.to_string()))?;
        project.validate()?;
        Ok(project)
    }

    /// Serializes the project to bincode.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| EngineError::MalformedProject(e.to_string()))
    }

    /// Parses and validates a project from bincode.
    ///
    /// # Errors
    ///
    /// Returns `MalformedProject` if decoding or validation fails
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        let project: Project =
            bincode::deserialize(data).map_err(|e| EngineError::MalformedProject(e.to_string()))?;
        project.validate()?;
        Ok(project)
    }

    /// Saves the project to a JSON file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the output file
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = self
            .to_json()
            .map_err(|e| EngineError::MalformedProject(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Loads a project from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if file reading, parsing or validation fails
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Saves the project to binary format.
    ///
    /// Uses bincode for efficient serialization of point data.
    pub fn save_to_binary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = self.to_binary()?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Loads a project from binary format.
    ///
    /// # Errors
    ///
    /// Returns error if file reading, decoding or validation fails
    pub fn load_from_binary<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        Self::from_binary(&data)
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new(default_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Point;
    use crate::music::Instrument;

    fn sample_project() -> Project {
        let mut project = Project::new("Test");
        for (i, instrument) in [Instrument::Piano, Instrument::Strings].into_iter().enumerate() {
            let mut stroke = Stroke::new(instrument, instrument.color());
            for k in 0..5 {
                let t = i as f64 + k as f64 * 0.1;
                stroke.push(Point::new(0.1 + 0.15 * k as f32, 0.4, t, 12.0));
            }
            project.add_stroke(stroke);
        }
        project
    }

    #[test]
    fn test_project_creation() {
        let project = Project::new("Test");
        assert_eq!(project.name, "Test");
        assert_eq!(project.bpm, 120);
        assert_eq!(project.version, PROJECT_SCHEMA_VERSION);
        assert!(project.is_empty());
        assert_eq!(project.duration(), 0.0);
    }

    #[test]
    fn test_duration_is_latest_timestamp() {
        let project = sample_project();
        assert!((project.duration() - 1.4).abs() < 1e-9);
        assert_eq!(project.point_count(), 10);
    }

    #[test]
    fn test_json_round_trip() {
        let project = sample_project();
        let json = project.to_json().unwrap();
        let loaded = Project::from_json(&json).unwrap();
        assert_eq!(loaded, project);
    }

    #[test]
    fn test_binary_round_trip_via_file() {
        let project = sample_project();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawing.bin");
        project.save_to_binary(&path).unwrap();
        let loaded = Project::load_from_binary(&path).unwrap();
        assert_eq!(loaded, project);

        let json_path = dir.path().join("drawing.json");
        project.save_to_file(&json_path).unwrap();
        assert_eq!(Project::load_from_file(&json_path).unwrap(), project);
    }

    #[test]
    fn test_malformed_projects_rejected() {
        assert!(matches!(
            Project::from_json("{not json"),
            Err(EngineError::MalformedProject(_))
        ));

        let mut project = sample_project();
        project.bpm = 500;
        let json = project.to_json().unwrap();
        assert!(matches!(
            Project::from_json(&json),
            Err(EngineError::MalformedProject(_))
        ));

        let mut project = sample_project();
        project.version = PROJECT_SCHEMA_VERSION + 1;
        let json = project.to_json().unwrap();
        assert!(Project::from_json(&json).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Project::load_from_file(dir.path().join("missing.json"));
        assert!(matches!(result, Err(EngineError::Io(_))));
    }

    #[test]
    fn test_quantize_grid() {
        assert_eq!(Quantize::Eighth.apply(1.3), 1.5);
        assert_eq!(Quantize::Quarter.apply(1.3), 1.0);
        assert_eq!(Quantize::Sixteenth.apply(1.3), 1.25);
        assert_eq!(Quantize::Off.apply(1.3), 1.3);
        assert_eq!("1/16".parse::<Quantize>().unwrap(), Quantize::Sixteenth);
        assert_eq!(Quantize::Eighth.to_string(), "1/8");
    }
}
