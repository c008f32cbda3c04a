//! Spatial mapping from canvas coordinates to note parameters.
//!
//! Horizontal position controls pitch, vertical position controls duration,
//! and brush thickness controls velocity. The same mapper is used for live
//! input and for replaying saved projects, so both produce identical notes.

use super::Scale;
use crate::config::MappingConfig;

/// Stateless mapper from canvas space to pitch, duration and velocity.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialMapper {
    config: MappingConfig,
    scale: Scale,
    root: u8,
}

impl SpatialMapper {
    /// Creates a mapper for the given ranges, scale and scale root.
    pub fn new(config: MappingConfig, scale: Scale, root: u8) -> Self {
        Self {
            config,
            scale,
            root: root.min(127),
        }
    }

    /// Returns the active scale.
    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Returns the scale root note.
    pub fn root(&self) -> u8 {
        self.root
    }

    /// Returns the mapping ranges.
    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    /// Snaps a pitch to the active scale.
    pub fn quantize(&self, pitch: i32) -> i32 {
        self.scale.quantize(pitch, self.root)
    }

    /// Maps a horizontal position onto a scale note.
    ///
    /// # Arguments
    ///
    /// * `x` - Horizontal position, in the same units as `width`
    /// * `width` - Canvas width (1.0 for normalized coordinates)
    ///
    /// # Returns
    ///
    /// A note in `[min_note, max_note]` that belongs to the active scale
    pub fn map_pitch(&self, x: f32, width: f32) -> u8 {
        let (low, high) = self.note_range();
        let ratio = ratio(x, width);
        let raw = low as f32 + ratio * (high - low) as f32;
        let mut note = self.quantize(raw.floor() as i32);

        // Octave shifts keep the pitch class, so the result stays in scale.
        while note < low as i32 {
            note += 12;
        }
        while note > high as i32 {
            note -= 12;
        }
        note.clamp(0, 127) as u8
    }

    /// Maps a vertical position onto a note duration in seconds.
    ///
    /// The top of the canvas gives the longest notes.
    pub fn map_duration(&self, y: f32, height: f32) -> f32 {
        let min = self.config.min_duration.min(self.config.max_duration);
        let max = self.config.max_duration.max(self.config.min_duration);
        let ratio = ratio(y, height);
        (max - ratio * (max - min)).clamp(min, max)
    }

    /// Maps a brush thickness onto a note velocity.
    pub fn map_velocity(&self, thickness: f32) -> u8 {
        let thin = self.config.min_thickness;
        let thick = self.config.max_thickness.max(thin);
        let low = self.config.min_velocity.min(self.config.max_velocity) as f32;
        let high = self.config.max_velocity.max(self.config.min_velocity) as f32;

        let ratio = if thick > thin && thickness.is_finite() {
            ((thickness.clamp(thin, thick) - thin) / (thick - thin)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (low + ratio * (high - low)).round().clamp(low, high) as u8
    }

    fn note_range(&self) -> (u8, u8) {
        let low = self.config.min_note.min(self.config.max_note).min(127);
        let high = self.config.max_note.max(self.config.min_note).min(127);
        // Octave folding needs at least an octave of room.
        (low, high.max(low.saturating_add(11)).min(127))
    }
}

/// Position as a fraction of the extent, saturating at both ends.
fn ratio(value: f32, extent: f32) -> f32 {
    if !value.is_finite() || !extent.is_finite() || extent <= 0.0 {
        return 0.0;
    }
    (value / extent).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(scale: Scale) -> SpatialMapper {
        SpatialMapper::new(MappingConfig::default(), scale, 60)
    }

    #[test]
    fn test_pitch_in_range_and_scale() {
        for scale in Scale::ALL {
            for root in [60u8, 62, 67] {
                let mapper = SpatialMapper::new(MappingConfig::default(), scale, root);
                for step in 0..=640 {
                    let pitch = mapper.map_pitch(step as f32, 640.0);
                    assert!((48..=84).contains(&pitch), "{} out of range", pitch);
                    assert!(scale.contains(pitch as i32, root));
                }
            }
        }
    }

    #[test]
    fn test_pitch_endpoints_saturate() {
        let mapper = mapper(Scale::Chromatic);
        assert_eq!(mapper.map_pitch(0.0, 1.0), 48);
        assert_eq!(mapper.map_pitch(1.0, 1.0), 84);
        assert_eq!(mapper.map_pitch(-3.0, 1.0), 48);
        assert_eq!(mapper.map_pitch(7.5, 1.0), 84);
        assert_eq!(mapper.map_pitch(f32::NAN, 1.0), 48);
    }

    #[test]
    fn test_pitch_idempotent() {
        let mapper = mapper(Scale::Blues);
        for x in 0..100 {
            let pitch = mapper.map_pitch(x as f32 / 100.0, 1.0) as i32;
            assert_eq!(mapper.quantize(pitch), pitch);
        }
    }

    #[test]
    fn test_duration_top_is_longest() {
        let mapper = mapper(Scale::Pentatonic);
        assert!((mapper.map_duration(0.0, 1.0) - 0.5).abs() < 1e-6);
        assert!((mapper.map_duration(1.0, 1.0) - 0.1).abs() < 1e-6);
        assert!((mapper.map_duration(0.5, 1.0) - 0.3).abs() < 1e-6);
        // Saturates outside the canvas
        assert!((mapper.map_duration(-2.0, 1.0) - 0.5).abs() < 1e-6);
        assert!((mapper.map_duration(9.0, 1.0) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_velocity_clamped() {
        let mapper = mapper(Scale::Pentatonic);
        assert_eq!(mapper.map_velocity(3.0), 30);
        assert_eq!(mapper.map_velocity(30.0), 127);
        assert_eq!(mapper.map_velocity(0.0), 30);
        assert_eq!(mapper.map_velocity(300.0), 127);
        let mid = mapper.map_velocity(16.5);
        assert!(mid > 30 && mid < 127);
    }
}
