//! Procedural oscillator shapes.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt;

/// Oscillator shape used to voice a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Evaluates the waveform at time `t` seconds for frequency `freq` Hz.
    ///
    /// Output is in [-1, 1].
    #[inline]
    pub fn sample(self, freq: f64, t: f64) -> f64 {
        let phase = freq * t;
        match self {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Square => sign((TAU * phase).sin()),
            Waveform::Sawtooth => 2.0 * (phase - (0.5 + phase).floor()),
            Waveform::Triangle => 2.0 * (2.0 * (phase - (phase + 0.5).floor())).abs() - 1.0,
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        };
        f.write_str(name)
    }
}

/// Sign function with sign(0) = 0.
#[inline]
fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
    ];

    #[test]
    fn test_waveforms_bounded() {
        for waveform in ALL {
            for n in 0..2000 {
                let t = n as f64 / 44100.0;
                let value = waveform.sample(440.0, t);
                assert!((-1.0..=1.0).contains(&value), "{} at {}", waveform, t);
            }
        }
    }

    #[test]
    fn test_waveform_shapes() {
        // Quarter period of a 1 Hz wave
        assert!((Waveform::Sine.sample(1.0, 0.25) - 1.0).abs() < 1e-12);
        assert_eq!(Waveform::Square.sample(1.0, 0.25), 1.0);
        assert_eq!(Waveform::Square.sample(1.0, 0.75), -1.0);
        assert_eq!(Waveform::Square.sample(1.0, 0.0), 0.0);
        assert!((Waveform::Sawtooth.sample(1.0, 0.25) - 0.5).abs() < 1e-12);
        assert!((Waveform::Sawtooth.sample(1.0, 0.75) + 0.5).abs() < 1e-12);
        assert!((Waveform::Triangle.sample(1.0, 0.0) + 1.0).abs() < 1e-12);
        assert!((Waveform::Triangle.sample(1.0, 0.5) - 1.0).abs() < 1e-12);
    }
}
