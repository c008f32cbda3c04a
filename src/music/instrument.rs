//! Instruments available to the brush.
//!
//! Each instrument pairs a display colour with a procedural waveform.

use crate::audio::Waveform;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A brush instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    #[default]
    Piano,
    Guitar,
    Drums,
    Synth,
    Strings,
}

impl Instrument {
    /// All instruments in cycling order.
    pub const ALL: [Instrument; 5] = [
        Instrument::Piano,
        Instrument::Guitar,
        Instrument::Drums,
        Instrument::Synth,
        Instrument::Strings,
    ];

    /// Identifier used in project files and notifications.
    pub fn id(self) -> &'static str {
        match self {
            Instrument::Piano => "piano",
            Instrument::Guitar => "guitar",
            Instrument::Drums => "drums",
            Instrument::Synth => "synth",
            Instrument::Strings => "strings",
        }
    }

    /// Human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            Instrument::Piano => "Piano",
            Instrument::Guitar => "Guitar",
            Instrument::Drums => "Drums",
            Instrument::Synth => "Synth",
            Instrument::Strings => "Strings",
        }
    }

    /// Waveform used to voice this instrument.
    pub fn waveform(self) -> Waveform {
        match self {
            Instrument::Piano => Waveform::Sine,
            Instrument::Guitar => Waveform::Triangle,
            // Pitched square stands in for the noise kit.
            Instrument::Drums => Waveform::Square,
            Instrument::Synth => Waveform::Square,
            Instrument::Strings => Waveform::Sawtooth,
        }
    }

    /// Stroke colour as RGB.
    pub fn color(self) -> [u8; 3] {
        match self {
            Instrument::Piano => [100, 200, 255],
            Instrument::Guitar => [255, 200, 100],
            Instrument::Drums => [255, 100, 100],
            Instrument::Synth => [200, 100, 255],
            Instrument::Strings => [150, 255, 100],
        }
    }

    /// The instrument after this one, wrapping around.
    pub fn next(self) -> Instrument {
        let index = Instrument::ALL
            .iter()
            .position(|i| *i == self)
            .unwrap_or(0);
        Instrument::ALL[(index + 1) % Instrument::ALL.len()]
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Instrument::ALL
            .into_iter()
            .find(|i| i.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown instrument '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_cycle() {
        let mut instrument = Instrument::Piano;
        for _ in 0..Instrument::ALL.len() {
            instrument = instrument.next();
        }
        assert_eq!(instrument, Instrument::Piano);
        assert_eq!(Instrument::Strings.next(), Instrument::Piano);
    }

    #[test]
    fn test_instrument_waveforms() {
        assert_eq!(Instrument::Piano.waveform(), Waveform::Sine);
        assert_eq!(Instrument::Strings.waveform(), Waveform::Sawtooth);
        assert_eq!("GUITAR".parse::<Instrument>().unwrap(), Instrument::Guitar);
    }
}
