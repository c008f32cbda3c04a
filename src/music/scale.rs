//! Musical scales and pitch quantization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A scale identifier with a fixed interval set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Major,
    Minor,
    #[default]
    Pentatonic,
    Blues,
    Chromatic,
}

impl Scale {
    /// All scales, in display order.
    pub const ALL: [Scale; 5] = [
        Scale::Major,
        Scale::Minor,
        Scale::Pentatonic,
        Scale::Blues,
        Scale::Chromatic,
    ];

    /// Semitone offsets from the root, ascending and starting at 0.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Pentatonic => &[0, 2, 4, 7, 9],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        }
    }

    /// Identifier used in project files.
    pub fn id(self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::Minor => "minor",
            Scale::Pentatonic => "pentatonic",
            Scale::Blues => "blues",
            Scale::Chromatic => "chromatic",
        }
    }

    /// Snaps a pitch to the nearest member of this scale.
    ///
    /// The pitch is split into an octave and a pitch class relative to
    /// `root`; the pitch class is replaced by the nearest interval (ties go
    /// to the lower interval) and the two are recombined. Quantizing an
    /// already-quantized pitch returns it unchanged.
    pub fn quantize(self, pitch: i32, root: u8) -> i32 {
        let relative = pitch - root as i32;
        let octave = relative.div_euclid(12);
        let class = relative.rem_euclid(12);

        // `min_by_key` keeps the first minimum, and intervals ascend,
        // so ties resolve to the lower interval.
        let closest = self
            .intervals()
            .iter()
            .map(|&i| i as i32)
            .min_by_key(|&i| (i - class).abs())
            .unwrap_or(0);

        root as i32 + octave * 12 + closest
    }

    /// Returns true if `pitch` belongs to this scale rooted at `root`.
    pub fn contains(self, pitch: i32, root: u8) -> bool {
        let class = (pitch - root as i32).rem_euclid(12);
        self.intervals().iter().any(|&i| i as i32 == class)
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scale::ALL
            .into_iter()
            .find(|scale| scale.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown scale '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_idempotent() {
        for scale in Scale::ALL {
            for root in [55u8, 60, 62, 66] {
                for pitch in 0..128 {
                    let once = scale.quantize(pitch, root);
                    assert_eq!(
                        scale.quantize(once, root),
                        once,
                        "{} root {} pitch {}",
                        scale,
                        root,
                        pitch
                    );
                    assert!(scale.contains(once, root));
                }
            }
        }
    }

    #[test]
    fn test_quantize_ties_go_down() {
        // C# sits between C and D in major: tie resolves to C.
        assert_eq!(Scale::Major.quantize(61, 60), 60);
        // F# sits between F and G: tie resolves to F.
        assert_eq!(Scale::Major.quantize(66, 60), 65);
        // Pentatonic F (5) is nearer E (4) than G (7).
        assert_eq!(Scale::Pentatonic.quantize(65, 60), 64);
    }

    #[test]
    fn test_quantize_below_root() {
        // B3 relative to C4 is octave -1, class 11.
        assert_eq!(Scale::Pentatonic.quantize(59, 60), 57);
        assert_eq!(Scale::Chromatic.quantize(59, 60), 59);
    }

    #[test]
    fn test_scale_parse() {
        assert_eq!("Blues".parse::<Scale>().unwrap(), Scale::Blues);
        assert!("dorian".parse::<Scale>().is_err());
        assert_eq!(Scale::default(), Scale::Pentatonic);
    }
}
