//! Deterministic per-user voice pitch
//!
//! Every chatter gets a stable pitch derived from a hash of their lowercased
//! name, so the same user always sounds the same across restarts.

use serde::Serialize;
use sha1::{Digest, Sha1};

/// Upper bound of the synthesis engine's own pitch scale
pub const SYNTH_PITCH_MAX: u32 = 99;

/// Normalized, inclusive pitch range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PitchRange {
    min: u32,
    max: u32,
}

impl PitchRange {
    /// Negative bounds are clamped to zero; a max below min is raised to min.
    pub fn new(min: i64, max: i64) -> Self {
        let min = min.clamp(0, u32::MAX as i64) as u32;
        let max = (max.clamp(0, u32::MAX as i64) as u32).max(min);
        Self { min, max }
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn span(&self) -> u32 {
        self.max - self.min
    }
}

/// Map a username into `range`. Empty names get the midpoint.
pub fn pitch(username: &str, range: PitchRange) -> u32 {
    if username.is_empty() {
        return range.min + range.span() / 2;
    }

    let span = range.span();
    if span == 0 {
        return range.min;
    }

    let digest = Sha1::digest(username.to_lowercase().as_bytes());
    let value = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);

    let offset = u64::from(value) % (u64::from(span) + 1);
    range.min + offset as u32
}

/// Rescale a pitch from `range` onto the synthesis engine's 0..=99 scale.
pub fn to_synthesis_pitch(value: u32, range: PitchRange) -> u8 {
    let value = value.clamp(range.min, range.max);

    let synth_min = range.min.min(SYNTH_PITCH_MAX);
    let synth_max = range.max.min(SYNTH_PITCH_MAX).max(synth_min);
    if synth_max == synth_min || range.span() == 0 {
        return synth_min as u8;
    }

    let ratio = f64::from(value - range.min) / f64::from(range.span());
    let scaled = f64::from(synth_min) + ratio.clamp(0.0, 1.0) * f64::from(synth_max - synth_min);
    scaled.round_ties_even() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_normalization() {
        let range = PitchRange::new(-5, -10);
        assert_eq!((range.min(), range.max()), (0, 0));

        let range = PitchRange::new(60, 40);
        assert_eq!((range.min(), range.max()), (60, 60));
    }

    #[test]
    fn test_pitch_in_range_and_deterministic() {
        let range = PitchRange::new(25, 99);
        for name in ["alice", "bob", "xX_gamer_Xx", "a", "justinfan12345"] {
            let first = pitch(name, range);
            assert!((25..=99).contains(&first), "{} -> {}", name, first);
            assert_eq!(first, pitch(name, range));
        }
    }

    #[test]
    fn test_known_pitches() {
        // stable across releases: a viewer keeps the voice they already have
        let range = PitchRange::new(25, 99);
        assert_eq!(pitch("alice", range), 25);
        assert_eq!(pitch("bob", range), 52);
        assert_eq!(pitch("xX_gamer_Xx", range), 60);

        let range = PitchRange::new(0, 99);
        assert_eq!(pitch("alice", range), 50);
        assert_eq!(pitch("bob", range), 77);
    }

    #[test]
    fn test_pitch_is_case_insensitive() {
        let range = PitchRange::new(0, 400);
        assert_eq!(pitch("Alice", range), pitch("alice", range));
    }

    #[test]
    fn test_empty_username_uses_midpoint() {
        assert_eq!(pitch("", PitchRange::new(25, 99)), 62);
        assert_eq!(pitch("", PitchRange::new(10, 11)), 10);
    }

    #[test]
    fn test_degenerate_range() {
        let range = PitchRange::new(42, 42);
        for name in ["alice", "bob", ""] {
            assert_eq!(pitch(name, range), 42);
            assert_eq!(to_synthesis_pitch(pitch(name, range), range), 42);
        }
    }

    #[test]
    fn test_synthesis_pitch_scaling() {
        let range = PitchRange::new(0, 200);
        assert_eq!(to_synthesis_pitch(0, range), 0);
        assert_eq!(to_synthesis_pitch(200, range), 99);
        assert_eq!(to_synthesis_pitch(100, range), 50);
        // clamped into range first
        assert_eq!(to_synthesis_pitch(500, range), 99);

        let range = PitchRange::new(25, 99);
        assert_eq!(to_synthesis_pitch(10, range), 25);
        assert_eq!(to_synthesis_pitch(99, range), 99);
    }

    #[test]
    fn test_synthesis_pitch_above_engine_scale() {
        let range = PitchRange::new(150, 300);
        assert_eq!(to_synthesis_pitch(200, range), 99);
    }
}
