//! Content update scopes and playback transformation flags
//!
//! Both are small bit sets passed through the document hooks. Readers only ask
//! one question of a scope: does this change touch decodable samples?

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

// ============================================================================
// Content Update Scopes
// ============================================================================

/// Which parts of an object's content changed in a content update
///
/// A set bit means "this aspect is affected". Updates that only touch
/// metadata (notes, tempo, chords) leave the sample bit clear, and readers
/// skip invalidation for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContentUpdateScopes(u32);

impl ContentUpdateScopes {
    const SAMPLES: u32 = 1 << 0;
    const NOTES: u32 = 1 << 1;
    const TEMPO: u32 = 1 << 2;
    const SIGNATURES: u32 = 1 << 3;
    const TUNING: u32 = 1 << 4;
    const KEY_SIGNATURES: u32 = 1 << 5;
    const CHORDS: u32 = 1 << 6;
    const ALL: u32 = (1 << 7) - 1;

    /// No aspect changed
    pub const fn nothing() -> Self {
        Self(0)
    }

    /// Every aspect may have changed
    pub const fn everything() -> Self {
        Self(Self::ALL)
    }

    /// The audio signal changed
    pub const fn samples_are_affected() -> Self {
        Self(Self::SAMPLES)
    }

    pub const fn notes_are_affected() -> Self {
        Self(Self::NOTES)
    }

    pub const fn tempo_is_affected() -> Self {
        Self(Self::TEMPO)
    }

    pub const fn signatures_are_affected() -> Self {
        Self(Self::SIGNATURES)
    }

    pub const fn tuning_is_affected() -> Self {
        Self(Self::TUNING)
    }

    pub const fn key_signatures_are_affected() -> Self {
        Self(Self::KEY_SIGNATURES)
    }

    pub const fn chords_are_affected() -> Self {
        Self(Self::CHORDS)
    }

    /// Does this change affect decodable samples?
    #[inline]
    pub fn affects_samples(&self) -> bool {
        self.0 & Self::SAMPLES != 0
    }

    #[inline]
    pub fn affects_notes(&self) -> bool {
        self.0 & Self::NOTES != 0
    }

    #[inline]
    pub fn affects_tempo(&self) -> bool {
        self.0 & Self::TEMPO != 0
    }

    #[inline]
    pub fn affects_signatures(&self) -> bool {
        self.0 & Self::SIGNATURES != 0
    }

    #[inline]
    pub fn affects_tuning(&self) -> bool {
        self.0 & Self::TUNING != 0
    }

    #[inline]
    pub fn affects_key_signatures(&self) -> bool {
        self.0 & Self::KEY_SIGNATURES != 0
    }

    #[inline]
    pub fn affects_chords(&self) -> bool {
        self.0 & Self::CHORDS != 0
    }

    /// True if no aspect is flagged
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Raw bit representation
    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl BitOr for ContentUpdateScopes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ContentUpdateScopes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ContentUpdateScopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::SAMPLES, "samples"),
            (Self::NOTES, "notes"),
            (Self::TEMPO, "tempo"),
            (Self::SIGNATURES, "signatures"),
            (Self::TUNING, "tuning"),
            (Self::KEY_SIGNATURES, "key-signatures"),
            (Self::CHORDS, "chords"),
        ];
        let affected: Vec<&str> = names
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| *name)
            .collect();
        if affected.is_empty() {
            write!(f, "nothing")
        } else {
            write!(f, "{}", affected.join("|"))
        }
    }
}

// ============================================================================
// Playback Transformation Flags
// ============================================================================

/// How a playback region may transform its modification's audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TransformationFlags(u32);

impl TransformationFlags {
    pub const NONE: Self = Self(0);
    pub const TIMESTRETCH: Self = Self(1 << 0);
    pub const TIMESTRETCH_REFLECTING_TEMPO: Self = Self(1 << 1);
    pub const CONTENT_BASED_FADE_AT_TAIL: Self = Self(1 << 2);
    pub const CONTENT_BASED_FADE_AT_HEAD: Self = Self(1 << 3);

    /// All transformations a renderer may advertise
    pub const fn all() -> Self {
        Self(0b1111)
    }

    #[inline]
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl BitOr for TransformationFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_scope_affects_samples() {
        assert!(ContentUpdateScopes::samples_are_affected().affects_samples());
        assert!(ContentUpdateScopes::everything().affects_samples());
        assert!(!ContentUpdateScopes::nothing().affects_samples());
    }

    #[test]
    fn test_cosmetic_scopes_leave_samples_alone() {
        let scopes = ContentUpdateScopes::notes_are_affected()
            | ContentUpdateScopes::chords_are_affected()
            | ContentUpdateScopes::tempo_is_affected();
        assert!(!scopes.affects_samples());
        assert!(scopes.affects_notes());
        assert!(scopes.affects_chords());
        assert_eq!(scopes.to_string(), "notes|tempo|chords");
    }

    #[test]
    fn test_scope_accumulation() {
        let mut pending = ContentUpdateScopes::nothing();
        assert!(pending.is_empty());
        pending |= ContentUpdateScopes::tuning_is_affected();
        pending |= ContentUpdateScopes::samples_are_affected();
        assert!(pending.affects_tuning());
        assert!(pending.affects_samples());
    }

    #[test]
    fn test_transformation_flags() {
        let flags = TransformationFlags::TIMESTRETCH | TransformationFlags::CONTENT_BASED_FADE_AT_HEAD;
        assert!(flags.contains(TransformationFlags::TIMESTRETCH));
        assert!(!flags.contains(TransformationFlags::CONTENT_BASED_FADE_AT_TAIL));
        assert!(TransformationFlags::all().contains(flags));
    }
}
