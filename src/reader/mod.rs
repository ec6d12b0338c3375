//! Invalidation-aware streaming readers
//!
//! Three readers serve pull-based sample reads while the document is edited
//! on the controller thread:
//! - [`AudioSourceReader`]: decoded samples of one audio source
//! - [`PlaybackRegionReader`]: rendered output of a set of playback regions
//! - [`RegionSequenceReader`]: rendered output of a region sequence
//!
//! A reader that cannot serve a request (lock busy, access disabled,
//! invalidated) fills the requested span with silence and returns `false`.
//! A rendering reader whose engine fails a block also returns `false`, but
//! keeps what the engine produced. Invalidation is terminal; callers rebuild
//! the reader to continue.

pub mod audio_source_reader;
pub mod cache;
pub mod lock;
pub mod playback_region_reader;
pub mod region_sequence_reader;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::AudioBuffer;

pub use audio_source_reader::AudioSourceReader;
pub use cache::ReaderCache;
pub use lock::{InvalidationLock, StateCell};
pub use playback_region_reader::PlaybackRegionReader;
pub use region_sequence_reader::RegionSequenceReader;

// ============================================================================
// Reader State
// ============================================================================

/// Lifecycle of a reader
///
/// `Valid` and `AccessDisabled` alternate as the host toggles sample access.
/// `Invalidated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReaderState {
    Valid = 0,
    AccessDisabled = 1,
    Invalidated = 2,
}

impl ReaderState {
    pub fn is_terminal(self) -> bool {
        self == ReaderState::Invalidated
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReaderState::Valid => "valid",
            ReaderState::AccessDisabled => "access-disabled",
            ReaderState::Invalidated => "invalidated",
        }
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Reader Format
// ============================================================================

/// Stream format a reader produces, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReaderFormat {
    pub sample_rate: f64,
    pub num_channels: u32,
    pub bits_per_sample: u32,
    pub uses_floating_point_data: bool,
    pub length_in_samples: i64,
}

impl ReaderFormat {
    /// 32-bit float format
    pub fn new(sample_rate: f64, num_channels: u32, length_in_samples: i64) -> Self {
        Self {
            sample_rate,
            num_channels,
            bits_per_sample: 32,
            uses_floating_point_data: true,
            length_in_samples,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate <= 0.0 {
            return 0.0;
        }
        self.length_in_samples as f64 / self.sample_rate
    }
}

// ============================================================================
// Reader Trait
// ============================================================================

/// Common interface of all readers
pub trait AudioReader: Send + Sync {
    fn format(&self) -> ReaderFormat;

    /// Read `num_samples` samples starting at `start_sample` into
    /// `dest[c][dest_offset..]`
    ///
    /// Never blocks on a writer. Spans that do not fit the destination
    /// slices are truncated to what fits.
    ///
    /// # Returns
    /// `true` on success. A `false` from a reader that was not valid, or
    /// that was busy with an edit, leaves the requested span silent. A valid
    /// rendering reader may return `false` with engine output in place.
    fn read_samples(
        &self,
        dest: &mut [&mut [f32]],
        dest_offset: usize,
        start_sample: i64,
        num_samples: usize,
    ) -> bool;

    fn state(&self) -> ReaderState;

    /// Terminally invalidate the reader. Idempotent.
    fn invalidate(&self);

    /// Never blocks, even while an access bracket is open
    fn is_valid(&self) -> bool {
        self.state() == ReaderState::Valid
    }

    fn sample_rate(&self) -> f64 {
        self.format().sample_rate
    }

    fn num_channels(&self) -> u32 {
        self.format().num_channels
    }

    fn length_in_samples(&self) -> i64 {
        self.format().length_in_samples
    }

    /// Fill a whole buffer starting at `start_sample`
    fn read_into_buffer(&self, buffer: &mut AudioBuffer, start_sample: i64) -> bool {
        let num_samples = buffer.num_samples();
        let mut channels = buffer.channels_mut();
        self.read_samples(&mut channels, 0, start_sample, num_samples)
    }
}

// ============================================================================
// Destination helpers
// ============================================================================

/// Number of samples of the request that fit every destination channel
pub(crate) fn writable_len(dest: &[&mut [f32]], dest_offset: usize, num_samples: usize) -> usize {
    dest.iter()
        .map(|channel| channel.len().saturating_sub(dest_offset))
        .fold(num_samples, usize::min)
}

/// Zero `dest[c][dest_offset..dest_offset + num_samples]` on every channel
pub(crate) fn clear_destination(dest: &mut [&mut [f32]], dest_offset: usize, num_samples: usize) {
    for channel in dest.iter_mut() {
        let end = (dest_offset + num_samples).min(channel.len());
        if dest_offset < end {
            channel[dest_offset..end].fill(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writable_len_truncates_to_shortest_channel() {
        let mut a = vec![0.0_f32; 10];
        let mut b = vec![0.0_f32; 6];
        let dest: Vec<&mut [f32]> = vec![a.as_mut_slice(), b.as_mut_slice()];
        assert_eq!(writable_len(&dest, 2, 8), 4);
        assert_eq!(writable_len(&dest, 8, 8), 0);
        assert_eq!(writable_len(&[], 0, 8), 8);
    }

    #[test]
    fn test_clear_destination_only_touches_span() {
        let mut a = vec![1.0_f32; 6];
        {
            let mut dest: Vec<&mut [f32]> = vec![a.as_mut_slice()];
            clear_destination(&mut dest, 2, 3);
        }
        assert_eq!(a, vec![1.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_reader_format_defaults_to_float() {
        let format = ReaderFormat::new(48000.0, 2, 96000);
        assert_eq!(format.bits_per_sample, 32);
        assert!(format.uses_floating_point_data);
        assert_eq!(format.duration_secs(), 2.0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ReaderState::AccessDisabled.to_string(), "access-disabled");
        assert!(ReaderState::Invalidated.is_terminal());
        assert!(!ReaderState::Valid.is_terminal());
    }
}
