//! Audio Buffer Management
//!
//! Planar `f32` block buffer handed to rendering engines and filled by
//! readers. Unlike host data it carries a fractional sample rate, since
//! readers inherit whatever rate their sources report.

use smallvec::SmallVec;

/// Channel count up to which channel slice lists stay on the stack
pub const INLINE_CHANNELS: usize = 8;

/// Per-channel mutable slices, the shape readers write into
pub type ChannelSlices<'a> = SmallVec<[&'a mut [f32]; INLINE_CHANNELS]>;

// ============================================================================
// Helper Functions
// ============================================================================

/// Calculate the peak absolute sample value of a buffer
///
/// # Returns
/// Peak amplitude, 0.0 for empty buffers.
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| s.abs())
        .fold(0.0_f32, f32::max)
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Planar audio buffer
///
/// # Example
/// ```
/// use ara_bridge::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::new(2, 512, 48000.0);
/// assert_eq!(buffer.num_channels(), 2);
/// assert_eq!(buffer.num_samples(), 512);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: f64,
}

impl AudioBuffer {
    /// Create a zeroed buffer
    ///
    /// # Arguments
    /// * `num_channels` - Number of channels
    /// * `num_samples` - Number of samples per channel
    /// * `sample_rate` - Sample rate in Hz
    pub fn new(num_channels: usize, num_samples: usize, sample_rate: f64) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; num_channels],
            sample_rate,
        }
    }

    /// Wrap existing planar data
    ///
    /// Channels shorter than the longest one are padded with silence.
    pub fn from_channels(mut samples: Vec<Vec<f32>>, sample_rate: f64) -> Self {
        let len = samples.iter().map(Vec::len).max().unwrap_or(0);
        for channel in &mut samples {
            channel.resize(len, 0.0);
        }
        Self {
            samples,
            sample_rate,
        }
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_samples = self.num_samples();
        let mut interleaved = Vec::with_capacity(self.num_channels() * num_samples);
        for sample_idx in 0..num_samples {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }
        interleaved
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate <= 0.0 {
            return 0.0;
        }
        self.num_samples() as f64 / self.sample_rate
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Mutable slices over every channel
    ///
    /// Does not allocate for up to [`INLINE_CHANNELS`] channels.
    pub fn channels_mut(&mut self) -> ChannelSlices<'_> {
        self.samples.iter_mut().map(|c| c.as_mut_slice()).collect()
    }

    /// Fill every sample with silence
    pub fn clear(&mut self) {
        for channel in &mut self.samples {
            channel.fill(0.0);
        }
    }

    /// Resize to `num_channels` x `num_samples`, keeping existing content
    /// where it still fits
    pub fn resize(&mut self, num_channels: usize, num_samples: usize) {
        self.samples.resize_with(num_channels, Vec::new);
        for channel in &mut self.samples {
            channel.resize(num_samples, 0.0);
        }
    }

    /// Check if every sample is exactly zero
    pub fn is_silent(&self) -> bool {
        self.samples.iter().flat_map(|ch| ch.iter()).all(|&s| s == 0.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
