//! Host-side sample access
//!
//! The host owns the audio data behind each audio source. The plug-in side
//! reaches it through a [`SampleProvider`] and, per reader, an exclusively
//! owned [`HostAudioReader`] handle that is only usable while the host has
//! sample access enabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{AraError, Result};
use crate::model::ObjectId;

/// Host decode primitive
///
/// Fills one destination slice per source channel (all of equal length) with
/// the samples starting at `start_sample`. Returns `false` if the host could
/// not deliver the data; the destination content is then unspecified.
pub trait SampleProvider: Send + Sync {
    fn read_samples(&self, start_sample: i64, dest: &mut [&mut [f32]]) -> bool;
}

// ============================================================================
// In-memory provider
// ============================================================================

/// Planar in-memory sample data standing in for host storage
///
/// The content can be swapped or made to fail, which is how tests and the
/// soak tool simulate host-side edits and I/O glitches.
#[derive(Debug, Default)]
pub struct MemorySampleProvider {
    channels: RwLock<Vec<Vec<f32>>>,
    failing: AtomicBool,
}

impl MemorySampleProvider {
    pub fn new(channels: Vec<Vec<f32>>) -> Self {
        Self {
            channels: RwLock::new(channels),
            failing: AtomicBool::new(false),
        }
    }

    /// Deterministic test signal: sample `i` of channel `c` is
    /// `(c + 1) * 0.1 + i * 1e-4` wrapped into [-1, 1)
    pub fn ramp(num_channels: usize, num_samples: usize) -> Self {
        let channels = (0..num_channels)
            .map(|c| {
                (0..num_samples)
                    .map(|i| {
                        let v = (c as f32 + 1.0) * 0.1 + i as f32 * 1e-4;
                        (v + 1.0).rem_euclid(2.0) - 1.0
                    })
                    .collect()
            })
            .collect();
        Self::new(channels)
    }

    /// Replace the stored samples (host-side content edit)
    pub fn replace(&self, channels: Vec<Vec<f32>>) {
        *self.channels.write() = channels;
    }

    /// Make every subsequent read fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn num_channels(&self) -> usize {
        self.channels.read().len()
    }

    pub fn num_samples(&self) -> usize {
        self.channels.read().first().map(|c| c.len()).unwrap_or(0)
    }
}

impl SampleProvider for MemorySampleProvider {
    fn read_samples(&self, start_sample: i64, dest: &mut [&mut [f32]]) -> bool {
        if self.failing.load(Ordering::SeqCst) {
            return false;
        }

        let channels = self.channels.read();
        for (ch, out) in dest.iter_mut().enumerate() {
            let Some(source) = channels.get(ch) else {
                out.fill(0.0);
                continue;
            };
            for (i, sample) in out.iter_mut().enumerate() {
                let index = start_sample + i as i64;
                *sample = if index >= 0 {
                    source.get(index as usize).copied().unwrap_or(0.0)
                } else {
                    0.0
                };
            }
        }
        true
    }
}

// ============================================================================
// Host audio source state
// ============================================================================

/// Host-side state of one audio source: its data and the access gate
pub struct HostAudioSource {
    source_id: ObjectId,
    provider: Arc<dyn SampleProvider>,
    access_enabled: AtomicBool,
}

impl HostAudioSource {
    pub fn new(source_id: ObjectId, provider: Arc<dyn SampleProvider>) -> Self {
        Self {
            source_id,
            provider,
            access_enabled: AtomicBool::new(false),
        }
    }

    pub fn is_access_enabled(&self) -> bool {
        self.access_enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_access_enabled(&self, enabled: bool) {
        self.access_enabled.store(enabled, Ordering::Release);
    }
}

impl std::fmt::Debug for HostAudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostAudioSource")
            .field("source_id", &self.source_id)
            .field("access_enabled", &self.is_access_enabled())
            .finish()
    }
}

// ============================================================================
// Host audio reader
// ============================================================================

/// Decode handle for one audio source, owned by exactly one reader
#[derive(Debug)]
pub struct HostAudioReader {
    host: Arc<HostAudioSource>,
    channel_count: usize,
}

impl HostAudioReader {
    /// Acquire a decode handle
    ///
    /// # Errors
    /// Returns `SampleAccessDisabled` if the host currently denies access.
    pub fn new(host: Arc<HostAudioSource>, channel_count: usize) -> Result<Self> {
        if !host.is_access_enabled() {
            return Err(AraError::SampleAccessDisabled {
                source_id: host.source_id,
            });
        }
        Ok(Self {
            host,
            channel_count,
        })
    }

    /// Number of channels the host fills on every read
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Decode samples into one slice per source channel
    ///
    /// Fails if access was revoked since the handle was created or if `dest`
    /// does not hold exactly `channel_count` slices.
    pub fn read_audio_samples(&self, start_sample: i64, dest: &mut [&mut [f32]]) -> bool {
        if dest.len() != self.channel_count || !self.host.is_access_enabled() {
            return false;
        }
        self.host.provider.read_samples(start_sample, dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_provider_zero_fills_out_of_range() {
        let provider = MemorySampleProvider::new(vec![vec![1.0, 2.0, 3.0]]);
        let mut out = vec![9.0_f32; 4];
        assert!(provider.read_samples(-1, &mut [&mut out[..]]));
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0]);

        assert!(provider.read_samples(2, &mut [&mut out[..]]));
        assert_eq!(out, vec![3.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_host_reader_requires_access() {
        let id = ObjectId::new();
        let host = Arc::new(HostAudioSource::new(
            id,
            Arc::new(MemorySampleProvider::ramp(1, 16)),
        ));
        let err = HostAudioReader::new(host.clone(), 1).unwrap_err();
        assert_eq!(err.error_code(), "SAMPLE_ACCESS_DISABLED");

        host.set_access_enabled(true);
        let reader = HostAudioReader::new(host.clone(), 1).unwrap();
        let mut out = vec![0.0_f32; 8];
        assert!(reader.read_audio_samples(0, &mut [&mut out[..]]));

        host.set_access_enabled(false);
        assert!(!reader.read_audio_samples(0, &mut [&mut out[..]]));
    }

    #[test]
    fn test_host_reader_rejects_wrong_channel_count() {
        let host = Arc::new(HostAudioSource::new(
            ObjectId::new(),
            Arc::new(MemorySampleProvider::ramp(2, 16)),
        ));
        host.set_access_enabled(true);
        let reader = HostAudioReader::new(host, 2).unwrap();
        let mut out = vec![0.0_f32; 8];
        assert!(!reader.read_audio_samples(0, &mut [&mut out[..]]));
    }

    #[test]
    fn test_failing_provider() {
        let provider = MemorySampleProvider::ramp(1, 8);
        provider.set_failing(true);
        let mut out = vec![0.0_f32; 4];
        assert!(!provider.read_samples(0, &mut [&mut out[..]]));
        provider.set_failing(false);
        assert!(provider.read_samples(0, &mut [&mut out[..]]));
    }
}
