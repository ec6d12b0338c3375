//! Source Renderer - default playback renderer
//!
//! Mixes each region's audio source into the block. Playback samples map to
//! modification samples one to one; time-stretched regions whose playback
//! duration differs from their modification duration are resampled with
//! linear interpolation. Outside `[start - head, end + tail)` a region is
//! silent.

use std::sync::Arc;

use tracing::trace;

use crate::engine::AudioBuffer;
use crate::model::{sample_position_at_time, ObjectId, PlaybackRegion, TransformationFlags};
use crate::reader::{AudioReader, ReaderCache};

use super::PlaybackRenderer;

pub struct SourceRenderer {
    cache: ReaderCache,
    regions: Vec<Arc<PlaybackRegion>>,
    sample_rate: f64,
    max_block_size: usize,
    num_channels: usize,
    include_head_and_tail: bool,
    scratch: AudioBuffer,
    stretched: AudioBuffer,
    prepared: bool,
}

/// How one region maps playback samples onto modification samples
#[derive(Debug, Clone, Copy)]
struct RegionMapping {
    playback_start: i64,
    modification_start: i64,
    /// Modification samples per playback sample, `None` when 1:1
    ratio: Option<f64>,
}

impl RegionMapping {
    fn of(region: &PlaybackRegion, sample_rate: f64) -> Self {
        region.with_properties(|props| {
            let stretched = props.transformation_flags.contains(TransformationFlags::TIMESTRETCH)
                && props.duration_in_playback_time > 0.0
                && props.duration_in_modification_time != props.duration_in_playback_time;
            Self {
                playback_start: sample_position_at_time(props.start_in_playback_time, sample_rate),
                modification_start: sample_position_at_time(props.start_in_modification_time, sample_rate),
                ratio: stretched.then(|| props.duration_in_modification_time / props.duration_in_playback_time),
            }
        })
    }

    fn source_position(&self, playback_sample: i64) -> f64 {
        let offset = playback_sample.saturating_sub(self.playback_start) as f64;
        self.modification_start as f64 + offset * self.ratio.unwrap_or(1.0)
    }
}

impl SourceRenderer {
    pub fn new() -> Self {
        Self {
            cache: ReaderCache::new(),
            regions: Vec::new(),
            sample_rate: 0.0,
            max_block_size: 0,
            num_channels: 0,
            include_head_and_tail: true,
            scratch: AudioBuffer::new(0, 0, 0.0),
            stretched: AudioBuffer::new(0, 0, 0.0),
            prepared: false,
        }
    }

    /// Whether regions sound during their head and tail time
    pub fn with_head_and_tail(mut self, include: bool) -> Self {
        self.include_head_and_tail = include;
        self
    }

    pub fn reader_cache(&self) -> &ReaderCache {
        &self.cache
    }

    /// Mix one region's part of `[block_start, block_start + len)` into `buffer`
    fn render_region(&mut self, region: &PlaybackRegion, buffer: &mut AudioBuffer, block_start: i64) -> bool {
        let block_end = block_start.saturating_add(buffer.num_samples() as i64);
        let (region_start, region_end) = region.sample_range(self.sample_rate, self.include_head_and_tail);
        let start = block_start.max(region_start);
        let end = block_end.min(region_end);
        if start >= end {
            return true;
        }

        // Readers are resolved when a region is added; this only creates one
        // to replace a reader invalidated since then
        let reader = self.cache.reader_for(region.audio_source());
        let mapping = RegionMapping::of(region, self.sample_rate);
        let count = (end - start) as usize;
        let channels = reader.num_channels() as usize;

        let ok = match mapping.ratio {
            None => {
                self.scratch.resize(channels, count);
                let from = mapping
                    .modification_start
                    .saturating_add(start.saturating_sub(mapping.playback_start));
                reader.read_into_buffer(&mut self.scratch, from)
            }
            Some(_) => {
                let first = mapping.source_position(start).floor() as i64;
                let last = mapping.source_position(end - 1).floor() as i64 + 1;
                self.scratch.resize(channels, last.saturating_sub(first).saturating_add(1) as usize);
                let ok = reader.read_into_buffer(&mut self.scratch, first);
                self.stretched.resize(channels, count);
                for c in 0..channels {
                    let input = self.scratch.channel(c);
                    for (i, out) in self.stretched.channel_mut(c).iter_mut().enumerate() {
                        let position = mapping.source_position(start + i as i64) - first as f64;
                        let index = position.floor() as usize;
                        let frac = (position - index as f64) as f32;
                        let current = input.get(index).copied().unwrap_or(0.0);
                        let next = input.get(index + 1).copied().unwrap_or(0.0);
                        *out = current * (1.0 - frac) + next * frac;
                    }
                }
                ok
            }
        };

        let rendered = if mapping.ratio.is_some() {
            &self.stretched
        } else {
            &self.scratch
        };
        let offset = (start - block_start) as usize;
        for c in 0..channels.min(buffer.num_channels()) {
            let input = &rendered.channel(c)[..count];
            let output = &mut buffer.channel_mut(c)[offset..offset + count];
            for (out, sample) in output.iter_mut().zip(input) {
                *out += sample;
            }
        }

        if !ok {
            trace!(region = %region.id(), start, count, "region read failed");
        }
        ok
    }
}

impl Default for SourceRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackRenderer for SourceRenderer {
    fn prepare_to_play(&mut self, sample_rate: f64, max_block_size: usize, num_channels: usize) {
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.num_channels = num_channels;
        self.scratch = AudioBuffer::new(num_channels, max_block_size, sample_rate);
        self.stretched = AudioBuffer::new(num_channels, max_block_size, sample_rate);
        for region in &self.regions {
            self.cache.reader_for(region.audio_source());
        }
        self.prepared = true;
    }

    fn release_resources(&mut self) {
        self.cache.clear();
        self.scratch = AudioBuffer::new(0, 0, self.sample_rate);
        self.stretched = AudioBuffer::new(0, 0, self.sample_rate);
        self.prepared = false;
    }

    fn is_prepared(&self) -> bool {
        self.prepared
    }

    fn add_region(&mut self, region: Arc<PlaybackRegion>) {
        if !self.regions.iter().any(|r| r.id() == region.id()) {
            self.cache.reader_for(region.audio_source());
            self.regions.push(region);
        }
    }

    fn remove_region(&mut self, region_id: ObjectId) {
        self.regions.retain(|r| r.id() != region_id);
    }

    fn regions(&self) -> Vec<Arc<PlaybackRegion>> {
        self.regions.clone()
    }

    fn process_block(&mut self, buffer: &mut AudioBuffer, time_in_samples: i64, is_playing: bool) -> bool {
        buffer.clear();
        if !is_playing {
            return true;
        }
        if !self.prepared {
            return false;
        }

        let regions = std::mem::take(&mut self.regions);
        let mut success = true;
        for region in &regions {
            success &= self.render_region(region, buffer, time_in_samples);
        }
        self.regions = regions;
        success
    }
}

impl std::fmt::Debug for SourceRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRenderer")
            .field("regions", &self.regions.len())
            .field("sample_rate", &self.sample_rate)
            .field("max_block_size", &self.max_block_size)
            .field("num_channels", &self.num_channels)
            .field("prepared", &self.prepared)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemorySampleProvider;
    use crate::model::{AudioModificationProperties, AudioSourceProperties, Document, PlaybackRegionProperties};
    use approx::assert_relative_eq;

    // Source sample i holds the value i, so positions are easy to check
    fn document_with_counting_source(len: usize) -> (Document, Arc<crate::model::AudioModification>) {
        let document = Document::new("render");
        let samples: Vec<f32> = (0..len).map(|i| i as f32).collect();
        let source = document
            .create_audio_source(
                AudioSourceProperties::new("count", 10.0, 1, len as i64),
                Arc::new(MemorySampleProvider::new(vec![samples])),
            )
            .unwrap();
        document.enable_audio_source_samples_access(&source, true).unwrap();
        let modification = document
            .create_audio_modification(&source, AudioModificationProperties::default())
            .unwrap();
        (document, modification)
    }

    #[test]
    fn test_region_is_placed_at_playback_position() {
        let (document, modification) = document_with_counting_source(100);
        // Modification [1.0, 1.5) s placed at 2.0 s, 10 Hz
        let region = document
            .create_playback_region(&modification, PlaybackRegionProperties::new(1.0, 0.5, 2.0))
            .unwrap();

        let mut renderer = SourceRenderer::new();
        renderer.prepare_to_play(10.0, 32, 1);
        renderer.add_region(region);

        let mut block = AudioBuffer::new(1, 32, 10.0);
        assert!(renderer.process_block(&mut block, 18, true));
        let expected: Vec<f32> = (0..32)
            .map(|i| {
                let p = 18 + i;
                if (20..25).contains(&p) {
                    (10 + p - 20) as f32
                } else {
                    0.0
                }
            })
            .collect();
        assert_eq!(block.channel(0), expected.as_slice());
    }

    #[test]
    fn test_head_and_tail_extend_region() {
        let (document, modification) = document_with_counting_source(100);
        let region = document
            .create_playback_region(&modification, PlaybackRegionProperties::new(2.0, 1.0, 2.0))
            .unwrap();
        document.set_playback_region_head_and_tail_time(&region, 0.2, 0.3).unwrap();

        let mut with = SourceRenderer::new();
        with.prepare_to_play(10.0, 16, 1);
        with.add_region(region.clone());
        let mut block = AudioBuffer::new(1, 16, 10.0);
        assert!(with.process_block(&mut block, 16, true));
        // Playback [18, 33) maps to source [18, 33)
        assert_eq!(block.channel(0)[1], 0.0);
        assert_eq!(block.channel(0)[2], 18.0);
        assert_eq!(block.channel(0)[15], 31.0);

        let mut without = SourceRenderer::new().with_head_and_tail(false);
        without.prepare_to_play(10.0, 16, 1);
        without.add_region(region);
        assert!(without.process_block(&mut block, 16, true));
        assert_eq!(block.channel(0)[3], 0.0);
        assert_eq!(block.channel(0)[4], 20.0);
    }

    #[test]
    fn test_time_stretch_interpolates() {
        let (document, modification) = document_with_counting_source(100);
        // 1 s of modification stretched over 2 s of playback
        let mut props = PlaybackRegionProperties::new(0.0, 1.0, 0.0);
        props.duration_in_playback_time = 2.0;
        props.transformation_flags = TransformationFlags::TIMESTRETCH;
        let region = document.create_playback_region(&modification, props).unwrap();

        let mut renderer = SourceRenderer::new();
        renderer.prepare_to_play(10.0, 20, 1);
        renderer.add_region(region);

        let mut block = AudioBuffer::new(1, 20, 10.0);
        assert!(renderer.process_block(&mut block, 0, true));
        for (i, &sample) in block.channel(0).iter().enumerate() {
            assert_relative_eq!(sample, i as f32 * 0.5);
        }
    }

    #[test]
    fn test_stopped_transport_renders_silence() {
        let (document, modification) = document_with_counting_source(100);
        let region = document
            .create_playback_region(&modification, PlaybackRegionProperties::new(0.0, 1.0, 0.0))
            .unwrap();
        let mut renderer = SourceRenderer::new();
        renderer.prepare_to_play(10.0, 8, 1);
        renderer.add_region(region);

        let mut block = AudioBuffer::from_channels(vec![vec![1.0; 8]], 10.0);
        assert!(renderer.process_block(&mut block, 0, false));
        assert!(block.is_silent());
    }

    #[test]
    fn test_readers_resolved_before_rendering() {
        let (document, modification) = document_with_counting_source(100);
        let region = document
            .create_playback_region(&modification, PlaybackRegionProperties::new(0.0, 1.0, 0.0))
            .unwrap();
        let source_id = region.audio_source().id();

        let mut renderer = SourceRenderer::new();
        renderer.add_region(region.clone());
        let resolved = renderer.reader_cache().get(source_id).unwrap();
        assert!(resolved.is_valid());

        renderer.prepare_to_play(10.0, 8, 1);
        let mut block = AudioBuffer::new(1, 8, 10.0);
        assert!(renderer.process_block(&mut block, 0, true));
        let used = renderer.reader_cache().get(source_id).unwrap();
        assert!(Arc::ptr_eq(&resolved, &used));

        // Cleared caches fill again on the next prepare
        renderer.release_resources();
        renderer.prepare_to_play(10.0, 8, 1);
        assert_eq!(renderer.reader_cache().len(), 1);
    }

    #[test]
    fn test_block_at_i64_limits_is_silent() {
        let (document, modification) = document_with_counting_source(100);
        let region = document
            .create_playback_region(&modification, PlaybackRegionProperties::new(0.0, 1.0, 0.0))
            .unwrap();
        let mut renderer = SourceRenderer::new();
        renderer.prepare_to_play(10.0, 8, 1);
        renderer.add_region(region);

        let mut block = AudioBuffer::from_channels(vec![vec![1.0; 8]], 10.0);
        assert!(renderer.process_block(&mut block, i64::MAX - 4, true));
        assert!(block.is_silent());
        assert!(renderer.process_block(&mut block, i64::MIN, true));
        assert!(block.is_silent());
    }

    #[test]
    fn test_unprepared_or_disabled_source_fails() {
        let (document, modification) = document_with_counting_source(100);
        let region = document
            .create_playback_region(&modification, PlaybackRegionProperties::new(0.0, 1.0, 0.0))
            .unwrap();
        let mut renderer = SourceRenderer::new();
        renderer.add_region(region.clone());
        let mut block = AudioBuffer::new(1, 8, 10.0);
        assert!(!renderer.process_block(&mut block, 0, true));

        renderer.prepare_to_play(10.0, 8, 1);
        document
            .enable_audio_source_samples_access(region.audio_source(), false)
            .unwrap();
        assert!(!renderer.process_block(&mut block, 0, true));
        assert!(block.is_silent());

        renderer.remove_region(region.id());
        assert!(renderer.regions().is_empty());
        renderer.release_resources();
        assert!(!renderer.is_prepared());
        assert!(renderer.reader_cache().is_empty());
    }
}
