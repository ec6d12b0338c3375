//! Playback Region Reader
//!
//! Reads the rendered output of a fixed set of playback regions through an
//! owned [`PlaybackRenderer`]. Sample 0 of the reader is the first sample of
//! the regions' union range, `start_in_samples` in playback time.
//!
//! Any sample-affecting change to one of the regions invalidates the reader;
//! it detaches from the renderer and from every region and cannot recover.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::{BlockFailurePolicy, ReaderConfig, SampleRateMismatchPolicy};
use crate::engine::AudioBuffer;
use crate::error::{AraError, Result};
use crate::model::{
    sample_position_at_time, ContentUpdateScopes, ListenerId, PlaybackRegion, PlaybackRegionListener,
    PlaybackRegionProperties,
};
use crate::render::PlaybackRenderer;

use super::{clear_destination, writable_len, AudioReader, InvalidationLock, ReaderFormat, ReaderState, StateCell};

struct RenderState {
    renderer: Box<dyn PlaybackRenderer>,
    block: AudioBuffer,
}

impl RenderState {
    fn shut_down(mut self) {
        for region in self.renderer.regions() {
            self.renderer.remove_region(region.id());
        }
        self.renderer.release_resources();
    }
}

pub struct PlaybackRegionReader {
    format: ReaderFormat,
    start_in_samples: i64,
    block_failure: BlockFailurePolicy,
    max_block_size: usize,
    // `None` once invalidated. The inner mutex is only try-locked so two
    // concurrent reads never drive the renderer at the same time.
    lock: InvalidationLock<Option<Mutex<RenderState>>>,
    state: StateCell,
    regions: Mutex<Vec<Weak<PlaybackRegion>>>,
}

impl PlaybackRegionReader {
    /// Build a reader over `regions`, handing them to `renderer`
    ///
    /// # Arguments
    /// * `regions` - Regions to render; the first one fixes the sample rate
    /// * `renderer` - Engine the reader takes ownership of
    /// * `config` - Head/tail, mismatch and block policies
    ///
    /// # Errors
    /// * `EmptyRegionSet` if `regions` is empty
    /// * `SampleRateMismatch` under `SampleRateMismatchPolicy::Reject`
    /// * `InvalidSampleRate` / `InvalidConfig` for unusable inputs
    pub fn new(
        regions: &[Arc<PlaybackRegion>],
        mut renderer: Box<dyn PlaybackRenderer>,
        config: &ReaderConfig,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let first = regions.first().ok_or(AraError::EmptyRegionSet)?;
        let sample_rate = first.audio_source().sample_rate();
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(AraError::InvalidSampleRate { rate: sample_rate });
        }

        let mut accepted: Vec<Arc<PlaybackRegion>> = Vec::with_capacity(regions.len());
        for region in regions {
            let rate = region.audio_source().sample_rate();
            if rate != sample_rate {
                match config.sample_rate_mismatch {
                    SampleRateMismatchPolicy::Reject => {
                        return Err(AraError::SampleRateMismatch {
                            expected: sample_rate,
                            found: rate,
                            region: region.id(),
                        })
                    }
                    SampleRateMismatchPolicy::Skip => {
                        warn!(region = %region.id(), expected = sample_rate, found = rate, "skipping region with mismatched sample rate");
                        continue;
                    }
                }
            }
            if !accepted.iter().any(|r| r.id() == region.id()) {
                accepted.push(region.clone());
            }
        }

        let num_channels = accepted
            .iter()
            .map(|r| r.audio_source().channel_count())
            .max()
            .unwrap_or(0);

        let (start, end) = accepted
            .iter()
            .map(|r| r.time_range(config.include_head_and_tail))
            .fold((f64::MAX, f64::MIN), |(start, end), (s, e)| (start.min(s), end.max(e)));
        let start_in_samples = sample_position_at_time(start, sample_rate);
        let length_in_samples = sample_position_at_time(end, sample_rate)
            .saturating_sub(start_in_samples)
            .max(0);

        renderer.prepare_to_play(sample_rate, config.max_block_size, num_channels as usize);
        for region in &accepted {
            renderer.add_region(region.clone());
        }
        let render = RenderState {
            renderer,
            block: AudioBuffer::new(num_channels as usize, config.max_block_size, sample_rate),
        };

        let reader = Arc::new(Self {
            format: ReaderFormat::new(sample_rate, num_channels, length_in_samples),
            start_in_samples,
            block_failure: config.block_failure,
            max_block_size: config.max_block_size,
            lock: InvalidationLock::new(Some(Mutex::new(render))),
            state: StateCell::new(ReaderState::Valid),
            regions: Mutex::new(accepted.iter().map(Arc::downgrade).collect()),
        });

        for region in &accepted {
            let weak = Arc::downgrade(&reader);
            let listener: Weak<dyn PlaybackRegionListener> = weak;
            region.add_listener(listener);
        }

        debug!(
            regions = accepted.len(),
            start_in_samples,
            length_in_samples,
            num_channels,
            "playback region reader created"
        );
        Ok(reader)
    }

    /// Playback position of the reader's sample 0
    pub fn start_in_samples(&self) -> i64 {
        self.start_in_samples
    }

    /// Regions the reader still renders (empty once invalidated)
    pub fn playback_regions(&self) -> Vec<Arc<PlaybackRegion>> {
        self.regions.lock().iter().filter_map(Weak::upgrade).collect()
    }

    fn detach_from_regions(&self) {
        let regions = std::mem::take(&mut *self.regions.lock());
        let id = ListenerId::of(self);
        for region in regions.iter().filter_map(Weak::upgrade) {
            region.remove_listener(id);
        }
    }
}

impl AudioReader for PlaybackRegionReader {
    fn format(&self) -> ReaderFormat {
        self.format
    }

    fn read_samples(
        &self,
        dest: &mut [&mut [f32]],
        dest_offset: usize,
        start_sample: i64,
        num_samples: usize,
    ) -> bool {
        let num_samples = writable_len(dest, dest_offset, num_samples);

        let Some(core) = self.lock.try_read() else {
            trace!("region read skipped, reader busy");
            clear_destination(dest, dest_offset, num_samples);
            return false;
        };
        let Some(mut render) = core.as_ref().and_then(|render| render.try_lock()) else {
            clear_destination(dest, dest_offset, num_samples);
            return false;
        };
        let RenderState { renderer, block } = &mut *render;
        let channels = self.format.num_channels as usize;

        let mut success = true;
        let mut position = 0;
        while position < num_samples {
            let block_len = (num_samples - position).min(self.max_block_size);
            block.resize(channels, block_len);
            block.clear();
            // Positions past the i64 range pin to its ends, where no region sounds
            let time = self
                .start_in_samples
                .saturating_add(start_sample)
                .saturating_add(position as i64);
            let ok = renderer.process_block(block, time, true);

            let begin = dest_offset + position;
            for (c, out) in dest.iter_mut().enumerate() {
                let out = &mut out[begin..begin + block_len];
                if c < channels {
                    out.copy_from_slice(block.channel(c));
                } else {
                    out.fill(0.0);
                }
            }
            position += block_len;

            if !ok {
                success = false;
                trace!(time, block_len, "render block failed");
                if self.block_failure == BlockFailurePolicy::Abort {
                    clear_destination(dest, dest_offset + position, num_samples - position);
                    break;
                }
            }
        }
        success
    }

    fn state(&self) -> ReaderState {
        self.state.get()
    }

    fn invalidate(&self) {
        let (previous, render) = self.lock.write(|core| (self.state.set(ReaderState::Invalidated), core.take()));
        if let Some(render) = render {
            render.into_inner().shut_down();
        }
        self.detach_from_regions();
        if !previous.is_terminal() {
            debug!("playback region reader invalidated");
        }
    }
}

impl PlaybackRegionListener for PlaybackRegionReader {
    fn will_update_playback_region_properties(&self, region: &PlaybackRegion, new_properties: &PlaybackRegionProperties) {
        if region.properties().affects_samples_compared_to(new_properties) {
            self.invalidate();
        }
    }

    fn did_update_playback_region_content(&self, _region: &PlaybackRegion, scopes: ContentUpdateScopes) {
        if scopes.affects_samples() {
            self.invalidate();
        }
    }

    fn will_destroy_playback_region(&self, _region: &PlaybackRegion) {
        self.invalidate();
    }
}

impl Drop for PlaybackRegionReader {
    fn drop(&mut self) {
        if let Some(render) = self.lock.write(Option::take) {
            render.into_inner().shut_down();
        }
        self.detach_from_regions();
    }
}

impl std::fmt::Debug for PlaybackRegionReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackRegionReader")
            .field("format", &self.format)
            .field("start_in_samples", &self.start_in_samples)
            .field("state", &self.state.get())
            .finish()
    }
}
