//! Rendering engines
//!
//! A [`PlaybackRenderer`] turns a set of playback regions into audio, one
//! block at a time. Playback region readers own one engine each and are its
//! only caller.

pub mod source_renderer;

use std::sync::Arc;

use crate::engine::AudioBuffer;
use crate::model::{ObjectId, PlaybackRegion};

pub use source_renderer::SourceRenderer;

/// Block-based renderer of playback regions
pub trait PlaybackRenderer: Send {
    /// Allocate for rendering at `sample_rate` in blocks of at most
    /// `max_block_size` samples
    fn prepare_to_play(&mut self, sample_rate: f64, max_block_size: usize, num_channels: usize);

    /// Free everything allocated by `prepare_to_play`
    fn release_resources(&mut self);

    fn is_prepared(&self) -> bool;

    fn add_region(&mut self, region: Arc<PlaybackRegion>);

    fn remove_region(&mut self, region_id: ObjectId);

    fn regions(&self) -> Vec<Arc<PlaybackRegion>>;

    /// Render the block starting at playback sample `time_in_samples`
    ///
    /// # Arguments
    /// * `buffer` - Output block; its length is the block size
    /// * `time_in_samples` - Playback position of the first sample
    /// * `is_playing` - When false the block is silence
    ///
    /// # Returns
    /// `false` if any part of the block could not be rendered. The buffer
    /// holds whatever was rendered either way.
    fn process_block(&mut self, buffer: &mut AudioBuffer, time_in_samples: i64, is_playing: bool) -> bool;
}
