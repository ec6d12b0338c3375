//! Audio Source Reader
//!
//! Serves decoded samples of one audio source. The reader owns a private
//! host decode handle; it is dropped when the host disables sample access
//! and re-acquired when access comes back. Any change to the source's sample
//! format or sample content invalidates the reader for good.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::engine::ChannelSlices;
use crate::host::HostAudioReader;
use crate::model::{AudioSource, AudioSourceListener, AudioSourceProperties, ContentUpdateScopes, ListenerId, ObjectId};

use super::{clear_destination, writable_len, AudioReader, InvalidationLock, ReaderFormat, ReaderState, StateCell};

#[derive(Debug, Default)]
struct DecodeState {
    host_reader: Option<HostAudioReader>,
}

pub struct AudioSourceReader {
    source_id: ObjectId,
    format: ReaderFormat,
    source: Mutex<Weak<AudioSource>>,
    lock: InvalidationLock<DecodeState>,
    state: StateCell,
    /// Landing space for source channels a caller did not ask for
    scratch: Mutex<Vec<Vec<f32>>>,
}

impl AudioSourceReader {
    /// Create a reader and register it with `source`
    ///
    /// The format is taken from the source's current properties. The reader
    /// starts `Valid` if sample access is enabled, `AccessDisabled` otherwise.
    pub fn new(source: &Arc<AudioSource>) -> Arc<Self> {
        let format = ReaderFormat::new(
            source.sample_rate(),
            source.channel_count(),
            source.sample_count(),
        );

        let host_reader = acquire_host_reader(source, format.num_channels);
        let initial = if host_reader.is_some() {
            ReaderState::Valid
        } else {
            ReaderState::AccessDisabled
        };

        let reader = Arc::new(Self {
            source_id: source.id(),
            format,
            source: Mutex::new(Arc::downgrade(source)),
            lock: InvalidationLock::new(DecodeState { host_reader }),
            state: StateCell::new(initial),
            scratch: Mutex::new(Vec::new()),
        });

        let weak = Arc::downgrade(&reader);
        let listener: Weak<dyn AudioSourceListener> = weak;
        source.add_listener(listener);
        debug!(source = %reader.source_id, state = %initial, "audio source reader created");
        reader
    }

    pub fn source_id(&self) -> ObjectId {
        self.source_id
    }

    /// The observed source, if it is still alive and not destroyed
    pub fn audio_source(&self) -> Option<Arc<AudioSource>> {
        self.source.lock().upgrade()
    }

    fn detach(&self) {
        let source = std::mem::take(&mut *self.source.lock());
        if let Some(source) = source.upgrade() {
            source.remove_listener(ListenerId::of(self));
        }
    }
}

fn acquire_host_reader(source: &AudioSource, num_channels: u32) -> Option<HostAudioReader> {
    if !source.is_sample_access_enabled() {
        return None;
    }
    match HostAudioReader::new(source.host().clone(), num_channels as usize) {
        Ok(reader) => Some(reader),
        Err(e) => {
            warn!(source = %source.id(), error = %e, "could not acquire host reader");
            None
        }
    }
}

impl AudioReader for AudioSourceReader {
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

        let Some(decode) = self.lock.try_read() else {
            trace!(source = %self.source_id, "read skipped, reader busy");
            clear_destination(dest, dest_offset, num_samples);
            return false;
        };
        let Some(host_reader) = decode.host_reader.as_ref() else {
            clear_destination(dest, dest_offset, num_samples);
            return false;
        };

        // Only the part inside [0, length) is decoded
        clear_destination(dest, dest_offset, num_samples);
        let length = self.format.length_in_samples;
        let first = start_sample.clamp(0, length);
        let last = start_sample.saturating_add(num_samples as i64).clamp(0, length);
        if first >= last {
            return true;
        }
        let skip = dest_offset + (first - start_sample) as usize;
        let count = (last - first) as usize;

        // The host fills every source channel; channels the caller did not
        // ask for land in scratch. Scratch keeps its capacity between reads
        // and is only allocated afresh when another thread holds it.
        let source_channels = host_reader.channel_count();
        let unrequested = source_channels.saturating_sub(dest.len());
        let mut pooled = if unrequested > 0 { self.scratch.try_lock() } else { None };
        let mut contended = Vec::new();
        let scratch = match pooled.as_deref_mut() {
            Some(pooled) => pooled,
            None => &mut contended,
        };
        scratch.resize_with(unrequested, Vec::new);
        for channel in scratch.iter_mut() {
            channel.clear();
            channel.resize(count, 0.0);
        }
        let ok = {
            let mut channels = ChannelSlices::new();
            for channel in dest.iter_mut().take(source_channels) {
                channels.push(&mut channel[skip..skip + count]);
            }
            for channel in scratch.iter_mut() {
                channels.push(channel.as_mut_slice());
            }
            host_reader.read_audio_samples(first, &mut channels)
        };

        if !ok {
            trace!(source = %self.source_id, start = first, count, "host read failed");
            clear_destination(dest, dest_offset, num_samples);
        }
        ok
    }

    fn state(&self) -> ReaderState {
        self.state.get()
    }

    fn invalidate(&self) {
        let previous = self.lock.write(|decode| {
            decode.host_reader = None;
            self.state.set(ReaderState::Invalidated)
        });
        if !previous.is_terminal() {
            debug!(source = %self.source_id, "audio source reader invalidated");
        }
    }
}

impl AudioSourceListener for AudioSourceReader {
    fn will_update_audio_source_properties(&self, source: &AudioSource, new_properties: &AudioSourceProperties) {
        if source.properties().changes_sample_format(new_properties) {
            self.invalidate();
        }
    }

    fn do_update_audio_source_content(&self, _source: &AudioSource, scopes: ContentUpdateScopes) {
        if scopes.affects_samples() {
            self.invalidate();
        }
    }

    fn will_enable_audio_source_samples_access(&self, _source: &AudioSource, enable: bool) {
        self.lock.begin_bracket(|decode| {
            if !enable {
                decode.host_reader = None;
                self.state.set(ReaderState::AccessDisabled);
            }
        });
    }

    fn did_enable_audio_source_samples_access(&self, source: &AudioSource, enable: bool) {
        self.lock.end_bracket(|decode| {
            // A reader created between the two dispatches missed the `will`
            // half, so disabling is applied here too
            if !enable {
                decode.host_reader = None;
                self.state.set(ReaderState::AccessDisabled);
                return;
            }
            if self.state.get().is_terminal() {
                return;
            }
            decode.host_reader = acquire_host_reader(source, self.format.num_channels);
            let state = if decode.host_reader.is_some() {
                ReaderState::Valid
            } else {
                ReaderState::AccessDisabled
            };
            self.state.set(state);
        });
        debug!(source = %self.source_id, enable, state = %self.state.get(), "sample access changed");
    }

    fn will_destroy_audio_source(&self, _source: &AudioSource) {
        self.invalidate();
        self.detach();
    }
}

impl Drop for AudioSourceReader {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for AudioSourceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSourceReader")
            .field("source_id", &self.source_id)
            .field("format", &self.format)
            .field("state", &self.state.get())
            .finish()
    }
}
