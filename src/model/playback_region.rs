//! Playback Region - a placed, time-ranged use of an audio modification
//!
//! A region maps a span of its modification's time line onto the song's
//! playback time line. Head and tail time extend the rendered span beyond the
//! region bounds (fade-ins, reverb tails).

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{
    AudioModification, AudioSource, Color, ContentUpdateScopes, ListenerId, ListenerList, ObjectId,
    TransformationFlags,
};

/// Convert a time in seconds to a sample position, rounding half up
#[inline]
pub fn sample_position_at_time(time: f64, sample_rate: f64) -> i64 {
    (time * sample_rate + 0.5).floor() as i64
}

/// Properties the host sets for a playback region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackRegionProperties {
    /// Start in the modification's time line (seconds)
    pub start_in_modification_time: f64,
    /// Duration in the modification's time line (seconds)
    pub duration_in_modification_time: f64,
    /// Start in the playback time line (seconds)
    pub start_in_playback_time: f64,
    /// Duration in the playback time line (seconds)
    pub duration_in_playback_time: f64,
    pub transformation_flags: TransformationFlags,
    /// Region sequence this region currently belongs to
    pub region_sequence: Option<ObjectId>,
    pub name: String,
    pub color: Option<Color>,
}

impl PlaybackRegionProperties {
    /// Untransformed region: modification span `[start, start + duration)` placed at `position`
    pub fn new(start_in_modification_time: f64, duration: f64, position: f64) -> Self {
        Self {
            start_in_modification_time,
            duration_in_modification_time: duration,
            start_in_playback_time: position,
            duration_in_playback_time: duration,
            transformation_flags: TransformationFlags::NONE,
            region_sequence: None,
            name: String::new(),
            color: None,
        }
    }

    pub fn in_sequence(mut self, sequence: ObjectId) -> Self {
        self.region_sequence = Some(sequence);
        self
    }

    /// True if switching to `other` changes the rendered samples
    ///
    /// Sequence membership, name and color are not part of the signal.
    pub fn affects_samples_compared_to(&self, other: &PlaybackRegionProperties) -> bool {
        self.start_in_modification_time != other.start_in_modification_time
            || self.duration_in_modification_time != other.duration_in_modification_time
            || self.start_in_playback_time != other.start_in_playback_time
            || self.duration_in_playback_time != other.duration_in_playback_time
            || self.transformation_flags != other.transformation_flags
    }

    pub fn end_in_playback_time(&self) -> f64 {
        self.start_in_playback_time + self.duration_in_playback_time
    }

    pub fn end_in_modification_time(&self) -> f64 {
        self.start_in_modification_time + self.duration_in_modification_time
    }
}

/// Hooks fired for a playback region
#[allow(unused_variables)]
pub trait PlaybackRegionListener: Send + Sync {
    fn will_update_playback_region_properties(
        &self,
        region: &PlaybackRegion,
        new_properties: &PlaybackRegionProperties,
    ) {
    }
    fn did_update_playback_region_properties(&self, region: &PlaybackRegion) {}
    fn did_update_playback_region_content(&self, region: &PlaybackRegion, scopes: ContentUpdateScopes) {}
    fn will_destroy_playback_region(&self, region: &PlaybackRegion) {}
}

#[derive(Debug, Clone, Copy, Default)]
struct HeadAndTail {
    head: f64,
    tail: f64,
}

/// Mirror of one host playback region
pub struct PlaybackRegion {
    id: ObjectId,
    modification: Arc<AudioModification>,
    properties: RwLock<PlaybackRegionProperties>,
    head_and_tail: RwLock<HeadAndTail>,
    listeners: ListenerList<dyn PlaybackRegionListener>,
}

impl PlaybackRegion {
    pub(crate) fn new(modification: Arc<AudioModification>, properties: PlaybackRegionProperties) -> Self {
        Self {
            id: ObjectId::new(),
            modification,
            properties: RwLock::new(properties),
            head_and_tail: RwLock::new(HeadAndTail::default()),
            listeners: ListenerList::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn audio_modification(&self) -> &Arc<AudioModification> {
        &self.modification
    }

    pub fn audio_source(&self) -> &Arc<AudioSource> {
        self.modification.audio_source()
    }

    pub fn properties(&self) -> PlaybackRegionProperties {
        self.properties.read().clone()
    }

    /// Inspect the properties in place, without cloning them
    pub fn with_properties<R>(&self, f: impl FnOnce(&PlaybackRegionProperties) -> R) -> R {
        f(&self.properties.read())
    }

    pub fn region_sequence_id(&self) -> Option<ObjectId> {
        self.properties.read().region_sequence
    }

    pub fn transformation_flags(&self) -> TransformationFlags {
        self.properties.read().transformation_flags
    }

    pub fn start_in_playback_time(&self) -> f64 {
        self.properties.read().start_in_playback_time
    }

    pub fn end_in_playback_time(&self) -> f64 {
        self.properties.read().end_in_playback_time()
    }

    pub fn head_time(&self) -> f64 {
        self.head_and_tail.read().head
    }

    pub fn tail_time(&self) -> f64 {
        self.head_and_tail.read().tail
    }

    /// Playback time span `[start, end)`, optionally widened by head and tail
    pub fn time_range(&self, include_head_and_tail: bool) -> (f64, f64) {
        let props = self.properties.read();
        let mut start = props.start_in_playback_time;
        let mut end = props.end_in_playback_time();
        if include_head_and_tail {
            let head_and_tail = self.head_and_tail.read();
            start -= head_and_tail.head;
            end += head_and_tail.tail;
        }
        (start, end)
    }

    /// Playback sample span `[start, end)` at `sample_rate`
    pub fn sample_range(&self, sample_rate: f64, include_head_and_tail: bool) -> (i64, i64) {
        let (start, end) = self.time_range(include_head_and_tail);
        (
            sample_position_at_time(start, sample_rate),
            sample_position_at_time(end, sample_rate),
        )
    }

    pub fn add_listener(&self, listener: Weak<dyn PlaybackRegionListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    pub fn listeners(&self) -> &ListenerList<dyn PlaybackRegionListener> {
        &self.listeners
    }

    pub(crate) fn set_properties(&self, properties: PlaybackRegionProperties) {
        *self.properties.write() = properties;
    }

    pub(crate) fn set_head_and_tail_time(&self, head: f64, tail: f64) {
        *self.head_and_tail.write() = HeadAndTail {
            head: head.max(0.0),
            tail: tail.max(0.0),
        };
    }
}

impl std::fmt::Debug for PlaybackRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackRegion")
            .field("id", &self.id)
            .field("modification", &self.modification.id())
            .field("properties", &*self.properties.read())
            .field("head_and_tail", &*self.head_and_tail.read())
            .finish()
    }
}
