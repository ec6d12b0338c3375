//! Region Sequence - an ordered track of playback regions

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{Color, ListenerId, ListenerList, ObjectId, PlaybackRegion};

/// Properties the host sets for a region sequence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSequenceProperties {
    pub name: String,
    pub order_index: i32,
    pub color: Option<Color>,
    pub musical_context: Option<ObjectId>,
}

impl RegionSequenceProperties {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Hooks fired for a region sequence
#[allow(unused_variables)]
pub trait RegionSequenceListener: Send + Sync {
    fn will_update_region_sequence_properties(
        &self,
        sequence: &RegionSequence,
        new_properties: &RegionSequenceProperties,
    ) {
    }
    fn did_update_region_sequence_properties(&self, sequence: &RegionSequence) {}
    fn did_add_playback_region_to_region_sequence(&self, sequence: &RegionSequence, region: &PlaybackRegion) {}
    fn will_remove_playback_region_from_region_sequence(&self, sequence: &RegionSequence, region: &PlaybackRegion) {}
    fn will_destroy_region_sequence(&self, sequence: &RegionSequence) {}
}

/// Mirror of one host region sequence
pub struct RegionSequence {
    id: ObjectId,
    properties: RwLock<RegionSequenceProperties>,
    regions: RwLock<Vec<Weak<PlaybackRegion>>>,
    listeners: ListenerList<dyn RegionSequenceListener>,
}

impl RegionSequence {
    pub(crate) fn new(properties: RegionSequenceProperties) -> Self {
        Self {
            id: ObjectId::new(),
            properties: RwLock::new(properties),
            regions: RwLock::new(Vec::new()),
            listeners: ListenerList::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn properties(&self) -> RegionSequenceProperties {
        self.properties.read().clone()
    }

    /// Current members in insertion order
    pub fn playback_regions(&self) -> Vec<Arc<PlaybackRegion>> {
        self.regions.read().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn contains(&self, region: &PlaybackRegion) -> bool {
        self.regions
            .read()
            .iter()
            .any(|r| r.upgrade().map(|r| r.id() == region.id()).unwrap_or(false))
    }

    /// Union of the members' playback time ranges, `(0, 0)` when empty
    pub fn time_range(&self, include_head_and_tail: bool) -> (f64, f64) {
        let regions = self.playback_regions();
        if regions.is_empty() {
            return (0.0, 0.0);
        }
        regions
            .iter()
            .map(|r| r.time_range(include_head_and_tail))
            .fold((f64::MAX, f64::MIN), |(start, end), (s, e)| (start.min(s), end.max(e)))
    }

    /// The sample rate shared by all members' sources
    ///
    /// `None` if the sequence is empty or its sources disagree.
    pub fn common_sample_rate(&self) -> Option<f64> {
        let mut common: Option<f64> = None;
        for region in self.playback_regions() {
            let rate = region.audio_source().sample_rate();
            match common {
                None => common = Some(rate),
                Some(existing) if existing != rate => return None,
                Some(_) => {}
            }
        }
        common
    }

    /// True if every member's audio source currently allows sample access
    pub fn is_sample_access_enabled(&self) -> bool {
        self.playback_regions()
            .iter()
            .all(|r| r.audio_source().is_sample_access_enabled())
    }

    pub fn add_listener(&self, listener: Weak<dyn RegionSequenceListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    pub fn listeners(&self) -> &ListenerList<dyn RegionSequenceListener> {
        &self.listeners
    }

    pub(crate) fn set_properties(&self, properties: RegionSequenceProperties) {
        *self.properties.write() = properties;
    }

    pub(crate) fn attach_region(&self, region: &Arc<PlaybackRegion>) {
        let mut regions = self.regions.write();
        regions.retain(|r| r.strong_count() > 0);
        regions.push(Arc::downgrade(region));
    }

    pub(crate) fn detach_region(&self, id: ObjectId) {
        self.regions
            .write()
            .retain(|r| r.upgrade().map(|r| r.id() != id).unwrap_or(false));
    }
}

impl std::fmt::Debug for RegionSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionSequence")
            .field("id", &self.id)
            .field("name", &self.properties.read().name)
            .field("regions", &self.regions.read().len())
            .finish()
    }
}
