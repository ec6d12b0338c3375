//! Audio Modification - an edit layer over one audio source

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::{AudioSource, ContentUpdateScopes, ListenerId, ListenerList, ObjectId, PlaybackRegion};

/// Properties the host sets for an audio modification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioModificationProperties {
    pub name: String,
    pub persistent_id: String,
}

/// Hooks fired for an audio modification
#[allow(unused_variables)]
pub trait AudioModificationListener: Send + Sync {
    fn will_update_audio_modification_properties(
        &self,
        modification: &AudioModification,
        new_properties: &AudioModificationProperties,
    ) {
    }
    fn did_update_audio_modification_properties(&self, modification: &AudioModification) {}
    fn do_update_audio_modification_content(&self, modification: &AudioModification, scopes: ContentUpdateScopes) {}
    fn do_deactivate_audio_modification_for_undo_history(&self, modification: &AudioModification, deactivate: bool) {}
    fn did_add_playback_region_to_audio_modification(&self, modification: &AudioModification, region: &PlaybackRegion) {}
    fn will_remove_playback_region_from_audio_modification(
        &self,
        modification: &AudioModification,
        region: &PlaybackRegion,
    ) {
    }
    fn will_destroy_audio_modification(&self, modification: &AudioModification) {}
}

/// Mirror of one host audio modification
pub struct AudioModification {
    id: ObjectId,
    source: Arc<AudioSource>,
    properties: RwLock<AudioModificationProperties>,
    deactivated: AtomicBool,
    regions: Mutex<Vec<Weak<PlaybackRegion>>>,
    listeners: ListenerList<dyn AudioModificationListener>,
}

impl AudioModification {
    pub(crate) fn new(source: Arc<AudioSource>, properties: AudioModificationProperties) -> Self {
        Self {
            id: ObjectId::new(),
            source,
            properties: RwLock::new(properties),
            deactivated: AtomicBool::new(false),
            regions: Mutex::new(Vec::new()),
            listeners: ListenerList::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn audio_source(&self) -> &Arc<AudioSource> {
        &self.source
    }

    pub fn properties(&self) -> AudioModificationProperties {
        self.properties.read().clone()
    }

    pub fn is_deactivated_for_undo_history(&self) -> bool {
        self.deactivated.load(Ordering::Acquire)
    }

    /// Live playback regions using this modification
    pub fn playback_regions(&self) -> Vec<Arc<PlaybackRegion>> {
        self.regions.lock().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn add_listener(&self, listener: Weak<dyn AudioModificationListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    pub fn listeners(&self) -> &ListenerList<dyn AudioModificationListener> {
        &self.listeners
    }

    pub(crate) fn set_properties(&self, properties: AudioModificationProperties) {
        *self.properties.write() = properties;
    }

    pub(crate) fn set_deactivated(&self, deactivated: bool) {
        self.deactivated.store(deactivated, Ordering::Release);
    }

    pub(crate) fn attach_region(&self, region: &Arc<PlaybackRegion>) {
        self.regions.lock().push(Arc::downgrade(region));
    }

    pub(crate) fn detach_region(&self, id: ObjectId) {
        self.regions
            .lock()
            .retain(|r| r.upgrade().map(|r| r.id() != id).unwrap_or(false));
    }
}

impl std::fmt::Debug for AudioModification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioModification")
            .field("id", &self.id)
            .field("source", &self.source.id())
            .field("name", &self.properties.read().name)
            .finish()
    }
}
