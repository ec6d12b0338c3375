//! Audio Source - host-owned sample data
//!
//! An audio source describes a stream of samples the host can deliver. Its
//! properties may change during an edit, and the host can temporarily revoke
//! sample access. Readers observe both through [`AudioSourceListener`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::host::{HostAudioSource, SampleProvider};

use super::{AudioModification, ContentUpdateScopes, ListenerId, ListenerList, ObjectId};

/// Properties the host sets for an audio source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSourceProperties {
    /// Display name
    pub name: String,
    /// Persistent id used by the host to match archived state
    pub persistent_id: String,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Number of channels
    pub channel_count: u32,
    /// Total length in samples per channel
    pub sample_count: i64,
    /// Whether the source deserves 64-bit processing
    pub merits_64_bit_samples: bool,
}

impl AudioSourceProperties {
    pub fn new(name: impl Into<String>, sample_rate: f64, channel_count: u32, sample_count: i64) -> Self {
        let name = name.into();
        Self {
            persistent_id: name.clone(),
            name,
            sample_rate,
            channel_count,
            sample_count,
            merits_64_bit_samples: false,
        }
    }

    /// True if switching to `other` changes what a decoder would produce
    pub fn changes_sample_format(&self, other: &AudioSourceProperties) -> bool {
        self.sample_rate != other.sample_rate
            || self.channel_count != other.channel_count
            || self.sample_count != other.sample_count
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate <= 0.0 {
            return 0.0;
        }
        self.sample_count as f64 / self.sample_rate
    }
}

/// Hooks fired for an audio source, all on the controller thread
#[allow(unused_variables)]
pub trait AudioSourceListener: Send + Sync {
    fn will_update_audio_source_properties(&self, source: &AudioSource, new_properties: &AudioSourceProperties) {}
    fn did_update_audio_source_properties(&self, source: &AudioSource) {}
    fn do_update_audio_source_content(&self, source: &AudioSource, scopes: ContentUpdateScopes) {}
    fn will_enable_audio_source_samples_access(&self, source: &AudioSource, enable: bool) {}
    fn did_enable_audio_source_samples_access(&self, source: &AudioSource, enable: bool) {}
    fn do_deactivate_audio_source_for_undo_history(&self, source: &AudioSource, deactivate: bool) {}
    fn did_add_audio_modification_to_audio_source(&self, source: &AudioSource, modification: &AudioModification) {}
    fn will_remove_audio_modification_from_audio_source(&self, source: &AudioSource, modification: &AudioModification) {}
    fn will_destroy_audio_source(&self, source: &AudioSource) {}
}

/// Mirror of one host audio source
pub struct AudioSource {
    id: ObjectId,
    properties: RwLock<AudioSourceProperties>,
    host: Arc<HostAudioSource>,
    deactivated: AtomicBool,
    modifications: Mutex<Vec<Weak<AudioModification>>>,
    listeners: ListenerList<dyn AudioSourceListener>,
}

impl AudioSource {
    pub(crate) fn new(properties: AudioSourceProperties, provider: Arc<dyn SampleProvider>) -> Self {
        let id = ObjectId::new();
        Self {
            id,
            properties: RwLock::new(properties),
            host: Arc::new(HostAudioSource::new(id, provider)),
            deactivated: AtomicBool::new(false),
            modifications: Mutex::new(Vec::new()),
            listeners: ListenerList::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Snapshot of the committed properties
    pub fn properties(&self) -> AudioSourceProperties {
        self.properties.read().clone()
    }

    pub fn name(&self) -> String {
        self.properties.read().name.clone()
    }

    pub fn sample_rate(&self) -> f64 {
        self.properties.read().sample_rate
    }

    pub fn channel_count(&self) -> u32 {
        self.properties.read().channel_count
    }

    pub fn sample_count(&self) -> i64 {
        self.properties.read().sample_count
    }

    pub fn is_sample_access_enabled(&self) -> bool {
        self.host.is_access_enabled()
    }

    pub fn is_deactivated_for_undo_history(&self) -> bool {
        self.deactivated.load(Ordering::Acquire)
    }

    /// Host-side data and access gate
    pub fn host(&self) -> &Arc<HostAudioSource> {
        &self.host
    }

    /// Live audio modifications of this source
    pub fn audio_modifications(&self) -> Vec<Arc<AudioModification>> {
        self.modifications.lock().iter().filter_map(Weak::upgrade).collect()
    }

    pub fn add_listener(&self, listener: Weak<dyn AudioSourceListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    pub fn listeners(&self) -> &ListenerList<dyn AudioSourceListener> {
        &self.listeners
    }

    // ------------------------------------------------------------------------
    // Commit helpers used by the document
    // ------------------------------------------------------------------------

    pub(crate) fn set_properties(&self, properties: AudioSourceProperties) {
        *self.properties.write() = properties;
    }

    pub(crate) fn set_sample_access_enabled(&self, enabled: bool) {
        self.host.set_access_enabled(enabled);
    }

    pub(crate) fn set_deactivated(&self, deactivated: bool) {
        self.deactivated.store(deactivated, Ordering::Release);
    }

    pub(crate) fn attach_modification(&self, modification: &Arc<AudioModification>) {
        self.modifications.lock().push(Arc::downgrade(modification));
    }

    pub(crate) fn detach_modification(&self, id: ObjectId) {
        self.modifications
            .lock()
            .retain(|m| m.upgrade().map(|m| m.id() != id).unwrap_or(false));
    }
}

impl std::fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSource")
            .field("id", &self.id)
            .field("properties", &*self.properties.read())
            .field("access_enabled", &self.is_sample_access_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemorySampleProvider;

    #[test]
    fn test_sample_format_change_detection() {
        let a = AudioSourceProperties::new("kick", 48000.0, 2, 1000);
        let mut b = a.clone();
        b.name = "kick (renamed)".to_string();
        assert!(!a.changes_sample_format(&b));

        b.sample_count = 1200;
        assert!(a.changes_sample_format(&b));
    }

    #[test]
    fn test_duration() {
        let props = AudioSourceProperties::new("x", 48000.0, 1, 96000);
        assert_eq!(props.duration_secs(), 2.0);
    }

    #[test]
    fn test_access_starts_disabled() {
        let source = AudioSource::new(
            AudioSourceProperties::new("x", 44100.0, 1, 10),
            Arc::new(MemorySampleProvider::ramp(1, 10)),
        );
        assert!(!source.is_sample_access_enabled());
        source.set_sample_access_enabled(true);
        assert!(source.is_sample_access_enabled());
    }
}
