//! Document - owner of the model graph and driver of edits
//!
//! All mutations go through [`Document`] on a single controller thread. Each
//! edit fires the matching `will…` hook, commits, then fires the `did…` hook,
//! so listeners (readers in particular) can bracket the change.
//!
//! Registries are only locked long enough to look objects up; no document
//! lock is held while listeners run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{AraError, Result};
use crate::host::SampleProvider;

use super::{
    AudioModification, AudioModificationProperties, AudioSource, AudioSourceProperties,
    ContentUpdateScopes, ListenerId, ListenerList, MusicalContext, MusicalContextProperties,
    ObjectId, PlaybackRegion, PlaybackRegionProperties, RegionSequence, RegionSequenceProperties,
};

/// Hooks fired for the document itself
#[allow(unused_variables)]
pub trait DocumentListener: Send + Sync {
    fn will_begin_editing(&self, document: &Document) {}
    fn did_end_editing(&self, document: &Document) {}
    fn did_add_audio_source_to_document(&self, document: &Document, source: &AudioSource) {}
    fn will_remove_audio_source_from_document(&self, document: &Document, source: &AudioSource) {}
    fn did_add_region_sequence_to_document(&self, document: &Document, sequence: &RegionSequence) {}
    fn will_remove_region_sequence_from_document(&self, document: &Document, sequence: &RegionSequence) {}
    fn did_add_musical_context_to_document(&self, document: &Document, context: &MusicalContext) {}
    fn will_remove_musical_context_from_document(&self, document: &Document, context: &MusicalContext) {}
    fn will_destroy_document(&self, document: &Document) {}
}

/// Content changes made on the plug-in side that the host has not been told about yet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingModelUpdates {
    pub audio_sources: HashMap<ObjectId, ContentUpdateScopes>,
    pub audio_modifications: HashMap<ObjectId, ContentUpdateScopes>,
    pub playback_regions: HashMap<ObjectId, ContentUpdateScopes>,
}

impl PendingModelUpdates {
    pub fn is_empty(&self) -> bool {
        self.audio_sources.is_empty()
            && self.audio_modifications.is_empty()
            && self.playback_regions.is_empty()
    }
}

fn is_registered<T>(registry: &RwLock<Vec<Arc<T>>>, object: &Arc<T>) -> bool {
    registry.read().iter().any(|o| Arc::ptr_eq(o, object))
}

fn unregister<T>(registry: &RwLock<Vec<Arc<T>>>, object: &Arc<T>) {
    registry.write().retain(|o| !Arc::ptr_eq(o, object));
}

fn validate_sample_rate(rate: f64) -> Result<()> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(AraError::InvalidSampleRate { rate })
    }
}

/// The plug-in side document graph
pub struct Document {
    id: ObjectId,
    name: RwLock<String>,
    audio_sources: RwLock<Vec<Arc<AudioSource>>>,
    audio_modifications: RwLock<Vec<Arc<AudioModification>>>,
    playback_regions: RwLock<Vec<Arc<PlaybackRegion>>>,
    region_sequences: RwLock<Vec<Arc<RegionSequence>>>,
    musical_contexts: RwLock<Vec<Arc<MusicalContext>>>,
    editing: AtomicBool,
    pending: Mutex<PendingModelUpdates>,
    listeners: ListenerList<dyn DocumentListener>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            name: RwLock::new(name.into()),
            audio_sources: RwLock::new(Vec::new()),
            audio_modifications: RwLock::new(Vec::new()),
            playback_regions: RwLock::new(Vec::new()),
            region_sequences: RwLock::new(Vec::new()),
            musical_contexts: RwLock::new(Vec::new()),
            editing: AtomicBool::new(false),
            pending: Mutex::new(PendingModelUpdates::default()),
            listeners: ListenerList::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    pub fn add_listener(&self, listener: Weak<dyn DocumentListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    // ========================================================================
    // Edit Cycle
    // ========================================================================

    pub fn begin_editing(&self) {
        if !self.editing.swap(true, Ordering::AcqRel) {
            self.listeners.call(|l| l.will_begin_editing(self));
        }
    }

    pub fn end_editing(&self) {
        if self.editing.swap(false, Ordering::AcqRel) {
            self.listeners.call(|l| l.did_end_editing(self));
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing.load(Ordering::Acquire)
    }

    /// Drain the content updates the host must be notified about
    pub fn take_pending_model_updates(&self) -> PendingModelUpdates {
        std::mem::take(&mut *self.pending.lock())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn audio_sources(&self) -> Vec<Arc<AudioSource>> {
        self.audio_sources.read().clone()
    }

    pub fn audio_modifications(&self) -> Vec<Arc<AudioModification>> {
        self.audio_modifications.read().clone()
    }

    pub fn playback_regions(&self) -> Vec<Arc<PlaybackRegion>> {
        self.playback_regions.read().clone()
    }

    pub fn region_sequences(&self) -> Vec<Arc<RegionSequence>> {
        self.region_sequences.read().clone()
    }

    pub fn musical_contexts(&self) -> Vec<Arc<MusicalContext>> {
        self.musical_contexts.read().clone()
    }

    pub fn audio_source(&self, id: ObjectId) -> Option<Arc<AudioSource>> {
        self.audio_sources.read().iter().find(|s| s.id() == id).cloned()
    }

    pub fn playback_region(&self, id: ObjectId) -> Option<Arc<PlaybackRegion>> {
        self.playback_regions.read().iter().find(|r| r.id() == id).cloned()
    }

    pub fn region_sequence(&self, id: ObjectId) -> Option<Arc<RegionSequence>> {
        self.region_sequences.read().iter().find(|s| s.id() == id).cloned()
    }

    fn require_region_sequence(&self, id: ObjectId) -> Result<Arc<RegionSequence>> {
        self.region_sequence(id).ok_or(AraError::ObjectNotFound {
            kind: "region sequence",
            id,
        })
    }

    // ========================================================================
    // Audio Sources
    // ========================================================================

    /// Add an audio source. Sample access starts disabled, as in a fresh host edit.
    pub fn create_audio_source(
        &self,
        properties: AudioSourceProperties,
        provider: Arc<dyn SampleProvider>,
    ) -> Result<Arc<AudioSource>> {
        validate_sample_rate(properties.sample_rate)?;
        let source = Arc::new(AudioSource::new(properties, provider));
        self.audio_sources.write().push(source.clone());
        debug!(source = %source.id(), name = %source.name(), "audio source created");
        self.listeners.call(|l| l.did_add_audio_source_to_document(self, &source));
        Ok(source)
    }

    pub fn update_audio_source_properties(
        &self,
        source: &Arc<AudioSource>,
        properties: AudioSourceProperties,
    ) -> Result<()> {
        self.ensure_audio_source(source)?;
        validate_sample_rate(properties.sample_rate)?;
        source
            .listeners()
            .call(|l| l.will_update_audio_source_properties(source, &properties));
        source.set_properties(properties);
        source.listeners().call(|l| l.did_update_audio_source_properties(source));
        Ok(())
    }

    /// Host reports that the source's content changed
    pub fn update_audio_source_content(&self, source: &Arc<AudioSource>, scopes: ContentUpdateScopes) -> Result<()> {
        self.ensure_audio_source(source)?;
        debug!(source = %source.id(), %scopes, "audio source content updated by host");
        source
            .listeners()
            .call(|l| l.do_update_audio_source_content(source, scopes));
        Ok(())
    }

    /// Plug-in changed the source's content; queue a host notification
    ///
    /// With `notify_dependents`, every modification and playback region built
    /// on this source is notified with the same scopes.
    pub fn notify_audio_source_content_changed(
        &self,
        source: &Arc<AudioSource>,
        scopes: ContentUpdateScopes,
        notify_dependents: bool,
    ) -> Result<()> {
        self.ensure_audio_source(source)?;
        *self.pending.lock().audio_sources.entry(source.id()).or_default() |= scopes;
        source
            .listeners()
            .call(|l| l.do_update_audio_source_content(source, scopes));

        if notify_dependents {
            for modification in source.audio_modifications() {
                self.notify_audio_modification_content_changed(&modification, scopes, true)?;
            }
        }
        Ok(())
    }

    /// Toggle host sample access, bracketed by the will/did hooks
    pub fn enable_audio_source_samples_access(&self, source: &Arc<AudioSource>, enable: bool) -> Result<()> {
        self.ensure_audio_source(source)?;
        source
            .listeners()
            .call(|l| l.will_enable_audio_source_samples_access(source, enable));
        source.set_sample_access_enabled(enable);
        debug!(source = %source.id(), enable, "sample access changed");
        source
            .listeners()
            .call(|l| l.did_enable_audio_source_samples_access(source, enable));
        Ok(())
    }

    pub fn deactivate_audio_source_for_undo_history(&self, source: &Arc<AudioSource>, deactivate: bool) -> Result<()> {
        self.ensure_audio_source(source)?;
        source.set_deactivated(deactivate);
        source
            .listeners()
            .call(|l| l.do_deactivate_audio_source_for_undo_history(source, deactivate));
        Ok(())
    }

    /// Destroy a source together with its modifications and their regions
    pub fn destroy_audio_source(&self, source: &Arc<AudioSource>) -> Result<()> {
        self.ensure_audio_source(source)?;
        for modification in source.audio_modifications() {
            self.destroy_audio_modification(&modification)?;
        }

        self.listeners
            .call(|l| l.will_remove_audio_source_from_document(self, source));
        source.listeners().call(|l| l.will_destroy_audio_source(source));
        unregister(&self.audio_sources, source);
        self.pending.lock().audio_sources.remove(&source.id());
        debug!(source = %source.id(), "audio source destroyed");
        Ok(())
    }

    fn ensure_audio_source(&self, source: &Arc<AudioSource>) -> Result<()> {
        if is_registered(&self.audio_sources, source) {
            Ok(())
        } else {
            Err(AraError::ObjectDestroyed { kind: "audio source" })
        }
    }

    // ========================================================================
    // Audio Modifications
    // ========================================================================

    pub fn create_audio_modification(
        &self,
        source: &Arc<AudioSource>,
        properties: AudioModificationProperties,
    ) -> Result<Arc<AudioModification>> {
        self.ensure_audio_source(source)?;
        let modification = Arc::new(AudioModification::new(source.clone(), properties));
        source.attach_modification(&modification);
        self.audio_modifications.write().push(modification.clone());
        source
            .listeners()
            .call(|l| l.did_add_audio_modification_to_audio_source(source, &modification));
        Ok(modification)
    }

    pub fn update_audio_modification_properties(
        &self,
        modification: &Arc<AudioModification>,
        properties: AudioModificationProperties,
    ) -> Result<()> {
        self.ensure_audio_modification(modification)?;
        modification
            .listeners()
            .call(|l| l.will_update_audio_modification_properties(modification, &properties));
        modification.set_properties(properties);
        modification
            .listeners()
            .call(|l| l.did_update_audio_modification_properties(modification));
        Ok(())
    }

    /// Host reports that the modification's content changed
    pub fn update_audio_modification_content(
        &self,
        modification: &Arc<AudioModification>,
        scopes: ContentUpdateScopes,
    ) -> Result<()> {
        self.ensure_audio_modification(modification)?;
        modification
            .listeners()
            .call(|l| l.do_update_audio_modification_content(modification, scopes));
        Ok(())
    }

    /// Plug-in changed the modification's content; queue a host notification
    pub fn notify_audio_modification_content_changed(
        &self,
        modification: &Arc<AudioModification>,
        scopes: ContentUpdateScopes,
        notify_regions: bool,
    ) -> Result<()> {
        self.ensure_audio_modification(modification)?;
        *self
            .pending
            .lock()
            .audio_modifications
            .entry(modification.id())
            .or_default() |= scopes;
        modification
            .listeners()
            .call(|l| l.do_update_audio_modification_content(modification, scopes));

        if notify_regions {
            for region in modification.playback_regions() {
                self.notify_playback_region_content_changed(&region, scopes)?;
            }
        }
        Ok(())
    }

    pub fn deactivate_audio_modification_for_undo_history(
        &self,
        modification: &Arc<AudioModification>,
        deactivate: bool,
    ) -> Result<()> {
        self.ensure_audio_modification(modification)?;
        modification.set_deactivated(deactivate);
        modification
            .listeners()
            .call(|l| l.do_deactivate_audio_modification_for_undo_history(modification, deactivate));
        Ok(())
    }

    /// Destroy a modification together with its playback regions
    pub fn destroy_audio_modification(&self, modification: &Arc<AudioModification>) -> Result<()> {
        self.ensure_audio_modification(modification)?;
        for region in modification.playback_regions() {
            self.destroy_playback_region(&region)?;
        }

        let source = modification.audio_source();
        source
            .listeners()
            .call(|l| l.will_remove_audio_modification_from_audio_source(source, modification));
        modification
            .listeners()
            .call(|l| l.will_destroy_audio_modification(modification));
        source.detach_modification(modification.id());
        unregister(&self.audio_modifications, modification);
        self.pending.lock().audio_modifications.remove(&modification.id());
        Ok(())
    }

    fn ensure_audio_modification(&self, modification: &Arc<AudioModification>) -> Result<()> {
        if is_registered(&self.audio_modifications, modification) {
            Ok(())
        } else {
            Err(AraError::ObjectDestroyed {
                kind: "audio modification",
            })
        }
    }

    // ========================================================================
    // Playback Regions
    // ========================================================================

    /// Add a playback region, joining the sequence named in its properties
    pub fn create_playback_region(
        &self,
        modification: &Arc<AudioModification>,
        properties: PlaybackRegionProperties,
    ) -> Result<Arc<PlaybackRegion>> {
        self.ensure_audio_modification(modification)?;
        let sequence = properties
            .region_sequence
            .map(|id| self.require_region_sequence(id))
            .transpose()?;

        let region = Arc::new(PlaybackRegion::new(modification.clone(), properties));
        modification.attach_region(&region);
        self.playback_regions.write().push(region.clone());
        modification
            .listeners()
            .call(|l| l.did_add_playback_region_to_audio_modification(modification, &region));

        if let Some(sequence) = sequence {
            sequence.attach_region(&region);
            sequence
                .listeners()
                .call(|l| l.did_add_playback_region_to_region_sequence(&sequence, &region));
        }
        debug!(region = %region.id(), "playback region created");
        Ok(region)
    }

    /// Commit new region properties
    ///
    /// A change of `region_sequence` moves the region between sequences and
    /// fires the sequences' remove/add hooks inside the property bracket. A
    /// sample-affecting change is followed by a content update.
    pub fn update_playback_region_properties(
        &self,
        region: &Arc<PlaybackRegion>,
        properties: PlaybackRegionProperties,
    ) -> Result<()> {
        self.ensure_playback_region(region)?;
        let old = region.properties();
        let new_sequence = match properties.region_sequence {
            Some(id) if Some(id) != old.region_sequence => Some(self.require_region_sequence(id)?),
            _ => None,
        };
        let affects_samples = old.affects_samples_compared_to(&properties);

        region
            .listeners()
            .call(|l| l.will_update_playback_region_properties(region, &properties));

        if old.region_sequence != properties.region_sequence {
            if let Some(old_sequence) = old.region_sequence.and_then(|id| self.region_sequence(id)) {
                old_sequence
                    .listeners()
                    .call(|l| l.will_remove_playback_region_from_region_sequence(&old_sequence, region));
                old_sequence.detach_region(region.id());
            }
        }

        region.set_properties(properties);

        if let Some(sequence) = new_sequence {
            sequence.attach_region(region);
            sequence
                .listeners()
                .call(|l| l.did_add_playback_region_to_region_sequence(&sequence, region));
        }

        region
            .listeners()
            .call(|l| l.did_update_playback_region_properties(region));

        if affects_samples {
            self.notify_playback_region_content_changed(region, ContentUpdateScopes::samples_are_affected())?;
        }
        Ok(())
    }

    /// Change how far rendering extends beyond the region bounds
    pub fn set_playback_region_head_and_tail_time(
        &self,
        region: &Arc<PlaybackRegion>,
        head_time: f64,
        tail_time: f64,
    ) -> Result<()> {
        self.ensure_playback_region(region)?;
        region.set_head_and_tail_time(head_time, tail_time);
        self.notify_playback_region_content_changed(region, ContentUpdateScopes::samples_are_affected())
    }

    /// Region content changed; queue a host notification and tell listeners
    pub fn notify_playback_region_content_changed(
        &self,
        region: &Arc<PlaybackRegion>,
        scopes: ContentUpdateScopes,
    ) -> Result<()> {
        self.ensure_playback_region(region)?;
        *self.pending.lock().playback_regions.entry(region.id()).or_default() |= scopes;
        region
            .listeners()
            .call(|l| l.did_update_playback_region_content(region, scopes));
        Ok(())
    }

    pub fn destroy_playback_region(&self, region: &Arc<PlaybackRegion>) -> Result<()> {
        self.ensure_playback_region(region)?;

        if let Some(sequence) = region.region_sequence_id().and_then(|id| self.region_sequence(id)) {
            sequence
                .listeners()
                .call(|l| l.will_remove_playback_region_from_region_sequence(&sequence, region));
            sequence.detach_region(region.id());
        }

        let modification = region.audio_modification();
        modification
            .listeners()
            .call(|l| l.will_remove_playback_region_from_audio_modification(modification, region));
        region.listeners().call(|l| l.will_destroy_playback_region(region));
        modification.detach_region(region.id());
        unregister(&self.playback_regions, region);
        self.pending.lock().playback_regions.remove(&region.id());
        debug!(region = %region.id(), "playback region destroyed");
        Ok(())
    }

    fn ensure_playback_region(&self, region: &Arc<PlaybackRegion>) -> Result<()> {
        if is_registered(&self.playback_regions, region) {
            Ok(())
        } else {
            Err(AraError::ObjectDestroyed {
                kind: "playback region",
            })
        }
    }

    // ========================================================================
    // Region Sequences
    // ========================================================================

    pub fn create_region_sequence(&self, properties: RegionSequenceProperties) -> Arc<RegionSequence> {
        let sequence = Arc::new(RegionSequence::new(properties));
        self.region_sequences.write().push(sequence.clone());
        self.listeners
            .call(|l| l.did_add_region_sequence_to_document(self, &sequence));
        sequence
    }

    pub fn update_region_sequence_properties(
        &self,
        sequence: &Arc<RegionSequence>,
        properties: RegionSequenceProperties,
    ) -> Result<()> {
        self.ensure_region_sequence(sequence)?;
        sequence
            .listeners()
            .call(|l| l.will_update_region_sequence_properties(sequence, &properties));
        sequence.set_properties(properties);
        sequence
            .listeners()
            .call(|l| l.did_update_region_sequence_properties(sequence));
        Ok(())
    }

    /// Destroy a sequence; remaining members are moved out of it first
    pub fn destroy_region_sequence(&self, sequence: &Arc<RegionSequence>) -> Result<()> {
        self.ensure_region_sequence(sequence)?;
        for region in sequence.playback_regions() {
            let mut properties = region.properties();
            properties.region_sequence = None;
            self.update_playback_region_properties(&region, properties)?;
        }

        self.listeners
            .call(|l| l.will_remove_region_sequence_from_document(self, sequence));
        sequence.listeners().call(|l| l.will_destroy_region_sequence(sequence));
        unregister(&self.region_sequences, sequence);
        Ok(())
    }

    fn ensure_region_sequence(&self, sequence: &Arc<RegionSequence>) -> Result<()> {
        if is_registered(&self.region_sequences, sequence) {
            Ok(())
        } else {
            Err(AraError::ObjectDestroyed {
                kind: "region sequence",
            })
        }
    }

    // ========================================================================
    // Musical Contexts
    // ========================================================================

    pub fn create_musical_context(&self, properties: MusicalContextProperties) -> Arc<MusicalContext> {
        let context = Arc::new(MusicalContext::new(properties));
        self.musical_contexts.write().push(context.clone());
        self.listeners
            .call(|l| l.did_add_musical_context_to_document(self, &context));
        context
    }

    pub fn update_musical_context_properties(
        &self,
        context: &Arc<MusicalContext>,
        properties: MusicalContextProperties,
    ) -> Result<()> {
        self.ensure_musical_context(context)?;
        context
            .listeners()
            .call(|l| l.will_update_musical_context_properties(context, &properties));
        context.set_properties(properties);
        context
            .listeners()
            .call(|l| l.did_update_musical_context_properties(context));
        Ok(())
    }

    pub fn update_musical_context_content(
        &self,
        context: &Arc<MusicalContext>,
        scopes: ContentUpdateScopes,
    ) -> Result<()> {
        self.ensure_musical_context(context)?;
        context
            .listeners()
            .call(|l| l.do_update_musical_context_content(context, scopes));
        Ok(())
    }

    pub fn destroy_musical_context(&self, context: &Arc<MusicalContext>) -> Result<()> {
        self.ensure_musical_context(context)?;
        self.listeners
            .call(|l| l.will_remove_musical_context_from_document(self, context));
        context.listeners().call(|l| l.will_destroy_musical_context(context));
        unregister(&self.musical_contexts, context);
        Ok(())
    }

    fn ensure_musical_context(&self, context: &Arc<MusicalContext>) -> Result<()> {
        if is_registered(&self.musical_contexts, context) {
            Ok(())
        } else {
            Err(AraError::ObjectDestroyed {
                kind: "musical context",
            })
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Tear down the whole graph, firing every destroy hook
    pub fn destroy(&self) -> Result<()> {
        self.listeners.call(|l| l.will_destroy_document(self));
        for sequence in self.region_sequences() {
            self.destroy_region_sequence(&sequence)?;
        }
        for source in self.audio_sources() {
            self.destroy_audio_source(&source)?;
        }
        for context in self.musical_contexts() {
            self.destroy_musical_context(&context)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("name", &*self.name.read())
            .field("audio_sources", &self.audio_sources.read().len())
            .field("playback_regions", &self.playback_regions.read().len())
            .field("region_sequences", &self.region_sequences.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemorySampleProvider;
    use crate::model::RegionSequenceListener;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct SequenceEvents {
        added: AtomicUsize,
        removed: AtomicUsize,
        destroyed: AtomicUsize,
    }

    impl RegionSequenceListener for SequenceEvents {
        fn did_add_playback_region_to_region_sequence(&self, _: &RegionSequence, _: &PlaybackRegion) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }
        fn will_remove_playback_region_from_region_sequence(&self, _: &RegionSequence, _: &PlaybackRegion) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
        fn will_destroy_region_sequence(&self, _: &RegionSequence) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn source(document: &Document) -> Arc<AudioSource> {
        document
            .create_audio_source(
                AudioSourceProperties::new("src", 48000.0, 2, 48000),
                Arc::new(MemorySampleProvider::ramp(2, 48000)),
            )
            .unwrap()
    }

    #[test]
    fn test_invalid_sample_rate_is_rejected() {
        let document = Document::new("doc");
        let err = document
            .create_audio_source(
                AudioSourceProperties::new("bad", 0.0, 1, 10),
                Arc::new(MemorySampleProvider::ramp(1, 10)),
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SAMPLE_RATE");
    }

    #[test]
    fn test_region_moves_between_sequences() {
        let document = Document::new("doc");
        let src = source(&document);
        let modification = document
            .create_audio_modification(&src, AudioModificationProperties::default())
            .unwrap();
        let a = document.create_region_sequence(RegionSequenceProperties::named("a"));
        let b = document.create_region_sequence(RegionSequenceProperties::named("b"));

        let events_a = Arc::new(SequenceEvents::default());
        let events_b = Arc::new(SequenceEvents::default());
        a.add_listener(Arc::downgrade(&events_a) as Weak<dyn RegionSequenceListener>);
        b.add_listener(Arc::downgrade(&events_b) as Weak<dyn RegionSequenceListener>);

        let region = document
            .create_playback_region(
                &modification,
                PlaybackRegionProperties::new(0.0, 1.0, 0.0).in_sequence(a.id()),
            )
            .unwrap();
        assert_eq!(a.playback_regions().len(), 1);
        assert_eq!(events_a.added.load(Ordering::SeqCst), 1);

        let moved = region.properties().in_sequence(b.id());
        document.update_playback_region_properties(&region, moved).unwrap();

        assert!(a.playback_regions().is_empty());
        assert_eq!(b.playback_regions().len(), 1);
        assert_eq!(events_a.removed.load(Ordering::SeqCst), 1);
        assert_eq!(events_b.added.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_sequence_is_rejected() {
        let document = Document::new("doc");
        let src = source(&document);
        let modification = document
            .create_audio_modification(&src, AudioModificationProperties::default())
            .unwrap();
        let err = document
            .create_playback_region(
                &modification,
                PlaybackRegionProperties::new(0.0, 1.0, 0.0).in_sequence(ObjectId::new()),
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "OBJECT_NOT_FOUND");
    }

    #[test]
    fn test_pending_updates_accumulate_and_drain() {
        let document = Document::new("doc");
        let src = source(&document);
        let modification = document
            .create_audio_modification(&src, AudioModificationProperties::default())
            .unwrap();
        let region = document
            .create_playback_region(&modification, PlaybackRegionProperties::new(0.0, 1.0, 0.0))
            .unwrap();

        document
            .notify_audio_source_content_changed(&src, ContentUpdateScopes::notes_are_affected(), true)
            .unwrap();
        document
            .set_playback_region_head_and_tail_time(&region, 0.1, 0.2)
            .unwrap();

        let pending = document.take_pending_model_updates();
        assert!(pending.audio_sources[&src.id()].affects_notes());
        assert!(pending.audio_modifications[&modification.id()].affects_notes());
        let region_scopes = pending.playback_regions[&region.id()];
        assert!(region_scopes.affects_notes());
        assert!(region_scopes.affects_samples());

        assert!(document.take_pending_model_updates().is_empty());
    }

    #[test]
    fn test_destroying_source_cascades() {
        let document = Document::new("doc");
        let src = source(&document);
        let modification = document
            .create_audio_modification(&src, AudioModificationProperties::default())
            .unwrap();
        let sequence = document.create_region_sequence(RegionSequenceProperties::named("track"));
        document
            .create_playback_region(
                &modification,
                PlaybackRegionProperties::new(0.0, 1.0, 0.0).in_sequence(sequence.id()),
            )
            .unwrap();

        document.destroy_audio_source(&src).unwrap();
        assert!(document.audio_sources().is_empty());
        assert!(document.audio_modifications().is_empty());
        assert!(document.playback_regions().is_empty());
        assert!(sequence.playback_regions().is_empty());

        let err = document.destroy_audio_source(&src).unwrap_err();
        assert_eq!(err.error_code(), "OBJECT_DESTROYED");
    }

    #[test]
    fn test_destroying_sequence_fires_hooks() {
        let document = Document::new("doc");
        let src = source(&document);
        let modification = document
            .create_audio_modification(&src, AudioModificationProperties::default())
            .unwrap();
        let sequence = document.create_region_sequence(RegionSequenceProperties::named("track"));
        let events = Arc::new(SequenceEvents::default());
        sequence.add_listener(Arc::downgrade(&events) as Weak<dyn RegionSequenceListener>);
        let region = document
            .create_playback_region(
                &modification,
                PlaybackRegionProperties::new(0.0, 1.0, 0.0).in_sequence(sequence.id()),
            )
            .unwrap();

        document.destroy_region_sequence(&sequence).unwrap();
        assert_eq!(events.removed.load(Ordering::SeqCst), 1);
        assert_eq!(events.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(region.region_sequence_id(), None);
    }

    #[test]
    fn test_edit_cycle_is_not_reentrant() {
        let document = Document::new("doc");
        assert!(!document.is_editing());
        document.begin_editing();
        document.begin_editing();
        assert!(document.is_editing());
        document.end_editing();
        assert!(!document.is_editing());
    }
}
