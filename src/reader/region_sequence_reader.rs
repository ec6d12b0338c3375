//! Region Sequence Reader
//!
//! A [`PlaybackRegionReader`] over the regions a sequence holds at
//! construction time. Membership changes invalidate the reader instead of
//! patching the renderer, since the range, channel count and sample rate all
//! depend on the member set. Rebuild the reader to pick up the new members.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::ReaderConfig;
use crate::error::Result;
use crate::model::{ListenerId, ObjectId, PlaybackRegion, RegionSequence, RegionSequenceListener};
use crate::render::PlaybackRenderer;

use super::{AudioReader, PlaybackRegionReader, ReaderFormat, ReaderState};

pub struct RegionSequenceReader {
    sequence_id: ObjectId,
    sequence: Mutex<Weak<RegionSequence>>,
    inner: Arc<PlaybackRegionReader>,
}

impl RegionSequenceReader {
    /// Build a reader over the current members of `sequence`
    ///
    /// # Errors
    /// Same as [`PlaybackRegionReader::new`]; an empty sequence yields
    /// `EmptyRegionSet`.
    pub fn new(
        sequence: &Arc<RegionSequence>,
        renderer: Box<dyn PlaybackRenderer>,
        config: &ReaderConfig,
    ) -> Result<Arc<Self>> {
        let regions = sequence.playback_regions();
        let inner = PlaybackRegionReader::new(&regions, renderer, config)?;

        let reader = Arc::new(Self {
            sequence_id: sequence.id(),
            sequence: Mutex::new(Arc::downgrade(sequence)),
            inner,
        });
        let weak = Arc::downgrade(&reader);
        let listener: Weak<dyn RegionSequenceListener> = weak;
        sequence.add_listener(listener);
        debug!(sequence = %reader.sequence_id, regions = regions.len(), "region sequence reader created");
        Ok(reader)
    }

    pub fn sequence_id(&self) -> ObjectId {
        self.sequence_id
    }

    /// The observed sequence, until it is destroyed
    pub fn region_sequence(&self) -> Option<Arc<RegionSequence>> {
        self.sequence.lock().upgrade()
    }

    pub fn playback_region_reader(&self) -> &Arc<PlaybackRegionReader> {
        &self.inner
    }

    pub fn start_in_samples(&self) -> i64 {
        self.inner.start_in_samples()
    }

    fn detach(&self) {
        let sequence = std::mem::take(&mut *self.sequence.lock());
        if let Some(sequence) = sequence.upgrade() {
            sequence.remove_listener(ListenerId::of(self));
        }
    }
}

impl AudioReader for RegionSequenceReader {
    fn format(&self) -> ReaderFormat {
        self.inner.format()
    }

    fn read_samples(
        &self,
        dest: &mut [&mut [f32]],
        dest_offset: usize,
        start_sample: i64,
        num_samples: usize,
    ) -> bool {
        self.inner.read_samples(dest, dest_offset, start_sample, num_samples)
    }

    fn state(&self) -> ReaderState {
        self.inner.state()
    }

    fn invalidate(&self) {
        self.inner.invalidate();
    }
}

impl RegionSequenceListener for RegionSequenceReader {
    fn did_add_playback_region_to_region_sequence(&self, _sequence: &RegionSequence, region: &PlaybackRegion) {
        debug!(sequence = %self.sequence_id, region = %region.id(), "member added");
        self.invalidate();
    }

    fn will_remove_playback_region_from_region_sequence(&self, _sequence: &RegionSequence, region: &PlaybackRegion) {
        debug!(sequence = %self.sequence_id, region = %region.id(), "member removed");
        self.invalidate();
    }

    fn will_destroy_region_sequence(&self, _sequence: &RegionSequence) {
        self.invalidate();
        self.detach();
    }
}

impl Drop for RegionSequenceReader {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for RegionSequenceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionSequenceReader")
            .field("sequence_id", &self.sequence_id)
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemorySampleProvider;
    use crate::model::{
        AudioModification, AudioModificationProperties, AudioSourceProperties, Document, PlaybackRegionProperties,
        RegionSequenceProperties,
    };
    use crate::render::SourceRenderer;

    fn setup() -> (Document, Arc<AudioModification>, Arc<RegionSequence>) {
        let document = Document::new("test");
        let source = document
            .create_audio_source(
                AudioSourceProperties::new("src", 1000.0, 2, 10_000),
                Arc::new(MemorySampleProvider::ramp(2, 10_000)),
            )
            .unwrap();
        document.enable_audio_source_samples_access(&source, true).unwrap();
        let modification = document
            .create_audio_modification(&source, AudioModificationProperties::default())
            .unwrap();
        let sequence = document.create_region_sequence(RegionSequenceProperties::named("track"));
        (document, modification, sequence)
    }

    fn add_region(
        document: &Document,
        modification: &Arc<AudioModification>,
        sequence: &RegionSequence,
        position: f64,
    ) -> Arc<PlaybackRegion> {
        document
            .create_playback_region(
                modification,
                PlaybackRegionProperties::new(0.0, 1.0, position).in_sequence(sequence.id()),
            )
            .unwrap()
    }

    fn build(sequence: &Arc<RegionSequence>) -> Result<Arc<RegionSequenceReader>> {
        RegionSequenceReader::new(sequence, Box::new(SourceRenderer::new()), &ReaderConfig::default())
    }

    #[test]
    fn test_empty_sequence_is_rejected() {
        let (_doc, _modification, sequence) = setup();
        let err = build(&sequence).unwrap_err();
        assert_eq!(err.error_code(), "EMPTY_REGION_SET");
    }

    #[test]
    fn test_removing_member_invalidates_and_rebuild_reflects_membership() {
        let (doc, modification, sequence) = setup();
        add_region(&doc, &modification, &sequence, 0.0);
        let second = add_region(&doc, &modification, &sequence, 1.0);

        let reader = build(&sequence).unwrap();
        assert!(reader.is_valid());
        assert_eq!(reader.length_in_samples(), 2000);

        let mut props = second.properties();
        props.region_sequence = None;
        doc.update_playback_region_properties(&second, props).unwrap();
        assert!(!reader.is_valid());

        let mut out = vec![vec![1.0_f32; 100]; 2];
        {
            let mut slices: Vec<&mut [f32]> = out.iter_mut().map(|c| c.as_mut_slice()).collect();
            assert!(!reader.read_samples(&mut slices, 0, 0, 100));
        }
        assert!(out.iter().flatten().all(|&s| s == 0.0));

        let rebuilt = build(&sequence).unwrap();
        assert!(rebuilt.is_valid());
        assert_eq!(rebuilt.length_in_samples(), 1000);
        assert_eq!(rebuilt.playback_region_reader().playback_regions().len(), 1);
    }

    #[test]
    fn test_adding_member_invalidates() {
        let (doc, modification, sequence) = setup();
        add_region(&doc, &modification, &sequence, 0.0);
        let reader = build(&sequence).unwrap();

        add_region(&doc, &modification, &sequence, 3.0);
        assert_eq!(reader.state(), ReaderState::Invalidated);
    }

    #[test]
    fn test_sequence_property_update_is_cosmetic() {
        let (doc, modification, sequence) = setup();
        add_region(&doc, &modification, &sequence, 0.0);
        let reader = build(&sequence).unwrap();

        let mut props = sequence.properties();
        props.name = "renamed".to_string();
        props.order_index = 4;
        doc.update_region_sequence_properties(&sequence, props).unwrap();
        assert!(reader.is_valid());
    }

    #[test]
    fn test_region_level_changes_propagate() {
        let (doc, modification, sequence) = setup();
        let region = add_region(&doc, &modification, &sequence, 0.0);
        let reader = build(&sequence).unwrap();

        doc.set_playback_region_head_and_tail_time(&region, 0.1, 0.1).unwrap();
        assert!(!reader.is_valid());
    }

    #[test]
    fn test_sequence_destruction_detaches() {
        let (doc, modification, sequence) = setup();
        add_region(&doc, &modification, &sequence, 0.0);
        let reader = build(&sequence).unwrap();
        assert_eq!(sequence.listeners().len(), 1);

        doc.destroy_region_sequence(&sequence).unwrap();
        assert!(!reader.is_valid());
        assert!(reader.region_sequence().is_none());
        assert!(sequence.listeners().is_empty());
    }

    #[test]
    fn test_drop_unregisters_from_sequence() {
        let (doc, modification, sequence) = setup();
        add_region(&doc, &modification, &sequence, 0.0);
        let reader = build(&sequence).unwrap();
        drop(reader);
        assert!(sequence.listeners().is_empty());
    }
}
