//! Document Model
//!
//! Plug-in side mirror of the host's document graph:
//! - Audio sources (host-owned sample data with an access gate)
//! - Audio modifications (edit layers on top of one audio source)
//! - Playback regions (placed, time-ranged uses of a modification)
//! - Region sequences (ordered tracks of playback regions)
//! - Musical contexts
//!
//! Every object kind has its own listener trait with no-op default methods.
//! The [`Document`] applies edits and fires those hooks on the controller thread.

pub mod audio_modification;
pub mod audio_source;
pub mod content;
pub mod document;
pub mod listener;
pub mod musical_context;
pub mod playback_region;
pub mod region_sequence;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use audio_modification::{AudioModification, AudioModificationListener, AudioModificationProperties};
pub use audio_source::{AudioSource, AudioSourceListener, AudioSourceProperties};
pub use content::{ContentUpdateScopes, TransformationFlags};
pub use document::{Document, DocumentListener, PendingModelUpdates};
pub use listener::{ListenerId, ListenerList};
pub use musical_context::{MusicalContext, MusicalContextListener, MusicalContextProperties};
pub use playback_region::{
    sample_position_at_time, PlaybackRegion, PlaybackRegionListener, PlaybackRegionProperties,
};
pub use region_sequence::{RegionSequence, RegionSequenceListener, RegionSequenceProperties};

/// Stable identity of a model object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first group is enough to tell objects apart in logs
        let text = self.0.to_string();
        write!(f, "{}", &text[..8])
    }
}

/// RGB display color, carried for hosts that send one
pub type Color = [f32; 3];
