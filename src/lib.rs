//! ARA Bridge - invalidation-aware streaming readers over a host document graph
//!
//! A host owns a document of audio sources, playback regions and region
//! sequences and edits it on its controller thread. Any other thread pulls
//! sample blocks through a reader:
//! 1. [`AudioSourceReader`] - raw samples of one audio source
//! 2. [`PlaybackRegionReader`] - rendered output of a set of playback regions
//! 3. [`RegionSequenceReader`] - rendered output of a whole region sequence
//!
//! # Architecture
//!
//! Readers observe the model objects they depend on. Edits that change
//! sample data invalidate the affected readers; a reader that is invalid,
//! temporarily disabled or busy with a concurrent edit reports failure and
//! fills the request with silence instead of blocking.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod factory;
pub mod host;
pub mod logging;
pub mod model;
pub mod reader;
pub mod render;

pub use config::{BlockFailurePolicy, ReaderConfig, SampleRateMismatchPolicy};
pub use error::{AraError, Result};
pub use model::{Document, ObjectId};
pub use reader::{AudioReader, AudioSourceReader, PlaybackRegionReader, ReaderState, RegionSequenceReader};
