//! Audio Engine Module
//!
//! Block buffers and file output:
//! - Audio buffer management
//! - WAV export and synthetic test signals

pub mod buffer;
pub mod io;

pub use buffer::{calculate_peak, AudioBuffer, ChannelSlices, INLINE_CHANNELS};
pub use io::{export_wav, generate_test_tone};
