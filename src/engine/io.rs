//! Audio file I/O
//!
//! Rendered output is written as 32-bit float WAV. Synthetic signals for the
//! soak tool and tests are generated here too.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::engine::buffer::AudioBuffer;
use crate::error::{AraError, Result};

/// Export a buffer as a 32-bit float WAV file
///
/// # Arguments
/// * `buffer` - Planar audio to write
/// * `path` - Destination file path
///
/// # Errors
/// Returns `InvalidSampleRate` if the buffer rate is not a positive integral
/// rate, or `Wav` if hound fails to write.
pub fn export_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let rate = buffer.sample_rate;
    if !(rate > 0.0 && rate.fract() == 0.0 && rate <= u32::MAX as f64) {
        return Err(AraError::InvalidSampleRate { rate });
    }

    let spec = WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate: rate as u32,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for sample in buffer.to_interleaved() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Generate a sine tone on every channel
///
/// Channel `c` is phase-shifted by a quarter turn per channel so channels
/// are distinguishable.
///
/// # Arguments
/// * `frequency` - Tone frequency in Hz
/// * `num_channels` - Number of channels
/// * `num_samples` - Length in samples
/// * `sample_rate` - Sample rate in Hz
pub fn generate_test_tone(
    frequency: f64,
    num_channels: usize,
    num_samples: usize,
    sample_rate: f64,
) -> AudioBuffer {
    let channels = (0..num_channels)
        .map(|c| {
            let phase = c as f64 * std::f64::consts::FRAC_PI_2;
            (0..num_samples)
                .map(|i| {
                    let t = i as f64 / sample_rate;
                    (0.5 * (2.0 * std::f64::consts::PI * frequency * t + phase).sin()) as f32
                })
                .collect()
        })
        .collect();
    AudioBuffer::from_channels(channels, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_export_wav_writes_float_samples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.wav");
        let buffer = generate_test_tone(440.0, 2, 480, 48000.0);

        export_wav(&buffer, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.sample_format, SampleFormat::Float);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, buffer.to_interleaved());
    }

    #[test]
    fn test_export_rejects_fractional_rate() {
        let dir = TempDir::new().unwrap();
        let buffer = AudioBuffer::new(1, 4, 44100.5);
        let err = export_wav(&buffer, &dir.path().join("bad.wav")).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_SAMPLE_RATE");
    }

    #[test]
    fn test_tone_channels_differ() {
        let tone = generate_test_tone(100.0, 2, 100, 48000.0);
        assert_eq!(tone.channel(0)[0], 0.0);
        assert!((tone.channel(1)[0] - 0.5).abs() < 1e-6);
    }
}
