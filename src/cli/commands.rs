//! CLI Command Implementations
//!
//! Both commands work on a synthetic document: one audio source backed by
//! in-memory samples, one modification and one region sequence holding
//! back-to-back playback regions.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ReaderConfig;
use crate::engine::{calculate_peak, export_wav, generate_test_tone, AudioBuffer};
use crate::factory;
use crate::host::MemorySampleProvider;
use crate::model::{
    AudioModificationProperties, AudioSource, AudioSourceProperties, ContentUpdateScopes, Document, PlaybackRegion,
    PlaybackRegionProperties, RegionSequence, RegionSequenceProperties,
};
use crate::reader::{AudioReader, RegionSequenceReader};
use crate::render::SourceRenderer;

const SESSION_SAMPLE_RATE: f64 = 48_000.0;
const SESSION_CHANNELS: usize = 2;
const REGION_SECS: f64 = 0.5;
const SOAK_BLOCK_SIZE: usize = 512;

// ============================================================================
// Synthetic session
// ============================================================================

/// A small document used by the soak and render commands
pub struct Session {
    pub document: Document,
    pub source: Arc<AudioSource>,
    pub sequence: Arc<RegionSequence>,
    pub regions: Vec<Arc<PlaybackRegion>>,
}

impl Session {
    /// Build a session of `num_regions` regions over a two-second test tone
    ///
    /// Region `i` plays at `i * 0.5 s`; odd regions take their audio from the
    /// second half of the source.
    pub fn build(num_regions: usize) -> crate::Result<Self> {
        let num_samples = (2.0 * SESSION_SAMPLE_RATE) as usize;
        let tone = generate_test_tone(440.0, SESSION_CHANNELS, num_samples, SESSION_SAMPLE_RATE);

        let document = Document::new("synthetic session");
        let source = document.create_audio_source(
            AudioSourceProperties::new("tone", SESSION_SAMPLE_RATE, SESSION_CHANNELS as u32, num_samples as i64),
            Arc::new(MemorySampleProvider::new(tone.samples)),
        )?;
        document.enable_audio_source_samples_access(&source, true)?;
        let modification = document.create_audio_modification(&source, AudioModificationProperties::default())?;
        let sequence = document.create_region_sequence(RegionSequenceProperties::named("track 1"));

        let regions = (0..num_regions)
            .map(|i| {
                let offset = if i % 2 == 0 { 0.0 } else { 1.0 };
                let props = PlaybackRegionProperties::new(offset, REGION_SECS, i as f64 * REGION_SECS)
                    .in_sequence(sequence.id());
                document.create_playback_region(&modification, props)
            })
            .collect::<crate::Result<Vec<_>>>()?;

        Ok(Self {
            document,
            source,
            sequence,
            regions,
        })
    }

    pub fn sequence_reader(&self, config: &ReaderConfig) -> crate::Result<Arc<RegionSequenceReader>> {
        let renderer = SourceRenderer::new().with_head_and_tail(config.include_head_and_tail);
        RegionSequenceReader::new(&self.sequence, Box::new(renderer), config)
    }
}

// ============================================================================
// Soak
// ============================================================================

/// Counters collected by a soak run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SoakReport {
    pub reads: u64,
    pub successes: u64,
    pub fallbacks: u64,
    /// Reads that failed on a reader already out of service and still left
    /// non-zero samples behind. Must stay zero.
    ///
    /// A reader that is valid may fail a block and keep what the engine
    /// rendered, so those reads are not counted here.
    pub dirty_fallbacks: u64,
    pub edits: usize,
    pub rebuilds: usize,
}

#[derive(Default)]
struct Counters {
    reads: AtomicU64,
    successes: AtomicU64,
    fallbacks: AtomicU64,
    dirty_fallbacks: AtomicU64,
}

impl Counters {
    /// Account one read. `was_valid` is the reader's state before the read.
    fn record(&self, was_valid: bool, ok: bool, block: &AudioBuffer) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if ok {
            self.successes.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        if !was_valid && !block.is_silent() {
            self.dirty_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Run reader threads against a region sequence reader while editing
///
/// # Arguments
/// * `readers` - Number of reader threads
/// * `edits` - Number of edits, spread evenly over `duration`
/// * `duration` - Total run time
/// * `config` - Reader configuration used for every (re)built reader
///
/// # Errors
/// Fails if the session cannot be built or a reader thread panics.
pub fn run_soak(readers: usize, edits: usize, duration: Duration, config: &ReaderConfig) -> anyhow::Result<SoakReport> {
    if readers == 0 {
        bail!("at least one reader thread is required");
    }
    let session = Session::build(4).context("building soak session")?;
    let current = Arc::new(Mutex::new(Some(session.sequence_reader(config)?)));
    let counters = Arc::new(Counters::default());
    let stop = Arc::new(AtomicBool::new(false));

    let handles = (0..readers)
        .map(|i| {
            let current = Arc::clone(&current);
            let counters = Arc::clone(&counters);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name(format!("reader-{i}"))
                .spawn(move || read_loop(&current, &counters, &stop))
                .context("spawning reader thread")
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let started = Instant::now();
    let interval = duration.checked_div(edits.max(1) as u32).unwrap_or_default();
    let mut report = SoakReport::default();

    for step in 0..edits {
        if started.elapsed() >= duration {
            break;
        }
        apply_edit(&session, step)?;
        report.edits += 1;

        let stale = current.lock().as_ref().map_or(true, |reader| reader.state().is_terminal());
        if stale {
            match session.sequence_reader(config) {
                Ok(reader) => {
                    *current.lock() = Some(reader);
                    report.rebuilds += 1;
                }
                Err(e) => warn!(error = %e, "could not rebuild sequence reader"),
            }
        }
        thread::sleep(interval);
    }
    if let Some(rest) = duration.checked_sub(started.elapsed()) {
        thread::sleep(rest);
    }

    stop.store(true, Ordering::Release);
    for handle in handles {
        handle.join().map_err(|_| anyhow!("reader thread panicked"))?;
    }

    report.reads = counters.reads.load(Ordering::Relaxed);
    report.successes = counters.successes.load(Ordering::Relaxed);
    report.fallbacks = counters.fallbacks.load(Ordering::Relaxed);
    report.dirty_fallbacks = counters.dirty_fallbacks.load(Ordering::Relaxed);
    Ok(report)
}

fn read_loop(current: &Mutex<Option<Arc<RegionSequenceReader>>>, counters: &Counters, stop: &AtomicBool) {
    let mut block = AudioBuffer::new(SESSION_CHANNELS, SOAK_BLOCK_SIZE, SESSION_SAMPLE_RATE);
    let mut position = 0_i64;

    while !stop.load(Ordering::Acquire) {
        let reader = current.lock().clone();
        let Some(reader) = reader else {
            thread::yield_now();
            continue;
        };

        for channel in block.samples.iter_mut() {
            channel.fill(1.0);
        }
        let was_valid = reader.is_valid();
        let ok = reader.read_into_buffer(&mut block, position);
        counters.record(was_valid, ok, &block);

        let length = reader.length_in_samples().max(1);
        position = (position + SOAK_BLOCK_SIZE as i64) % length;
    }
}

/// One step of the edit cycle: disable access, enable access, move a region,
/// touch the source content
fn apply_edit(session: &Session, step: usize) -> crate::Result<()> {
    let document = &session.document;
    match step % 4 {
        0 => document.enable_audio_source_samples_access(&session.source, false),
        1 => document.enable_audio_source_samples_access(&session.source, true),
        2 => {
            let region = &session.regions[(step / 4) % session.regions.len()];
            let mut props = region.properties();
            let slots = session.regions.len() as f64;
            props.start_in_playback_time = (props.start_in_playback_time + REGION_SECS) % (slots * REGION_SECS);
            debug!(region = %region.id(), position = props.start_in_playback_time, "moving region");
            document.update_playback_region_properties(region, props)
        }
        _ => document.update_audio_source_content(&session.source, ContentUpdateScopes::samples_are_affected()),
    }
}

pub fn soak(readers: usize, edits: usize, seconds: f64, config: &ReaderConfig) -> anyhow::Result<()> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("run time must be positive, got {seconds}");
    }
    info!(readers, edits, seconds, "starting soak");

    let report = run_soak(readers, edits, Duration::from_secs_f64(seconds), config)?;

    println!("Reads:            {}", report.reads);
    println!("Successful:       {}", report.successes);
    println!("Failed reads:     {}", report.fallbacks);
    println!("Edits applied:    {}", report.edits);
    println!("Reader rebuilds:  {}", report.rebuilds);

    if report.dirty_fallbacks > 0 {
        bail!("{} reads on out-of-service readers left non-silent output", report.dirty_fallbacks);
    }
    Ok(())
}

// ============================================================================
// Render
// ============================================================================

/// Render the whole synthetic sequence into a buffer
pub fn render_sequence(num_regions: usize, config: &ReaderConfig) -> anyhow::Result<(AudioBuffer, bool)> {
    if num_regions == 0 {
        bail!("at least one region is required");
    }
    let session = Session::build(num_regions)?;
    let reader = session.sequence_reader(config)?;

    let length = usize::try_from(reader.length_in_samples()).context("negative reader length")?;
    let mut buffer = AudioBuffer::new(reader.num_channels() as usize, length, reader.sample_rate());
    let ok = reader.read_into_buffer(&mut buffer, 0);
    Ok((buffer, ok))
}

pub fn render(output: &Path, regions: usize, config: &ReaderConfig) -> anyhow::Result<()> {
    info!("Rendering {} regions to {}", regions, output.display());

    let (buffer, ok) = render_sequence(regions, config)?;
    if !ok {
        warn!("some blocks failed to render; output contains silence");
    }
    export_wav(&buffer, output).with_context(|| format!("writing {}", output.display()))?;

    println!("Rendered: {}", output.display());
    println!("Duration: {:.3} s", buffer.duration_secs());
    println!("Peak:     {:.3}", calculate_peak(&buffer));
    Ok(())
}

// ============================================================================
// Factory
// ============================================================================

pub fn print_factory() -> anyhow::Result<()> {
    println!("{}", factory::descriptor().to_json()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_session_layout() {
        let session = Session::build(3).unwrap();
        assert_eq!(session.sequence.playback_regions().len(), 3);
        assert_relative_eq!(session.regions[2].start_in_playback_time(), 1.0);
    }

    #[test]
    fn test_render_sequence_length() {
        let (buffer, ok) = render_sequence(3, &ReaderConfig::default()).unwrap();
        assert!(ok);
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.num_samples(), 72_000);
        assert!(calculate_peak(&buffer) > 0.4);
    }

    #[test]
    fn test_render_rejects_zero_regions() {
        assert!(render_sequence(0, &ReaderConfig::default()).is_err());
    }

    #[test]
    fn test_render_writes_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        render(&path, 2, &ReaderConfig::default()).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), 48_000);
    }

    #[test]
    fn test_engine_output_on_valid_reader_is_not_dirty() {
        let counters = Counters::default();
        let rendered = AudioBuffer::from_channels(vec![vec![0.5; 4]], SESSION_SAMPLE_RATE);
        let silent = AudioBuffer::new(1, 4, SESSION_SAMPLE_RATE);

        counters.record(true, false, &rendered);
        counters.record(false, false, &silent);
        counters.record(true, true, &rendered);
        assert_eq!(counters.fallbacks.load(Ordering::Relaxed), 2);
        assert_eq!(counters.dirty_fallbacks.load(Ordering::Relaxed), 0);

        counters.record(false, false, &rendered);
        assert_eq!(counters.dirty_fallbacks.load(Ordering::Relaxed), 1);
        assert_eq!(counters.reads.load(Ordering::Relaxed), 4);
        assert_eq!(counters.successes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_short_soak_has_no_dirty_fallbacks() {
        let report = run_soak(2, 40, Duration::from_millis(200), &ReaderConfig::default()).unwrap();
        assert!(report.reads > 0);
        assert_eq!(report.dirty_fallbacks, 0);
        assert!(report.edits > 0);
    }
}
