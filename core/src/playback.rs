//! Jitter-buffered playback of downstream synthesized-speech audio.
//!
//! Decouples the variable arrival rate of `AudioOnlyServer` frames from the
//! fixed-rate output device: downstream pushes float32 samples in, the
//! playback worker drains fixed-size blocks out. Bounded to `sampleRateOut
//! * 100` samples; exceeding the cap drops the oldest samples. A blocking
//! `read()` would be the wrong shape for a playback worker that must always
//! hand the device a full block (zero-filled on underrun, not blocked), so
//! the sample queue here is a bespoke bounded `VecDeque` rather than a
//! generic buffer type. The diagnostic byte trail alongside it has no such
//! underrun requirement, so it's a plain [`dialog_buffer::Buffer`].

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dialog_audio::device::OutputDevice;
use dialog_buffer::Buffer as GrowableBuffer;

use crate::cancellation::Cancellation;
use crate::error::{Error, Result};

/// One block of output at 24kHz, matching the device contract's 512-frame
/// write granularity.
const PLAYBACK_BLOCK_FRAMES: usize = 512;

/// Playback buffer (C4). The sample queue is serialized by its own mutex so
/// any worker may push, drain, or flush concurrently; the diagnostic trail
/// has its own internal locking via [`dialog_buffer::Buffer`]; the
/// suppression flag is a separate atomic so checking it never contends with
/// either.
pub struct PlaybackBuffer {
    samples: Mutex<VecDeque<f32>>,
    diagnostic: GrowableBuffer<u8>,
    capacity_samples: usize,
    suppressed: AtomicBool,
}

impl PlaybackBuffer {
    /// `sample_rate` is the output device's rate (24000 Hz in the reference
    /// configuration); the cap is `sample_rate * 100` samples (100 s).
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Mutex::new(VecDeque::new()),
            diagnostic: GrowableBuffer::new(),
            capacity_samples: sample_rate as usize * 100,
            suppressed: AtomicBool::new(false),
        }
    }

    /// Sets or clears suppression. While suppressed, [`Self::push_bytes`] is
    /// a no-op: the server's model audio during a local TTS injection is
    /// discarded rather than buffered.
    pub fn set_suppressed(&self, suppressed: bool) {
        self.suppressed.store(suppressed, Ordering::SeqCst);
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::SeqCst)
    }

    /// Interprets `bytes` as a contiguous little-endian float32 stream,
    /// appends the samples (dropping oldest on overflow), and appends the
    /// raw bytes to the diagnostic trail. No-op while suppressed.
    pub fn push_bytes(&self, bytes: &[u8]) {
        if self.is_suppressed() {
            return;
        }

        let mut samples = self.samples.lock().expect("playback buffer mutex poisoned");

        for chunk in bytes.chunks_exact(4) {
            samples.push_back(f32::from_le_bytes(chunk.try_into().unwrap()));
        }

        let overflow = samples.len().saturating_sub(self.capacity_samples);
        if overflow > 0 {
            samples.drain(..overflow);
        }
        drop(samples);

        // Best-effort: a lost diagnostic byte never affects playback.
        let _ = self.diagnostic.write(bytes);
    }

    /// Copies up to `into.len()` samples into `into` in FIFO order and
    /// zero-fills anything left over, removing the copied samples from the
    /// buffer. Returns the number of samples actually drained (the rest of
    /// `into` was zero-filled).
    pub fn drain(&self, into: &mut [f32]) -> usize {
        let mut samples = self.samples.lock().expect("playback buffer mutex poisoned");

        let n = into.len().min(samples.len());
        for slot in into.iter_mut().take(n) {
            *slot = samples.pop_front().expect("checked against len above");
        }
        for slot in into.iter_mut().skip(n) {
            *slot = 0.0;
        }
        n
    }

    /// Empties both the sample sequence and the diagnostic byte sequence.
    pub fn flush(&self) {
        self.samples
            .lock()
            .expect("playback buffer mutex poisoned")
            .clear();
        self.diagnostic.reset();
    }

    /// Current sample count, for tests and diagnostics.
    pub fn len(&self) -> usize {
        self.samples.lock().expect("playback buffer mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity_samples
    }

    /// Writes the diagnostic byte sequence to `path` as raw PCM, no-op if
    /// empty. Not atomic at the filesystem level -- a single `write` is a
    /// best-effort diagnostic dump, not a durability guarantee.
    pub fn dump_diagnostic(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.diagnostic.to_vec();
        if bytes.is_empty() {
            return Ok(());
        }
        std::fs::write(path, &bytes)?;
        Ok(())
    }
}

/// Drains the playback buffer into fixed-size blocks and writes them to
/// `output` on a dedicated OS thread -- both the drain (a mutex lock) and
/// the device write are synchronous, so there's no need to involve the
/// async runtime here at all. Returns the thread handle; join it (off the
/// async runtime, e.g. via `spawn_blocking`) once `cancel` has fired.
pub fn run_playback_worker<O>(
    buffer: Arc<PlaybackBuffer>,
    mut output: O,
    cancel: Cancellation,
) -> std::thread::JoinHandle<Result<()>>
where
    O: OutputDevice + 'static,
{
    std::thread::spawn(move || -> Result<()> {
        output.open().map_err(|e| Error::device(e.to_string()))?;

        let result = (|| -> Result<()> {
            let mut block = [0.0f32; PLAYBACK_BLOCK_FRAMES];
            loop {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                buffer.drain(&mut block);
                output.write(&block).map_err(|e| Error::device(e.to_string()))?;
            }
        })();

        let _ = output.close();
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_from(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn push_then_drain_is_fifo() {
        let buf = PlaybackBuffer::new(24000);
        buf.push_bytes(&bytes_from(&[1.0, 2.0, 3.0]));

        let mut out = [0.0f32; 2];
        let n = buf.drain(&mut out);
        assert_eq!(n, 2);
        assert_eq!(out, [1.0, 2.0]);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn drain_zero_fills_remainder() {
        let buf = PlaybackBuffer::new(24000);
        buf.push_bytes(&bytes_from(&[1.0]));

        let mut out = [9.0f32; 4];
        let n = buf.drain(&mut out);
        assert_eq!(n, 1);
        assert_eq!(out, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn bound_drops_oldest() {
        // small sample rate so the cap (rate * 100) is easy to exceed in a test
        let buf = PlaybackBuffer::new(10);
        assert_eq!(buf.capacity(), 1000);

        let samples: Vec<f32> = (0..1500).map(|i| i as f32).collect();
        buf.push_bytes(&bytes_from(&samples));

        assert_eq!(buf.len(), 1000);
        let mut out = [0.0f32; 1000];
        buf.drain(&mut out);
        // the retained tail must equal the last 1000 pushed samples
        let expected: Vec<f32> = (500..1500).map(|i| i as f32).collect();
        assert_eq!(out.to_vec(), expected);
    }

    #[test]
    fn suppression_leaves_buffer_unchanged() {
        let buf = PlaybackBuffer::new(24000);
        buf.set_suppressed(true);
        buf.push_bytes(&bytes_from(&[1.0, 2.0, 3.0]));
        assert!(buf.is_empty());

        buf.set_suppressed(false);
        buf.push_bytes(&bytes_from(&[1.0]));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn flush_clears_samples_and_diagnostic() {
        let buf = PlaybackBuffer::new(24000);
        buf.push_bytes(&bytes_from(&[1.0, 2.0]));
        buf.flush();
        assert!(buf.is_empty());

        let dir = std::env::temp_dir().join(format!("playback-flush-test-{:p}", &buf));
        buf.dump_diagnostic(&dir).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn dump_diagnostic_writes_raw_pcm() {
        let buf = PlaybackBuffer::new(24000);
        let samples = [1.0f32, -1.0, 0.5];
        buf.push_bytes(&bytes_from(&samples));

        let path = std::env::temp_dir().join(format!("playback-dump-test-{:p}.pcm", &buf));
        buf.dump_diagnostic(&path).unwrap();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, bytes_from(&samples));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn playback_worker_exits_on_cancellation() {
        use dialog_audio::device::NullOutput;

        let buf = Arc::new(PlaybackBuffer::new(24000));
        let cancel = Cancellation::new();
        let handle = run_playback_worker(buf, NullOutput, cancel.clone());

        std::thread::sleep(std::time::Duration::from_millis(20));
        cancel.cancel();
        assert!(handle.join().unwrap().is_ok());
    }
}
