//! Blocking audio device capability traits.
//!
//! The native bindings for an actual microphone or speaker are not part of
//! this crate (see the crate-level docs): callers plug in an
//! [`InputDevice`] / [`OutputDevice`] implementation backed by whatever
//! platform audio API they have available. What this module fixes is the
//! *contract*: one blocking read of a fixed frame count, one blocking write
//! of a fixed frame count, open/close, and an error type that does not
//! retry on its own.

use std::io;

use crate::pcm::Format;

/// A blocking PCM capture stream.
///
/// `read` blocks until exactly `buf.len()` frames have been captured, or
/// returns an error. One "frame" is one sample (the streams this crate
/// models are mono).
pub trait InputDevice: Send {
    /// Opens the stream. Must be called before the first `read`.
    fn open(&mut self) -> io::Result<()>;

    /// Blocks until `buf` is completely filled with captured samples.
    fn read(&mut self, buf: &mut [i16]) -> io::Result<()>;

    /// Closes the stream, releasing any underlying device handle.
    fn close(&mut self) -> io::Result<()>;

    /// The format this device captures in.
    fn format(&self) -> Format {
        Format::L16Mono16K
    }
}

/// A blocking PCM playback stream.
///
/// `write` blocks until exactly `buf` has been handed to the device (i.e.
/// until the previous block has drained enough to accept it).
pub trait OutputDevice: Send {
    /// Opens the stream. Must be called before the first `write`.
    fn open(&mut self) -> io::Result<()>;

    /// Blocks until `buf` has been written to the device.
    fn write(&mut self, buf: &[f32]) -> io::Result<()>;

    /// Closes the stream, releasing any underlying device handle.
    fn close(&mut self) -> io::Result<()>;

    /// The format this device plays back.
    fn format(&self) -> Format {
        Format::F32Mono24K
    }
}

/// An [`OutputDevice`] that discards everything written to it.
///
/// Useful for headless operation (diagnostics-only runs, tests) where no
/// real speaker is attached.
#[derive(Debug, Default)]
pub struct NullOutput;

impl OutputDevice for NullOutput {
    fn open(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn write(&mut self, _buf: &[f32]) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An [`InputDevice`] that always yields silence.
///
/// Useful for headless operation and tests; it still honors the blocking
/// "one 160-sample block per call" contract so callers exercise the same
/// pacing a real microphone would impose.
#[derive(Debug, Default)]
pub struct SilentInput;

impl InputDevice for SilentInput {
    fn open(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [i16]) -> io::Result<()> {
        buf.fill(0);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_output_accepts_any_block() {
        let mut out = NullOutput;
        out.open().unwrap();
        out.write(&[0.0; 512]).unwrap();
        out.close().unwrap();
    }

    #[test]
    fn silent_input_fills_with_zero() {
        let mut input = SilentInput;
        input.open().unwrap();
        let mut buf = [1i16; 160];
        input.read(&mut buf).unwrap();
        assert!(buf.iter().all(|&s| s == 0));
        input.close().unwrap();
    }
}
