//! Audio processing utilities.
//!
//! This crate provides PCM audio format handling and the blocking capture/
//! playback capability traits that the dialog session wires into its
//! upstream and downstream pumps:
//!
//! - `pcm`: PCM (Pulse Code Modulation) audio format handling
//! - `device`: blocking "read N frames" / "write N frames" capability traits
//!
//! The native device bindings themselves (ALSA, CoreAudio, WASAPI, ...) are
//! not part of this crate; callers provide an implementation of
//! [`device::InputDevice`] / [`device::OutputDevice`].
//!
//! # Example
//!
//! ```rust
//! use dialog_audio::pcm::Format;
//! use std::time::Duration;
//!
//! // Create a 16kHz mono format
//! let format = Format::L16Mono16K;
//!
//! // Calculate bytes needed for 20ms of audio (one capture block)
//! let bytes = format.bytes_in_duration(Duration::from_millis(20));
//! assert_eq!(bytes, 640);
//! ```

pub mod device;
pub mod pcm;

pub use pcm::Format;
