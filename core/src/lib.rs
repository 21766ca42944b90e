//! Realtime voice-dialog client core.
//!
//! This crate drives a bidirectional streaming session against a cloud
//! speech-dialog service over WebSocket: it captures microphone audio,
//! streams it upstream, and concurrently receives synthesized reply audio
//! and event messages, driving playback and session lifecycle.
//!
//! # Layout
//!
//! - [`protocol`]: the length-delimited binary frame codec (C1) -- message
//!   types, flags, the sequence-presence predicate, and marshal/unmarshal.
//! - [`transport`]: the WebSocket duplex adapter (C2).
//! - [`flags`]: process-wide dialog state shared by every worker (C8).
//! - [`playback`]: the jitter-buffered playback queue fed by the downstream
//!   pump and drained by the playback worker (C4).
//! - [`upstream`]: captures microphone audio and streams it upstream (C5).
//! - [`downstream`]: receives and dispatches server frames (C6), including
//!   the ChatTTSText injection sequence.
//! - [`session`]: the controller (C7) tying the above together -- handshake,
//!   steady state, and shutdown.
//! - [`config`]: credentials and the tunable parameters of a session.
//! - [`error`]: the crate's error taxonomy.
//!
//! Audio device I/O itself lives in the sibling `dialog-audio` crate behind
//! the [`dialog_audio::device::InputDevice`] / [`dialog_audio::device::OutputDevice`]
//! traits; this crate is agnostic to what's on the other end of a device.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use dialog_core::config::{Credentials, SessionConfig};
//! use dialog_core::session::DialogSession;
//! use dialog_core::cancellation::Cancellation;
//! use dialog_audio::device::{NullOutput, SilentInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials {
//!         ws_url: "wss://example.com/v1/realtime".to_string(),
//!         resource_id: "volc.speech.dialog".to_string(),
//!         access_key: "access-key".to_string(),
//!         app_key: "app-key".to_string(),
//!         app_id: "app-id".to_string(),
//!     };
//!
//!     let (session, query_signal_rx) =
//!         DialogSession::connect(&credentials, SessionConfig::default()).await?;
//!     let cancel = Cancellation::new();
//!     session.run(SilentInput, NullOutput, query_signal_rx, cancel).await?;
//!     Ok(())
//! }
//! ```

pub mod cancellation;
pub mod config;
pub mod downstream;
pub mod error;
pub mod flags;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod upstream;

pub use cancellation::Cancellation;
pub use config::{ChatTtsTextLiterals, Credentials, DialogProfile, GreetingConfig, SessionConfig, TtsAudioConfig};
pub use downstream::{run_downstream_pump, ChatTtsTextSender};
pub use error::{CodecError, CodecErrorKind, Error, Result};
pub use flags::DialogFlags;
pub use playback::{run_playback_worker, PlaybackBuffer};
pub use protocol::{
    default_sequence_predicate, events, BinaryProtocol, CompressionType, Message, MessageFlags,
    MessageType, SequencePredicate, SerializationType,
};
pub use session::DialogSession;
pub use transport::{DuplexTransport, Transport, TransportHeaders};
pub use upstream::run_upstream_pump;
