//! Binary wire protocol for the realtime dialog session.
//!
//! Frame layout:
//! - Header (`headerSize` 4-byte units, default 1 = 4 bytes):
//!   - byte 0: (4 bits) version + (4 bits) header size
//!   - byte 1: (4 bits) message type + (4 bits) flags
//!   - byte 2: (4 bits) serialization + (4 bits) compression
//!   - remaining header bytes: zero padding
//!
//! - Body:
//!   - [optional] sequence (4 bytes, BE i32)
//!   - [optional] errorCode (4 bytes, BE u32) -- only for type=Error, in place of the event group
//!   - [optional] event (4 bytes, BE i32) -- iff with-event
//!   - [optional] sessionId (4-byte BE length + UTF-8 bytes) -- iff with-event and event omits a session id
//!   - [optional] connectId (4-byte BE length + UTF-8 bytes) -- iff the event carries a connect id
//!   - payload (4-byte BE length + bytes) -- always present, possibly empty

use std::io::{Read, Write};
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{CodecError, Error, Result};

// ================== Protocol Constants ==================

/// Protocol version carried in the high nibble of byte 0.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    #[default]
    V1 = 0b0001,
}

/// Message type (high nibble of byte 1).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageType {
    #[default]
    FullClient = 0b0001,
    AudioOnlyClient = 0b0010,
    FullServer = 0b1001,
    /// Alias: ServerACK.
    AudioOnlyServer = 0b1011,
    FrontEndResult = 0b1100,
    Error = 0b1111,
}

impl MessageType {
    fn from_bits(bits: u8) -> Result<Self> {
        Ok(match bits {
            0b0001 => MessageType::FullClient,
            0b0010 => MessageType::AudioOnlyClient,
            0b1001 => MessageType::FullServer,
            0b1011 => MessageType::AudioOnlyServer,
            0b1100 => MessageType::FrontEndResult,
            0b1111 => MessageType::Error,
            other => return Err(CodecError::UnknownMessageType(other).into()),
        })
    }
}

/// Message flags (low nibble of byte 1).
///
/// The low 2 bits hold one of four mutually exclusive sequence states; bit 2
/// (`WITH_EVENT`) is independent and may be combined with any of them, so
/// this is a small bitset rather than a single-valued enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct MessageFlags(u8);

impl MessageFlags {
    pub const NO_SEQUENCE: MessageFlags = MessageFlags(0b0000);
    pub const POSITIVE_SEQUENCE: MessageFlags = MessageFlags(0b0001);
    pub const NEGATIVE_SEQUENCE: MessageFlags = MessageFlags(0b0010);
    pub const LAST_NO_SEQUENCE: MessageFlags = MessageFlags(0b0011);
    pub const WITH_EVENT: MessageFlags = MessageFlags(0b0100);

    const SEQUENCE_MASK: u8 = 0b0011;

    /// Builds a flag set from the raw low nibble, discarding any bit above it.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        MessageFlags(bits & 0x0f)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: MessageFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn has_event(self) -> bool {
        self.contains(MessageFlags::WITH_EVENT)
    }

    pub fn is_no_sequence(self) -> bool {
        self.0 & Self::SEQUENCE_MASK == Self::NO_SEQUENCE.0
    }

    pub fn is_positive_sequence(self) -> bool {
        self.0 & Self::SEQUENCE_MASK == Self::POSITIVE_SEQUENCE.0
    }

    pub fn is_negative_sequence(self) -> bool {
        self.0 & Self::SEQUENCE_MASK == Self::NEGATIVE_SEQUENCE.0
    }

    pub fn is_last_no_sequence(self) -> bool {
        self.0 & Self::SEQUENCE_MASK == Self::LAST_NO_SEQUENCE.0
    }
}

impl BitOr for MessageFlags {
    type Output = MessageFlags;

    fn bitor(self, rhs: MessageFlags) -> MessageFlags {
        MessageFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for MessageFlags {
    fn bitor_assign(&mut self, rhs: MessageFlags) {
        self.0 |= rhs.0;
    }
}

/// Serialization method (high nibble of byte 2).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationType {
    /// Raw bytes, used for audio-only frames.
    Raw = 0b0000,
    #[default]
    Json = 0b0001,
    Thrift = 0b0010,
    Custom = 0b1111,
}

impl SerializationType {
    fn from_bits(bits: u8) -> Result<Self> {
        Ok(match bits {
            0b0000 => SerializationType::Raw,
            0b0001 => SerializationType::Json,
            0b0010 => SerializationType::Thrift,
            0b1111 => SerializationType::Custom,
            other => return Err(CodecError::UnknownSerialization(other).into()),
        })
    }
}

/// Compression method (low nibble of byte 2).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    #[default]
    None = 0b0000,
    Gzip = 0b0001,
    Custom = 0b1111,
}

impl CompressionType {
    fn from_bits(bits: u8) -> Result<Self> {
        Ok(match bits {
            0b0000 => CompressionType::None,
            0b0001 => CompressionType::Gzip,
            0b1111 => CompressionType::Custom,
            other => return Err(CodecError::UnknownCompression(other).into()),
        })
    }
}

/// Wire event numbers. Implementations must use these exact values.
pub mod events {
    pub const START_CONNECTION: i32 = 1;
    pub const FINISH_CONNECTION: i32 = 2;
    pub const CONNECTION_STARTED: i32 = 50;
    /// Not in the registry table but referenced by the session-id-omission
    /// rule alongside the other connection-level events.
    pub const CONNECTION_FAILED: i32 = 51;
    pub const CONNECTION_FINISHED: i32 = 52;
    pub const START_SESSION: i32 = 100;
    pub const FINISH_SESSION: i32 = 102;
    pub const SESSION_STARTED: i32 = 150;
    pub const SESSION_FINISHED: i32 = 152;
    pub const SESSION_FINISHED_ALT: i32 = 153;
    pub const AUDIO_CHUNK_UPSTREAM: i32 = 200;
    pub const SAY_HELLO: i32 = 300;
    pub const TTS_TYPE_INFO: i32 = 350;
    pub const ASR_INFO: i32 = 450;
    pub const QUERY_FINISHED: i32 = 459;
    pub const CHAT_TTS_TEXT: i32 = 500;

    /// Session id is omitted for connection-level events, even though they
    /// carry `with-event`.
    pub fn omits_session_id(event: i32) -> bool {
        matches!(
            event,
            START_CONNECTION | FINISH_CONNECTION | CONNECTION_STARTED | CONNECTION_FAILED
                | CONNECTION_FINISHED
        )
    }

    /// Connect id is present only for the three server acks that settle a
    /// connection attempt -- a strictly narrower set than
    /// [`omits_session_id`] (it excludes StartConnection/FinishConnection).
    pub fn has_connect_id(event: i32) -> bool {
        matches!(
            event,
            CONNECTION_STARTED | CONNECTION_FAILED | CONNECTION_FINISHED
        )
    }
}

/// Default sequence-presence predicate: a sequence number is only on the
/// wire when the flags carry a real forward or backward sequence, not for
/// `no-seq` or the "last packet, no sequence" variant.
pub fn default_sequence_predicate(flags: MessageFlags) -> bool {
    flags.is_positive_sequence() || flags.is_negative_sequence()
}

/// A predicate deciding, from the flags alone, whether a frame's sequence
/// sub-field is present. Injected into [`BinaryProtocol`] rather than
/// hardcoded so the codec stays pure and the rule is testable in isolation.
pub type SequencePredicate = Arc<dyn Fn(MessageFlags) -> bool + Send + Sync>;

// ================== Protocol Message ==================

/// A single self-describing wire message. Constructed fresh per send or
/// receive; never reused across the wire boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub msg_type: MessageType,
    pub flags: MessageFlags,
    pub event: Option<i32>,
    pub session_id: Option<String>,
    pub connect_id: Option<String>,
    pub sequence: Option<i32>,
    pub error_code: Option<u32>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(msg_type: MessageType) -> Self {
        Self {
            msg_type,
            ..Default::default()
        }
    }

    /// Convenience constructor for the common `FullClient` + `with-event`
    /// request shape used throughout the handshake and steady state.
    pub fn full_client(event: i32) -> Self {
        Self::new(MessageType::FullClient).with_event(event)
    }

    /// Convenience constructor for an upstream audio chunk.
    pub fn audio_only_client(session_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self::new(MessageType::AudioOnlyClient)
            .with_event(events::AUDIO_CHUNK_UPSTREAM)
            .with_session_id(session_id)
            .with_payload(payload)
    }

    pub fn with_event(mut self, event: i32) -> Self {
        self.flags |= MessageFlags::WITH_EVENT;
        self.event = Some(event);
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_connect_id(mut self, connect_id: impl Into<String>) -> Self {
        self.connect_id = Some(connect_id.into());
        self
    }

    pub fn with_sequence(mut self, flags: MessageFlags, sequence: i32) -> Self {
        self.flags |= flags;
        self.sequence = Some(sequence);
        self
    }

    pub fn with_error_code(mut self, code: u32) -> Self {
        self.error_code = Some(code);
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(
            self.msg_type,
            MessageType::AudioOnlyServer | MessageType::AudioOnlyClient
        )
    }

    pub fn is_error(&self) -> bool {
        self.msg_type == MessageType::Error
    }

    pub fn is_frontend(&self) -> bool {
        self.msg_type == MessageType::FrontEndResult
    }

    pub fn has_event(&self) -> bool {
        self.flags.has_event()
    }
}

// ================== Binary Protocol ==================

/// Binary protocol encoder/decoder. Holds the codec configuration (header
/// size, compression) and the injected sequence predicate; stateless
/// otherwise, so the same instance can be shared by the upstream and
/// downstream pumps.
///
/// Serialization is deliberately NOT an instance field: the upstream pump
/// and the ChatTTSText sender run concurrently and need different
/// serialization tags on the frames they emit (Raw for audio, JSON for
/// everything else). A mutable "current serialization" setting shared
/// between them would race; instead `marshal` takes it as an explicit
/// argument per call.
#[derive(Clone)]
pub struct BinaryProtocol {
    header_size_units: u8,
    compression: CompressionType,
    sequence_predicate: SequencePredicate,
}

impl std::fmt::Debug for BinaryProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryProtocol")
            .field("header_size_units", &self.header_size_units)
            .field("compression", &self.compression)
            .finish()
    }
}

impl Default for BinaryProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryProtocol {
    /// Version=1, header-size=4 bytes, compression=None.
    pub fn new() -> Self {
        Self {
            header_size_units: 1,
            compression: CompressionType::None,
            sequence_predicate: Arc::new(default_sequence_predicate),
        }
    }

    /// Overrides the sequence-presence predicate. See [`SequencePredicate`].
    pub fn with_sequence_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(MessageFlags) -> bool + Send + Sync + 'static,
    {
        self.sequence_predicate = Arc::new(predicate);
        self
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    pub fn set_compression(&mut self, compression: CompressionType) {
        self.compression = compression;
    }

    /// Encodes a message tagged with the given serialization method. Field
    /// order: sequence, then (errorCode if `type=Error`, else event +
    /// sessionId), then connectId, then payload.
    pub fn marshal(&self, msg: &Message, serialization: SerializationType) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(32 + msg.payload.len());

        buf.put_u8(((ProtocolVersion::V1 as u8) << 4) | self.header_size_units);
        buf.put_u8(((msg.msg_type as u8) << 4) | msg.flags.bits());
        buf.put_u8(((serialization as u8) << 4) | (self.compression as u8));
        for _ in 0..(self.header_size_units as usize * 4 - 3) {
            buf.put_u8(0);
        }

        if (self.sequence_predicate)(msg.flags) {
            buf.put_i32(msg.sequence.unwrap_or(0));
        }

        if msg.msg_type == MessageType::Error {
            buf.put_u32(msg.error_code.unwrap_or(0));
        } else if msg.flags.has_event() {
            let event = msg.event.unwrap_or(0);
            buf.put_i32(event);

            if !events::omits_session_id(event) {
                let session_id = msg.session_id.as_deref().unwrap_or("");
                buf.put_u32(session_id.len() as u32);
                buf.put_slice(session_id.as_bytes());
            }

            if events::has_connect_id(event) {
                let connect_id = msg.connect_id.as_deref().unwrap_or("");
                buf.put_u32(connect_id.len() as u32);
                buf.put_slice(connect_id.as_bytes());
            }
        }

        let payload = if self.compression == CompressionType::Gzip && !msg.payload.is_empty() {
            gzip_compress(&msg.payload)?
        } else {
            msg.payload.clone()
        };
        buf.put_u32(payload.len() as u32);
        buf.put_slice(&payload);

        Ok(buf.to_vec())
    }

    /// Decodes a message, returning it along with the serialization tag
    /// read from the header so the caller knows how to interpret the
    /// payload. Consumes the entire frame; any residual byte is a
    /// [`CodecError::TrailingBytes`] error.
    pub fn unmarshal(&self, data: &[u8]) -> Result<(Message, SerializationType)> {
        if data.len() < 3 {
            return Err(CodecError::MissingHeader(data.len()).into());
        }
        let (byte0, byte1, byte2) = (data[0], data[1], data[2]);
        let mut pos = 3usize;

        let header_size_units = (byte0 & 0x0f).max(1) as usize;
        let padding = header_size_units * 4 - 3;
        if data.len() - pos < padding {
            return Err(CodecError::MissingHeader(data.len()).into());
        }
        pos += padding;

        let msg_type = MessageType::from_bits(byte1 >> 4)?;
        let flags = MessageFlags::from_bits_truncate(byte1 & 0x0f);
        let serialization = SerializationType::from_bits(byte2 >> 4)?;
        let compression = CompressionType::from_bits(byte2 & 0x0f)?;

        let mut msg = Message {
            msg_type,
            flags,
            ..Default::default()
        };

        if (self.sequence_predicate)(flags) {
            let field = take(data, &mut pos, 4).ok_or(CodecError::ShortSequence)?;
            msg.sequence = Some(i32::from_be_bytes(field.try_into().unwrap()));
        }

        if msg_type == MessageType::Error {
            let field = take(data, &mut pos, 4).ok_or(CodecError::ShortErrorCode)?;
            msg.error_code = Some(u32::from_be_bytes(field.try_into().unwrap()));
        } else if flags.has_event() {
            let field = take(data, &mut pos, 4).ok_or(CodecError::ShortEvent)?;
            let event = i32::from_be_bytes(field.try_into().unwrap());
            msg.event = Some(event);

            if !events::omits_session_id(event) {
                let len_field = take(data, &mut pos, 4).ok_or(CodecError::ShortSessionIdLen)?;
                let len = u32::from_be_bytes(len_field.try_into().unwrap()) as usize;
                let remaining = data.len() - pos;
                let body = take(data, &mut pos, len).ok_or(CodecError::ShortSessionIdBody {
                    expected: len,
                    found: remaining,
                })?;
                msg.session_id = Some(String::from_utf8_lossy(body).into_owned());
            }

            if events::has_connect_id(event) {
                let len_field = take(data, &mut pos, 4).ok_or(CodecError::ShortConnectIdLen)?;
                let len = u32::from_be_bytes(len_field.try_into().unwrap()) as usize;
                let remaining = data.len() - pos;
                let body = take(data, &mut pos, len).ok_or(CodecError::ShortConnectIdBody {
                    expected: len,
                    found: remaining,
                })?;
                msg.connect_id = Some(String::from_utf8_lossy(body).into_owned());
            }
        }

        let len_field = take(data, &mut pos, 4).ok_or(CodecError::ShortPayloadLen)?;
        let payload_len = u32::from_be_bytes(len_field.try_into().unwrap()) as usize;
        let remaining = data.len() - pos;
        let payload_bytes =
            take(data, &mut pos, payload_len).ok_or(CodecError::ShortPayloadBody {
                expected: payload_len,
                found: remaining,
            })?;

        msg.payload = if compression == CompressionType::Gzip && !payload_bytes.is_empty() {
            gzip_decompress(payload_bytes)?
        } else {
            payload_bytes.to_vec()
        };

        if pos != data.len() {
            return Err(CodecError::TrailingBytes(data.len() - pos).into());
        }

        Ok((msg, serialization))
    }
}

/// Takes `n` bytes at `*pos`, advancing it, or returns `None` without
/// mutating `pos` if fewer than `n` bytes remain. Never panics on
/// out-of-bounds input, unlike an unchecked cursor read.
fn take<'a>(data: &'a [u8], pos: &mut usize, n: usize) -> Option<&'a [u8]> {
    if data.len() - *pos < n {
        return None;
    }
    let slice = &data[*pos..*pos + n];
    *pos += n;
    Some(slice)
}

fn gzip_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| CodecError::Compress(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| Error::from(CodecError::Compress(e.to_string())))
}

fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| CodecError::Decompress(e.to_string()))?;
    Ok(decompressed)
}
