//! Session configuration: everything the handshake and the ChatTTSText
//! injection sequence need that isn't part of the wire protocol itself.
//!
//! The literal strings here (greetings, ChatTTSText copy) are the ones
//! Design Note (c) flags as things a deployment will want to override --
//! they're plain fields with sensible defaults, not hardcoded in the
//! handshake logic.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Credentials and connection target. One instance per process; there is
/// exactly one transport and one dialog per process, per the concurrency
/// model.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub ws_url: String,
    pub resource_id: String,
    pub access_key: String,
    pub app_key: String,
    pub app_id: String,
}

/// The TTS audio format requested of the server for the downstream stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsAudioConfig {
    pub channel: u32,
    pub format: String,
    pub sample_rate: u32,
}

impl Default for TtsAudioConfig {
    fn default() -> Self {
        Self {
            channel: 1,
            format: "pcm".to_string(),
            sample_rate: 24000,
        }
    }
}

/// The dialog persona sent in the `StartSession` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogProfile {
    pub bot_name: String,
    pub system_role: String,
    pub speaking_style: String,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Greeting copy, sent via `SayHello` and on a prompt-for-silence timeout.
#[derive(Debug, Clone)]
pub struct GreetingConfig {
    pub initial_greeting: String,
    pub silence_prompt: String,
}

impl Default for GreetingConfig {
    fn default() -> Self {
        Self {
            initial_greeting: "Hello! How can I help you today?".to_string(),
            silence_prompt: "Are you still there?".to_string(),
        }
    }
}

/// The four literal strings sent across a ChatTTSText burst.
#[derive(Debug, Clone)]
pub struct ChatTtsTextLiterals {
    pub round1_start: String,
    pub round1_end: String,
    pub round2_start: String,
    pub round2_end: String,
}

impl Default for ChatTtsTextLiterals {
    fn default() -> Self {
        Self {
            round1_start: "Let me think about that for a moment.".to_string(),
            round1_end: "".to_string(),
            round2_start: "Still working on it.".to_string(),
            round2_end: "".to_string(),
        }
    }
}

/// Everything the session controller needs beyond the protocol and
/// transport themselves.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tts_audio: TtsAudioConfig,
    pub dialog_profile: DialogProfile,
    pub greeting: GreetingConfig,
    pub chat_tts_text: ChatTtsTextLiterals,
    /// How long the silence-prompt timer waits for a query signal before
    /// re-sending the greeting.
    pub silence_prompt_timeout: Duration,
    /// Probability of triggering a ChatTTSText burst on event 459.
    pub chat_tts_text_probability: f64,
    /// Pause between the two rounds of a ChatTTSText burst.
    pub chat_tts_text_pause: Duration,
    /// Where to dump the playback buffer's diagnostic PCM trail on
    /// shutdown. `None` skips the dump.
    pub diagnostic_dump_path: Option<std::path::PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tts_audio: TtsAudioConfig::default(),
            dialog_profile: DialogProfile::default(),
            greeting: GreetingConfig::default(),
            chat_tts_text: ChatTtsTextLiterals::default(),
            silence_prompt_timeout: Duration::from_secs(30),
            chat_tts_text_probability: 0.5,
            chat_tts_text_pause: Duration::from_secs(10),
            diagnostic_dump_path: Some(std::path::PathBuf::from("./output.pcm")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_configuration() {
        let config = SessionConfig::default();
        assert_eq!(config.tts_audio.sample_rate, 24000);
        assert_eq!(config.silence_prompt_timeout, Duration::from_secs(30));
        assert_eq!(config.chat_tts_text_probability, 0.5);
    }
}
