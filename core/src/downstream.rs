//! Downstream pump (C6): receives server frames, updates C8's flags, feeds
//! synthesized audio into the playback buffer, and occasionally kicks off
//! the ChatTTSText injection sequence.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::cancellation::Cancellation;
use crate::config::ChatTtsTextLiterals;
use crate::error::{Error, Result};
use crate::flags::DialogFlags;
use crate::playback::PlaybackBuffer;
use crate::protocol::{events, BinaryProtocol, Message, MessageType, SerializationType};
use crate::transport::DuplexTransport;

/// Sets both halves of the suppression state together: the boolean flag
/// other workers read, and the playback buffer's own gate (which is what
/// actually makes `push_bytes` a no-op). Keeping the two in lockstep avoids
/// a window where one says "suppressed" and the other doesn't.
fn set_suppression(flags: &DialogFlags, playback: &PlaybackBuffer, suppressed: bool) {
    flags.set_sending_chat_tts_text(suppressed);
    playback.set_suppressed(suppressed);
}

/// Sends the four-message ChatTTSText sequence (start, end, pause, start,
/// end) that locally injects synthesized speech while suppressing whatever
/// the server would otherwise be streaming down.
pub struct ChatTtsTextSender {
    pub transport: Arc<dyn DuplexTransport>,
    pub protocol: Arc<BinaryProtocol>,
    pub flags: Arc<DialogFlags>,
    pub playback: Arc<PlaybackBuffer>,
    pub session_id: String,
    pub literals: ChatTtsTextLiterals,
    pub pause: Duration,
}

impl ChatTtsTextSender {
    /// Sends the burst if `userQuerying` is currently false, as required by
    /// the precondition; otherwise logs and does nothing. Clears suppression
    /// itself if a send fails partway through -- the downstream pump's
    /// event-350 handler is the only other place that clears it, and that
    /// event will never arrive if the send never reached the server.
    pub async fn maybe_send_burst(self: Arc<Self>) {
        if self.flags.user_querying() {
            tracing::warn!("chat tts text burst skipped: user is mid-query");
            return;
        }

        set_suppression(&self.flags, &self.playback, true);

        if let Err(e) = self
            .send_pair(&self.literals.round1_start, &self.literals.round1_end)
            .await
        {
            tracing::error!(error = %e, "chat tts text round 1 send failed");
            set_suppression(&self.flags, &self.playback, false);
            return;
        }

        tokio::time::sleep(self.pause).await;

        if let Err(e) = self
            .send_pair(&self.literals.round2_start, &self.literals.round2_end)
            .await
        {
            tracing::error!(error = %e, "chat tts text round 2 send failed");
            set_suppression(&self.flags, &self.playback, false);
        }

        // on success, suppression stays set until event 350 arrives
    }

    async fn send_pair(&self, start_content: &str, end_content: &str) -> Result<()> {
        self.send_chunk(true, false, start_content).await?;
        self.send_chunk(false, true, end_content).await
    }

    async fn send_chunk(&self, start: bool, end: bool, content: &str) -> Result<()> {
        let payload = serde_json::to_vec(&serde_json::json!({
            "start": start,
            "end": end,
            "content": content,
        }))?;
        let msg = Message::full_client(events::CHAT_TTS_TEXT)
            .with_session_id(self.session_id.clone())
            .with_payload(payload);
        let frame = self.protocol.marshal(&msg, SerializationType::Json)?;
        self.transport.send(frame).await
    }
}

/// Runs until cancelled, the connection is closed, the server signals the
/// session finished, or an unrecoverable frame arrives.
pub async fn run_downstream_pump(
    transport: Arc<dyn DuplexTransport>,
    protocol: Arc<BinaryProtocol>,
    flags: Arc<DialogFlags>,
    playback: Arc<PlaybackBuffer>,
    chat_tts_text: Arc<ChatTtsTextSender>,
    chat_tts_text_probability: f64,
    cancel: Cancellation,
) -> Result<()> {
    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let frame = match transport.receive().await {
            Ok(f) => f,
            Err(e) => {
                cancel.cancel();
                return Err(e);
            }
        };

        let (msg, _serialization) = match protocol.unmarshal(&frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                cancel.cancel();
                return Err(e);
            }
        };

        match msg.msg_type {
            MessageType::FullServer => {
                match msg.event {
                    Some(events::SESSION_FINISHED) | Some(events::SESSION_FINISHED_ALT) => {
                        cancel.cancel();
                        return Ok(());
                    }
                    Some(events::TTS_TYPE_INFO) if flags.sending_chat_tts_text() => {
                        if is_chat_tts_text_type(&msg.payload) {
                            playback.flush();
                            set_suppression(&flags, &playback, false);
                        }
                    }
                    Some(events::ASR_INFO) => {
                        playback.flush();
                        flags.signal_query();
                        flags.set_user_querying(true);
                    }
                    Some(events::QUERY_FINISHED) => {
                        flags.set_user_querying(false);
                        if rand::thread_rng().gen_bool(chat_tts_text_probability) {
                            let sender = chat_tts_text.clone();
                            tokio::spawn(async move { sender.maybe_send_burst().await });
                        }
                    }
                    _ => {
                        tracing::debug!(event = ?msg.event, "unhandled FullServer event");
                    }
                }
            }
            MessageType::AudioOnlyServer => {
                playback.push_bytes(&msg.payload);
            }
            MessageType::Error => {
                let code = msg.error_code.unwrap_or(0);
                let message = String::from_utf8_lossy(&msg.payload).into_owned();
                tracing::error!(code, %message, "server signalled an error");
                cancel.cancel();
                return Err(Error::server(code, message));
            }
            other => {
                cancel.cancel();
                return Err(Error::protocol(format!(
                    "unexpected message type in steady state: {other:?}"
                )));
            }
        }
    }
}

fn is_chat_tts_text_type(payload: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(payload)
        .ok()
        .and_then(|v| v.get("tts_type").and_then(|t| t.as_str()).map(str::to_owned))
        .is_some_and(|t| t == "chat_tts_text")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[test]
    fn recognizes_chat_tts_text_type_info() {
        assert!(is_chat_tts_text_type(br#"{"tts_type":"chat_tts_text"}"#));
        assert!(!is_chat_tts_text_type(br#"{"tts_type":"other"}"#));
        assert!(!is_chat_tts_text_type(b"not json"));
    }

    fn test_sender(
        mock: Arc<MockTransport>,
        flags: Arc<DialogFlags>,
        playback: Arc<PlaybackBuffer>,
    ) -> Arc<ChatTtsTextSender> {
        Arc::new(ChatTtsTextSender {
            transport: mock,
            protocol: Arc::new(BinaryProtocol::new()),
            flags,
            playback,
            session_id: "sess-1".to_string(),
            literals: ChatTtsTextLiterals::default(),
            pause: Duration::from_millis(1),
        })
    }

    #[tokio::test]
    async fn chat_tts_text_guard_emits_no_frames_while_user_querying() {
        let mock = Arc::new(MockTransport::new());
        let (flags, _query_signal_rx) = DialogFlags::new();
        flags.set_user_querying(true);
        let playback = Arc::new(PlaybackBuffer::new(24000));

        let sender = test_sender(mock.clone(), flags.clone(), playback);
        sender.maybe_send_burst().await;

        assert!(mock.sent_frames().is_empty());
        assert!(!flags.sending_chat_tts_text());
    }

    #[tokio::test]
    async fn chat_tts_text_sends_burst_when_user_is_not_querying() {
        let mock = Arc::new(MockTransport::new());
        let (flags, _query_signal_rx) = DialogFlags::new();
        let playback = Arc::new(PlaybackBuffer::new(24000));

        let sender = test_sender(mock.clone(), flags.clone(), playback);
        sender.maybe_send_burst().await;

        // start, end, (pause), start, end -- four frames, all ChatTTSText.
        assert_eq!(mock.sent_frames().len(), 4);
        assert!(flags.sending_chat_tts_text());
    }

    #[tokio::test]
    async fn dispatches_asr_info_and_query_finished_events() {
        let mock = Arc::new(MockTransport::new());
        let protocol = Arc::new(BinaryProtocol::new());

        let asr_info = Message::new(MessageType::FullServer)
            .with_event(events::ASR_INFO)
            .with_session_id("sess-1")
            .with_payload(b"{}".to_vec());
        mock.push_inbound(protocol.marshal(&asr_info, SerializationType::Json).unwrap());

        let query_finished = Message::new(MessageType::FullServer)
            .with_event(events::QUERY_FINISHED)
            .with_session_id("sess-1")
            .with_payload(b"{}".to_vec());
        mock.push_inbound(protocol.marshal(&query_finished, SerializationType::Json).unwrap());

        let (flags, mut query_signal_rx) = DialogFlags::new();
        let playback = Arc::new(PlaybackBuffer::new(24000));
        playback.push_bytes(&[0u8; 4]);
        assert!(!playback.is_empty());

        let chat_tts_text = test_sender(mock.clone(), flags.clone(), playback.clone());
        let cancel = Cancellation::new();

        let result = run_downstream_pump(
            mock.clone(),
            protocol.clone(),
            flags.clone(),
            playback.clone(),
            chat_tts_text,
            0.0,
            cancel.clone(),
        )
        .await;

        // the mock transport runs dry after the two queued frames.
        assert!(result.is_err());
        assert!(cancel.is_cancelled());

        // ASR info flushed the buffer and raised userQuerying + a query signal;
        // query-finished then cleared userQuerying again.
        assert!(playback.is_empty());
        assert!(!flags.user_querying());
        assert!(query_signal_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn audio_only_server_is_dropped_while_suppressed() {
        let mock = Arc::new(MockTransport::new());
        let protocol = Arc::new(BinaryProtocol::new());

        let audio = Message::new(MessageType::AudioOnlyServer).with_payload(vec![0, 0, 128, 63]);
        mock.push_inbound(protocol.marshal(&audio, SerializationType::Raw).unwrap());

        let (flags, _query_signal_rx) = DialogFlags::new();
        flags.set_sending_chat_tts_text(true);
        let playback = Arc::new(PlaybackBuffer::new(24000));
        playback.set_suppressed(true);

        let chat_tts_text = test_sender(mock.clone(), flags.clone(), playback.clone());
        let cancel = Cancellation::new();

        let result = run_downstream_pump(
            mock.clone(),
            protocol.clone(),
            flags.clone(),
            playback.clone(),
            chat_tts_text,
            0.0,
            cancel.clone(),
        )
        .await;

        assert!(result.is_err());
        assert!(playback.is_empty());
    }
}
