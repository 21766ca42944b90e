//! Session controller (C7): the handshake, the steady-state orchestration
//! of the upstream/downstream pumps and playback worker, and the shutdown
//! sequence.

use std::sync::Arc;
use std::time::Duration;

use dialog_audio::device::{InputDevice, OutputDevice};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::cancellation::Cancellation;
use crate::config::{Credentials, SessionConfig};
use crate::downstream::{run_downstream_pump, ChatTtsTextSender};
use crate::error::{Error, Result};
use crate::flags::DialogFlags;
use crate::playback::{run_playback_worker, PlaybackBuffer};
use crate::protocol::{events, BinaryProtocol, Message, MessageType, SerializationType};
use crate::transport::{DuplexTransport, Transport, TransportHeaders};
use crate::upstream::run_upstream_pump;

/// Bound on how long the controller waits for each worker to exit after
/// cancellation before giving up on it.
const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected, handshaken dialog. Holds everything a worker needs behind
/// `Arc`s so `run` can hand clones to each spawned task. `transport` is
/// boxed behind the `DuplexTransport` trait (rather than the concrete
/// `Transport`) so the handshake, steady state, and shutdown sequence can
/// all be driven against an in-memory fake in tests.
pub struct DialogSession {
    transport: Arc<dyn DuplexTransport>,
    protocol: Arc<BinaryProtocol>,
    flags: Arc<DialogFlags>,
    playback: Arc<PlaybackBuffer>,
    session_id: String,
    config: SessionConfig,
}

impl DialogSession {
    /// Dials the transport, then runs the handshake over it.
    pub async fn connect(
        credentials: &Credentials,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::Receiver<()>)> {
        let connect_id = Uuid::new_v4().to_string();
        let headers = TransportHeaders {
            resource_id: credentials.resource_id.clone(),
            access_key: credentials.access_key.clone(),
            app_key: credentials.app_key.clone(),
            app_id: credentials.app_id.clone(),
            connect_id,
        };

        let transport: Arc<dyn DuplexTransport> =
            Arc::new(Transport::connect(&credentials.ws_url, &headers).await?);
        Self::handshake(transport, config).await
    }

    /// Runs the three-step handshake (StartConnection, StartSession,
    /// SayHello) over an already-connected transport and returns a session
    /// ready for [`Self::run`]. Split out from [`Self::connect`] so the
    /// handshake logic can be exercised against an in-memory
    /// [`DuplexTransport`] fake without a live WebSocket dial.
    async fn handshake(
        transport: Arc<dyn DuplexTransport>,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::Receiver<()>)> {
        let protocol = Arc::new(BinaryProtocol::new());
        let (flags, query_signal_rx) = DialogFlags::new();
        let playback = Arc::new(PlaybackBuffer::new(config.tts_audio.sample_rate));

        let start_connection =
            Message::full_client(events::START_CONNECTION).with_payload(b"{}".to_vec());
        transport
            .send(protocol.marshal(&start_connection, SerializationType::Json)?)
            .await?;
        let connection_started = expect_event(
            protocol.unmarshal(&transport.receive().await?)?.0,
            events::CONNECTION_STARTED,
        )?;
        if let Some(connect_id) = connection_started.connect_id {
            flags.set_connect_id(connect_id);
        }

        let session_id = Uuid::new_v4().to_string();
        let session_payload = serde_json::to_vec(&serde_json::json!({
            "tts": config.tts_audio,
            "dialog": config.dialog_profile,
        }))?;
        let start_session = Message::full_client(events::START_SESSION)
            .with_session_id(session_id.clone())
            .with_payload(session_payload);
        transport
            .send(protocol.marshal(&start_session, SerializationType::Json)?)
            .await?;
        let session_started =
            expect_event(protocol.unmarshal(&transport.receive().await?)?.0, events::SESSION_STARTED)?;
        if let Some(dialog_id) = json_str_field(&session_started.payload, "dialog_id") {
            flags.set_dialog_id(dialog_id);
        }

        let hello_payload = serde_json::to_vec(&serde_json::json!({
            "content": config.greeting.initial_greeting,
        }))?;
        let say_hello = Message::full_client(events::SAY_HELLO)
            .with_session_id(session_id.clone())
            .with_payload(hello_payload);
        transport
            .send(protocol.marshal(&say_hello, SerializationType::Json)?)
            .await?;

        Ok((
            Self {
                transport,
                protocol,
                flags,
                playback,
                session_id,
                config,
            },
            query_signal_rx,
        ))
    }

    pub fn dialog_id(&self) -> Option<String> {
        self.flags.dialog_id()
    }

    pub fn connect_id(&self) -> Option<String> {
        self.flags.connect_id()
    }

    pub fn playback(&self) -> Arc<PlaybackBuffer> {
        self.playback.clone()
    }

    /// Spawns the upstream pump, downstream pump, and playback worker, runs
    /// the silence-prompt timer inline, and on exit (from any of those, or
    /// external cancellation) tears the session down.
    pub async fn run<I, O>(
        &self,
        input: I,
        output: O,
        mut query_signal_rx: mpsc::Receiver<()>,
        cancel: Cancellation,
    ) -> Result<()>
    where
        I: InputDevice + 'static,
        O: OutputDevice + 'static,
    {
        let chat_tts_text = Arc::new(ChatTtsTextSender {
            transport: self.transport.clone(),
            protocol: self.protocol.clone(),
            flags: self.flags.clone(),
            playback: self.playback.clone(),
            session_id: self.session_id.clone(),
            literals: self.config.chat_tts_text.clone(),
            pause: self.config.chat_tts_text_pause,
        });

        let upstream = tokio::spawn(run_upstream_pump(
            self.transport.clone(),
            self.protocol.clone(),
            self.session_id.clone(),
            input,
            cancel.clone(),
        ));

        let downstream = tokio::spawn(run_downstream_pump(
            self.transport.clone(),
            self.protocol.clone(),
            self.flags.clone(),
            self.playback.clone(),
            chat_tts_text,
            self.config.chat_tts_text_probability,
            cancel.clone(),
        ));

        let playback_handle =
            run_playback_worker(self.playback.clone(), output, cancel.clone());

        let silence_result = self.run_silence_prompt_timer(&mut query_signal_rx, &cancel).await;

        cancel.cancel();

        let upstream_result = join_with_timeout(upstream).await;
        let downstream_result = join_with_timeout(downstream).await;
        let _ = tokio::task::spawn_blocking(move || playback_handle.join()).await;

        self.shutdown().await?;

        silence_result.or(upstream_result).or(downstream_result)
    }

    /// While no query is in progress, re-sends the greeting if no query
    /// signal arrives within the configured timeout. Exits when cancelled.
    async fn run_silence_prompt_timer(
        &self,
        query_signal_rx: &mut mpsc::Receiver<()>,
        cancel: &Cancellation,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                signal = query_signal_rx.recv() => {
                    if signal.is_none() {
                        return Ok(());
                    }
                    // a query is underway; nothing to prompt
                }
                _ = tokio::time::sleep(self.config.silence_prompt_timeout) => {
                    let payload = serde_json::to_vec(&serde_json::json!({
                        "content": self.config.greeting.silence_prompt,
                    }))?;
                    let say_hello = Message::full_client(events::SAY_HELLO)
                        .with_session_id(self.session_id.clone())
                        .with_payload(payload);
                    let frame = self.protocol.marshal(&say_hello, SerializationType::Json)?;
                    if let Err(e) = self.transport.send(frame).await {
                        return Err(e);
                    }
                }
            }
        }
    }

    /// FinishSession, FinishConnection (awaiting its ack), close the
    /// transport, and dump the playback buffer's diagnostic trail.
    async fn shutdown(&self) -> Result<()> {
        let finish_session = Message::full_client(events::FINISH_SESSION)
            .with_session_id(self.session_id.clone())
            .with_payload(b"{}".to_vec());
        let _ = self
            .transport
            .send(self.protocol.marshal(&finish_session, SerializationType::Json)?)
            .await;

        let finish_connection =
            Message::full_client(events::FINISH_CONNECTION).with_payload(b"{}".to_vec());
        if self
            .transport
            .send(self.protocol.marshal(&finish_connection, SerializationType::Json)?)
            .await
            .is_ok()
        {
            let _ = tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, async {
                loop {
                    match self.transport.receive().await {
                        Ok(frame) => match self.protocol.unmarshal(&frame) {
                            Ok((msg, _)) if msg.event == Some(events::CONNECTION_FINISHED) => {
                                return;
                            }
                            Ok(_) => continue,
                            Err(_) => return,
                        },
                        Err(_) => return,
                    }
                }
            })
            .await;
        }

        let _ = self.transport.close().await;

        if let Some(path) = &self.config.diagnostic_dump_path {
            self.playback.dump_diagnostic(path)?;
        }

        Ok(())
    }
}

async fn join_with_timeout(handle: tokio::task::JoinHandle<Result<()>>) -> Result<()> {
    match tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(Error::TaskFailed(join_error.to_string())),
        Err(_) => Ok(()),
    }
}

fn expect_event(msg: Message, event: i32) -> Result<Message> {
    if msg.msg_type != MessageType::FullServer || msg.event != Some(event) {
        return Err(Error::protocol(format!(
            "expected FullServer/event {event} during handshake, got {:?}/{:?}",
            msg.msg_type, msg.event
        )));
    }
    Ok(msg)
}

fn json_str_field(payload: &[u8], field: &str) -> Option<String> {
    serde_json::from_slice::<serde_json::Value>(payload)
        .ok()?
        .get(field)?
        .as_str()
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[tokio::test]
    async fn handshake_records_connect_id_and_dialog_id() {
        let mock = Arc::new(MockTransport::new());
        let protocol = BinaryProtocol::new();

        let connection_started = Message::new(MessageType::FullServer)
            .with_event(events::CONNECTION_STARTED)
            .with_connect_id("c-abc")
            .with_payload(b"{}".to_vec());
        mock.push_inbound(protocol.marshal(&connection_started, SerializationType::Json).unwrap());

        let session_started = Message::new(MessageType::FullServer)
            .with_event(events::SESSION_STARTED)
            .with_session_id("sess-placeholder")
            .with_payload(br#"{"dialog_id":"d-42"}"#.to_vec());
        mock.push_inbound(protocol.marshal(&session_started, SerializationType::Json).unwrap());

        let (session, _query_signal_rx) =
            DialogSession::handshake(mock.clone(), SessionConfig::default())
                .await
                .unwrap();

        assert_eq!(session.connect_id(), Some("c-abc".to_string()));
        assert_eq!(session.dialog_id(), Some("d-42".to_string()));
    }
}
