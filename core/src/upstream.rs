//! Upstream pump (C5): captures microphone audio and streams it to the
//! server as `AudioOnlyClient` frames, independent of whatever the
//! downstream pump is doing.

use std::sync::Arc;

use dialog_audio::device::InputDevice;
use tokio::sync::mpsc;

use crate::cancellation::Cancellation;
use crate::error::{Error, Result};
use crate::protocol::{events, BinaryProtocol, Message, SerializationType};
use crate::transport::DuplexTransport;

/// One 10ms capture block at 16kHz mono.
const CAPTURE_BLOCK_FRAMES: usize = 160;

/// Capacity of the channel bridging the blocking capture thread to the
/// async pump; a handful of blocks of slack absorbs scheduling jitter
/// without building up unbounded latency.
const CAPTURE_CHANNEL_CAPACITY: usize = 8;

/// Runs microphone capture on a dedicated OS thread (device reads are
/// blocking) and a bounded channel carries PCM blocks to the async task
/// that marshals and sends them. Returns once cancelled or once the
/// transport send fails.
pub async fn run_upstream_pump(
    transport: Arc<dyn DuplexTransport>,
    protocol: Arc<BinaryProtocol>,
    session_id: String,
    input: impl InputDevice + 'static,
    cancel: Cancellation,
) -> Result<()> {
    let (capture_handle, mut blocks) = spawn_capture_thread(input, cancel.clone());

    let mut result = Ok(());
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = blocks.recv() => {
                match received {
                    Some(pcm_bytes) => {
                        let msg = Message::audio_only_client(session_id.clone(), pcm_bytes);
                        match protocol.marshal(&msg, SerializationType::Raw) {
                            Ok(frame) => {
                                if let Err(e) = transport.send(frame).await {
                                    result = Err(e);
                                    break;
                                }
                            }
                            Err(e) => {
                                result = Err(e);
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }
        }
    }

    cancel.cancel();
    let _ = tokio::task::spawn_blocking(move || capture_handle.join()).await;

    let finish = Message::full_client(events::FINISH_SESSION)
        .with_session_id(session_id)
        .with_payload(b"{}".to_vec());
    if let Ok(frame) = protocol.marshal(&finish, SerializationType::Json) {
        let _ = transport.send(frame).await;
    }

    result
}

fn spawn_capture_thread<I>(
    mut input: I,
    cancel: Cancellation,
) -> (std::thread::JoinHandle<Result<()>>, mpsc::Receiver<Vec<u8>>)
where
    I: InputDevice + 'static,
{
    let (tx, rx) = mpsc::channel(CAPTURE_CHANNEL_CAPACITY);

    let handle = std::thread::spawn(move || -> Result<()> {
        input.open().map_err(|e| Error::device(e.to_string()))?;

        let result = (|| -> Result<()> {
            loop {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                let mut block = [0i16; CAPTURE_BLOCK_FRAMES];
                input
                    .read(&mut block)
                    .map_err(|e| Error::device(e.to_string()))?;
                let bytes: Vec<u8> = block.iter().flat_map(|s| s.to_le_bytes()).collect();
                if tx.blocking_send(bytes).is_err() {
                    return Ok(());
                }
            }
        })();

        let _ = input.close();
        result
    });

    (handle, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use dialog_audio::device::SilentInput;

    #[tokio::test]
    async fn pump_exits_promptly_on_cancellation() {
        let cancel = Cancellation::new();
        let (handle, mut rx) = spawn_capture_thread(SilentInput, cancel.clone());

        // let a block or two flow through before cancelling
        let _ = rx.recv().await;
        cancel.cancel();

        let joined = tokio::task::spawn_blocking(move || handle.join())
            .await
            .unwrap();
        assert!(joined.unwrap().is_ok());
    }

    #[tokio::test]
    async fn pump_sends_audio_frames_then_finish_session_on_cancel() {
        let mock = Arc::new(MockTransport::new());
        let protocol = Arc::new(BinaryProtocol::new());
        let cancel = Cancellation::new();

        let pump_cancel = cancel.clone();
        let handle = tokio::spawn(run_upstream_pump(
            mock.clone(),
            protocol,
            "sess-1".to_string(),
            SilentInput,
            pump_cancel,
        ));

        // let a few capture blocks flow through before tearing down.
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        let sent = mock.sent_frames();
        assert!(!sent.is_empty(), "expected at least one audio frame before cancellation");

        let last = sent.last().unwrap();
        let (finish, _) = BinaryProtocol::new().unmarshal(last).unwrap();
        assert_eq!(finish.event, Some(events::FINISH_SESSION));
    }
}
