//! Transport adapter (C2): atomic send/receive of one whole binary frame
//! over a WebSocket duplex pipe, with writes from multiple producers
//! serialized by a single mutex and a single-consumer receive path.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use http::Request;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The capability a session worker actually needs from a transport: send one
/// frame, receive one frame, close. Split out as a trait (mirroring the
/// `InputDevice`/`OutputDevice` seam in `dialog_audio::device`) so the
/// session controller and pumps can be driven against an in-memory fake in
/// tests instead of a live WebSocket dial.
#[async_trait]
pub trait DuplexTransport: Send + Sync {
    /// Sends one complete binary frame atomically; concurrent callers must
    /// be serialized by the implementation.
    async fn send(&self, frame: Vec<u8>) -> Result<()>;

    /// Blocks until a full binary message is reassembled and returns its
    /// bytes. Single-consumer: only the downstream pump should call this.
    async fn receive(&self) -> Result<Vec<u8>>;

    /// Closes the underlying connection.
    async fn close(&self) -> Result<()>;
}

/// Handshake headers required by the remote service (names sent verbatim,
/// per §6 External Interfaces).
#[derive(Debug, Clone)]
pub struct TransportHeaders {
    pub resource_id: String,
    pub access_key: String,
    pub app_key: String,
    pub app_id: String,
    /// Freshly generated per connection.
    pub connect_id: String,
}

/// Duplex binary transport. No retries: a transport error surfaces to the
/// caller, which decides whether to terminate the session.
pub struct Transport {
    write: Mutex<SplitSink<WsStream, WsMessage>>,
    read: Mutex<SplitStream<WsStream>>,
}

impl Transport {
    /// Connects to `url`, attaching the negotiated handshake headers.
    pub async fn connect(url: &str, headers: &TransportHeaders) -> Result<Self> {
        let host = host_of(url).ok_or_else(|| Error::Config(format!("invalid websocket url: {url}")))?;

        let request = Request::builder()
            .uri(url)
            .header("Host", host)
            .header("X-Api-Resource-Id", headers.resource_id.clone())
            .header("X-Api-Access-Key", headers.access_key.clone())
            .header("X-Api-App-Key", headers.app_key.clone())
            .header("X-Api-App-ID", headers.app_id.clone())
            .header("X-Api-Connect-Id", headers.connect_id.clone())
            .header("Sec-WebSocket-Key", generate_key())
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .body(())
            .map_err(|e| Error::Config(format!("invalid websocket request: {e}")))?;

        let (ws_stream, _response) = connect_async(request).await?;
        let (write, read) = ws_stream.split();

        Ok(Self {
            write: Mutex::new(write),
            read: Mutex::new(read),
        })
    }
}

#[async_trait]
impl DuplexTransport for Transport {
    /// Sends one complete binary frame atomically; concurrent callers are
    /// serialized by the write mutex.
    async fn send(&self, frame: Vec<u8>) -> Result<()> {
        let mut write = self.write.lock().await;
        write.send(WsMessage::Binary(frame.into())).await?;
        Ok(())
    }

    /// Blocks until a full binary message is reassembled and returns its
    /// bytes. Single-consumer: only the downstream pump should call this.
    async fn receive(&self) -> Result<Vec<u8>> {
        let mut read = self.read.lock().await;
        loop {
            match read.next().await {
                Some(Ok(WsMessage::Binary(bytes))) => return Ok(bytes.to_vec()),
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Close(_))) | None => {
                    return Err(Error::protocol("transport closed by peer"))
                }
                Some(Ok(other)) => {
                    return Err(Error::protocol(format!(
                        "unexpected non-binary websocket message: {other:?}"
                    )))
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Closes the underlying connection.
    async fn close(&self) -> Result<()> {
        let mut write = self.write.lock().await;
        write.close().await?;
        Ok(())
    }
}

fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://")?.1;
    Some(rest.split('/').next().unwrap_or(rest).to_string())
}

/// An in-memory [`DuplexTransport`] fake for unit tests, crate-visible so
/// the session controller and the pumps can be driven end-to-end without a
/// live WebSocket. `receive()` pops pre-loaded frames in FIFO order and
/// returns the "peer closed" error once exhausted; `send()` records every
/// frame handed to it for assertions.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    pub(crate) struct MockTransport {
        inbound: StdMutex<VecDeque<Vec<u8>>>,
        sent: StdMutex<Vec<Vec<u8>>>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Queues a frame to be returned by a future `receive()` call.
        pub(crate) fn push_inbound(&self, frame: Vec<u8>) {
            self.inbound.lock().unwrap().push_back(frame);
        }

        /// Every frame passed to `send()` so far, in order.
        pub(crate) fn sent_frames(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DuplexTransport for MockTransport {
        async fn send(&self, frame: Vec<u8>) -> Result<()> {
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn receive(&self) -> Result<Vec<u8>> {
            self.inbound
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::protocol("mock transport: no more inbound frames"))
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_of_parses_scheme_and_path() {
        assert_eq!(
            host_of("wss://example.com/v1/realtime?x=1"),
            Some("example.com".to_string())
        );
        assert_eq!(host_of("not-a-url"), None);
    }

    #[tokio::test]
    async fn mock_transport_records_sends_and_replays_inbound() {
        use mock::MockTransport;

        let transport = MockTransport::new();
        transport.push_inbound(vec![1, 2, 3]);
        transport.push_inbound(vec![4, 5]);

        transport.send(vec![9, 9]).await.unwrap();

        assert_eq!(transport.receive().await.unwrap(), vec![1, 2, 3]);
        assert_eq!(transport.receive().await.unwrap(), vec![4, 5]);
        assert!(transport.receive().await.is_err());
        assert_eq!(transport.sent_frames(), vec![vec![9, 9]]);
    }
}
