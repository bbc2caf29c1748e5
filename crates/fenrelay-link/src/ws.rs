//! WebSocket transport over `tokio-tungstenite`.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::errors::LinkError;
use crate::transport::{Connector, EngineConnection, FrameSink};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects to the engine over `ws://` or `wss://`.
///
/// A handshake that does not finish within the timeout fails like a
/// refused connection.
#[derive(Clone, Copy, Debug)]
pub struct WsConnector {
    handshake_timeout: Duration,
}

impl WsConnector {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<EngineConnection, LinkError> {
        let handshake = tokio::time::timeout(self.handshake_timeout, connect_async(url)).await;
        let (ws, _) = match handshake {
            Ok(result) => result.map_err(|e| LinkError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?,
            Err(_) => {
                return Err(LinkError::Connect {
                    url: url.to_string(),
                    reason: format!(
                        "handshake timed out after {}ms",
                        self.handshake_timeout.as_millis()
                    ),
                })
            }
        };
        debug!(url, "websocket handshake complete");

        let (ws_tx, ws_rx) = ws.split();
        // Only text frames carry replies; control frames are answered by
        // tungstenite itself.
        let frames = ws_rx
            .filter_map(|msg| async move {
                match msg {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(Message::Close(_)) => Some(Err(LinkError::Closed)),
                    Ok(_) => None,
                    Err(e) => Some(Err(LinkError::Receive(e.to_string()))),
                }
            })
            .boxed();

        Ok(EngineConnection {
            sink: Box::new(WsSink(ws_tx)),
            frames,
        })
    }
}

struct WsSink(SplitSink<WsStream, Message>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), LinkError> {
        self.0
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| LinkError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.0.close().await;
    }
}
