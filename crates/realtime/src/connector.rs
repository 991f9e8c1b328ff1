//! Transport handshake seam
//!
//! A [`Connector`] opens a transport, performs the STOMP CONNECT/CONNECTED
//! exchange and hands back a [`Link`]: a frame sender and a frame receiver.
//! The receiver closing means the link is gone.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use syncrift_core::{ClientConfig, Credential, Result, SyncriftError};

use crate::frame::{decode_all, Command, Frame};

/// An established broker link
pub struct Link {
    pub outbound: mpsc::UnboundedSender<Frame>,
    pub inbound: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credential: &Credential) -> Result<Link>;
}

// ============================================================================
// WEBSOCKET CONNECTOR
// ============================================================================

/// STOMP over a raw WebSocket
pub struct WsConnector {
    url: String,
    handshake_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, handshake_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            handshake_timeout,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.broker_url.clone(), config.handshake_timeout)
    }

    fn host(&self) -> String {
        self.url
            .parse::<Uri>()
            .ok()
            .and_then(|uri| uri.host().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }

    async fn handshake(&self, credential: &Credential) -> Result<Link> {
        debug!("Opening WebSocket to {}", self.url);

        let (ws_stream, _) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| SyncriftError::Connection(format!("WebSocket error: {}", e)))?;

        let (mut write, mut read) = ws_stream.split();

        write
            .send(Message::Text(Frame::connect(&self.host(), credential).encode()))
            .await
            .map_err(|e| SyncriftError::Connection(format!("Failed to send CONNECT: {}", e)))?;

        // Frames that trail CONNECTED in the same payload belong to the link
        let mut early = Vec::new();
        'handshake: loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    let mut frames = decode_all(&text)?.into_iter();
                    while let Some(frame) = frames.next() {
                        match frame.command {
                            Command::Connected => {
                                debug!(
                                    version = frame.get("version").unwrap_or("?"),
                                    "STOMP session established"
                                );
                                early.extend(frames);
                                break 'handshake;
                            }
                            Command::Error => {
                                let reason = frame
                                    .get("message")
                                    .map(str::to_string)
                                    .unwrap_or(frame.body);
                                return Err(SyncriftError::Connection(format!(
                                    "Broker rejected CONNECT: {}",
                                    reason
                                )));
                            }
                            other => debug!("Ignoring {} before CONNECTED", other),
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(SyncriftError::Connection(
                        "Connection closed during handshake".to_string(),
                    ))
                }
                Some(Err(e)) => {
                    return Err(SyncriftError::Connection(format!("WebSocket error: {}", e)))
                }
                Some(Ok(_)) => {}
            }
        }

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Frame>();

        for frame in early {
            let _ = in_tx.send(frame);
        }

        // Write task
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if write.send(Message::Text(frame.encode())).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Read task; dropping `in_tx` signals link loss
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!("Dropping non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => {
                        info!("Broker closed connection");
                        break;
                    }
                    Err(e) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    _ => continue,
                };
                match decode_all(&text) {
                    Ok(frames) => {
                        for frame in frames {
                            if in_tx.send(frame).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => warn!("Failed to parse broker frame: {}", e),
                }
            }
        });

        Ok(Link {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, credential: &Credential) -> Result<Link> {
        tokio::time::timeout(self.handshake_timeout, self.handshake(credential))
            .await
            .map_err(|_| SyncriftError::Timeout)?
    }
}
