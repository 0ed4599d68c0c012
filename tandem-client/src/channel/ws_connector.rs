use crate::channel::relay_connector::{RelayConnector, RelayLink};
use crate::error::ChannelError;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use futures::{SinkExt, Stream, StreamExt};
use std::time::Duration;
use tandem_core::{ParticipantId, RelayMessage, SessionContext};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};
use url::Url;

/// WebSocket transport to the relay. Frames are JSON text messages.
#[derive(Debug, Clone)]
pub struct WsRelayConnector {
    url: Url,
    handshake_timeout: Duration,
}

impl WsRelayConnector {
    pub fn new(url: &str, handshake_timeout: Duration) -> Result<Self, ChannelError> {
        Ok(Self {
            url: Url::parse(url)?,
            handshake_timeout,
        })
    }

    fn endpoint(&self, ctx: &SessionContext) -> Url {
        let mut url = self.url.clone();
        if let Some(token) = &ctx.auth_token {
            url.query_pairs_mut().append_pair("token", token);
        }
        url
    }
}

#[async_trait]
impl RelayConnector for WsRelayConnector {
    async fn connect(&self, ctx: &SessionContext) -> Result<RelayLink, ChannelError> {
        info!("Connecting to relay at {}", self.url);

        let (stream, _) = tokio_tungstenite::connect_async(self.endpoint(ctx).as_str())
            .await
            .context("WebSocket handshake with relay failed")?;

        let (mut sink, mut source) = stream.split();

        let connection_id = tokio::time::timeout(self.handshake_timeout, read_welcome(&mut source))
            .await
            .map_err(|_| ChannelError::HandshakeTimeout(self.handshake_timeout))??;

        info!("Relay assigned connection id {}", connection_id);

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<RelayMessage>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize relay message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    warn!("Relay write failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<RelayMessage>(&text) {
                        Ok(msg) => {
                            if in_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid relay frame: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Relay read failed: {}", e);
                        break;
                    }
                }
            }
            debug!("Relay reader finished");
        });

        Ok(RelayLink {
            connection_id,
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

async fn read_welcome<S>(source: &mut S) -> Result<ParticipantId, ChannelError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = source.next().await {
        let frame = frame.context("Relay connection failed during handshake")?;
        let Message::Text(text) = frame else {
            continue;
        };
        match serde_json::from_str::<RelayMessage>(&text) {
            Ok(RelayMessage::Welcome { connection_id }) => return Ok(connection_id),
            Ok(other) => debug!("Ignoring '{}' received before welcome", other.event_name()),
            Err(e) => warn!("Invalid relay frame during handshake: {}", e),
        }
    }

    Err(anyhow!("Relay closed the connection before welcome").into())
}
