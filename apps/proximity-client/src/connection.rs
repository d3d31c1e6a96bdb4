//! Socket event loop driving a [`ProximityClient`].

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use proximity_common::{FrameError, Update};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::call::MediaDialer;
use crate::client::{MediaEvent, ProximityClient};

/// Local input from whatever is moving the cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalEvent {
    Moved { x: f64, y: f64 },
    Volume(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("bad frame from server: {0}")]
    Frame(#[from] FrameError),

    #[error("server closed the connection ({code}): {reason}")]
    Closed { code: u16, reason: String },
}

/// Connect to `url` and pump events until the server closes the socket or
/// the local input channel is dropped.
///
/// Every call the client holds is closed before this returns, on every exit
/// path.
pub async fn run<D: MediaDialer>(
    client: &mut ProximityClient<D>,
    url: &str,
    local: mpsc::Receiver<LocalEvent>,
    media: mpsc::Receiver<MediaEvent>,
    flush_interval: Duration,
) -> Result<(), ClientError> {
    let result = pump(client, url, local, media, flush_interval).await;
    client.shutdown();
    result
}

async fn pump<D: MediaDialer>(
    client: &mut ProximityClient<D>,
    url: &str,
    mut local: mpsc::Receiver<LocalEvent>,
    mut media: mpsc::Receiver<MediaEvent>,
    flush_interval: Duration,
) -> Result<(), ClientError> {
    let (ws, _) = tokio_tungstenite::connect_async(url).await?;
    tracing::info!(url = %url, peer_id = %client.id(), "connected to room");
    let (mut ws_tx, mut ws_rx) = ws.split();

    let mut flush_timer = time::interval(flush_interval);
    flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        client.handle_update(Update::from_json(text.as_str())?);
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        return match frame {
                            Some(frame) if u16::from(frame.code) >= 4000 => Err(ClientError::Closed {
                                code: frame.code.into(),
                                reason: frame.reason.as_str().to_string(),
                            }),
                            _ => Ok(()),
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                }
            }

            event = local.recv() => {
                match event {
                    Some(LocalEvent::Moved { x, y }) => client.move_to(x, y),
                    Some(LocalEvent::Volume(v)) => client.set_volume(v),
                    None => {
                        tracing::info!(peer_id = %client.id(), "leaving room");
                        let _ = ws_tx.send(WsMessage::Close(None)).await;
                        return Ok(());
                    }
                }
            }

            Some(event) = media.recv() => client.handle_media_event(event),

            _ = flush_timer.tick() => {
                if let Some(frame) = client.flush() {
                    let json = serde_json::to_string(&frame).map_err(FrameError::Json)?;
                    ws_tx.send(WsMessage::Text(json.into())).await?;
                }
            }
        }
    }
}
