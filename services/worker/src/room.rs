//! Production room transport: a signaling WebSocket client that joins a
//! room with a signed access token, routes participant presence, and
//! carries PCM16 audio frames in both directions.

use crate::{
    audio,
    signal::{ClientSignal, ServerSignal},
    token,
};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use govi_core::room::{Participant, RoomConnector, RoomSession, SubscriptionMode};
use std::{sync::Arc, time::Duration};
use tokio::{
    net::TcpStream,
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{debug, error, info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const TOKEN_TTL: Duration = Duration::from_secs(10 * 60);
const AUDIO_CHANNEL_CAPACITY: usize = 128;

/// Connects to rooms on the signaling server using the transport key/secret
/// pair from configuration.
pub struct SignalRoomConnector {
    server_url: String,
    api_key: String,
    api_secret: String,
    agent_identity: String,
}

impl SignalRoomConnector {
    pub fn new(
        server_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        agent_identity: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            agent_identity: agent_identity.into(),
        }
    }
}

#[async_trait]
impl RoomConnector for SignalRoomConnector {
    async fn connect(
        &self,
        room_name: &str,
        mode: SubscriptionMode,
    ) -> Result<Arc<dyn RoomSession>> {
        let token = token::mint_room_token(
            &self.api_key,
            &self.api_secret,
            room_name,
            &self.agent_identity,
            mode,
            TOKEN_TTL,
        )?;

        let mut request = self.server_url.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert("Authorization", format!("Bearer {}", token).parse()?);

        let (ws_stream, _) = connect_async(request)
            .await
            .context("Failed to connect to the room server")?;
        let (mut signal_tx, mut signal_rx) = ws_stream.split();

        let join = ClientSignal::Join {
            room: room_name.to_string(),
            subscription: mode,
        };
        signal_tx
            .send(WsMessage::Text(serde_json::to_string(&join)?.into()))
            .await?;

        // Membership is confirmed before any other signal flows.
        wait_for_joined(&mut signal_rx, room_name).await?;
        info!(room = room_name, "joined room");

        let (participant_tx, participant_rx) = mpsc::channel(4);
        let (audio_tx, audio_rx) = mpsc::channel(AUDIO_CHANNEL_CAPACITY);
        let router = tokio::spawn(route_signals(signal_rx, participant_tx, audio_tx));

        Ok(Arc::new(SignalRoom {
            name: room_name.to_string(),
            outbound: Mutex::new(signal_tx),
            participants: Mutex::new(participant_rx),
            audio: Mutex::new(Some(audio_rx)),
            router,
        }))
    }
}

async fn wait_for_joined(signal_rx: &mut WsSource, room_name: &str) -> Result<()> {
    while let Some(message) = signal_rx.next().await {
        match message.context("room server connection failed during join")? {
            WsMessage::Text(text) => match serde_json::from_str::<ServerSignal>(&text) {
                Ok(ServerSignal::Joined { room }) => {
                    if room != room_name {
                        bail!("room server confirmed the wrong room: {room}");
                    }
                    return Ok(());
                }
                Ok(ServerSignal::Closed { reason }) => {
                    bail!("room closed before join completed: {reason:?}");
                }
                Ok(other) => warn!(signal = ?other, "ignoring signal before join confirmation"),
                Err(_) => warn!("unparseable signal before join confirmation"),
            },
            WsMessage::Close(_) => bail!("room server closed the connection during join"),
            _ => {}
        }
    }
    bail!("room server disconnected before confirming the join")
}

/// Routes server signals for the lifetime of the session: participant
/// presence into the wait channel, subscribed audio into the audio channel.
async fn route_signals(
    mut signal_rx: WsSource,
    participants: mpsc::Sender<Participant>,
    audio_frames: mpsc::Sender<Bytes>,
) {
    while let Some(message) = signal_rx.next().await {
        let text = match message {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(frame)) => {
                info!(?frame, "room server closed the connection");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                error!(error = %e, "error reading from the room server");
                break;
            }
        };
        match serde_json::from_str::<ServerSignal>(&text) {
            Ok(ServerSignal::ParticipantJoined { identity }) => {
                if participants.send(Participant { identity }).await.is_err() {
                    break;
                }
            }
            Ok(ServerSignal::ParticipantLeft { identity }) => {
                info!(%identity, "participant left the room");
            }
            Ok(ServerSignal::Audio { data, .. }) => {
                let frame = audio::decode_pcm16_base64(&data);
                if frame.is_empty() {
                    continue;
                }
                // Realtime audio: drop frames instead of backing up presence
                // signals behind a slow subscriber.
                if audio_frames.try_send(frame).is_err() {
                    debug!("dropping room audio frame; subscriber is behind");
                }
            }
            Ok(ServerSignal::Closed { reason }) => {
                info!(?reason, "room was closed by the server");
                break;
            }
            Ok(ServerSignal::Joined { .. }) => {
                warn!("unexpected duplicate join confirmation");
            }
            Err(e) => warn!(error = %e, "unparseable signal from the room server"),
        }
    }
    debug!("signal router ended");
}

/// A live, joined room.
struct SignalRoom {
    name: String,
    outbound: Mutex<WsSink>,
    participants: Mutex<mpsc::Receiver<Participant>>,
    audio: Mutex<Option<mpsc::Receiver<Bytes>>>,
    router: JoinHandle<()>,
}

#[async_trait]
impl RoomSession for SignalRoom {
    fn name(&self) -> &str {
        &self.name
    }

    async fn wait_for_participant(&self) -> Result<Participant> {
        self.participants
            .lock()
            .await
            .recv()
            .await
            .context("room closed before a participant joined")
    }

    async fn subscribe_audio(&self) -> Result<mpsc::Receiver<Bytes>> {
        self.audio
            .lock()
            .await
            .take()
            .context("room audio was already subscribed")
    }

    async fn publish_audio(&self, frame: Bytes) -> Result<()> {
        let signal = ClientSignal::Audio {
            data: audio::encode_pcm16_base64(&frame),
        };
        self.outbound
            .lock()
            .await
            .send(WsMessage::Text(serde_json::to_string(&signal)?.into()))
            .await
            .context("failed to publish audio to the room")?;
        Ok(())
    }
}

impl Drop for SignalRoom {
    fn drop(&mut self) {
        self.router.abort();
    }
}
