//! Handles the real-time WebSocket connection to OpenAI for voice
//! interaction.
//!
//! Session construction is a three-step handshake (`session.created`, then
//! `session.update` carrying our configuration, then `session.updated`); any
//! failure inside it surfaces as a construction error for the job's
//! initializer to retry. A successful handshake hands back a
//! `ModelSessionHandle` whose pump task owns the socket from then on.

use crate::audio;
use anyhow::{Context, Result, bail};
use async_openai::types::realtime::{
    self as oai_realtime, ClientEvent as OAIClientEvent, ServerEvent as OAIServerEvent,
};
use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use govi_core::{
    chat::ChatRole,
    model::{
        ModelCommand, ModelEvent, ModelSessionConfig, ModelSessionHandle, RealtimeModelProvider,
    },
};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{error, info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const REALTIME_ENDPOINT: &str = "wss://api.openai.com/v1/realtime";
const CHANNEL_CAPACITY: usize = 128;

pub struct OpenAiRealtimeProvider {
    api_key: String,
}

impl OpenAiRealtimeProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl RealtimeModelProvider for OpenAiRealtimeProvider {
    async fn create_session(&self, config: ModelSessionConfig) -> Result<ModelSessionHandle> {
        let url = format!("{}?model={}", REALTIME_ENDPOINT, config.model);
        let mut request = url.into_client_request()?;
        request
            .headers_mut()
            .insert("Authorization", format!("Bearer {}", self.api_key).parse()?);
        request
            .headers_mut()
            .insert("OpenAI-Beta", "realtime=v1".parse()?);

        let (ws_stream, _) = connect_async(request)
            .await
            .context("Failed to connect to the OpenAI Realtime endpoint")?;
        let (mut model_tx, mut model_rx) = ws_stream.split();

        // The server announces the session before accepting configuration.
        expect_server_event(&mut model_rx, "session.created", |event| {
            matches!(event, OAIServerEvent::SessionCreated(_))
        })
        .await?;

        let update = OAIClientEvent::SessionUpdate(oai_realtime::SessionUpdateEvent {
            session: session_resource(&config)?,
            event_id: None,
        });
        model_tx
            .send(WsMessage::Text(serde_json::to_string(&update)?.into()))
            .await?;
        expect_server_event(&mut model_rx, "session.updated", |event| {
            matches!(event, OAIServerEvent::SessionUpdated(_))
        })
        .await?;
        info!(model = %config.model, voice = %config.voice, "realtime session configured");

        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let pump = tokio::spawn(pump(model_tx, model_rx, command_rx, event_tx));
        Ok(ModelSessionHandle::new(command_tx, event_rx, pump))
    }
}

/// Waits for one expected event during session setup. An `error` event or a
/// closed connection fails the construction attempt.
async fn expect_server_event(
    model_rx: &mut WsSource,
    expected: &str,
    is_expected: impl Fn(&OAIServerEvent) -> bool,
) -> Result<()> {
    while let Some(message) = model_rx.next().await {
        match message.context("realtime connection failed during session setup")? {
            WsMessage::Text(text) => match serde_json::from_str::<OAIServerEvent>(&text) {
                Ok(event) if is_expected(&event) => return Ok(()),
                Ok(OAIServerEvent::Error(e)) => {
                    bail!("realtime session setup failed: {}", e.error.message);
                }
                Ok(_) => {}
                Err(_) => warn!(expected, "unparseable server event during setup"),
            },
            WsMessage::Close(_) => {
                bail!("realtime endpoint closed the connection while waiting for {expected}");
            }
            _ => {}
        }
    }
    bail!("realtime endpoint disconnected while waiting for {expected}")
}

/// Builds the session resource announced via `session.update`.
fn session_resource(config: &ModelSessionConfig) -> Result<oai_realtime::SessionResource> {
    Ok(oai_realtime::SessionResource {
        model: Some(config.model.clone()),
        modalities: Some(vec!["text".to_string(), "audio".to_string()]),
        instructions: Some(config.instructions.clone()),
        voice: Some(parse_voice(&config.voice)?),
        temperature: Some(config.temperature),
        input_audio_format: Some(oai_realtime::AudioFormat::PCM16),
        output_audio_format: Some(oai_realtime::AudioFormat::PCM16),
        input_audio_transcription: Some(oai_realtime::AudioTranscription {
            model: Some("whisper-1".to_string()),
            ..Default::default()
        }),
        turn_detection: config.turn_detection.map(|td| {
            oai_realtime::TurnDetection::ServerVAD {
                threshold: td.threshold,
                prefix_padding_ms: td.prefix_padding_ms,
                silence_duration_ms: td.silence_duration_ms,
                interrupt_response: Some(true),
                create_response: Some(td.auto_respond),
            }
        }),
        ..Default::default()
    })
}

fn parse_voice(voice: &str) -> Result<oai_realtime::RealtimeVoice> {
    let voice = match voice.to_ascii_lowercase().as_str() {
        "alloy" => oai_realtime::RealtimeVoice::Alloy,
        "ash" => oai_realtime::RealtimeVoice::Ash,
        "ballad" => oai_realtime::RealtimeVoice::Ballad,
        "coral" => oai_realtime::RealtimeVoice::Coral,
        "echo" => oai_realtime::RealtimeVoice::Echo,
        "sage" => oai_realtime::RealtimeVoice::Sage,
        "shimmer" => oai_realtime::RealtimeVoice::Shimmer,
        "verse" => oai_realtime::RealtimeVoice::Verse,
        other => bail!("'{other}' is not a supported realtime voice"),
    };
    Ok(voice)
}

fn item_role(role: ChatRole) -> oai_realtime::ItemRole {
    match role {
        ChatRole::System => oai_realtime::ItemRole::System,
        ChatRole::Assistant => oai_realtime::ItemRole::Assistant,
        ChatRole::User => oai_realtime::ItemRole::User,
    }
}

/// Main event loop for an established session: forwards runtime commands to
/// the socket and translates server events back into model events.
async fn pump(
    mut model_tx: WsSink,
    mut model_rx: WsSource,
    mut commands: mpsc::Receiver<ModelCommand>,
    events: mpsc::Sender<ModelEvent>,
) {
    loop {
        tokio::select! {
            biased;
            command = commands.recv() => {
                let Some(command) = command else { break };
                match forward_command(&mut model_tx, command).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        error!(error = format!("{e:#}"), "failed to forward a command to the model");
                        break;
                    }
                }
            }
            message = model_rx.next() => {
                match message {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Ok(server_event) = serde_json::from_str::<OAIServerEvent>(&text) {
                            if let Some(event) = translate_event(server_event) {
                                if events.send(event).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(?frame, "realtime endpoint closed the session");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "error reading from the realtime endpoint");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}

/// Returns `Ok(false)` once the session should end.
async fn forward_command(model_tx: &mut WsSink, command: ModelCommand) -> Result<bool> {
    match command {
        ModelCommand::AppendAudio(frame) => {
            let append = oai_realtime::InputAudioBufferAppendEvent {
                audio: audio::encode_pcm16_base64(&frame),
                event_id: None,
            };
            send_event(model_tx, OAIClientEvent::InputAudioBufferAppend(append)).await?;
        }
        ModelCommand::CreateItem { role, text } => {
            let item = oai_realtime::Item {
                r#type: Some(oai_realtime::ItemType::Message),
                role: Some(item_role(role)),
                content: Some(vec![oai_realtime::ItemContent {
                    r#type: oai_realtime::ItemContentType::InputText,
                    text: Some(text),
                    audio: None,
                    transcript: None,
                }]),
                id: None,
                status: None,
                call_id: None,
                name: None,
                arguments: None,
                output: None,
            };
            let create = oai_realtime::ConversationItemCreateEvent {
                item,
                event_id: None,
                previous_item_id: None,
            };
            send_event(model_tx, OAIClientEvent::ConversationItemCreate(create)).await?;
        }
        ModelCommand::CreateResponse => {
            let response = oai_realtime::ResponseCreateEvent {
                response: None,
                event_id: None,
            };
            send_event(model_tx, OAIClientEvent::ResponseCreate(response)).await?;
        }
        ModelCommand::Close => {
            let _ = model_tx.send(WsMessage::Close(None)).await;
            return Ok(false);
        }
    }
    Ok(true)
}

async fn send_event(model_tx: &mut WsSink, event: OAIClientEvent) -> Result<()> {
    model_tx
        .send(WsMessage::Text(serde_json::to_string(&event)?.into()))
        .await?;
    Ok(())
}

fn translate_event(event: OAIServerEvent) -> Option<ModelEvent> {
    match event {
        OAIServerEvent::ResponseAudioDelta(e) => {
            Some(ModelEvent::Audio(audio::decode_pcm16_base64(&e.delta)))
        }
        OAIServerEvent::ConversationItemInputAudioTranscriptionDelta(e) => {
            Some(ModelEvent::UserTranscript {
                text: e.delta,
                is_final: false,
            })
        }
        OAIServerEvent::ConversationItemInputAudioTranscriptionCompleted(e) => {
            Some(ModelEvent::UserTranscript {
                text: e.transcript,
                is_final: true,
            })
        }
        OAIServerEvent::InputAudioBufferSpeechStarted(_) => Some(ModelEvent::UserSpeechStarted),
        OAIServerEvent::InputAudioBufferSpeechStopped(_) => Some(ModelEvent::UserSpeechStopped),
        OAIServerEvent::ResponseDone(_) => Some(ModelEvent::ResponseDone),
        OAIServerEvent::Error(e) => Some(ModelEvent::Error(e.error.message)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govi_core::model::TurnDetection;

    fn config() -> ModelSessionConfig {
        ModelSessionConfig {
            instructions: "You are Govi.".to_string(),
            voice: "echo".to_string(),
            temperature: 0.6,
            model: "gpt-4o-realtime-preview".to_string(),
            turn_detection: Some(TurnDetection::default()),
        }
    }

    #[test]
    fn session_resource_carries_the_config() {
        let resource = session_resource(&config()).unwrap();
        assert_eq!(resource.model.as_deref(), Some("gpt-4o-realtime-preview"));
        assert_eq!(resource.instructions.as_deref(), Some("You are Govi."));
        assert_eq!(resource.temperature, Some(0.6));
        match resource.turn_detection {
            Some(oai_realtime::TurnDetection::ServerVAD {
                threshold,
                silence_duration_ms,
                create_response,
                ..
            }) => {
                assert_eq!(threshold, 0.5);
                assert_eq!(silence_duration_ms, 700);
                assert_eq!(create_response, Some(true));
            }
            other => panic!("expected server VAD turn detection, got {:?}", other),
        }
    }

    #[test]
    fn unknown_voice_is_rejected() {
        let mut config = config();
        config.voice = "basso-profondo".to_string();
        assert!(session_resource(&config).is_err());
    }

    #[test]
    fn voice_parsing_is_case_insensitive() {
        assert!(parse_voice("Echo").is_ok());
        assert!(parse_voice("alloy").is_ok());
    }
}
