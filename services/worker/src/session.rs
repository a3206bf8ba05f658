//! Production conversation runtime: binds a model session handle to a live
//! room and participant, seeds the chat context, and bridges audio in both
//! directions until the room closes.

use crate::audio;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use govi_core::{
    chat::{ChatContext, ChatRole},
    model::{ModelCommand, ModelEvent, ModelSessionHandle},
    room::{Participant, RoomSession},
    session::{ConversationSession, SessionRuntime},
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info};

/// Starts live conversations over a realtime model session.
pub struct RealtimeSessionRuntime;

#[async_trait]
impl SessionRuntime for RealtimeSessionRuntime {
    async fn start(
        &self,
        mut model: ModelSessionHandle,
        room: Arc<dyn RoomSession>,
        participant: Participant,
        chat: ChatContext,
    ) -> Result<Box<dyn ConversationSession>> {
        let commands = model.commands();

        // Seed the conversation before any audio flows; the context is
        // immutable from here on.
        for message in chat.messages() {
            commands
                .send(ModelCommand::CreateItem {
                    role: message.role,
                    text: message.text.clone(),
                })
                .await
                .context("model session ended while seeding the chat context")?;
        }

        let events = model
            .take_events()
            .context("model session events were already consumed")?;
        let room_audio = room
            .subscribe_audio()
            .await
            .context("failed to subscribe to room audio")?;

        // Open by default; closed only for the duration of an
        // uninterruptible scripted turn.
        let input_gate = Arc::new(AtomicBool::new(true));
        let uplink = tokio::spawn(forward_room_audio(
            room_audio,
            commands.clone(),
            input_gate.clone(),
        ));
        let downlink = tokio::spawn(forward_model_events(
            events,
            room.clone(),
            input_gate.clone(),
        ));

        info!(
            room = room.name(),
            identity = %participant.identity,
            "conversation session started"
        );
        Ok(Box::new(LiveConversation {
            commands,
            _model: model,
            input_gate,
            uplink,
            downlink,
        }))
    }
}

/// Caller audio, room rate in, model rate out.
async fn forward_room_audio(
    mut frames: mpsc::Receiver<Bytes>,
    commands: mpsc::Sender<ModelCommand>,
    input_gate: Arc<AtomicBool>,
) {
    let mut resampler = match audio::StreamResampler::new(
        audio::ROOM_SAMPLE_RATE,
        audio::MODEL_SAMPLE_RATE,
    ) {
        Ok(resampler) => resampler,
        Err(e) => {
            error!(error = %e, "failed to create the uplink resampler");
            return;
        }
    };
    while let Some(frame) = frames.recv().await {
        if !input_gate.load(Ordering::SeqCst) {
            continue;
        }
        let samples = audio::pcm16_bytes_to_f32(&frame);
        let resampled = resampler.push(&samples);
        if resampled.is_empty() {
            continue;
        }
        let frame = audio::f32_to_pcm16_bytes(&resampled);
        if commands
            .send(ModelCommand::AppendAudio(frame))
            .await
            .is_err()
        {
            break;
        }
    }
    debug!("room audio uplink ended");
}

/// Model events: speech back into the room, transcripts into the log, and
/// the input gate re-opened when a response finishes.
async fn forward_model_events(
    mut events: mpsc::Receiver<ModelEvent>,
    room: Arc<dyn RoomSession>,
    input_gate: Arc<AtomicBool>,
) {
    let mut resampler = match audio::StreamResampler::new(
        audio::MODEL_SAMPLE_RATE,
        audio::ROOM_SAMPLE_RATE,
    ) {
        Ok(resampler) => resampler,
        Err(e) => {
            error!(error = %e, "failed to create the downlink resampler");
            return;
        }
    };
    while let Some(event) = events.recv().await {
        match event {
            ModelEvent::Audio(frame) => {
                let samples = audio::pcm16_bytes_to_f32(&frame);
                let resampled = resampler.push(&samples);
                if resampled.is_empty() {
                    continue;
                }
                if let Err(e) = room
                    .publish_audio(audio::f32_to_pcm16_bytes(&resampled))
                    .await
                {
                    error!(error = format!("{e:#}"), "failed to publish model audio to the room");
                    break;
                }
            }
            ModelEvent::UserTranscript { text, is_final } => {
                if is_final {
                    info!(%text, "caller transcript");
                }
            }
            ModelEvent::UserSpeechStarted => debug!("caller started speaking"),
            ModelEvent::UserSpeechStopped => debug!("caller stopped speaking"),
            ModelEvent::ResponseDone => {
                input_gate.store(true, Ordering::SeqCst);
            }
            ModelEvent::Error(message) => {
                error!(%message, "realtime model reported an error");
            }
        }
    }
    debug!("model event downlink ended");
}

/// A live conversation; further turns run on the bridge tasks, the
/// orchestrator only speaks through the opening-turn methods.
#[derive(Debug)]
struct LiveConversation {
    commands: mpsc::Sender<ModelCommand>,
    // Keeps the provider's pump task alive for the life of the session.
    _model: ModelSessionHandle,
    input_gate: Arc<AtomicBool>,
    uplink: JoinHandle<()>,
    downlink: JoinHandle<()>,
}

#[async_trait]
impl ConversationSession for LiveConversation {
    async fn send(&mut self, text: &str, allow_interruptions: bool) -> Result<()> {
        if !allow_interruptions {
            // Hold caller audio back until the scripted turn completes; the
            // downlink re-opens the gate on ResponseDone.
            self.input_gate.store(false, Ordering::SeqCst);
        }
        self.commands
            .send(ModelCommand::CreateItem {
                role: ChatRole::System,
                text: text.to_string(),
            })
            .await
            .context("model session ended before the scripted turn")?;
        self.commands
            .send(ModelCommand::CreateResponse)
            .await
            .context("model session ended before the scripted turn")?;
        Ok(())
    }

    async fn generate_reply(&mut self) -> Result<()> {
        self.commands
            .send(ModelCommand::CreateResponse)
            .await
            .context("model session ended before the generated turn")
    }
}

impl Drop for LiveConversation {
    fn drop(&mut self) {
        self.uplink.abort();
        self.downlink.abort();
    }
}
