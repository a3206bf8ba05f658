//! Collaborator interface to the hosted realtime speech model.

use crate::chat::ChatRole;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::{sync::mpsc, task::JoinHandle};

/// Turn-detection policy handed to the provider: when the model decides the
/// human has finished speaking and a response should begin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnDetection {
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
    /// Whether the model responds on its own once speech stops.
    pub auto_respond: bool,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 200,
            silence_duration_ms: 700,
            auto_respond: true,
        }
    }
}

/// Immutable configuration bundle for one model session attempt.
///
/// A failed attempt's config is discarded; the initializer builds a fresh
/// bundle of identical content for every retry.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSessionConfig {
    pub instructions: String,
    pub voice: String,
    pub temperature: f32,
    pub model: String,
    pub turn_detection: Option<TurnDetection>,
}

/// Commands the conversation runtime sends into a live model session.
#[derive(Debug)]
pub enum ModelCommand {
    /// A frame of caller audio, raw PCM16 mono at the model sample rate.
    AppendAudio(Bytes),
    /// Inserts a conversation item without requesting a response.
    CreateItem { role: ChatRole, text: String },
    /// Asks the model to produce its next response.
    CreateResponse,
    /// Ends the model session.
    Close,
}

/// Events a live model session emits back to the runtime.
#[derive(Debug)]
pub enum ModelEvent {
    /// A frame of model speech, raw PCM16 mono at the model sample rate.
    Audio(Bytes),
    /// Transcription of the caller's speech.
    UserTranscript { text: String, is_final: bool },
    UserSpeechStarted,
    UserSpeechStopped,
    ResponseDone,
    Error(String),
}

/// Opaque handle to a successfully initialized model session.
///
/// Owned exclusively by the session launcher that created it and handed off
/// to the conversation runtime. Dropping the handle aborts the provider's
/// pump task, so a job cancelled mid-setup leaks nothing.
#[derive(Debug)]
pub struct ModelSessionHandle {
    commands: mpsc::Sender<ModelCommand>,
    events: Option<mpsc::Receiver<ModelEvent>>,
    pump: JoinHandle<()>,
}

impl ModelSessionHandle {
    pub fn new(
        commands: mpsc::Sender<ModelCommand>,
        events: mpsc::Receiver<ModelEvent>,
        pump: JoinHandle<()>,
    ) -> Self {
        Self {
            commands,
            events: Some(events),
            pump,
        }
    }

    pub fn commands(&self) -> mpsc::Sender<ModelCommand> {
        self.commands.clone()
    }

    /// Hands out the event stream. Yields `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ModelEvent>> {
        self.events.take()
    }
}

impl Drop for ModelSessionHandle {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Constructs live model sessions. Construction may fail transiently (e.g.
/// upstream provisioning delay); the job's model initializer owns the retry
/// budget, not the provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RealtimeModelProvider: Send + Sync {
    async fn create_session(&self, config: ModelSessionConfig) -> Result<ModelSessionHandle>;
}
