//! Job orchestration: the staged pipeline that brings a room connection, a
//! participant and a realtime model session into a consistent, conversing
//! state.
//!
//! Control flows strictly top to bottom. Each stage is a suspension point;
//! the only transition that revisits an earlier state is the bounded retry
//! loop inside model initialization. The first failure aborts the job and
//! maps to one variant of [`JobError`].

use crate::{
    agent::{AgentDefinition, OpeningTurn},
    error::JobError,
    model::{ModelSessionHandle, RealtimeModelProvider},
    room::{Participant, RoomConnector, RoomSession, SubscriptionMode},
    session::{ConversationSession, SessionRuntime},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Total model construction attempts per job.
pub const MAX_MODEL_INIT_ATTEMPTS: u32 = 3;
/// Fixed pause between model construction attempts. No exponential growth,
/// no jitter; the wait is a cancellable suspension, not a busy-wait.
pub const MODEL_INIT_BACKOFF: Duration = Duration::from_secs(1);

/// Observable lifecycle of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStage {
    Idle,
    Validating,
    Connecting,
    AwaitingParticipant,
    InitializingModel { attempt: u32 },
    LaunchingSession,
    Conversing,
    Failed,
}

/// One assignment to handle one room. Owned exclusively by the entrypoint
/// for the duration of the job; a new job never reuses a prior job's
/// handles.
#[derive(Debug)]
pub struct JobContext {
    job_id: Uuid,
    room_name: String,
    stage: JobStage,
}

impl JobContext {
    pub fn new(room_name: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            room_name: room_name.into(),
            stage: JobStage::Idle,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn stage(&self) -> &JobStage {
        &self.stage
    }

    fn advance(&mut self, next: JobStage) {
        debug!(job_id = %self.job_id, from = ?self.stage, to = ?next, "job stage transition");
        self.stage = next;
    }
}

/// Runs one job to the conversing state.
///
/// On success the context ends in [`JobStage::Conversing`] and the live
/// session is returned to the caller, which owns it until the room closes
/// or the job is cancelled. On failure the context ends in
/// [`JobStage::Failed`] and the error is propagated after logging.
pub async fn run_job(
    ctx: &mut JobContext,
    definition: &AgentDefinition,
    connector: &dyn RoomConnector,
    provider: &dyn RealtimeModelProvider,
    runtime: &dyn SessionRuntime,
) -> Result<Box<dyn ConversationSession>, JobError> {
    match drive(ctx, definition, connector, provider, runtime).await {
        Ok(session) => {
            ctx.advance(JobStage::Conversing);
            info!(job_id = %ctx.job_id, room = %ctx.room_name, "agent session started successfully");
            Ok(session)
        }
        Err(err) => {
            let failed_stage = ctx.stage.clone();
            ctx.advance(JobStage::Failed);
            error!(
                job_id = %ctx.job_id,
                room = %ctx.room_name,
                stage = ?failed_stage,
                error = %err,
                "job failed"
            );
            Err(err)
        }
    }
}

async fn drive(
    ctx: &mut JobContext,
    definition: &AgentDefinition,
    connector: &dyn RoomConnector,
    provider: &dyn RealtimeModelProvider,
    runtime: &dyn SessionRuntime,
) -> Result<Box<dyn ConversationSession>, JobError> {
    ctx.advance(JobStage::Validating);
    definition.validate().map_err(JobError::Configuration)?;

    ctx.advance(JobStage::Connecting);
    info!(job_id = %ctx.job_id, room = %ctx.room_name, "connecting to room");
    let room = connector
        .connect(&ctx.room_name, SubscriptionMode::AudioOnly)
        .await
        .map_err(JobError::Connection)?;

    ctx.advance(JobStage::AwaitingParticipant);
    info!(job_id = %ctx.job_id, "waiting for participant");
    let participant = room
        .wait_for_participant()
        .await
        .map_err(JobError::Connection)?;
    info!(job_id = %ctx.job_id, identity = %participant.identity, "participant joined");

    let handle = initialize_model(ctx, definition, provider).await?;

    ctx.advance(JobStage::LaunchingSession);
    launch_session(ctx, definition, runtime, handle, room, participant).await
}

/// Constructs the model session with bounded retry: up to
/// [`MAX_MODEL_INIT_ATTEMPTS`] attempts separated by a fixed backoff. Every
/// attempt builds a fresh config of identical content; a failed attempt is
/// discarded, never reused. Failures are not classified — each one is
/// assumed transient until the budget runs out.
async fn initialize_model(
    ctx: &mut JobContext,
    definition: &AgentDefinition,
    provider: &dyn RealtimeModelProvider,
) -> Result<ModelSessionHandle, JobError> {
    for attempt in 1..=MAX_MODEL_INIT_ATTEMPTS {
        ctx.advance(JobStage::InitializingModel { attempt });
        let config = definition.session_config();
        match provider.create_session(config).await {
            Ok(handle) => {
                info!(job_id = %ctx.job_id, attempt, "realtime model initialized successfully");
                return Ok(handle);
            }
            Err(source) if attempt == MAX_MODEL_INIT_ATTEMPTS => {
                return Err(JobError::ModelInitialization {
                    attempts: attempt,
                    source,
                });
            }
            Err(cause) => {
                warn!(
                    job_id = %ctx.job_id,
                    attempt,
                    error = format!("{cause:#}"),
                    "model initialization attempt failed"
                );
                tokio::time::sleep(MODEL_INIT_BACKOFF).await;
            }
        }
    }
    unreachable!("the attempt loop always returns")
}

/// Starts the session and produces exactly one opening turn per the
/// configured policy. A start failure is fatal; there is no retry here.
async fn launch_session(
    ctx: &mut JobContext,
    definition: &AgentDefinition,
    runtime: &dyn SessionRuntime,
    handle: ModelSessionHandle,
    room: Arc<dyn RoomSession>,
    participant: Participant,
) -> Result<Box<dyn ConversationSession>, JobError> {
    let mut session = runtime
        .start(handle, room, participant, definition.seed_context.clone())
        .await
        .map_err(JobError::SessionStart)?;

    match &definition.opening_turn {
        OpeningTurn::Scripted {
            text,
            allow_interruptions,
        } => {
            session
                .send(text, *allow_interruptions)
                .await
                .map_err(JobError::SessionStart)?;
        }
        OpeningTurn::GeneratedReply => {
            session.generate_reply().await.map_err(JobError::SessionStart)?;
        }
    }
    Ok(session)
}
