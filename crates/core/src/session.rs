//! Collaborator interface to the agent session runtime: the component that
//! binds a model handle, a room and a participant into a live conversation.

use crate::{
    chat::ChatContext,
    model::ModelSessionHandle,
    room::{Participant, RoomSession},
};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Starts conversation sessions. A start failure is treated as
/// non-transient; the job fails without retry at this layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRuntime: Send + Sync {
    /// Binds audio I/O between the model and the room/participant and
    /// begins the live conversation loop. The seed context is immutable
    /// from this point on.
    async fn start(
        &self,
        model: ModelSessionHandle,
        room: Arc<dyn RoomSession>,
        participant: Participant,
        chat: ChatContext,
    ) -> Result<Box<dyn ConversationSession>>;
}

/// A live conversation. Further turns are handled entirely by the runtime;
/// the orchestrator only produces the opening turn through one of the two
/// methods below.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationSession: Send + Sync + std::fmt::Debug {
    /// Speaks a literal scripted utterance.
    async fn send(&mut self, text: &str, allow_interruptions: bool) -> Result<()>;

    /// Lets the model compose its own opening reply from the seed context.
    async fn generate_reply(&mut self) -> Result<()>;
}
