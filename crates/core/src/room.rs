//! Collaborator interface to the real-time room transport.
//!
//! The worker is a client of an external room service; the core only needs
//! the two operations of the connection protocol (connect with a media
//! subscription mode, wait for a remote participant) plus the audio plumbing
//! the conversation runtime binds to. A `RoomSession` only exists once
//! `connect` has resolved, so `wait_for_participant` can never run first.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Which remote media the connection subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionMode {
    /// Subscribe to remote audio tracks only. The mode this system runs in.
    AudioOnly,
    /// Subscribe to every remote track.
    All,
}

/// A remote party in the room. Read-only reference data; the session never
/// owns the participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub identity: String,
}

/// Establishes connections to rooms on the transport service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomConnector: Send + Sync {
    /// Connects to the named room with the requested subscription mode.
    /// Resolves once the transport confirms membership; a transport failure
    /// surfaces as an error and is not retried at this layer.
    async fn connect(
        &self,
        room_name: &str,
        mode: SubscriptionMode,
    ) -> Result<Arc<dyn RoomSession>>;
}

/// A live, connected room.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomSession: Send + Sync {
    fn name(&self) -> &str;

    /// Suspends until at least one remote participant is present. No timeout
    /// is enforced here; the surrounding job framework owns cancellation.
    async fn wait_for_participant(&self) -> Result<Participant>;

    /// Raw PCM16 frames of subscribed remote audio. May be taken once.
    async fn subscribe_audio(&self) -> Result<mpsc::Receiver<Bytes>>;

    /// Publishes a raw PCM16 frame of agent audio into the room.
    async fn publish_audio(&self, frame: Bytes) -> Result<()>;
}
