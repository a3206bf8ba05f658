//! Govi Core
//!
//! Runtime-agnostic core of the Govi voice agent worker: the data model for
//! a single conversation job, the collaborator traits (room transport,
//! realtime model provider, session runtime), and the staged orchestration
//! that brings all three into a conversing state. Network implementations
//! live in the worker service crate; this crate never reads the environment
//! and owns no sockets.

pub mod agent;
pub mod chat;
pub mod error;
pub mod job;
pub mod model;
pub mod room;
pub mod session;
