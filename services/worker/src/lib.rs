//! Govi Worker Library Crate
//!
//! Production side of the Govi voice agent: environment configuration, the
//! room signaling client, the OpenAI realtime model provider, and the
//! conversation runtime that bridges room audio with model audio. The
//! `bin/worker.rs` binary is a thin wrapper that wires these into one
//! `govi_core::job::run_job` call.

pub mod audio;
pub mod config;
pub mod prompts;
pub mod provider;
pub mod room;
pub mod session;
pub mod signal;
pub mod token;
