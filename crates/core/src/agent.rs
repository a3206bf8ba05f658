//! The per-job agent blueprint: who the agent is, how it sounds, and how it
//! opens the conversation.

use crate::{
    chat::ChatContext,
    model::{ModelSessionConfig, TurnDetection},
};

/// How the agent produces its first conversational turn. Exactly one
/// variant executes per job, selected by configuration rather than by
/// divergent entrypoints.
#[derive(Debug, Clone, PartialEq)]
pub enum OpeningTurn {
    /// Speak a literal scripted greeting.
    Scripted {
        text: String,
        allow_interruptions: bool,
    },
    /// Let the model compose its own greeting from the seed context.
    GeneratedReply,
}

/// Immutable description of the agent for one job. Constructed once at
/// bootstrap from validated configuration; the job never mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDefinition {
    pub instructions: String,
    pub voice: String,
    pub temperature: f32,
    pub model: String,
    pub turn_detection: Option<TurnDetection>,
    pub seed_context: ChatContext,
    pub opening_turn: OpeningTurn,
}

impl AgentDefinition {
    /// Checks the definition before any network activity.
    pub fn validate(&self) -> Result<(), String> {
        if self.instructions.trim().is_empty() {
            return Err("agent instructions must not be empty".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("model identifier must not be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature {} is outside the supported range [0, 2]",
                self.temperature
            ));
        }
        Ok(())
    }

    /// Builds a fresh session config. Called once per initialization
    /// attempt; every call yields identical content, so a retry never
    /// observes state from a prior failed attempt.
    pub fn session_config(&self) -> ModelSessionConfig {
        ModelSessionConfig {
            instructions: self.instructions.clone(),
            voice: self.voice.clone(),
            temperature: self.temperature,
            model: self.model.clone(),
            turn_detection: self.turn_detection,
        }
    }
}
