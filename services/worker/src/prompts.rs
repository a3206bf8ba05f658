//! Prompt assets: markdown files loaded once at startup and assembled into
//! the per-job agent definition.

use crate::config::WorkerConfig;
use anyhow::{Context, Result};
use govi_core::{
    agent::{AgentDefinition, OpeningTurn},
    chat::{ChatContext, ChatRole},
    model::TurnDetection,
};
use std::{collections::HashMap, fs, path::Path};

/// The scripted greeting spoken when the opening turn is not
/// model-generated.
pub const GREETING: &str = "Hola, ¿en qué puedo ayudarte hoy?";

const INSTRUCTIONS_PROMPT: &str = "instructions";
const SEED_CONTEXT_PROMPT: &str = "seed_context";

/// Loads every `.md` file in the prompts directory, keyed by file stem.
pub fn load_prompts(prompts_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in fs::read_dir(prompts_path)
        .with_context(|| format!("failed to read prompts directory {}", prompts_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

/// Assembles the Govi agent blueprint from prompt assets and validated
/// configuration. The seed context frames the conversation; the
/// instructions define the agent.
pub fn govi_definition(
    prompts: &HashMap<String, String>,
    config: &WorkerConfig,
    opening_turn: OpeningTurn,
) -> Result<AgentDefinition> {
    let instructions = prompts
        .get(INSTRUCTIONS_PROMPT)
        .with_context(|| format!("{INSTRUCTIONS_PROMPT}.md not found in prompts directory"))?
        .clone();

    let mut seed_context = ChatContext::new();
    if let Some(framing) = prompts.get(SEED_CONTEXT_PROMPT) {
        seed_context.append(ChatRole::Assistant, framing.trim());
    }

    Ok(AgentDefinition {
        instructions,
        voice: config.voice.clone(),
        temperature: config.temperature,
        model: config.realtime_model.clone(),
        turn_detection: Some(TurnDetection::default()),
        seed_context,
        opening_turn,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tracing::Level;

    fn test_config() -> WorkerConfig {
        WorkerConfig {
            room_server_url: "wss://localhost:7880/rtc".to_string(),
            room_api_key: "key".to_string(),
            room_api_secret: "secret".to_string(),
            openai_api_key: "openai-key".to_string(),
            realtime_model: "gpt-4o-realtime-preview".to_string(),
            voice: "echo".to_string(),
            temperature: 0.6,
            log_level: Level::INFO,
            prompts_path: PathBuf::from("./prompts"),
        }
    }

    #[test]
    fn load_prompts_reads_markdown_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("instructions.md"), "Eres Govi.").unwrap();
        fs::write(dir.path().join("seed_context.md"), "framing").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let prompts = load_prompts(dir.path()).unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts.get("instructions").unwrap(), "Eres Govi.");
        assert!(!prompts.contains_key("notes"));
    }

    #[test]
    fn load_prompts_fails_for_a_missing_directory() {
        let result = load_prompts(Path::new("/definitely/not/a/real/prompts/dir"));
        assert!(result.is_err());
    }

    #[test]
    fn definition_is_assembled_from_prompts_and_config() {
        let mut prompts = HashMap::new();
        prompts.insert("instructions".to_string(), "Eres Govi.".to_string());
        prompts.insert("seed_context".to_string(), "framing\n".to_string());

        let definition = govi_definition(
            &prompts,
            &test_config(),
            OpeningTurn::Scripted {
                text: GREETING.to_string(),
                allow_interruptions: true,
            },
        )
        .unwrap();

        assert_eq!(definition.instructions, "Eres Govi.");
        assert_eq!(definition.voice, "echo");
        assert_eq!(definition.temperature, 0.6);
        assert_eq!(definition.model, "gpt-4o-realtime-preview");
        assert_eq!(definition.seed_context.messages().len(), 1);
        assert_eq!(definition.seed_context.messages()[0].text, "framing");
        assert!(definition.validate().is_ok());
    }

    #[test]
    fn missing_instructions_prompt_is_an_error() {
        let prompts = HashMap::new();
        let result = govi_definition(&prompts, &test_config(), OpeningTurn::GeneratedReply);
        assert!(result.is_err());
    }

    #[test]
    fn missing_seed_context_yields_an_empty_context() {
        let mut prompts = HashMap::new();
        prompts.insert("instructions".to_string(), "Eres Govi.".to_string());

        let definition =
            govi_definition(&prompts, &test_config(), OpeningTurn::GeneratedReply).unwrap();
        assert!(definition.seed_context.is_empty());
    }
}
