use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// Validation happens here, once, before any network activity; the core
/// crate only ever sees the validated values.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub room_server_url: String,
    pub room_api_key: String,
    pub room_api_secret: String,
    pub openai_api_key: String,
    pub realtime_model: String,
    pub voice: String,
    pub temperature: f32,
    pub log_level: Level,
    pub prompts_path: PathBuf,
}

/// A required credential: present and non-empty, or the load fails naming
/// the variable. Checked in a fixed order so the first missing one is the
/// one reported.
fn require(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name.to_string())),
    }
}

impl WorkerConfig {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env files in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::from_filename(".env.local").ok();
            dotenvy::dotenv().ok();
        }

        let openai_api_key = require("OPENAI_API_KEY")?;
        let room_api_key = require("ROOM_API_KEY")?;
        let room_api_secret = require("ROOM_API_SECRET")?;

        let room_server_url = std::env::var("ROOM_SERVER_URL")
            .unwrap_or_else(|_| "wss://rooms.govlab.example/rtc".to_string());

        let realtime_model = std::env::var("REALTIME_MODEL")
            .unwrap_or_else(|_| "gpt-4o-realtime-preview".to_string());

        let voice = std::env::var("REALTIME_VOICE").unwrap_or_else(|_| "echo".to_string());

        let temperature_str = std::env::var("TEMPERATURE").unwrap_or_else(|_| "0.6".to_string());
        let temperature = temperature_str
            .parse::<f32>()
            .map_err(|e| ConfigError::InvalidValue("TEMPERATURE".to_string(), e.to_string()))?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue(
                "TEMPERATURE".to_string(),
                format!("{} is outside the supported range [0, 2]", temperature),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        Ok(Self {
            room_server_url,
            room_api_key,
            room_api_secret,
            openai_api_key,
            realtime_model,
            voice,
            temperature,
            log_level,
            prompts_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    const REQUIRED_VARS: [&str; 3] = ["OPENAI_API_KEY", "ROOM_API_KEY", "ROOM_API_SECRET"];

    fn clear_env_vars() {
        unsafe {
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("ROOM_API_KEY");
            env::remove_var("ROOM_API_SECRET");
            env::remove_var("ROOM_SERVER_URL");
            env::remove_var("REALTIME_MODEL");
            env::remove_var("REALTIME_VOICE");
            env::remove_var("TEMPERATURE");
            env::remove_var("RUST_LOG");
            env::remove_var("PROMPTS_PATH");
        }
    }

    fn set_minimal_env() {
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-openai-key");
            env::set_var("ROOM_API_KEY", "test-room-key");
            env::set_var("ROOM_API_SECRET", "test-room-secret");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        set_minimal_env();

        let config = WorkerConfig::from_env().expect("Config should load successfully");

        assert_eq!(config.openai_api_key, "test-openai-key");
        assert_eq!(config.room_api_key, "test-room-key");
        assert_eq!(config.room_api_secret, "test-room-secret");
        assert_eq!(config.room_server_url, "wss://rooms.govlab.example/rtc");
        assert_eq!(config.realtime_model, "gpt-4o-realtime-preview");
        assert_eq!(config.voice, "echo");
        assert_eq!(config.temperature, 0.6);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, PathBuf::from("./prompts"));
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("ROOM_SERVER_URL", "wss://localhost:7880/rtc");
            env::set_var("REALTIME_MODEL", "gpt-4o-realtime-preview-2024-10-01");
            env::set_var("REALTIME_VOICE", "alloy");
            env::set_var("TEMPERATURE", "1.2");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
        }

        let config = WorkerConfig::from_env().expect("Config should load successfully");

        assert_eq!(config.room_server_url, "wss://localhost:7880/rtc");
        assert_eq!(config.realtime_model, "gpt-4o-realtime-preview-2024-10-01");
        assert_eq!(config.voice, "alloy");
        assert_eq!(config.temperature, 1.2);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.prompts_path, PathBuf::from("/custom/prompts"));
    }

    #[test]
    #[serial]
    fn test_each_missing_required_var_is_reported() {
        for missing in REQUIRED_VARS {
            clear_env_vars();
            set_minimal_env();
            unsafe {
                env::remove_var(missing);
            }

            let err = WorkerConfig::from_env().unwrap_err();
            match err {
                ConfigError::MissingVar(name) => assert_eq!(name, missing),
                other => panic!("Expected MissingVar for {}, got {:?}", missing, other),
            }
        }
    }

    #[test]
    #[serial]
    fn test_empty_required_var_counts_as_missing() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("ROOM_API_SECRET", "   ");
        }

        let err = WorkerConfig::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(name) => assert_eq!(name, "ROOM_API_SECRET"),
            other => panic!("Expected MissingVar, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_first_missing_var_wins() {
        clear_env_vars();

        let err = WorkerConfig::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(name) => assert_eq!(name, "OPENAI_API_KEY"),
            other => panic!("Expected MissingVar, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_temperature() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("TEMPERATURE", "2.5");
        }

        let err = WorkerConfig::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "TEMPERATURE"),
            _ => panic!("Expected InvalidValue for TEMPERATURE"),
        }

        unsafe {
            env::set_var("TEMPERATURE", "not-a-number");
        }
        let err = WorkerConfig::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "TEMPERATURE"),
            _ => panic!("Expected InvalidValue for TEMPERATURE"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        set_minimal_env();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = WorkerConfig::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }
}
