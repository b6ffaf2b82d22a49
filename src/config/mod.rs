//! Configuration for Looper.
//!
//! Settings are loaded with priority: env var > config.toml > default.
//! The Xtreamly key may also come from the character file, which wins over
//! both. `./.env` and `~/.looper/.env` are loaded via dotenvy early in
//! startup and never overwrite variables already set.

pub(crate) mod helpers;
mod llm;
mod pipeline;
mod xtreamly;

use std::path::{Path, PathBuf};

use crate::character::Character;
use crate::error::ConfigError;
use crate::settings::Settings;

pub use self::llm::{LlmBackend, LlmConfig};
pub use self::pipeline::PipelineConfig;
pub use self::xtreamly::{CredentialSource, XTREAMLY_API_KEY, XtreamlyConfig};

/// Main configuration for the interpreter.
#[derive(Debug, Clone)]
pub struct Config {
    pub character: Character,
    pub llm: LlmConfig,
    pub xtreamly: XtreamlyConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load `.env` files, the TOML overlay and the character, then resolve.
    ///
    /// An explicit `toml_path` or `character_path` that can't be read is
    /// fatal. The default TOML path is optional.
    pub fn load(
        toml_path: Option<&Path>,
        character_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        crate::bootstrap::load_looper_env();

        let mut settings = Settings::default();
        Self::apply_toml_overlay(&mut settings, toml_path)?;

        let character_path = character_path
            .map(Path::to_path_buf)
            .or_else(|| settings.character_path.as_ref().map(PathBuf::from));
        let character = match character_path {
            Some(path) => Character::load_from(&path).map_err(|e| {
                ConfigError::ParseError(format!(
                    "Failed to load character {}: {}",
                    path.display(),
                    e
                ))
            })?,
            None => Character::default(),
        };

        Self::build(&settings, character)
    }

    /// Resolve from already-loaded settings and character.
    pub fn build(settings: &Settings, character: Character) -> Result<Self, ConfigError> {
        Ok(Self {
            llm: LlmConfig::resolve(settings)?,
            xtreamly: XtreamlyConfig::resolve(settings, &character)?,
            pipeline: PipelineConfig::resolve(settings)?,
            character,
        })
    }

    /// Load and merge a TOML config file into settings.
    ///
    /// If `explicit_path` is `Some`, loads from that path (errors are fatal).
    /// If `None`, tries `~/.looper/config.toml` (missing file is ignored).
    fn apply_toml_overlay(
        settings: &mut Settings,
        explicit_path: Option<&Path>,
    ) -> Result<(), ConfigError> {
        let path = explicit_path
            .map(PathBuf::from)
            .unwrap_or_else(Settings::default_toml_path);

        match Settings::load_toml(&path) {
            Ok(Some(toml_settings)) => {
                settings.merge_from(&toml_settings);
                tracing::debug!("Loaded TOML config from {}", path.display());
            }
            Ok(None) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
            }
            Err(e) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Failed to load config file {}: {}",
                        path.display(),
                        e
                    )));
                }
                tracing::warn!("Failed to load default config file: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use secrecy::ExposeSecret;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const KEYS: &[&str] = &[
        "LLM_BACKEND",
        "LLM_BASE_URL",
        "LLM_API_KEY",
        "OPENAI_API_KEY",
        "LLM_MODEL",
        "LLM_TEMPERATURE",
        "XTREAMLY_API_KEY",
        "XTREAMLY_API_BASE_URL",
        "XTREAMLY_TIMEOUT_MS",
        "LOOPER_COMPOSE_TIMEOUT_MS",
        "LOOPER_EXTRACT_TIMEOUT_MS",
        "LOOPER_DISPATCH_TIMEOUT_MS",
        "LOOPER_RECENT_MESSAGE_LIMIT",
    ];

    fn clear_env() {
        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            for key in KEYS {
                std::env::remove_var(key);
            }
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            std::env::set_var(key, value);
        }
    }

    fn character_with_key(key: &str) -> Character {
        let mut character = Character::default();
        character
            .settings
            .secrets
            .insert(XTREAMLY_API_KEY.to_string(), key.to_string());
        character
    }

    #[test]
    fn resolvers_use_defaults() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();

        let config = Config::build(&Settings::default(), Character::default()).unwrap();

        assert_eq!(config.llm.backend, LlmBackend::OpenAi);
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.llm.model, "gpt-4o");
        assert!(!config.llm.has_api_key());
        assert_eq!(config.xtreamly.api_base_url, "https://api.xtreamly.io");
        assert_eq!(config.xtreamly.timeout, Duration::from_secs(10));
        assert!(!config.xtreamly.api_key_configured());
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn character_secret_overrides_env_and_settings() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        set_env("XTREAMLY_API_KEY", "from-env");

        let mut settings = Settings::default();
        settings.xtreamly.api_key = Some("from-settings".to_string());

        let config = Config::build(&settings, character_with_key("from-character")).unwrap();
        let key = config.xtreamly.api_key.as_ref().unwrap();
        assert_eq!(key.expose_secret(), "from-character");
        assert_eq!(
            config.xtreamly.credential_source,
            Some(CredentialSource::Character)
        );

        let config = Config::build(&settings, character_with_key("  ")).unwrap();
        assert_eq!(
            config.xtreamly.api_key.as_ref().unwrap().expose_secret(),
            "from-env"
        );

        clear_env();
        let config = Config::build(&settings, Character::default()).unwrap();
        assert_eq!(
            config.xtreamly.credential_source,
            Some(CredentialSource::Settings)
        );
    }

    #[test]
    fn env_overrides_settings() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        set_env("LLM_BACKEND", "openai-compatible");
        set_env("LLM_BASE_URL", "http://localhost:11434/v1");
        set_env("LLM_API_KEY", "local");
        set_env("LOOPER_EXTRACT_TIMEOUT_MS", "1200");

        let mut settings = Settings::default();
        settings.selected_model = Some("llama3".to_string());
        settings.pipeline.extract_timeout_ms = 99_000;

        let config = Config::build(&settings, Character::default()).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::OpenAiCompatible);
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(
            config.llm.api_key.as_ref().unwrap().expose_secret(),
            "local"
        );
        assert_eq!(config.pipeline.extract_timeout, Duration::from_millis(1200));

        clear_env();
    }

    #[test]
    fn rejects_invalid_values() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");

        for (key, value) in [
            ("LOOPER_DISPATCH_TIMEOUT_MS", "0"),
            ("XTREAMLY_TIMEOUT_MS", "soon"),
            ("LLM_BACKEND", "anthropic"),
            ("LLM_TEMPERATURE", "3.5"),
            ("XTREAMLY_API_BASE_URL", "not a url"),
        ] {
            clear_env();
            set_env(key, value);

            match Config::build(&Settings::default(), Character::default()).unwrap_err() {
                ConfigError::InvalidValue { key: got, .. } => assert_eq!(got, key),
                other => panic!("unexpected error for {key}: {other}"),
            }
        }

        clear_env();
    }

    #[test]
    fn compatible_backend_requires_base_url() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        set_env("LLM_BACKEND", "openai_compatible");

        let err = Config::build(&Settings::default(), Character::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));

        clear_env();
    }

    #[test]
    fn explicit_missing_toml_is_fatal() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        let dir = tempfile::tempdir().unwrap();

        let err = Config::load(Some(&dir.path().join("missing.toml")), None).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn loads_toml_and_character_paths() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_env();
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("config.toml");
        std::fs::write(&toml_path, "[pipeline]\nrecent_message_limit = 4\n").unwrap();
        let character_path = dir.path().join("character.json");
        std::fs::write(
            &character_path,
            r#"{"name": "Looper", "settings": {"secrets": {"XTREAMLY_API_KEY": "xk"}}}"#,
        )
        .unwrap();

        let config = Config::load(Some(&toml_path), Some(&character_path)).unwrap();
        assert_eq!(config.pipeline.recent_message_limit, 4);
        assert_eq!(config.character.name, "Looper");
        assert!(config.xtreamly.api_key_configured());

        clear_env();
    }
}
