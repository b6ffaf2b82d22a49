use secrecy::SecretString;

use crate::config::helpers::{normalize_variant, optional_env};
use crate::error::ConfigError;
use crate::settings::Settings;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Chat completions backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAi,
    OpenAiCompatible,
}

impl LlmBackend {
    fn parse(value: &str, key: &str) -> Result<Self, ConfigError> {
        match normalize_variant(value).as_str() {
            "openai" => Ok(Self::OpenAi),
            "openai_compatible" | "openai_compat" | "openaicompat" => Ok(Self::OpenAiCompatible),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected 'openai' or 'openai_compatible', got '{value}'"),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenAiCompatible => "openai_compatible",
        }
    }
}

impl std::fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved language model settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub temperature: Option<f32>,
}

impl LlmConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let backend = match optional_env("LLM_BACKEND")?.or_else(|| settings.llm_backend.clone()) {
            Some(raw) => LlmBackend::parse(&raw, "LLM_BACKEND")?,
            None => LlmBackend::OpenAi,
        };

        let base_url = match optional_env("LLM_BASE_URL")?.or_else(|| settings.llm_base_url.clone())
        {
            Some(url) => url,
            None if backend == LlmBackend::OpenAi => OPENAI_BASE_URL.to_string(),
            None => {
                return Err(ConfigError::MissingRequired {
                    key: "LLM_BASE_URL".to_string(),
                    hint: "Set LLM_BASE_URL when LLM_BACKEND=openai_compatible".to_string(),
                });
            }
        };
        url::Url::parse(&base_url).map_err(|e| ConfigError::InvalidValue {
            key: "LLM_BASE_URL".to_string(),
            message: e.to_string(),
        })?;

        let api_key = match backend {
            LlmBackend::OpenAi => optional_env("OPENAI_API_KEY")?,
            LlmBackend::OpenAiCompatible => match optional_env("LLM_API_KEY")? {
                Some(key) => Some(key),
                None => optional_env("OPENAI_API_KEY")?,
            },
        }
        .map(SecretString::from);

        let model = optional_env("LLM_MODEL")?
            .or_else(|| settings.selected_model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = optional_env("LLM_TEMPERATURE")?
            .map(|s| s.parse::<f32>())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "LLM_TEMPERATURE".to_string(),
                message: format!("must be a number: {e}"),
            })?
            .or(settings.llm_temperature);
        if let Some(t) = temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ConfigError::InvalidValue {
                key: "LLM_TEMPERATURE".to_string(),
                message: format!("must be between 0 and 2, got {t}"),
            });
        }

        Ok(Self {
            backend,
            base_url,
            api_key,
            model,
            temperature,
        })
    }

    /// Whether requests will carry a bearer token.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}
