use std::time::Duration;

use secrecy::SecretString;

use crate::character::Character;
use crate::config::helpers::{optional_env, positive};
use crate::error::ConfigError;
use crate::settings::Settings;

pub const XTREAMLY_API_KEY: &str = "XTREAMLY_API_KEY";
const DEFAULT_BASE_URL: &str = "https://api.xtreamly.io";

/// Where the Xtreamly credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Character,
    Env,
    Settings,
}

impl CredentialSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Env => "env",
            Self::Settings => "settings",
        }
    }
}

/// Resolved volatility service settings.
#[derive(Debug, Clone)]
pub struct XtreamlyConfig {
    pub api_key: Option<SecretString>,
    pub credential_source: Option<CredentialSource>,
    pub api_base_url: String,
    pub timeout: Duration,
}

impl XtreamlyConfig {
    /// Priority for the key: character secret > env > settings.
    pub(crate) fn resolve(settings: &Settings, character: &Character) -> Result<Self, ConfigError> {
        let (api_key, credential_source) = if let Some(secret) = character.secret(XTREAMLY_API_KEY)
        {
            (Some(secret.to_string()), Some(CredentialSource::Character))
        } else if let Some(env) = optional_env(XTREAMLY_API_KEY)? {
            (Some(env), Some(CredentialSource::Env))
        } else {
            match settings
                .xtreamly
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
            {
                Some(key) => (Some(key.to_string()), Some(CredentialSource::Settings)),
                None => (None, None),
            }
        };

        let api_base_url = optional_env("XTREAMLY_API_BASE_URL")?
            .or_else(|| settings.xtreamly.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&api_base_url).map_err(|e| ConfigError::InvalidValue {
            key: "XTREAMLY_API_BASE_URL".to_string(),
            message: e.to_string(),
        })?;

        let timeout_ms = positive(
            "XTREAMLY_TIMEOUT_MS",
            optional_env("XTREAMLY_TIMEOUT_MS")?,
            settings.xtreamly.timeout_ms,
        )?;

        Ok(Self {
            api_key: api_key.map(SecretString::from),
            credential_source,
            api_base_url,
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn api_key_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
