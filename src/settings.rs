//! User settings persistence.
//!
//! Stores user preferences in ~/.looper/config.toml.
//! Settings are loaded with env var > config.toml > default priority.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Supported LLM backends for settings/config wiring.
pub const SUPPORTED_LLM_BACKENDS: [&str; 2] = ["openai", "openai_compatible"];

/// Normalize backend aliases to canonical values used across config/runtime.
pub fn normalize_llm_backend(value: &str) -> Option<String> {
    let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");

    match normalized.as_str() {
        "openai" => Some("openai".to_string()),
        "openai_compatible" | "openaicompat" | "openai_compat" => {
            Some("openai_compatible".to_string())
        }
        _ => None,
    }
}

/// User settings persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// LLM backend: "openai" or "openai_compatible".
    #[serde(default, alias = "provider", alias = "llm_provider")]
    pub llm_backend: Option<String>,

    /// Chat completions base URL (required for "openai_compatible").
    #[serde(default)]
    pub llm_base_url: Option<String>,

    /// Model used for extraction and action selection.
    #[serde(default)]
    pub selected_model: Option<String>,

    /// Sampling temperature for extraction.
    #[serde(default)]
    pub llm_temperature: Option<f32>,

    /// Path to a character JSON file.
    #[serde(default)]
    pub character_path: Option<String>,

    #[serde(default)]
    pub xtreamly: XtreamlySettings,

    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Volatility service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct XtreamlySettings {
    /// API key. Prefer the env var or the character secret.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub api_base_url: Option<String>,

    #[serde(default = "default_xtreamly_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_xtreamly_timeout_ms() -> u64 {
    10_000
}

impl Default for XtreamlySettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: None,
            timeout_ms: default_xtreamly_timeout_ms(),
        }
    }
}

/// Command pipeline bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSettings {
    #[serde(default = "default_compose_timeout_ms")]
    pub compose_timeout_ms: u64,

    #[serde(default = "default_extract_timeout_ms")]
    pub extract_timeout_ms: u64,

    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,

    /// Messages kept per room and rendered into prompts.
    #[serde(default = "default_recent_message_limit")]
    pub recent_message_limit: usize,
}

fn default_compose_timeout_ms() -> u64 {
    5_000
}

fn default_extract_timeout_ms() -> u64 {
    30_000
}

fn default_dispatch_timeout_ms() -> u64 {
    15_000
}

fn default_recent_message_limit() -> usize {
    32
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            compose_timeout_ms: default_compose_timeout_ms(),
            extract_timeout_ms: default_extract_timeout_ms(),
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            recent_message_limit: default_recent_message_limit(),
        }
    }
}

impl Settings {
    /// Base directory for user files (~/.looper).
    pub fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".looper")
    }

    /// Default TOML config file path (~/.looper/config.toml).
    pub fn default_toml_path() -> PathBuf {
        Self::base_dir().join("config.toml")
    }

    /// Load settings from a TOML file.
    ///
    /// Returns `None` if the file doesn't exist. Returns an error only
    /// if the file exists but can't be parsed.
    pub fn load_toml(path: &std::path::Path) -> Result<Option<Self>, String> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("failed to read {}: {}", path.display(), e)),
        };

        let mut settings: Self = toml::from_str(&data)
            .map_err(|e| format!("invalid TOML in {}: {}", path.display(), e))?;
        settings.sanitize_llm_backend();
        Ok(Some(settings))
    }

    /// Write a commented TOML config file with current settings.
    pub fn save_toml(&self, path: &std::path::Path) -> Result<(), String> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize settings: {}", e))?;

        let content = format!(
            "# Looper configuration file.\n\
             #\n\
             # Priority: env var > this file > defaults.\n\
             # XTREAMLY_API_KEY set in the character file wins over both.\n\
             \n\
             {raw}"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
        }

        std::fs::write(path, content)
            .map_err(|e| format!("failed to write {}: {}", path.display(), e))
    }

    /// Merge values from `other` into `self`, preferring `other` for
    /// fields that differ from the default.
    pub fn merge_from(&mut self, other: &Self) {
        let default_json = match serde_json::to_value(Self::default()) {
            Ok(v) => v,
            Err(_) => return,
        };
        let other_json = match serde_json::to_value(other) {
            Ok(v) => v,
            Err(_) => return,
        };
        let mut self_json = match serde_json::to_value(&*self) {
            Ok(v) => v,
            Err(_) => return,
        };

        merge_non_default(&mut self_json, &other_json, &default_json);

        if let Ok(merged) = serde_json::from_value(self_json) {
            *self = merged;
            self.sanitize_llm_backend();
        }
    }

    fn sanitize_llm_backend(&mut self) {
        if let Some(raw) = self.llm_backend.take() {
            match normalize_llm_backend(&raw) {
                Some(normalized) => self.llm_backend = Some(normalized),
                None => tracing::warn!(
                    backend = %raw,
                    supported = ?SUPPORTED_LLM_BACKENDS,
                    "Ignoring unsupported llm_backend in settings"
                ),
            }
        }
    }
}

fn merge_non_default(
    target: &mut serde_json::Value,
    overlay: &serde_json::Value,
    defaults: &serde_json::Value,
) {
    let (Some(target), Some(overlay)) = (target.as_object_mut(), overlay.as_object()) else {
        return;
    };

    for (key, value) in overlay {
        let default = defaults.get(key).unwrap_or(&serde_json::Value::Null);
        match target.get_mut(key) {
            Some(existing) if value.is_object() && existing.is_object() => {
                merge_non_default(existing, value, default);
            }
            _ if value != default => {
                target.insert(key.clone(), value.clone());
            }
            _ => {}
        }
    }
}
