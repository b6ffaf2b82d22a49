//! Agent persona loaded from a character file.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CHARACTER_NAME: &str = "XtreamlyLooper";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub name: String,
    #[serde(default = "default_model_provider")]
    pub model_provider: String,
    #[serde(default)]
    pub settings: CharacterSettings,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub bio: Vec<String>,
    #[serde(default)]
    pub lore: Vec<String>,
    #[serde(default)]
    pub message_examples: Vec<Vec<ExampleMessage>>,
    #[serde(default)]
    pub adjectives: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterSettings {
    #[serde(default)]
    pub secrets: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleMessage {
    pub user: String,
    pub content: ExampleContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleContent {
    pub text: String,
}

fn default_model_provider() -> String {
    "openai".to_string()
}

impl Default for Character {
    fn default() -> Self {
        Self {
            name: DEFAULT_CHARACTER_NAME.to_string(),
            model_provider: default_model_provider(),
            settings: CharacterSettings {
                secrets: HashMap::from([(
                    crate::config::XTREAMLY_API_KEY.to_string(),
                    String::new(),
                )]),
            },
            system: None,
            bio: Vec::new(),
            lore: Vec::new(),
            message_examples: Vec::new(),
            adjectives: Vec::new(),
            topics: Vec::new(),
        }
    }
}

impl Character {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| {
            ConfigError::ParseError(format!("invalid character file {}: {}", path.display(), e))
        })
    }

    /// Secret value, or `None` when unset or blank.
    pub fn secret(&self, key: &str) -> Option<&str> {
        self.settings
            .secrets
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}
