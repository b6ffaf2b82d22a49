use std::time::Duration;

use crate::config::helpers::{optional_env, positive};
use crate::error::ConfigError;
use crate::settings::Settings;

/// Bounds on the command pipeline's external calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub compose_timeout: Duration,
    pub extract_timeout: Duration,
    pub dispatch_timeout: Duration,
    pub recent_message_limit: usize,
}

impl PipelineConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let compose_ms = positive(
            "LOOPER_COMPOSE_TIMEOUT_MS",
            optional_env("LOOPER_COMPOSE_TIMEOUT_MS")?,
            settings.pipeline.compose_timeout_ms,
        )?;
        let extract_ms = positive(
            "LOOPER_EXTRACT_TIMEOUT_MS",
            optional_env("LOOPER_EXTRACT_TIMEOUT_MS")?,
            settings.pipeline.extract_timeout_ms,
        )?;
        let dispatch_ms = positive(
            "LOOPER_DISPATCH_TIMEOUT_MS",
            optional_env("LOOPER_DISPATCH_TIMEOUT_MS")?,
            settings.pipeline.dispatch_timeout_ms,
        )?;
        let recent_message_limit = positive(
            "LOOPER_RECENT_MESSAGE_LIMIT",
            optional_env("LOOPER_RECENT_MESSAGE_LIMIT")?,
            settings.pipeline.recent_message_limit,
        )?;

        Ok(Self {
            compose_timeout: Duration::from_millis(compose_ms),
            extract_timeout: Duration::from_millis(extract_ms),
            dispatch_timeout: Duration::from_millis(dispatch_ms),
            recent_message_limit,
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compose_timeout: Duration::from_secs(5),
            extract_timeout: Duration::from_secs(30),
            dispatch_timeout: Duration::from_secs(15),
            recent_message_limit: 32,
        }
    }
}
