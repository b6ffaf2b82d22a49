//! Xtreamly connectivity check classification used by the handler
//! precondition and `looper doctor`.

use std::error::Error as _;

use serde::{Deserialize, Serialize};

/// Typed volatility service health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityHealthState {
    Healthy,
    MissingCredential,
    InvalidUrl,
    DnsFailure,
    ConnectFailure,
    Timeout,
    AuthFailure,
    HttpFailure,
}

impl VolatilityHealthState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::MissingCredential => "missing_credential",
            Self::InvalidUrl => "invalid_url",
            Self::DnsFailure => "dns_failure",
            Self::ConnectFailure => "connect_failure",
            Self::Timeout => "timeout",
            Self::AuthFailure => "auth_failure",
            Self::HttpFailure => "http_failure",
        }
    }

    pub fn is_healthy(self) -> bool {
        self == Self::Healthy
    }

    /// Classify a health response status.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            Self::AuthFailure
        } else if status.is_success() {
            Self::Healthy
        } else {
            Self::HttpFailure
        }
    }
}

impl std::fmt::Display for VolatilityHealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health result for the volatility service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityHealth {
    pub url: String,
    pub state: VolatilityHealthState,
    pub detail: String,
    pub http_status: Option<u16>,
}

impl VolatilityHealth {
    pub fn is_healthy(&self) -> bool {
        self.state.is_healthy()
    }
}

pub(crate) fn classify_transport_error(error: &reqwest::Error) -> VolatilityHealthState {
    if error.is_timeout() {
        return VolatilityHealthState::Timeout;
    }

    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_error) = err.downcast_ref::<std::io::Error>() {
            return match io_error.kind() {
                std::io::ErrorKind::NotFound => VolatilityHealthState::DnsFailure,
                _ => VolatilityHealthState::ConnectFailure,
            };
        }
        source = err.source();
    }

    let lowered = error.to_string().to_ascii_lowercase();
    if lowered.contains("dns")
        || lowered.contains("lookup")
        || lowered.contains("name or service not known")
        || lowered.contains("no such host")
    {
        VolatilityHealthState::DnsFailure
    } else {
        VolatilityHealthState::ConnectFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_state_labels_are_stable() {
        assert_eq!(VolatilityHealthState::Healthy.as_str(), "healthy");
        assert_eq!(
            VolatilityHealthState::MissingCredential.to_string(),
            "missing_credential"
        );
    }

    #[test]
    fn classifies_health_statuses() {
        use reqwest::StatusCode;

        assert!(VolatilityHealthState::from_status(StatusCode::OK).is_healthy());
        assert_eq!(
            VolatilityHealthState::from_status(StatusCode::FORBIDDEN),
            VolatilityHealthState::AuthFailure
        );
        assert_eq!(
            VolatilityHealthState::from_status(StatusCode::BAD_GATEWAY),
            VolatilityHealthState::HttpFailure
        );
        assert_eq!(
            VolatilityHealthState::from_status(StatusCode::NOT_FOUND),
            VolatilityHealthState::HttpFailure
        );
    }
}
