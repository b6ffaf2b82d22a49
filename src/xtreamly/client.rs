use async_trait::async_trait;
use secrecy::ExposeSecret;

use super::health::{VolatilityHealth, VolatilityHealthState, classify_transport_error};
use super::{VolatilityService, VolatilityState};
use crate::config::XtreamlyConfig;
use crate::error::ApiError;
use crate::schema::VolatilitySymbol;

const SERVICE: &str = "xtreamly";
const API_KEY_HEADER: &str = "x-api-key";
const ERROR_BODY_MAX: usize = 400;

/// HTTP client for the Xtreamly volatility API.
pub struct XtreamlyClient {
    http: reqwest::Client,
    config: XtreamlyConfig,
}

impl XtreamlyClient {
    pub fn new(config: XtreamlyConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("looper/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    fn request(&self, url: &str) -> Result<reqwest::RequestBuilder, ApiError> {
        let key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| ApiError::MissingCredential {
                service: SERVICE.to_string(),
            })?;
        Ok(self
            .http
            .get(url)
            .header(API_KEY_HEADER, key.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    /// Check the service root and classify the outcome.
    pub async fn check_health(&self) -> VolatilityHealth {
        let url = self.url("");
        let health = |state, detail: String, http_status| VolatilityHealth {
            url: url.clone(),
            state,
            detail,
            http_status,
        };

        if reqwest::Url::parse(&url).is_err() {
            return health(
                VolatilityHealthState::InvalidUrl,
                "URL parse failed".to_string(),
                None,
            );
        }

        let request = match self.request(&url) {
            Ok(request) => request,
            Err(_) => {
                return health(
                    VolatilityHealthState::MissingCredential,
                    "XTREAMLY_API_KEY not configured".to_string(),
                    None,
                );
            }
        };

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                health(
                    VolatilityHealthState::from_status(status),
                    format!("HTTP {}", status.as_u16()),
                    Some(status.as_u16()),
                )
            }
            Err(error) => health(classify_transport_error(&error), error.to_string(), None),
        }
    }
}

#[async_trait]
impl VolatilityService for XtreamlyClient {
    fn api_key_configured(&self) -> bool {
        self.config.api_key_configured()
    }

    async fn is_ok(&self) -> bool {
        let health = self.check_health().await;
        if !health.is_healthy() {
            tracing::debug!(
                state = %health.state,
                detail = %health.detail,
                "Xtreamly health check failed"
            );
        }
        health.is_healthy()
    }

    async fn state(&self, symbol: VolatilitySymbol) -> Result<VolatilityState, ApiError> {
        let response = self
            .request(&self.url("state"))?
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed {
                service: SERVICE.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_MAX).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse {
            service: SERVICE.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(base: &str, key: Option<&str>) -> XtreamlyConfig {
        XtreamlyConfig {
            api_key: key.map(secrecy::SecretString::from),
            credential_source: None,
            api_base_url: base.to_string(),
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn joins_paths_without_double_slash() {
        let client = XtreamlyClient::new(config("https://api.xtreamly.io/", None)).unwrap();
        assert_eq!(client.url("state"), "https://api.xtreamly.io/state");
    }

    #[tokio::test]
    async fn check_without_key_reports_missing_credential() {
        let client = XtreamlyClient::new(config("https://api.xtreamly.io", None)).unwrap();

        let health = client.check_health().await;
        assert_eq!(health.state, VolatilityHealthState::MissingCredential);
        assert!(!client.is_ok().await);
        assert!(!client.api_key_configured());
    }

    #[tokio::test]
    async fn state_without_key_fails_before_network() {
        let client = XtreamlyClient::new(config("https://api.xtreamly.io", None)).unwrap();

        let err = client.state(VolatilitySymbol::Eth).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingCredential { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_classified() {
        let client =
            XtreamlyClient::new(config("http://127.0.0.1:9", Some("xk-test"))).unwrap();

        let health = client.check_health().await;
        assert!(matches!(
            health.state,
            VolatilityHealthState::ConnectFailure | VolatilityHealthState::Timeout
        ));
    }
}
