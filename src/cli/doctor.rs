//! `looper doctor` - active health diagnostics.
//!
//! Validates configuration and checks the volatility service so problems
//! surface before a conversation does. Each check reports pass/fail with
//! actionable guidance on failures.

use std::path::Path;

use crate::config::{Config, LlmBackend};
use crate::xtreamly::{VolatilityHealthState, XtreamlyClient};

/// Run diagnostic checks and print results.
pub async fn run_doctor_command(
    config_path: Option<&Path>,
    character_path: Option<&Path>,
    strict: bool,
) -> anyhow::Result<()> {
    println!("Looper Doctor");
    println!("=============\n");

    let mut passed = 0u32;
    let mut failed = 0u32;

    let config = Config::load(config_path, character_path);
    check(
        "Configuration",
        check_config(&config),
        &mut passed,
        &mut failed,
    );

    match &config {
        Ok(config) => {
            check(
                "LLM credentials",
                check_llm_credentials(config),
                &mut passed,
                &mut failed,
            );
            check(
                "Xtreamly credential",
                check_xtreamly_credential(config),
                &mut passed,
                &mut failed,
            );
            check(
                "Xtreamly API reachability",
                check_xtreamly_reachability(config).await,
                &mut passed,
                &mut failed,
            );
        }
        Err(_) => {
            for name in [
                "LLM credentials",
                "Xtreamly credential",
                "Xtreamly API reachability",
            ] {
                check(
                    name,
                    CheckResult::Skip("configuration failed to load".to_string()),
                    &mut passed,
                    &mut failed,
                );
            }
        }
    }

    println!();
    println!("  {passed} passed, {failed} failed");

    if failed > 0 {
        println!("\n  Volatility queries stay unavailable until the Xtreamly checks pass.");
        if strict {
            anyhow::bail!("doctor strict mode failed with {failed} check(s)");
        }
    }

    Ok(())
}

// ── Individual checks ───────────────────────────────────────

fn check(name: &str, result: CheckResult, passed: &mut u32, failed: &mut u32) {
    match result {
        CheckResult::Pass(detail) => {
            *passed += 1;
            println!("  [pass] {name}: {detail}");
        }
        CheckResult::Fail(detail) => {
            *failed += 1;
            println!("  [FAIL] {name}: {detail}");
        }
        CheckResult::Skip(reason) => {
            println!("  [skip] {name}: {reason}");
        }
    }
}

enum CheckResult {
    Pass(String),
    Fail(String),
    Skip(String),
}

fn check_config(config: &Result<Config, crate::error::ConfigError>) -> CheckResult {
    match config {
        Ok(config) => CheckResult::Pass(format!(
            "character '{}', model {}",
            config.character.name, config.llm.model
        )),
        Err(e) => CheckResult::Fail(e.to_string()),
    }
}

fn check_llm_credentials(config: &Config) -> CheckResult {
    let endpoint = redact_url_for_display(&config.llm.base_url);
    match (config.llm.backend, config.llm.has_api_key()) {
        (_, true) => CheckResult::Pass(format!("{} via {}", config.llm.backend, endpoint)),
        (LlmBackend::OpenAi, false) => CheckResult::Fail(
            "OPENAI_API_KEY not set. Add it to ~/.looper/.env or run `looper init`".to_string(),
        ),
        (LlmBackend::OpenAiCompatible, false) => CheckResult::Skip(format!(
            "no LLM_API_KEY for {endpoint}; assuming the endpoint needs none"
        )),
    }
}

fn check_xtreamly_credential(config: &Config) -> CheckResult {
    match config.xtreamly.credential_source {
        Some(source) => CheckResult::Pass(format!("XTREAMLY_API_KEY from {}", source.as_str())),
        None => CheckResult::Fail(
            "XTREAMLY_API_KEY not set in the character secrets, env, or config.toml".to_string(),
        ),
    }
}

async fn check_xtreamly_reachability(config: &Config) -> CheckResult {
    let client = match XtreamlyClient::new(config.xtreamly.clone()) {
        Ok(client) => client,
        Err(e) => return CheckResult::Fail(format!("HTTP client init failed: {e}")),
    };

    let health = client.check_health().await;
    let url = redact_url_for_display(&health.url);
    match health.state {
        VolatilityHealthState::Healthy => CheckResult::Pass(format!("{url} ({})", health.detail)),
        VolatilityHealthState::MissingCredential => {
            CheckResult::Skip("no credential to check with".to_string())
        }
        state => CheckResult::Fail(format!("{url}: {state} ({})", health.detail)),
    }
}

fn redact_url_for_display(raw: &str) -> String {
    match reqwest::Url::parse(raw) {
        Ok(mut url) => {
            if !url.username().is_empty() {
                let _ = url.set_username("redacted");
            }
            if url.password().is_some() {
                let _ = url.set_password(Some("redacted"));
            }
            url.to_string()
        }
        Err(_) => "<invalid-url>".to_string(),
    }
}
