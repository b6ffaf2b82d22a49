//! Bootstrap helpers for Looper.
//!
//! Credentials and provider selection live in `~/.looper/.env` (standard
//! dotenvy format) so they are available before the TOML settings load.

use std::path::{Path, PathBuf};

/// Path to the Looper-specific `.env` file: `~/.looper/.env`.
pub fn looper_env_path() -> PathBuf {
    crate::settings::Settings::base_dir().join(".env")
}

/// Load env vars from `~/.looper/.env` (in addition to the standard `.env`).
///
/// Call this **after** `dotenvy::dotenv()` so that `./.env` takes priority.
/// dotenvy never overwrites existing env vars, so the effective priority is:
///
///   explicit env vars > `./.env` > `~/.looper/.env`
pub fn load_looper_env() {
    let path = looper_env_path();
    if path.exists()
        && let Err(e) = dotenvy::from_path(&path)
    {
        tracing::warn!("Failed to load {}: {}", path.display(), e);
    }
}

/// Write bootstrap vars to `~/.looper/.env`, replacing the file.
pub fn save_bootstrap_env(vars: &[(&str, &str)]) -> std::io::Result<()> {
    save_bootstrap_env_to(&looper_env_path(), vars)
}

/// Write bootstrap vars to `path`.
///
/// Values are double-quoted so that `#` and other shell-special characters
/// survive dotenvy parsing.
pub fn save_bootstrap_env_to(path: &Path, vars: &[(&str, &str)]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut content = String::new();
    for (key, value) in vars {
        // Escape backslashes and quotes so a value cannot break out of its line.
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        content.push_str(&format!("{}=\"{}\"\n", key, escaped));
    }
    std::fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_back(path: &Path) -> Vec<(String, String)> {
        dotenvy::from_path_iter(path)
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
    }

    #[test]
    fn saved_env_round_trips_through_dotenvy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(".env");

        save_bootstrap_env_to(
            &path,
            &[
                ("XTREAMLY_API_KEY", "xk#123"),
                ("OPENAI_API_KEY", "sk-\"quoted\""),
            ],
        )
        .unwrap();

        assert_eq!(
            read_back(&path),
            vec![
                ("XTREAMLY_API_KEY".to_string(), "xk#123".to_string()),
                ("OPENAI_API_KEY".to_string(), "sk-\"quoted\"".to_string()),
            ]
        );
    }

    #[test]
    fn env_path_is_under_looper_dir() {
        let path = looper_env_path();
        assert!(path.to_string_lossy().contains(".looper"));
        assert!(path.to_string_lossy().ends_with(".env"));
    }
}
