use crate::error::ConfigError;

/// Read an env var, treating unset and blank values as absent.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "not valid UTF-8".to_string(),
        }),
    }
}

/// Parse a positive millisecond or count value.
pub(crate) fn positive<T>(key: &str, raw: Option<String>, fallback: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let value = raw
        .map(|s| s.parse::<T>())
        .transpose()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be a positive integer: {e}"),
        })?
        .unwrap_or(fallback);
    if value == T::default() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be > 0".to_string(),
        });
    }
    Ok(value)
}

pub(crate) fn normalize_variant(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}
