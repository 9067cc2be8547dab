use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Load and deserialize a TOML file.
///
/// A missing file is reported as [`ConfigError::FileNotFound`] so callers can
/// tell "no config" apart from "broken config".
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    if !path.exists() {
        return Err(ConfigError::FileNotFound { path: display });
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: display.clone(),
        msg: e.to_string(),
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: display,
        msg: e.to_string(),
    })
}

/// Load a `.env` file from the working directory (or a parent) if present.
///
/// Returns `true` when a file was found.
pub fn load_dotenv() -> bool {
    dotenv::dotenv().is_ok()
}

/// Read a non-empty environment variable.
pub fn env_override(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
