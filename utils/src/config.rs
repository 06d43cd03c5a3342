//! TOML config-file loading for [`trajectory_types::EngineConfig`].

use std::fs;
use std::path::Path;
use thiserror::Error;
use trajectory_types::EngineConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(String),
    #[error("failed to parse config file: {0}")]
    Parse(String),
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_is_a_read_error() {
        let err = EngineConfig::from_file("/nonexistent/path.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let dir = std::env::temp_dir();
        let path = dir.join("trajectory_engine_config_test.toml");
        fs::write(&path, "[matcher]\nmin_confidence = 42.0\n").unwrap();

        let cfg = EngineConfig::from_file(&path).unwrap();
        assert_eq!(cfg.matcher.min_confidence, 42.0);
        assert_eq!(cfg.matcher.default_top_k, EngineConfig::default().matcher.default_top_k);

        fs::remove_file(&path).ok();
    }
}
