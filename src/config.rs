// ⚙️ Configuration - TOML file + environment overrides
// Resolution: explicit path > PROFILER_CONFIG > ./profiler.toml > <config dir>/customer-profiler/profiler.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "profiler.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ============================================================================
// CONFIG SECTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Executable that serves the model (invoked as `<program> run <model>`)
    pub program: String,
    pub model: String,
    /// Kill the model process after this many seconds (None = wait forever)
    pub timeout_secs: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            program: "ollama".to_string(),
            model: "gemma2:2b".to_string(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub program: String,
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        OcrConfig {
            program: "tesseract".to_string(),
            language: "eng".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

// ============================================================================
// ROOT CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where uploaded documents are staged for the session
    pub staging_dir: PathBuf,
    /// Pre-provisioned reference documents and customer photo
    pub backend_dir: PathBuf,
    /// How long the splash screen stays up before the start step
    pub splash_millis: u64,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub model: ModelConfig,
    pub ocr: OcrConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            staging_dir: PathBuf::from("temp"),
            backend_dir: PathBuf::from("backend_documents"),
            splash_millis: 3000,
            log_level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            model: ModelConfig::default(),
            ocr: OcrConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Parse a config from TOML text
    pub fn from_toml_str(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load config from disk. A missing file means defaults (first run).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist; using defaults");
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml_str(&raw, path)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Resolve the config path, load it, then apply environment overrides
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = config_path(explicit);
        let mut config = Self::load(&path)?;
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Apply `PROFILER_*` overrides. The lookup is injectable for tests.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("PROFILER_MODEL").filter(|v| !v.is_empty()) {
            self.model.model = model;
        }
        if let Some(dir) = lookup("PROFILER_STAGING_DIR").filter(|v| !v.is_empty()) {
            self.staging_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("PROFILER_BACKEND_DIR").filter(|v| !v.is_empty()) {
            self.backend_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("PROFILER_LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.log_level = level;
        }
    }
}

/// Pick the config file to read
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = env::var("PROFILER_CONFIG") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    match dirs::config_dir() {
        Some(dir) => dir.join("customer-profiler").join(CONFIG_FILE_NAME),
        None => local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.model.program, "ollama");
        assert_eq!(config.model.model, "gemma2:2b");
        assert_eq!(config.staging_dir, PathBuf::from("temp"));
        assert_eq!(config.backend_dir, PathBuf::from("backend_documents"));
        assert_eq!(config.splash_millis, 3000);
        assert!(config.model.timeout_secs.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let raw = r#"
            staging_dir = "uploads"

            [model]
            model = "llama3:8b"
            timeout_secs = 120
        "#;

        let config = Config::from_toml_str(raw, Path::new("inline.toml")).unwrap();
        assert_eq!(config.staging_dir, PathBuf::from("uploads"));
        assert_eq!(config.model.model, "llama3:8b");
        assert_eq!(config.model.program, "ollama");
        assert_eq!(config.model.timeout_secs, Some(120));
        assert_eq!(config.ocr.language, "eng");
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml_str("staging_dir = [", Path::new("broken.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "splash_millis = 10\n[ocr]\nlanguage = \"eng+hin\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.splash_millis, 10);
        assert_eq!(config.ocr.language, "eng+hin");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PROFILER_MODEL", "mistral"),
            ("PROFILER_BACKEND_DIR", "/srv/backend"),
            ("PROFILER_LOG_LEVEL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.model.model, "mistral");
        assert_eq!(config.backend_dir, PathBuf::from("/srv/backend"));
        // Empty values are ignored
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = config_path(Some(Path::new("/etc/profiler/custom.toml")));
        assert_eq!(path, PathBuf::from("/etc/profiler/custom.toml"));
    }
}
