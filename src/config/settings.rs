//! TOML-based configuration for the interpreter.
//!
//! Supports a config file (sqm.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [interpreter]
//! strict_jpa_compliance = true  # overrides the model's own setting
//!
//! [model]
//! path = "${SQM_HOME}/model.toml"
//!
//! [logging]
//! filter = "sqm=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::interpret::InterpretOptions;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Interpretation switches.
    pub interpreter: InterpreterSettings,

    /// Domain model location.
    pub model: ModelSettings,

    /// Log output of the CLI.
    pub logging: LoggingSettings,
}

/// Interpretation switches.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct InterpreterSettings {
    /// Overrides the model's strict JPQL compliance when set.
    pub strict_jpa_compliance: Option<bool>,
}

/// Domain model location.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Path to a TOML model definition (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl ModelSettings {
    /// Get the model path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing-subscriber` filter directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        if settings.logging.filter.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "logging.filter must not be empty".to_string(),
            ));
        }
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `SQM_CONFIG`
    /// 2. `./sqm.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("SQM_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("sqm.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        Ok(Settings::default())
    }

    /// Interpretation options derived from these settings.
    pub fn interpret_options(&self) -> InterpretOptions {
        InterpretOptions {
            strict_jpa_compliance: self.interpreter.strict_jpa_compliance,
        }
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // a lone $ is kept
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
