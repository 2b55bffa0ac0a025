//! Configuration module for the interpreter.
//!
//! Handles the `sqm.toml` settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, InterpreterSettings, LoggingSettings, ModelSettings, Settings, SettingsError,
};
