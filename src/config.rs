//! Harness configuration parsing and validation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::stub::ScriptedEngine;
use crate::session::config::SessionConfig;
use crate::{AppError, Result};

/// Options for the scripted engine hosted by the demo binary.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Simulated search time per request.
    #[serde(default = "default_search_delay_ms")]
    pub search_delay_ms: u64,
    /// Best-move rotation override; empty keeps the built-in rotation.
    #[serde(default)]
    pub moves: Vec<String>,
}

fn default_search_delay_ms() -> u64 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_delay_ms: default_search_delay_ms(),
            moves: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Build the scripted engine these options describe.
    #[must_use]
    pub fn build(&self) -> ScriptedEngine {
        ScriptedEngine::new()
            .with_search_delay(Duration::from_millis(self.search_delay_ms))
            .with_moves(self.moves.clone())
    }
}

/// Top-level configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HarnessConfig {
    /// Scripted engine options.
    #[serde(default)]
    pub engine: EngineConfig,
    /// The session to run.
    pub session: SessionConfig,
}

impl HarnessConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.session.validate()
    }
}
