//! Configuration system for simlive.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $SIMLIVE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/simlive/config.toml
//!   3. ~/.config/simlive/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimliveConfig {
    pub server: ServerConfig,
    pub stepping: SteppingConfig,
    pub layout: LayoutConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket API binds to.
    pub bind: String,
    pub port: u16,
}

/// Defaults applied to every new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteppingConfig {
    /// Wall-clock seconds between live steps.
    pub step_frequency: f64,
    /// Simulated time advanced per live step.
    pub step_size: f64,
    /// Smallest accepted step_frequency, in seconds.
    pub min_step_frequency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub gravity: f64,
    pub stiffness: f64,
    /// Relaxation passes for the reference layout engine.
    pub iterations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max concurrently registered sessions. 0 = unlimited.
    pub max_sessions: usize,
    /// Max accepted model upload size.
    pub max_model_bytes: usize,
    /// Max points in a one-shot run.
    pub max_run_steps: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 9100,
        }
    }
}

impl Default for SteppingConfig {
    fn default() -> Self {
        Self {
            step_frequency: 1.0,
            step_size: 1.0,
            min_step_frequency: 0.01,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            gravity: 1.0,
            stiffness: 1.0,
            iterations: 200,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_sessions: 256,
            max_model_bytes: 8 * 1024 * 1024,
            max_run_steps: 100_000,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("simlive")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SimliveConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::from_toml(&path, &text)?
        } else {
            SimliveConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_toml(path: &std::path::Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("SIMLIVE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&SimliveConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply SIMLIVE_* overrides. `lookup` resolves a variable name.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("SIMLIVE_SERVER__BIND") {
            self.server.bind = v;
        }
        if let Some(p) = lookup("SIMLIVE_SERVER__PORT").and_then(|v| v.parse().ok()) {
            self.server.port = p;
        }
        if let Some(f) = lookup("SIMLIVE_STEPPING__STEP_FREQUENCY").and_then(|v| v.parse().ok()) {
            self.stepping.step_frequency = f;
        }
        if let Some(s) = lookup("SIMLIVE_STEPPING__STEP_SIZE").and_then(|v| v.parse().ok()) {
            self.stepping.step_size = s;
        }
        if let Some(n) = lookup("SIMLIVE_LIMITS__MAX_SESSIONS").and_then(|v| v.parse().ok()) {
            self.limits.max_sessions = n;
        }
    }
}
