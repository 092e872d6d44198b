//! Hook layer configuration.
//!
//! Merged from defaults, then an optional TOML file, then environment variables:
//! `PROTOHOOK_MAX_HOOKS`, `PROTOHOOK_WRITE_BUFFERS` (`borrow` or `copy`) and
//! `PROTOHOOK_MAX_TRANSFER`. Unparsable env values are ignored with a warning.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// How write sources are handed to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferMode {
    /// Bounded view over the caller's memory
    #[default]
    Borrow,
    /// Fresh host-owned copy
    Copy,
}

impl std::str::FromStr for BufferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "borrow" => Ok(Self::Borrow),
            "copy" => Ok(Self::Copy),
            other => Err(format!("unknown buffer mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookConfig {
    /// Protocols that can be hooked at the same time (default 50).
    #[serde(default = "default_max_hooks")]
    pub max_hooks: usize,
    /// Borrow or copy write sources (default borrow).
    #[serde(default)]
    pub write_buffers: BufferMode,
    /// Upper bound on bytes moved by one read or write call.
    #[serde(default = "default_max_transfer")]
    pub max_transfer: usize,
}

fn default_max_hooks() -> usize {
    50
}
#[allow(clippy::cast_sign_loss)]
fn default_max_transfer() -> usize {
    i32::MAX as usize
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            max_hooks: default_max_hooks(),
            write_buffers: BufferMode::default(),
            max_transfer: default_max_transfer(),
        }
    }
}

/// Errors while loading configuration
#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(e) => write!(f, "Cannot read config: {e}"),
            Self::Parse(e) => write!(f, "Cannot parse config: {e}"),
            Self::Invalid(msg) => write!(f, "Invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl HookConfig {
    /// Parse a TOML document; missing keys take their defaults.
    ///
    /// # Errors
    /// Invalid TOML, unknown keys, or out-of-range values.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values a document cannot express as types.
    ///
    /// # Errors
    /// `max_transfer` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_transfer == 0 {
            return Err(ConfigError::Invalid("max_transfer must be positive".to_string()));
        }
        Ok(())
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    /// The file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::from_toml_str(&s)
    }

    /// Defaults, then the file named by `PROTOHOOK_CONFIG` if set, then env overrides.
    ///
    /// # Errors
    /// `PROTOHOOK_CONFIG` names a file that cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os("PROTOHOOK_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `PROTOHOOK_*` overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(s) = lookup("PROTOHOOK_MAX_HOOKS") {
            match s.parse() {
                Ok(n) => self.max_hooks = n,
                Err(e) => warn!(value = %s, error = %e, "ignoring PROTOHOOK_MAX_HOOKS"),
            }
        }
        if let Some(s) = lookup("PROTOHOOK_WRITE_BUFFERS") {
            match s.parse() {
                Ok(mode) => self.write_buffers = mode,
                Err(e) => warn!(value = %s, error = %e, "ignoring PROTOHOOK_WRITE_BUFFERS"),
            }
        }
        if let Some(s) = lookup("PROTOHOOK_MAX_TRANSFER") {
            match s.parse::<usize>() {
                Ok(n) if n > 0 => self.max_transfer = n,
                _ => warn!(value = %s, "ignoring PROTOHOOK_MAX_TRANSFER"),
            }
        }
    }
}
