use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SealError, SealResult};
use crate::types::CarrierKind;

/// Top-level configuration (loaded from rsaseal.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    pub envelope: EnvelopeConfig,
    pub keys: KeysConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Default carrier: "text" or "binary"
    pub carrier: CarrierKind,
    /// Text carrier delimiter. Must lie outside the Base64 alphabet.
    pub delimiter: char,
    /// Chunk count at which blocks are processed on the rayon pool (0 = never)
    pub parallel_threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Per-user key directory, searched first
    pub user_dir: PathBuf,
    /// Machine-wide key directory, searched after the user directory
    pub system_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            carrier: CarrierKind::Text,
            delimiter: ',',
            parallel_threshold: 16,
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            user_dir: PathBuf::from("~/.config/rsaseal/keys"),
            system_dir: PathBuf::from("/etc/rsaseal/keys"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl SealConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> SealResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| SealError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| SealError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        path.to_path_buf()
    }
}
