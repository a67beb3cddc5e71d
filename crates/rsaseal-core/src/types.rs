use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire representation of a sealed envelope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarrierKind {
    /// Base64 blocks joined by a delimiter character
    #[default]
    Text,
    /// Raw modulus-sized blocks, concatenated
    Binary,
}

impl fmt::Display for CarrierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CarrierKind::Text => f.write_str("text"),
            CarrierKind::Binary => f.write_str("binary"),
        }
    }
}

impl FromStr for CarrierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "base64" => Ok(CarrierKind::Text),
            "binary" | "bin" => Ok(CarrierKind::Binary),
            other => Err(format!("unknown carrier '{other}' (expected text or binary)")),
        }
    }
}
