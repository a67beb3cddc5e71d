use thiserror::Error;

pub type SealResult<T> = Result<T, SealError>;

#[derive(Debug, Error)]
pub enum SealError {
    /// Key missing, unparsable, too small, or lacking the private half
    #[error("key resolution error: {0}")]
    KeyResolution(String),

    #[error("encryption of chunk {index} failed: {reason}")]
    Encryption { index: usize, reason: String },

    /// Wrong key, tampered block, or a block of the wrong length
    #[error("decryption of chunk {index} failed: {reason}")]
    Decryption { index: usize, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Decryption succeeded but the plaintext is not a valid value
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Malformed Base64 token in a text envelope
    #[error("encoding error in token {index}: {reason}")]
    Encoding { index: usize, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SealError {
    pub fn key(msg: impl Into<String>) -> Self {
        SealError::KeyResolution(msg.into())
    }

    /// True for failures raised by the cipher while opening an envelope
    pub fn is_decryption(&self) -> bool {
        matches!(self, SealError::Decryption { .. })
    }
}
