//! Payload codecs: value ↔ plaintext bytes before chunking

use rsaseal_core::{SealError, SealResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Turns a value into the plaintext that gets sealed, and back.
pub trait PayloadCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> SealResult<Vec<u8>>;
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> SealResult<T>;
}

/// UTF-8 JSON via serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

/// Compact binary encoding via bincode. Not self-describing: the reader must
/// know the exact type.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl PayloadCodec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> SealResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| SealError::Serialization(format!("json: {e}")))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> SealResult<T> {
        serde_json::from_slice(bytes).map_err(|e| SealError::Deserialization(format!("json: {e}")))
    }
}

impl PayloadCodec for BincodeCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> SealResult<Vec<u8>> {
        bincode::serialize(value).map_err(|e| SealError::Serialization(format!("bincode: {e}")))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> SealResult<T> {
        bincode::deserialize(bytes).map_err(|e| SealError::Deserialization(format!("bincode: {e}")))
    }
}
