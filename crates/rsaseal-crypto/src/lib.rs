//! rsaseal-crypto: envelope encryption of serde values under an RSA key
//!
//! Architecture: Serialize-then-Chunk with RSA-OAEP(SHA-256)
//!
//! Pipeline: value → codec (JSON | bincode) → split into C-byte windows → OAEP encrypt → carrier
//!
//! Sizes for a modulus of `M` bytes:
//! ```text
//! plaintext window  C = M - 66      (2 × SHA-256 digest + 2)
//! ciphertext block      M           (always, even for a 1-byte window)
//! blocks for L bytes    ceil(L / C) (0 for an empty payload)
//! ```
//!
//! Carriers:
//! - text: Base64 per block, joined by a delimiter (default `,`)
//! - binary: blocks concatenated, boundaries implied by `M`

pub mod binary;
pub mod chunk;
pub mod codec;
pub mod envelope;
pub mod keys;
pub mod list;
pub mod text;

pub use chunk::{decrypt_and_join, split_and_encrypt, ChunkParams};
pub use codec::{BincodeCodec, JsonCodec, PayloadCodec};
pub use envelope::{
    from_binary_envelope, from_text_envelope, to_binary_envelope, to_text_envelope, Envelope,
    EnvelopeOptions, Sealable,
};
pub use keys::{Decrypter, Encrypter, KeyMaterial, ModulusSize, PublicKey, RsaKeyPair};
pub use list::{decode_list, encode_list};
pub use rsaseal_core::{SealError, SealResult};

/// SHA-256 digest size in bytes
pub const HASH_SIZE: usize = 32;

/// Bytes of OAEP-SHA256 padding per block
pub const OAEP_OVERHEAD: usize = 2 * HASH_SIZE + 2;
