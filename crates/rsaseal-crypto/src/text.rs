//! Text carrier: one Base64 token per ciphertext block, delimiter-joined
//!
//! ```text
//! <base64 block 0>,<base64 block 1>,...,<base64 block n-1>
//! ```
//!
//! Tokens use the standard padded alphabet `[A-Za-z0-9+/=]`. The delimiter
//! must lie outside that alphabet; with a delimiter from inside it, decoding
//! is undefined. An envelope of zero blocks is the empty string.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsaseal_core::{SealError, SealResult};

use crate::list::{decode_list_with, encode_list};

pub use crate::list::DEFAULT_DELIMITER;

/// Encode ciphertext blocks as a delimited Base64 string.
pub fn encode_blocks<B: AsRef<[u8]>>(blocks: &[B], delimiter: char) -> String {
    encode_list(blocks.iter().map(|b| STANDARD.encode(b.as_ref())), delimiter)
}

/// Decode a delimited Base64 string back into ciphertext blocks.
///
/// Surrounding whitespace (a trailing newline from a file) is ignored.
pub fn decode_blocks(data: &str, delimiter: char) -> SealResult<Vec<Vec<u8>>> {
    decode_list_with(data.trim(), delimiter, |token| STANDARD.decode(token))
        .map_err(|(index, e)| SealError::Encoding {
            index,
            reason: format!("base64 decode: {e}"),
        })
}
