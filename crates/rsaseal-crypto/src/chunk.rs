//! Chunking codec: split a payload into cipher-sized windows and reassemble it
//!
//! RSA-OAEP can only encrypt messages shorter than the modulus, so a payload is
//! cut into windows of at most `C = M - 66` bytes (for a modulus of `M` bytes),
//! each window is encrypted on its own into an `M`-byte block, and the blocks
//! keep the payload order.
//!
//! ```text
//! payload:  [    C    ][    C    ][ r ]      r in 1..=C
//!                |          |       |
//! blocks:   [    M    ][    M    ][    M    ]
//! ```
//!
//! Position in the sequence is the only thing tying a block to its window, so
//! every function here preserves order, including the rayon variants.

use rayon::prelude::*;
use rsaseal_core::{SealError, SealResult};
use zeroize::Zeroizing;

use crate::OAEP_OVERHEAD;

/// Plaintext/ciphertext window sizes derived from an RSA modulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    modulus_len: usize,
    plaintext_len: usize,
}

impl ChunkParams {
    /// Derive window sizes for a modulus of `modulus_len` bytes.
    ///
    /// Fails if the modulus leaves no room for even one plaintext byte
    /// (keys of 528 bits or less).
    pub fn for_modulus(modulus_len: usize) -> SealResult<Self> {
        match modulus_len.checked_sub(OAEP_OVERHEAD) {
            Some(plaintext_len) if plaintext_len > 0 => Ok(Self {
                modulus_len,
                plaintext_len,
            }),
            _ => Err(SealError::key(format!(
                "RSA modulus of {modulus_len} bytes ({} bits) cannot hold an OAEP-SHA256 \
                 block; at least {} bytes are required",
                modulus_len * 8,
                OAEP_OVERHEAD + 1
            ))),
        }
    }

    /// Ciphertext block size `M`.
    pub fn modulus_len(&self) -> usize {
        self.modulus_len
    }

    /// Maximum plaintext window size `C`.
    pub fn plaintext_len(&self) -> usize {
        self.plaintext_len
    }

    /// Number of blocks a payload of `payload_len` bytes encrypts to.
    pub fn chunk_count(&self, payload_len: usize) -> usize {
        chunk_count(payload_len, self.plaintext_len)
    }

    /// Size of the binary carrier for a payload of `payload_len` bytes.
    pub fn sealed_len(&self, payload_len: usize) -> usize {
        self.chunk_count(payload_len) * self.modulus_len
    }
}

/// `ceil(payload_len / chunk_len)`, zero for an empty payload.
pub fn chunk_count(payload_len: usize, chunk_len: usize) -> usize {
    if chunk_len == 0 {
        return 0;
    }
    payload_len.div_ceil(chunk_len)
}

fn check_chunk_len(chunk_len: usize) -> SealResult<()> {
    if chunk_len == 0 {
        return Err(SealError::key("plaintext chunk size must be at least 1 byte"));
    }
    Ok(())
}

/// Encrypt `payload` window by window.
///
/// Windows are `chunk_len` bytes except the last, which holds the remainder.
/// An empty payload yields no blocks, and an exact multiple of `chunk_len`
/// never yields an empty trailing block.
pub fn split_and_encrypt<F>(
    payload: &[u8],
    chunk_len: usize,
    mut encrypt: F,
) -> SealResult<Vec<Vec<u8>>>
where
    F: FnMut(&[u8]) -> SealResult<Vec<u8>>,
{
    check_chunk_len(chunk_len)?;

    payload
        .chunks(chunk_len)
        .enumerate()
        .map(|(index, window)| encrypt(window).map_err(|e| at_chunk(e, index)))
        .collect()
}

/// Decrypt `blocks` in order and concatenate the plaintext.
///
/// The first failing block aborts the whole operation. Plaintext recovered
/// before the failure is zeroized, never returned. The output buffer is sized
/// from the ciphertext up front; any further growth wipes the old allocation.
pub fn decrypt_and_join<I, B, F>(blocks: I, mut decrypt: F) -> SealResult<Vec<u8>>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
    F: FnMut(&[u8]) -> SealResult<Vec<u8>>,
{
    let blocks: Vec<B> = blocks.into_iter().collect();
    let capacity = blocks.iter().map(|b| b.as_ref().len()).sum();
    let mut joined = Zeroizing::new(Vec::with_capacity(capacity));
    for (index, block) in blocks.iter().enumerate() {
        let plain = Zeroizing::new(decrypt(block.as_ref()).map_err(|e| at_chunk(e, index))?);
        extend_zeroizing(&mut joined, &plain);
    }
    Ok(std::mem::take(&mut *joined))
}

/// [`split_and_encrypt`] on the rayon pool. Output order matches the payload.
pub fn par_split_and_encrypt<F>(
    payload: &[u8],
    chunk_len: usize,
    encrypt: F,
) -> SealResult<Vec<Vec<u8>>>
where
    F: Fn(&[u8]) -> SealResult<Vec<u8>> + Sync,
{
    check_chunk_len(chunk_len)?;

    payload
        .par_chunks(chunk_len)
        .enumerate()
        .map(|(index, window)| encrypt(window).map_err(|e| at_chunk(e, index)))
        .collect()
}

/// [`decrypt_and_join`] on the rayon pool. Blocks are decrypted independently
/// and concatenated in their original order.
pub fn par_decrypt_and_join<B, F>(blocks: &[B], decrypt: F) -> SealResult<Vec<u8>>
where
    B: AsRef<[u8]> + Sync,
    F: Fn(&[u8]) -> SealResult<Vec<u8>> + Sync,
{
    let plains: Vec<Zeroizing<Vec<u8>>> = blocks
        .par_iter()
        .enumerate()
        .map(|(index, block)| {
            decrypt(block.as_ref())
                .map(Zeroizing::new)
                .map_err(|e| at_chunk(e, index))
        })
        .collect::<SealResult<_>>()?;

    let mut joined = Vec::with_capacity(plains.iter().map(|p| p.len()).sum());
    for plain in &plains {
        joined.extend_from_slice(plain);
    }
    Ok(joined)
}

/// Append to a secret buffer. If it must grow, the old allocation is wiped
/// instead of being handed back to the allocator as is.
fn extend_zeroizing(buf: &mut Zeroizing<Vec<u8>>, data: &[u8]) {
    if buf.capacity() - buf.len() < data.len() {
        let mut grown = Zeroizing::new(Vec::with_capacity((buf.len() + data.len()) * 2));
        grown.extend_from_slice(&buf[..]);
        *buf = grown;
    }
    buf.extend_from_slice(data);
}

/// Stamp the chunk position onto errors raised by a per-chunk cipher call.
fn at_chunk(err: SealError, index: usize) -> SealError {
    match err {
        SealError::Encryption { reason, .. } => SealError::Encryption { index, reason },
        SealError::Decryption { reason, .. } => SealError::Decryption { index, reason },
        other => other,
    }
}
