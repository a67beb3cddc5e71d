//! Binary carrier: ciphertext blocks concatenated with no framing
//!
//! ```text
//! [ block 0 (M bytes) ][ block 1 (M bytes) ] ... [ block n-1 (M bytes) ]
//! ```
//!
//! Block boundaries come from the modulus size alone. Decoding consumes full
//! `M`-byte windows and stops at the first short read; a trailing remainder of
//! fewer than `M` bytes is dropped without error. A truncated stream therefore
//! decodes to a truncated payload, which usually fails later at
//! deserialization, but nothing here detects it. Callers that need integrity
//! must check `len % M == 0` themselves (see [`remainder_len`]).

use std::io::{ErrorKind, Read, Write};

use rsaseal_core::{SealError, SealResult};

/// Concatenate ciphertext blocks into one buffer.
pub fn encode_blocks<B: AsRef<[u8]>>(blocks: &[B]) -> Vec<u8> {
    let total = blocks.iter().map(|b| b.as_ref().len()).sum();
    let mut out = Vec::with_capacity(total);
    for block in blocks {
        out.extend_from_slice(block.as_ref());
    }
    out
}

/// Stream ciphertext blocks to `writer`. Returns the number of bytes written.
pub fn write_blocks<B: AsRef<[u8]>, W: Write>(blocks: &[B], writer: &mut W) -> SealResult<usize> {
    let mut written = 0;
    for block in blocks {
        writer.write_all(block.as_ref())?;
        written += block.as_ref().len();
    }
    writer.flush()?;
    Ok(written)
}

/// Split a buffer into `block_len`-byte windows, dropping any short tail.
pub fn decode_blocks(data: &[u8], block_len: usize) -> SealResult<Vec<&[u8]>> {
    check_block_len(block_len)?;

    let blocks = data.chunks_exact(block_len);
    warn_remainder(blocks.remainder().len(), block_len);
    Ok(blocks.collect())
}

/// Read `block_len`-byte windows from `reader` until a window comes up short.
pub fn read_blocks<R: Read>(reader: &mut R, block_len: usize) -> SealResult<Vec<Vec<u8>>> {
    check_block_len(block_len)?;

    let mut blocks = Vec::new();
    loop {
        let mut window = vec![0u8; block_len];
        let filled = fill_window(reader, &mut window)?;
        if filled < block_len {
            warn_remainder(filled, block_len);
            return Ok(blocks);
        }
        blocks.push(window);
    }
}

/// Bytes past the last full block: non-zero means the stream was truncated
/// or padded.
pub fn remainder_len(data_len: usize, block_len: usize) -> usize {
    if block_len == 0 {
        return data_len;
    }
    data_len % block_len
}

/// Fill `window` from `reader`, returning fewer bytes only at end of stream.
fn fill_window<R: Read>(reader: &mut R, window: &mut [u8]) -> SealResult<usize> {
    let mut filled = 0;
    while filled < window.len() {
        match reader.read(&mut window[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(SealError::Io(e)),
        }
    }
    Ok(filled)
}

fn check_block_len(block_len: usize) -> SealResult<()> {
    if block_len == 0 {
        return Err(SealError::key("ciphertext block size must be non-zero"));
    }
    Ok(())
}

fn warn_remainder(remainder: usize, block_len: usize) {
    if remainder > 0 {
        tracing::warn!(
            remainder,
            block_len,
            "binary envelope ends with a partial block; trailing bytes ignored"
        );
    }
}
