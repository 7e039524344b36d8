//! Packing of RGBA byte-quads into 32-bit words.
//!
//! Layout is `R << 24 | G << 16 | B << 8 | A`, independent of host
//! endianness. The packed form is what the parallel path uploads to the
//! compute backend.

use crate::util::{MorphError, MorphResult};

/// Bytes per packed element.
pub const WORD_BYTES: usize = 4;

/// Packs one RGBA sample into a word.
#[inline]
pub fn pack(rgba: [u8; 4]) -> u32 {
    u32::from_be_bytes(rgba)
}

/// Unpacks a word produced by [`pack`].
#[inline]
pub fn unpack(word: u32) -> [u8; 4] {
    word.to_be_bytes()
}

/// Packs an interleaved RGBA byte buffer into one word per pixel.
pub fn pack_rgba(bytes: &[u8]) -> MorphResult<Vec<u32>> {
    check_width(bytes.len())?;
    Ok(bytes
        .chunks_exact(WORD_BYTES)
        .map(|px| pack([px[0], px[1], px[2], px[3]]))
        .collect())
}

/// Unpacks words back into an interleaved RGBA byte buffer.
pub fn unpack_rgba(words: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * WORD_BYTES);
    for &word in words {
        out.extend_from_slice(&unpack(word));
    }
    out
}

/// Reinterprets native-endian bytes read back from a backend as words.
///
/// The input need not be word aligned; it is copied into a fresh `Vec<u32>`.
pub fn words_from_bytes(bytes: &[u8]) -> MorphResult<Vec<u32>> {
    check_width(bytes.len())?;
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

/// Native-endian byte view of `words`, the inverse of [`words_from_bytes`].
#[inline]
pub fn bytes_from_words(words: &[u32]) -> &[u8] {
    bytemuck::cast_slice(words)
}

fn check_width(len: usize) -> MorphResult<()> {
    if len % WORD_BYTES != 0 {
        return Err(MorphError::ElementWidth {
            len,
            width: WORD_BYTES,
        });
    }
    Ok(())
}
