//! Pixel sets and remapping.
//!
//! `PixelSet` is a borrowed view over interleaved RGBA bytes. Index `i`
//! addresses the `i`-th sample, which is its original position in the image
//! when the bytes come from a row-major buffer. `OwnedPixels` additionally
//! remembers the image dimensions so morphed output can be written back.

use crate::assign::Assignment;
use crate::util::{MorphError, MorphResult};

pub mod codec;
#[cfg(feature = "image-io")]
pub mod io;

/// Channels per sample.
pub const CHANNELS: usize = 4;

/// Borrowed sequence of RGBA samples.
#[derive(Copy, Clone, Debug)]
pub struct PixelSet<'a> {
    data: &'a [u8],
}

impl<'a> PixelSet<'a> {
    /// Creates a view over interleaved RGBA bytes.
    pub fn from_rgba(data: &'a [u8]) -> MorphResult<Self> {
        if data.len() % CHANNELS != 0 {
            return Err(MorphError::ElementWidth {
                len: data.len(),
                width: CHANNELS,
            });
        }
        Ok(Self { data })
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.data.len() / CHANNELS
    }

    /// Returns true if the set holds no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the backing bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the sample at `index` if it is within bounds.
    pub fn get(&self, index: usize) -> Option<[u8; 4]> {
        let start = index.checked_mul(CHANNELS)?;
        let px = self.data.get(start..start + CHANNELS)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Returns the sample at `index`.
    ///
    /// Callers index within `0..len()`; out-of-range indices panic.
    #[inline]
    pub(crate) fn at(&self, index: usize) -> [u8; 4] {
        let px = &self.data[index * CHANNELS..index * CHANNELS + CHANNELS];
        [px[0], px[1], px[2], px[3]]
    }

    /// Iterates samples in index order.
    pub fn iter(&self) -> impl Iterator<Item = [u8; 4]> + 'a {
        self.data
            .chunks_exact(CHANNELS)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }
}

/// Checks that two sets can be matched and returns their common length.
pub(crate) fn common_len(source: PixelSet<'_>, target: PixelSet<'_>) -> MorphResult<usize> {
    if source.len() != target.len() {
        return Err(MorphError::LengthMismatch {
            source_len: source.len(),
            target_len: target.len(),
        });
    }
    let n = source.len();
    if u32::try_from(n).map_or(true, |v| v == u32::MAX) {
        return Err(MorphError::TooManyPixels { count: n });
    }
    Ok(n)
}

/// Owned RGBA image in contiguous row-major layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedPixels {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl OwnedPixels {
    /// Wraps an interleaved RGBA buffer of exactly `width * height` pixels.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> MorphResult<Self> {
        if width == 0 || height == 0 {
            return Err(MorphError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(CHANNELS))
            .ok_or(MorphError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(MorphError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(MorphError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the interleaved RGBA bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the image and returns its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Returns the pixels as a matchable set.
    pub fn pixels(&self) -> PixelSet<'_> {
        PixelSet { data: &self.data }
    }
}

/// Moves every source sample `i` to position `assignment[i]`.
///
/// The result has the source's colors in the layout chosen by the
/// assignment.
pub fn remap(source: PixelSet<'_>, assignment: &Assignment) -> MorphResult<Vec<u8>> {
    if source.len() != assignment.len() {
        return Err(MorphError::LengthMismatch {
            source_len: source.len(),
            target_len: assignment.len(),
        });
    }
    let mut out = vec![0u8; source.as_bytes().len()];
    for (i, px) in source.iter().enumerate() {
        let j = assignment.target(i) as usize;
        out[j * CHANNELS..j * CHANNELS + CHANNELS].copy_from_slice(&px);
    }
    Ok(out)
}

/// Remaps an owned image, keeping its dimensions.
pub fn remap_owned(source: &OwnedPixels, assignment: &Assignment) -> MorphResult<OwnedPixels> {
    let data = remap(source.pixels(), assignment)?;
    OwnedPixels::new(data, source.width, source.height)
}
