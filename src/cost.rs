//! Color-distance cost between a source and a destination sample.

use crate::pixels::codec::unpack;
use crate::pixels::PixelSet;

/// Squared Euclidean distance over the four RGBA channels.
///
/// Exact in integers and ordered identically to [`color_distance`], so the
/// matchers rank candidates with it.
#[inline]
pub fn squared_distance(a: [u8; 4], b: [u8; 4]) -> u32 {
    let mut sum = 0u32;
    for c in 0..4 {
        let d = a[c].abs_diff(b[c]) as u32;
        sum += d * d;
    }
    sum
}

/// Euclidean distance over the four RGBA channels.
#[inline]
pub fn color_distance(a: [u8; 4], b: [u8; 4]) -> f32 {
    (squared_distance(a, b) as f32).sqrt()
}

/// Squared distance between two packed samples.
#[inline]
pub(crate) fn squared_distance_packed(a: u32, b: u32) -> u32 {
    squared_distance(unpack(a), unpack(b))
}

/// Cost of assigning `source[i]` to `target[j]`, or `None` if either
/// index is out of range.
pub fn cost(source: PixelSet<'_>, target: PixelSet<'_>, i: usize, j: usize) -> Option<f32> {
    Some(color_distance(source.get(i)?, target.get(j)?))
}

/// Sum of per-pair costs over a full assignment.
///
/// Returns `None` if `targets` names a pixel outside either set.
pub fn total_cost(source: PixelSet<'_>, target: PixelSet<'_>, targets: &[u32]) -> Option<f64> {
    targets
        .iter()
        .enumerate()
        .map(|(i, &j)| cost(source, target, i, j as usize).map(f64::from))
        .sum()
}
