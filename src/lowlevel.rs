//! Low-level building blocks for custom backends and tooling.
//!
//! These expose the buffer contract, kernel identifiers, codec, and cost
//! functions used by the matchers. Most users should prefer `Morpher`.

pub use crate::assign::UNASSIGNED;
pub use crate::backend::{
    lane_chunks, BufferHandle, BufferUsage, ComputeBackend, DispatchLimits, KernelId,
};
pub use crate::cost::{color_distance, cost, squared_distance, total_cost};
pub use crate::pixels::codec::{
    bytes_from_words, pack, pack_rgba, unpack, unpack_rgba, words_from_bytes,
};
