//! pixmorph computes pixel assignments for image morphing.
//!
//! Given two equally sized RGBA pixel sets, it maps every source pixel to a
//! distinct destination pixel of similar color, so the source image can be
//! rearranged into the layout of the target. A greedy sequential matcher is
//! always available; a data-parallel matcher runs over a compute backend
//! and resolves write conflicts between lanes without locks.
//!
//! Neither matcher finds the minimum-cost assignment, and the two are not
//! expected to agree. With the `rayon` feature the host backend runs lanes
//! on a thread pool.

pub mod assign;
pub mod backend;
pub mod cost;
pub mod lowlevel;
pub mod pixels;
mod trace;
pub mod util;

pub use assign::{
    assign_sequential, Assignment, ExecutionPath, MorphConfig, Morpher, ParallelMatcher,
    ParallelOutcome, ParallelStrategy, Solution, Strategy,
};
pub use backend::{BackendConfig, ComputeBackend, HostBackend};
pub use pixels::{remap, remap_owned, OwnedPixels, PixelSet};
pub use util::{BackendError, MorphError, MorphResult};

#[cfg(feature = "image-io")]
pub use pixels::io;
