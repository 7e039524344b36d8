//! Pixel assignment: result type, matchers, and the high-level `Morpher`.
//!
//! Two matchers produce the same kind of result: the greedy
//! [`assign_sequential`] baseline and the data-parallel [`ParallelMatcher`]
//! that runs on a [`ComputeBackend`]. Both return *some* permutation of the
//! destination indices; neither minimizes total cost, and they are not
//! expected to agree with each other.

use crate::backend::ComputeBackend;
use crate::pixels::{common_len, PixelSet};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{BackendError, MorphError, MorphResult};

pub(crate) mod parallel;
pub(crate) mod sequential;

pub use parallel::{ParallelMatcher, ParallelOutcome, ParallelStrategy};
pub use sequential::assign_sequential;

/// Marker for a source index with no destination yet.
pub const UNASSIGNED: u32 = u32::MAX;

/// A solved assignment: `target(i)` is the destination of source `i`.
///
/// Every value in `0..len()` appears exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    targets: Vec<u32>,
}

impl Assignment {
    /// Validates that `targets` is a permutation of `0..targets.len()`.
    pub fn from_targets(targets: Vec<u32>) -> MorphResult<Self> {
        let n = targets.len();
        let mut seen = vec![false; n];
        for (index, &j) in targets.iter().enumerate() {
            if j == UNASSIGNED {
                return Err(MorphError::InvalidPermutation {
                    index,
                    reason: "unassigned",
                });
            }
            let slot = seen.get_mut(j as usize).ok_or(MorphError::InvalidPermutation {
                index,
                reason: "out of range",
            })?;
            if *slot {
                return Err(MorphError::InvalidPermutation {
                    index,
                    reason: "duplicate",
                });
            }
            *slot = true;
        }
        Ok(Self { targets })
    }

    /// Number of assigned sources.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true for the empty assignment.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Destination of source `i`.
    ///
    /// Panics if `i >= len()`.
    pub fn target(&self, i: usize) -> u32 {
        self.targets[i]
    }

    /// Destinations in source order.
    pub fn as_slice(&self) -> &[u32] {
        &self.targets
    }

    /// Consumes the assignment and returns the destination array.
    pub fn into_vec(self) -> Vec<u32> {
        self.targets
    }

    /// The inverse mapping: source index for every destination.
    pub fn inverse(&self) -> Vec<u32> {
        let mut inv = vec![0u32; self.targets.len()];
        for (i, &j) in self.targets.iter().enumerate() {
            inv[j as usize] = i as u32;
        }
        inv
    }
}

/// Which matcher `Morpher` runs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Greedy single-threaded matcher.
    Sequential,
    /// Parallel matcher with a monotone used-mask.
    #[default]
    UsedMask,
    /// Parallel matcher with per-pass claim counts and priorities.
    PriorityClaim,
}

/// Configuration for [`Morpher`].
#[derive(Clone, Debug)]
pub struct MorphConfig {
    /// Matcher to run.
    pub strategy: Strategy,
    /// Pass cap for the parallel matcher; `None` means `N` passes.
    pub max_iterations: Option<usize>,
    /// Fall back to the sequential matcher when the backend is missing or fails.
    pub fallback: bool,
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::UsedMask,
            max_iterations: None,
            fallback: true,
        }
    }
}

/// How a solution was produced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecutionPath {
    /// The greedy matcher ran.
    Sequential,
    /// The parallel matcher converged with the given strategy.
    Parallel(ParallelStrategy),
}

/// A solved assignment plus how it was obtained.
#[derive(Clone, Debug)]
pub struct Solution {
    /// The permutation.
    pub assignment: Assignment,
    /// Matcher that produced it.
    pub path: ExecutionPath,
    /// Parallel passes run; 0 on the sequential path.
    pub passes: usize,
    /// True if a parallel attempt failed and the sequential matcher took over.
    pub fell_back: bool,
}

/// Front door that picks a matcher and handles backend fallback.
#[derive(Clone, Debug, Default)]
pub struct Morpher {
    cfg: MorphConfig,
}

impl Morpher {
    /// Creates a morpher with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: MorphConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &MorphConfig {
        &self.cfg
    }

    /// Computes an assignment of `source` onto `target`.
    ///
    /// Parallel strategies need `backend`. If it is `None` or reports a
    /// failure and `fallback` is set, the sequential matcher runs instead.
    /// Precondition violations and non-convergence are returned as errors.
    pub fn assign(
        &self,
        backend: Option<&mut dyn ComputeBackend>,
        source: PixelSet<'_>,
        target: PixelSet<'_>,
    ) -> MorphResult<Solution> {
        let n = common_len(source, target)?;
        let _span = trace_span!("morph", pixels = n).entered();

        let strategy = match self.cfg.strategy {
            Strategy::Sequential => return sequential_solution(source, target, false),
            Strategy::UsedMask => ParallelStrategy::UsedMask,
            Strategy::PriorityClaim => ParallelStrategy::PriorityClaim,
        };

        let Some(backend) = backend else {
            if self.cfg.fallback {
                trace_warn!("backend_missing", pixels = n);
                return sequential_solution(source, target, true);
            }
            return Err(MorphError::Backend(BackendError::Unavailable {
                reason: "no compute backend provided".to_string(),
            }));
        };

        let matcher = ParallelMatcher::new(strategy).with_max_iterations(self.cfg.max_iterations);
        match matcher.assign(backend, source, target) {
            Ok(outcome) => {
                trace_event!("morph_done", passes = outcome.passes);
                Ok(Solution {
                    assignment: outcome.assignment,
                    path: ExecutionPath::Parallel(strategy),
                    passes: outcome.passes,
                    fell_back: false,
                })
            }
            Err(err) if err.is_backend_failure() && self.cfg.fallback => {
                trace_warn!("backend_failed", error = err.to_string().as_str());
                sequential_solution(source, target, true)
            }
            Err(err) => Err(err),
        }
    }
}

fn sequential_solution(
    source: PixelSet<'_>,
    target: PixelSet<'_>,
    fell_back: bool,
) -> MorphResult<Solution> {
    Ok(Solution {
        assignment: assign_sequential(source, target)?,
        path: ExecutionPath::Sequential,
        passes: 0,
        fell_back,
    })
}
