//! Single-threaded greedy matcher.
//!
//! Sources are visited in index order and each takes the cheapest
//! destination still free. This is a greedy heuristic, not a minimum-cost
//! matching: early sources get first pick, so visiting sources in a
//! different order generally yields a different assignment.

use crate::assign::Assignment;
use crate::cost::squared_distance;
use crate::pixels::{common_len, PixelSet};
use crate::trace::{trace_event, trace_span};
use crate::util::MorphResult;

/// Greedy assignment of `source` onto `target`.
///
/// Ties go to the lowest destination index. Runs in O(N²) and is
/// deterministic for a given input.
pub fn assign_sequential(source: PixelSet<'_>, target: PixelSet<'_>) -> MorphResult<Assignment> {
    let n = common_len(source, target)?;
    let _span = trace_span!("sequential_assign", pixels = n).entered();

    let mut used = vec![false; n];
    let mut targets = Vec::with_capacity(n);
    for i in 0..n {
        let a = source.at(i);
        let mut best = None;
        let mut best_cost = u32::MAX;
        for (j, taken) in used.iter().enumerate() {
            if *taken {
                continue;
            }
            let cost = squared_distance(a, target.at(j));
            if best.is_none() || cost < best_cost {
                best = Some(j);
                best_cost = cost;
            }
        }
        // There are as many free destinations as remaining sources.
        let Some(j) = best else { break };
        used[j] = true;
        targets.push(j as u32);
    }

    trace_event!("sequential_done", pixels = n);
    Assignment::from_targets(targets)
}
