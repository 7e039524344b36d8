//! Lane programs executed by the host backend.
//!
//! Each function runs one lane against the bound buffers, in the slot order
//! given by [`KernelId::bindings`]. Loads past the end of a buffer read 0
//! and stores past the end are dropped, matching robust buffer access on
//! GPUs. All shared writes are relaxed atomics; dispatch boundaries are the
//! only ordering points.

use crate::assign::UNASSIGNED;
use crate::backend::KernelId;
use crate::cost::squared_distance_packed;
use std::sync::atomic::{AtomicU32, Ordering};

/// Sentinel for lanes that have no proposal to rank.
pub(crate) const UNRANKED: u32 = u32::MAX;

/// Words in a bit mask over `n` destinations; bit `j % 32` of word `j / 32`.
#[inline]
pub(crate) fn mask_words(n: u32) -> u32 {
    n.div_ceil(32)
}

struct Bound<'a> {
    buffers: &'a [&'a [AtomicU32]],
}

impl Bound<'_> {
    #[inline]
    fn load(&self, slot: usize, idx: u32) -> u32 {
        self.buffers[slot]
            .get(idx as usize)
            .map_or(0, |w| w.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, slot: usize, idx: u32, value: u32) {
        if let Some(w) = self.buffers[slot].get(idx as usize) {
            w.store(value, Ordering::Relaxed);
        }
    }

    #[inline]
    fn fetch_add(&self, slot: usize, idx: u32, value: u32) {
        if let Some(w) = self.buffers[slot].get(idx as usize) {
            w.fetch_add(value, Ordering::Relaxed);
        }
    }

    #[inline]
    fn bit(&self, slot: usize, j: u32) -> bool {
        self.load(slot, j / 32) & (1 << (j % 32)) != 0
    }

    #[inline]
    fn set_bit(&self, slot: usize, j: u32) {
        if let Some(w) = self.buffers[slot].get((j / 32) as usize) {
            w.fetch_or(1 << (j % 32), Ordering::Relaxed);
        }
    }

    fn n(&self) -> u32 {
        self.load(0, 0)
    }
}

/// Runs one lane of `kernel`. Lanes at or past `N` do nothing.
///
/// The caller has checked that `buffers` matches the kernel's layout.
pub(crate) fn run_lane(kernel: KernelId, buffers: &[&[AtomicU32]], lane: u32) {
    let b = Bound { buffers };
    if lane >= b.n() {
        return;
    }
    match kernel {
        KernelId::ProposeUnused => propose_unused(&b, lane),
        KernelId::CommitClaims => commit_claims(&b, lane),
        KernelId::CheckAllUsed => check_all_used(&b, lane),
        KernelId::ProposeNearest => propose_nearest(&b, lane),
        KernelId::TallyClaims => tally_claims(&b, lane),
        KernelId::CheckClaims => check_claims(&b, lane),
        KernelId::ResolveClaims => resolve_claims(&b, lane),
    }
}

/// Nearest destination whose bit in `mask_slot` is clear; lowest index on ties.
fn nearest_free(b: &Bound<'_>, lane: u32, mask_slot: usize) -> u32 {
    let n = b.n();
    let a = b.load(1, lane);
    let mut best = UNASSIGNED;
    let mut best_cost = u32::MAX;
    for j in 0..n {
        if b.bit(mask_slot, j) {
            continue;
        }
        let cost = squared_distance_packed(a, b.load(2, j));
        if best == UNASSIGNED || cost < best_cost {
            best = j;
            best_cost = cost;
        }
    }
    best
}

// [params, pixels_a, pixels_b, assignment, used, proposal, owner]
fn propose_unused(b: &Bound<'_>, lane: u32) {
    if b.load(3, lane) != UNASSIGNED {
        b.store(5, lane, UNASSIGNED);
        return;
    }
    let j = nearest_free(b, lane, 4);
    b.store(5, lane, j);
    if j != UNASSIGNED {
        // Racing lanes overwrite each other; the last store wins.
        b.store(6, j, lane);
    }
}

// [params, assignment, used, proposal, owner]
fn commit_claims(b: &Bound<'_>, lane: u32) {
    let j = b.load(3, lane);
    if j == UNASSIGNED || b.load(4, j) != lane {
        return;
    }
    b.store(1, lane, j);
    b.set_bit(2, j);
}

// [params, used, flag]
fn check_all_used(b: &Bound<'_>, lane: u32) {
    if !b.bit(1, lane) {
        b.store(2, 0, 0);
    }
}

// [params, pixels_a, pixels_b, assignment, excluded, locked]
fn propose_nearest(b: &Bound<'_>, lane: u32) {
    if b.load(5, lane) != 0 {
        return;
    }
    let j = nearest_free(b, lane, 4);
    b.store(3, lane, j);
}

// [params, pixels_a, pixels_b, assignment, claims, priority]
fn tally_claims(b: &Bound<'_>, lane: u32) {
    let j = b.load(3, lane);
    if j == UNASSIGNED {
        b.store(5, lane, UNRANKED);
        return;
    }
    b.fetch_add(4, j, 1);

    let n = b.n();
    let target = b.load(2, j);
    let own = squared_distance_packed(b.load(1, lane), target);
    let mut rank = 0u32;
    for k in 0..n {
        if k == lane || b.load(3, k) != j {
            continue;
        }
        let other = squared_distance_packed(b.load(1, k), target);
        if (other, k) < (own, lane) {
            rank += 1;
        }
    }
    b.store(5, lane, rank);
}

// [params, claims, flag]
fn check_claims(b: &Bound<'_>, lane: u32) {
    if b.load(1, lane) != 1 {
        b.store(2, 0, 0);
    }
}

// [params, assignment, priority, excluded, locked]
fn resolve_claims(b: &Bound<'_>, lane: u32) {
    if b.load(4, lane) != 0 {
        return;
    }
    let j = b.load(1, lane);
    if j == UNASSIGNED {
        return;
    }
    if b.load(2, lane) == 0 {
        b.store(4, lane, 1);
        b.set_bit(3, j);
    } else {
        b.store(1, lane, UNASSIGNED);
    }
}
