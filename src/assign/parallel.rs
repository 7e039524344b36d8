//! Data-parallel matcher driven over a compute backend.
//!
//! Each pass runs one lane per source index. Lanes never wait on each
//! other: several lanes may pick the same destination, and the collision is
//! settled by a later dispatch in the same pass. A pass always fixes at
//! least one more destination for good, so `N` passes are enough; the loop
//! is still capped and reports [`MorphError::NonConvergence`] past the cap.
//!
//! Passes are strictly serialized. The host observes the device only at
//! `await_completion` and when reading the solved flag, and reads the
//! assignment buffer once, after convergence.

use crate::assign::{Assignment, UNASSIGNED};
use crate::backend::kernels::mask_words;
use crate::backend::{lane_chunks, BufferHandle, BufferUsage, ComputeBackend, KernelId};
use crate::pixels::codec::{bytes_from_words, pack_rgba, words_from_bytes};
use crate::pixels::{common_len, PixelSet};
use crate::trace::{trace_event, trace_span};
use crate::util::{MorphError, MorphResult};

/// Conflict-resolution protocol run by [`ParallelMatcher`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ParallelStrategy {
    /// Destinations carry a monotone used bit. Every unassigned lane claims
    /// its nearest unused destination by overwriting an owner slot; the
    /// lane whose write survived commits, the others retry next pass.
    #[default]
    UsedMask,
    /// Lanes propose, proposals are counted and ranked by cost (then lane
    /// index), and the best-ranked proposer of each destination is locked
    /// in while the rest re-propose.
    PriorityClaim,
}

/// Result of a converged parallel run.
#[derive(Clone, Debug)]
pub struct ParallelOutcome {
    /// The permutation.
    pub assignment: Assignment,
    /// Passes needed to converge.
    pub passes: usize,
}

/// Parallel matcher configuration and entry point.
#[derive(Clone, Debug, Default)]
pub struct ParallelMatcher {
    strategy: ParallelStrategy,
    max_iterations: Option<usize>,
}

impl ParallelMatcher {
    /// Creates a matcher for `strategy` with the default `N`-pass cap.
    pub fn new(strategy: ParallelStrategy) -> Self {
        Self {
            strategy,
            max_iterations: None,
        }
    }

    /// Overrides the pass cap. `None` restores the default of `N`.
    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Returns the configured strategy.
    pub fn strategy(&self) -> ParallelStrategy {
        self.strategy
    }

    /// Pass cap for `n` lanes; never below one.
    pub fn iteration_cap(&self, n: usize) -> usize {
        self.max_iterations.unwrap_or(n).max(1)
    }

    /// Assigns `source` onto `target` using `backend`.
    ///
    /// Buffers are allocated for this call only and released before it
    /// returns, whether it succeeds or not.
    pub fn assign<B: ComputeBackend + ?Sized>(
        &self,
        backend: &mut B,
        source: PixelSet<'_>,
        target: PixelSet<'_>,
    ) -> MorphResult<ParallelOutcome> {
        let n = common_len(source, target)?;
        if n == 0 {
            return Ok(ParallelOutcome {
                assignment: Assignment::from_targets(Vec::new())?,
                passes: 0,
            });
        }
        let cap = self.iteration_cap(n);
        let _span = trace_span!(
            "parallel_assign",
            pixels = n,
            strategy = ?self.strategy,
            cap = cap
        )
        .entered();

        let mut session = Session::new(backend);
        let inputs = Inputs::upload(&mut session, source, target)?;
        match self.strategy {
            ParallelStrategy::UsedMask => run_used_mask(&mut session, &inputs, cap),
            ParallelStrategy::PriorityClaim => run_priority_claim(&mut session, &inputs, cap),
        }
    }
}

/// Buffers owned by one assignment computation; released on drop.
struct Session<'b, B: ComputeBackend + ?Sized> {
    backend: &'b mut B,
    handles: Vec<BufferHandle>,
}

impl<'b, B: ComputeBackend + ?Sized> Session<'b, B> {
    fn new(backend: &'b mut B) -> Self {
        Self {
            backend,
            handles: Vec::new(),
        }
    }

    fn create(
        &mut self,
        words: usize,
        usage: BufferUsage,
        init: Option<&[u32]>,
    ) -> MorphResult<BufferHandle> {
        let handle = self
            .backend
            .create_buffer(words * 4, usage, init.map(bytes_from_words))?;
        self.handles.push(handle);
        Ok(handle)
    }

    fn write(&mut self, handle: BufferHandle, words: &[u32]) -> MorphResult<()> {
        self.backend.write_buffer(handle, 0, bytes_from_words(words))?;
        Ok(())
    }

    /// Issues `kernel` over `0..lanes`, split to respect the dispatch cap.
    fn dispatch(
        &mut self,
        kernel: KernelId,
        bindings: &[BufferHandle],
        lanes: u32,
    ) -> MorphResult<()> {
        for chunk in lane_chunks(lanes, self.backend.limits()) {
            self.backend.dispatch(kernel, bindings, chunk)?;
        }
        Ok(())
    }

    fn read_words(&mut self, handle: BufferHandle, words: usize) -> MorphResult<Vec<u32>> {
        let bytes = self.backend.read_buffer(handle, words * 4)?;
        words_from_bytes(&bytes)
    }

    /// Resets `flag` to 1, runs a check kernel that clears it on failure,
    /// and waits for the verdict.
    fn check(
        &mut self,
        kernel: KernelId,
        bindings: &[BufferHandle],
        flag: BufferHandle,
        lanes: u32,
    ) -> MorphResult<bool> {
        self.write(flag, &[1])?;
        self.dispatch(kernel, bindings, lanes)?;
        self.backend.await_completion()?;
        Ok(self.read_words(flag, 1)?[0] == 1)
    }
}

impl<B: ComputeBackend + ?Sized> Drop for Session<'_, B> {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = self.backend.release_buffer(handle);
        }
    }
}

/// Buffers shared by both strategies.
struct Inputs {
    n: u32,
    params: BufferHandle,
    pixels_a: BufferHandle,
    pixels_b: BufferHandle,
    assignment: BufferHandle,
    flag: BufferHandle,
}

impl Inputs {
    fn upload<B: ComputeBackend + ?Sized>(
        session: &mut Session<'_, B>,
        source: PixelSet<'_>,
        target: PixelSet<'_>,
    ) -> MorphResult<Self> {
        let n = source.len();
        let lanes = n as u32;
        let storage = BufferUsage::STORAGE | BufferUsage::COPY_DST;
        let unassigned = vec![UNASSIGNED; n];
        let params = session.create(
            1,
            BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            Some(&[lanes][..]),
        )?;
        let packed_a = pack_rgba(source.as_bytes())?;
        let packed_b = pack_rgba(target.as_bytes())?;
        let pixels_a = session.create(n, storage, Some(packed_a.as_slice()))?;
        let pixels_b = session.create(n, storage, Some(packed_b.as_slice()))?;
        let assignment = session.create(
            n,
            storage | BufferUsage::COPY_SRC,
            Some(unassigned.as_slice()),
        )?;
        let flag = session.create(1, storage | BufferUsage::COPY_SRC, None)?;
        Ok(Self {
            n: lanes,
            params,
            pixels_a,
            pixels_b,
            assignment,
            flag,
        })
    }

    fn finish<B: ComputeBackend + ?Sized>(
        &self,
        session: &mut Session<'_, B>,
        passes: usize,
    ) -> MorphResult<ParallelOutcome> {
        let targets = session.read_words(self.assignment, self.n as usize)?;
        trace_event!("parallel_converged", passes = passes);
        Ok(ParallelOutcome {
            assignment: Assignment::from_targets(targets)?,
            passes,
        })
    }
}

fn run_used_mask<B: ComputeBackend + ?Sized>(
    session: &mut Session<'_, B>,
    io: &Inputs,
    cap: usize,
) -> MorphResult<ParallelOutcome> {
    let n = io.n;
    let used = session.create(mask_words(n) as usize, BufferUsage::STORAGE, None)?;
    let proposal = session.create(n as usize, BufferUsage::STORAGE, None)?;
    let unowned = vec![UNASSIGNED; n as usize];
    let owner = session.create(n as usize, BufferUsage::STORAGE, Some(unowned.as_slice()))?;

    let propose = [
        io.params,
        io.pixels_a,
        io.pixels_b,
        io.assignment,
        used,
        proposal,
        owner,
    ];
    let commit = [io.params, io.assignment, used, proposal, owner];
    let check = [io.params, used, io.flag];

    for pass in 1..=cap {
        session.dispatch(KernelId::ProposeUnused, &propose, n)?;
        session.dispatch(KernelId::CommitClaims, &commit, n)?;
        if session.check(KernelId::CheckAllUsed, &check, io.flag, n)? {
            return io.finish(session, pass);
        }
        trace_event!("used_mask_pass", pass = pass);
    }
    Err(MorphError::NonConvergence { iterations: cap })
}

fn run_priority_claim<B: ComputeBackend + ?Sized>(
    session: &mut Session<'_, B>,
    io: &Inputs,
    cap: usize,
) -> MorphResult<ParallelOutcome> {
    let n = io.n;
    let lanes = n as usize;
    let excluded = session.create(mask_words(n) as usize, BufferUsage::STORAGE, None)?;
    let locked = session.create(lanes, BufferUsage::STORAGE, None)?;
    let claims = session.create(lanes, BufferUsage::STORAGE | BufferUsage::COPY_DST, None)?;
    let priority = session.create(lanes, BufferUsage::STORAGE, None)?;
    let zeros = vec![0u32; lanes];

    let propose = [
        io.params,
        io.pixels_a,
        io.pixels_b,
        io.assignment,
        excluded,
        locked,
    ];
    let tally = [
        io.params,
        io.pixels_a,
        io.pixels_b,
        io.assignment,
        claims,
        priority,
    ];
    let check = [io.params, claims, io.flag];
    let resolve = [io.params, io.assignment, priority, excluded, locked];

    for pass in 1..=cap {
        session.dispatch(KernelId::ProposeNearest, &propose, n)?;
        session.write(claims, &zeros)?;
        session.dispatch(KernelId::TallyClaims, &tally, n)?;
        if session.check(KernelId::CheckClaims, &check, io.flag, n)? {
            return io.finish(session, pass);
        }
        session.dispatch(KernelId::ResolveClaims, &resolve, n)?;
        trace_event!("priority_claim_pass", pass = pass);
    }
    Err(MorphError::NonConvergence { iterations: cap })
}
