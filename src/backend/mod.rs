//! Compute backend contract consumed by the parallel matcher.
//!
//! A backend owns word-granular buffers and runs kernels over a range of
//! lanes. Work is issued with [`ComputeBackend::dispatch`] and becomes
//! visible after [`ComputeBackend::await_completion`] or a
//! [`ComputeBackend::read_buffer`], which are the only suspension points the
//! matcher relies on. Nothing inside a dispatch is synchronized: lanes that
//! write the same word race, and the matcher detects the outcome in a later
//! dispatch.

use crate::util::BackendResult;
use std::fmt;
use std::ops::{BitOr, Range};

pub mod host;
pub(crate) mod kernels;

pub use host::{BackendConfig, HostBackend};

/// Opaque handle to a backend buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(u32);

impl BufferHandle {
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the numeric id of the handle.
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Usage flags fixed when a buffer is created.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferUsage(u32);

impl BufferUsage {
    /// Bindable as read-write kernel storage.
    pub const STORAGE: Self = Self(1);
    /// Bindable as a small read-only parameter block.
    pub const UNIFORM: Self = Self(1 << 1);
    /// Readable by the host.
    pub const COPY_SRC: Self = Self(1 << 2);
    /// Writable by the host.
    pub const COPY_DST: Self = Self(1 << 3);

    /// Returns true if every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if the buffer can be bound to a kernel.
    pub fn is_bindable(self) -> bool {
        self.0 & (Self::STORAGE.0 | Self::UNIFORM.0) != 0
    }
}

impl BitOr for BufferUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Per-dispatch limits of a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DispatchLimits {
    /// Lanes per workgroup.
    pub workgroup_size: u32,
    /// Maximum workgroups a single dispatch may launch.
    pub max_workgroups_per_dispatch: u32,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        Self {
            workgroup_size: 64,
            max_workgroups_per_dispatch: 65_535,
        }
    }
}

impl DispatchLimits {
    /// Workgroups needed to cover `lanes` lanes.
    pub fn workgroups_for(&self, lanes: u32) -> u32 {
        lanes.div_ceil(self.workgroup_size.max(1))
    }

    /// Largest lane count a single dispatch can cover.
    pub fn max_lanes_per_dispatch(&self) -> u32 {
        self.workgroup_size
            .max(1)
            .saturating_mul(self.max_workgroups_per_dispatch.max(1))
    }
}

/// Splits `0..total` into ranges that each fit one dispatch.
pub fn lane_chunks(total: u32, limits: DispatchLimits) -> impl Iterator<Item = Range<u32>> {
    let step = limits.max_lanes_per_dispatch();
    (0..total.div_ceil(step)).map(move |k| {
        let start = k * step;
        start..total.min(start.saturating_add(step))
    })
}

/// Kernels a backend must provide, with fixed binding layouts.
///
/// Binding 0 is always a parameter block whose first word is the lane
/// count `N`. The remaining bindings are listed per kernel in
/// [`KernelId::bindings`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum KernelId {
    /// Unassigned lanes pick their nearest unused destination and write
    /// themselves into its owner slot.
    ProposeUnused,
    /// Lanes still owning their proposal commit it and set the used bit.
    CommitClaims,
    /// Clears the solved flag if any destination is unused.
    CheckAllUsed,
    /// Unlocked lanes pick their nearest non-excluded destination.
    ProposeNearest,
    /// Counts proposals per destination and ranks proposers by cost.
    TallyClaims,
    /// Clears the solved flag unless every destination has one claim.
    CheckClaims,
    /// Locks rank-0 lanes and releases the rest.
    ResolveClaims,
}

impl KernelId {
    /// Kernel name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            KernelId::ProposeUnused => "propose_unused",
            KernelId::CommitClaims => "commit_claims",
            KernelId::CheckAllUsed => "check_all_used",
            KernelId::ProposeNearest => "propose_nearest",
            KernelId::TallyClaims => "tally_claims",
            KernelId::CheckClaims => "check_claims",
            KernelId::ResolveClaims => "resolve_claims",
        }
    }

    /// Binding names in slot order.
    pub fn bindings(self) -> &'static [&'static str] {
        match self {
            KernelId::ProposeUnused => &[
                "params", "pixels_a", "pixels_b", "assignment", "used", "proposal", "owner",
            ],
            KernelId::CommitClaims => &["params", "assignment", "used", "proposal", "owner"],
            KernelId::CheckAllUsed => &["params", "used", "flag"],
            KernelId::ProposeNearest => &[
                "params", "pixels_a", "pixels_b", "assignment", "excluded", "locked",
            ],
            KernelId::TallyClaims => &[
                "params", "pixels_a", "pixels_b", "assignment", "claims", "priority",
            ],
            KernelId::CheckClaims => &["params", "claims", "flag"],
            KernelId::ResolveClaims => &["params", "assignment", "priority", "excluded", "locked"],
        }
    }
}

/// Buffer allocation and data-parallel dispatch.
///
/// Sizes and offsets are in bytes and must be multiples of 4. Calls are
/// blocking; `dispatch` and `write_buffer` may be queued, and a backend
/// must apply queued work in issue order before `await_completion` or
/// `read_buffer` return.
pub trait ComputeBackend {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Dispatch limits the caller must respect.
    fn limits(&self) -> DispatchLimits;

    /// Allocates a zero-filled buffer, optionally initialized from `initial`.
    fn create_buffer(
        &mut self,
        byte_size: usize,
        usage: BufferUsage,
        initial: Option<&[u8]>,
    ) -> BackendResult<BufferHandle>;

    /// Writes `data` at `byte_offset`.
    fn write_buffer(
        &mut self,
        handle: BufferHandle,
        byte_offset: usize,
        data: &[u8],
    ) -> BackendResult<()>;

    /// Issues `kernel` over `lanes` with `bindings` in slot order.
    fn dispatch(
        &mut self,
        kernel: KernelId,
        bindings: &[BufferHandle],
        lanes: Range<u32>,
    ) -> BackendResult<()>;

    /// Blocks until all issued work has finished.
    fn await_completion(&mut self) -> BackendResult<()>;

    /// Copies the first `byte_size` bytes of a buffer back to the host.
    fn read_buffer(&mut self, handle: BufferHandle, byte_size: usize) -> BackendResult<Vec<u8>>;

    /// Frees a buffer. The handle is invalid afterwards.
    fn release_buffer(&mut self, handle: BufferHandle) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_chunks_cover_range_without_overlap() {
        let limits = DispatchLimits {
            workgroup_size: 4,
            max_workgroups_per_dispatch: 2,
        };
        let chunks: Vec<_> = lane_chunks(19, limits).collect();
        assert_eq!(chunks, vec![0..8, 8..16, 16..19]);
        for chunk in &chunks {
            assert!(limits.workgroups_for(chunk.len() as u32) <= 2);
        }
    }

    #[test]
    fn lane_chunks_empty_for_zero_lanes() {
        assert_eq!(lane_chunks(0, DispatchLimits::default()).count(), 0);
    }

    #[test]
    fn usage_flags_combine() {
        let usage = BufferUsage::STORAGE | BufferUsage::COPY_SRC;
        assert!(usage.contains(BufferUsage::STORAGE));
        assert!(usage.contains(BufferUsage::COPY_SRC));
        assert!(!usage.contains(BufferUsage::COPY_DST));
        assert!(usage.is_bindable());
        assert!(!BufferUsage::COPY_DST.is_bindable());
    }

    #[test]
    fn workgroups_round_up() {
        let limits = DispatchLimits::default();
        assert_eq!(limits.workgroups_for(0), 0);
        assert_eq!(limits.workgroups_for(1), 1);
        assert_eq!(limits.workgroups_for(64), 1);
        assert_eq!(limits.workgroups_for(65), 2);
    }
}
