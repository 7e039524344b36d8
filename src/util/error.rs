//! Error types for pixmorph.

use thiserror::Error;

/// Result alias for pixmorph operations.
pub type MorphResult<T> = std::result::Result<T, MorphError>;

/// Result alias for compute backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Errors that can occur while computing or applying an assignment.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MorphError {
    /// The two pixel sets do not contain the same number of samples.
    #[error("pixel set length mismatch: source has {source_len}, target has {target_len}")]
    LengthMismatch {
        source_len: usize,
        target_len: usize,
    },
    /// A container does not hold a whole number of elements of the expected width.
    #[error("buffer of {len} bytes is not a multiple of the {width}-byte element width")]
    ElementWidth { len: usize, width: usize },
    /// The pixel count does not fit the 32-bit index space used by the backend.
    #[error("too many pixels: {count} exceeds the 32-bit index space")]
    TooManyPixels { count: usize },
    /// Image dimensions are zero or overflow.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// The provided buffer is smaller than required by the dimensions.
    #[error("buffer too small: need {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A result array is not a permutation of `[0, N)`.
    #[error("not a permutation: {reason} at index {index}")]
    InvalidPermutation { index: usize, reason: &'static str },
    /// The parallel resolution loop hit its iteration cap.
    #[error("parallel assignment did not converge within {iterations} passes")]
    NonConvergence { iterations: usize },
    /// The compute backend failed or could not be acquired.
    #[error("compute backend: {0}")]
    Backend(#[from] BackendError),
    /// Image decoding or encoding failed.
    #[error("image io error: {reason}")]
    ImageIo { reason: String },
}

impl MorphError {
    /// Returns true when the sequential matcher can take over.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, MorphError::Backend(_))
    }
}

/// Errors reported by a compute backend.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be acquired.
    #[error("backend unavailable: {reason}")]
    Unavailable { reason: String },
    /// The handle does not name a live buffer.
    #[error("unknown buffer handle {handle}")]
    UnknownBuffer { handle: u32 },
    /// The buffer was created without a usage flag the operation needs.
    #[error("buffer {handle} lacks usage `{usage}`")]
    MissingUsage { handle: u32, usage: &'static str },
    /// A byte range falls outside the buffer.
    #[error("range {offset}..{end} out of bounds for buffer of {size} bytes")]
    OutOfBounds { offset: usize, end: usize, size: usize },
    /// Sizes and offsets must be multiples of the 4-byte word size.
    #[error("size or offset {value} is not 4-byte aligned")]
    Misaligned { value: usize },
    /// The bindings do not match the kernel layout.
    #[error("kernel `{kernel}` expects {expected} bindings, got {got}")]
    BindingLayout {
        kernel: &'static str,
        expected: usize,
        got: usize,
    },
    /// The dispatch needs more workgroups than the backend allows.
    #[error("dispatch of {workgroups} workgroups exceeds the limit of {max}")]
    DispatchTooLarge { workgroups: u32, max: u32 },
}
