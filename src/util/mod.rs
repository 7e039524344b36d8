//! Shared utility helpers.

pub mod error;

pub use error::{BackendError, BackendResult, MorphError, MorphResult};
