//! Error types for the streaming core

use thiserror::Error;

use crate::geometry::ScalarKind;

/// Main error type for the streaming core
#[derive(Debug, Error)]
pub enum Error {
    /// A stream of the backing buffer cannot satisfy an allocation. The
    /// buffer never grows, so this is fatal for the requesting chunk.
    #[error("out of space in stream `{stream}`: requested {requested} elements")]
    OutOfSpace { stream: String, requested: usize },

    /// A binding was used that is not currently live: double free, or a
    /// binding that was never issued by this allocator.
    #[error("geometry binding {binding} is not live (double free?)")]
    UnknownBinding { binding: u64 },

    /// Write against an attribute name the allocator does not declare.
    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),

    /// Write whose length does not match the binding's region.
    #[error("`{attribute}` write of {got} elements does not match region of {expected}")]
    AttributeMismatch {
        attribute: String,
        expected: usize,
        got: usize,
    },

    /// Write whose scalar type does not match the declared stream type.
    #[error("`{attribute}` expects {expected:?} scalars, got {got:?}")]
    ScalarMismatch {
        attribute: String,
        expected: ScalarKind,
        got: ScalarKind,
    },

    /// An async stage observed cancellation. Expected during chunk disposal
    /// and swallowed by the pipeline, never reported as a failure.
    #[error("aborted by chunk disposal")]
    Aborted,

    /// Mesh generation failed for a reason other than cancellation.
    #[error("mesh generation failed: {0}")]
    Generation(String),

    /// Physics cooking failed for a reason other than cancellation.
    #[error("physics cooking failed: {0}")]
    Cooking(String),
}

impl Error {
    /// Whether this error is an expected cancellation rather than a failure
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}
