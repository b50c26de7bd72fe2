//! Errors reported while creating handles.

use core::alloc::Layout;

use thiserror::Error;

// -----------------------------------------------------------------------------
// AllocError

/// A control block could not be allocated.
///
/// When this is returned from an adopting constructor, the adopted object has
/// already been handed to its deleter.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error(
    "failed to allocate a control block of {} bytes (align {})",
    .layout.size(),
    .layout.align()
)]
pub struct AllocError {
    layout: Layout,
}

impl AllocError {
    #[inline]
    pub(crate) const fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// The layout of the block that failed to allocate.
    #[inline]
    pub const fn layout(&self) -> Layout {
        self.layout
    }
}

// -----------------------------------------------------------------------------
// MakeError

/// Failure of [`try_make_shared_with`](crate::try_make_shared_with).
///
/// In both cases the block allocation has been rolled back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MakeError<E> {
    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error("failed to construct the managed value: {0}")]
    Construct(E),
}
