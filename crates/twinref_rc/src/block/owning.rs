use core::ptr::NonNull;

use twinref_ptr::InlineSlot;

use super::{BlockRef, ControlBlock, Header, RawBlock};
use crate::error::MakeError;

/// A control block that stores the managed object inline.
///
/// Disposal runs the object's destructor in place; the storage stays part of
/// the block until the block itself is freed.
#[repr(C)]
pub(crate) struct OwningBlock<T> {
    header: Header,
    slot: InlineSlot<T>,
}

// SAFETY: `#[repr(C)]` with the header first; the slot never drops its value.
unsafe impl<T> ControlBlock for OwningBlock<T> {
    unsafe fn dispose(&self) {
        // SAFETY: the slot was filled in `try_new_with` and is disposed only once.
        unsafe { self.slot.drop_in_place() }
    }
}

impl<T> OwningBlock<T> {
    /// Allocates a block, then constructs the object with `f` straight into it.
    ///
    /// The allocation is rolled back if `f` fails or panics. On success the
    /// returned handle owns one strong unit, and the pointer addresses the
    /// embedded object.
    pub(crate) fn try_new_with<E>(
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<(BlockRef, NonNull<T>), MakeError<E>> {
        let raw = RawBlock::<Self>::allocate()?;
        let value = f().map_err(MakeError::Construct)?;

        let (block, ptr) = raw.init(Self {
            header: Header::new::<Self>(),
            slot: InlineSlot::uninit(),
        });
        // SAFETY: the block was just created, so the slot is empty and unshared.
        let object = unsafe { ptr.as_ref().slot.write(value) };

        Ok((block, object))
    }
}
