use core::cell::Cell;
use core::mem::ManuallyDrop;

use super::{BlockRef, ControlBlock, Header, RawBlock};
use crate::deleter::Deleter;
use crate::error::AllocError;

// -----------------------------------------------------------------------------
// Adoption

/// An adopted object together with its deleter.
///
/// Deletes the object when dropped, so every exit path that does not hand the
/// pair over to a block still releases it.
struct Adoption<T: ?Sized, D: Deleter<T>> {
    object: *mut T,
    deleter: ManuallyDrop<D>,
}

impl<T: ?Sized, D: Deleter<T>> Adoption<T, D> {
    #[inline]
    fn into_parts(self) -> (*mut T, D) {
        let mut this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the deleter is taken exactly once.
        let deleter = unsafe { ManuallyDrop::take(&mut this.deleter) };
        (this.object, deleter)
    }
}

impl<T: ?Sized, D: Deleter<T>> Drop for Adoption<T, D> {
    fn drop(&mut self) {
        // SAFETY: `drop` runs at most once, and the adoption contract allows
        // passing `object` to the deleter.
        unsafe { ManuallyDrop::take(&mut self.deleter).delete(self.object) }
    }
}

// -----------------------------------------------------------------------------
// ExternalBlock

/// A control block for an object allocated elsewhere.
///
/// Disposal hands the stored pointer to the deleter.
#[repr(C)]
pub(crate) struct ExternalBlock<T: ?Sized, D> {
    header: Header,
    object: *mut T,
    deleter: Cell<Option<D>>,
}

// SAFETY: `#[repr(C)]` with the header first; dropping the block only drops
// the deleter, which is `None` once the object has been disposed.
unsafe impl<T: ?Sized, D: Deleter<T>> ControlBlock for ExternalBlock<T, D> {
    unsafe fn dispose(&self) {
        if let Some(deleter) = self.deleter.take() {
            // SAFETY: the pointer and deleter were adopted together.
            unsafe { deleter.delete(self.object) }
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> ExternalBlock<T, D> {
    /// Creates a block that takes over `object`.
    ///
    /// If the block cannot be allocated, `deleter` is run on `object` before
    /// the error is returned. On success the returned handle owns one strong
    /// unit.
    ///
    /// # Safety
    ///
    /// Passing `object` to `deleter` once must be sound, and nothing else may
    /// destroy the object.
    pub(crate) unsafe fn adopt(object: *mut T, deleter: D) -> Result<BlockRef, AllocError> {
        let adoption = Adoption {
            object,
            deleter: ManuallyDrop::new(deleter),
        };
        let raw = RawBlock::<Self>::allocate()?;

        let (object, deleter) = adoption.into_parts();
        let (block, _) = raw.init(Self {
            header: Header::new::<Self>(),
            object,
            deleter: Cell::new(Some(deleter)),
        });
        Ok(block)
    }
}
