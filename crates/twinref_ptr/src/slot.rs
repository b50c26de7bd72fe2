use core::cell::UnsafeCell;
use core::fmt;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

/// Storage for one `T`, embedded in a larger allocation.
///
/// # Ownership
///
/// The slot does **not** track whether it holds a value. Dropping the slot
/// never drops the value; call [`drop_in_place`](Self::drop_in_place)
/// exactly once for every [`write`](Self::write), or the value leaks.
///
/// # Shared mutation
///
/// Writing and dropping go through `&self`, so the slot can sit next to other
/// shared state (such as reference counts) behind a shared reference. The
/// caller is responsible for making sure no reference into the value is alive
/// while it is written or dropped.
///
/// # Examples
///
/// ```
/// use twinref_ptr::InlineSlot;
///
/// let slot = InlineSlot::<String>::uninit();
///
/// let value = unsafe { slot.write("inline".to_string()) };
/// assert_eq!(unsafe { value.as_ref() }, "inline");
///
/// unsafe { slot.drop_in_place() };
/// ```
#[repr(transparent)]
pub struct InlineSlot<T>(UnsafeCell<MaybeUninit<T>>);

impl<T> InlineSlot<T> {
    /// Creates an empty slot.
    #[inline(always)]
    pub const fn uninit() -> Self {
        Self(UnsafeCell::new(MaybeUninit::uninit()))
    }

    /// Gets a pointer to the stored value.
    ///
    /// The pointer is valid to dereference only between a `write` and the
    /// matching `drop_in_place`.
    #[inline(always)]
    pub const fn as_ptr(&self) -> *mut T {
        self.0.get().cast::<T>()
    }

    /// Moves `value` into the slot and returns a pointer to it.
    ///
    /// # Safety
    ///
    /// - The slot must be empty; a previous value is overwritten without being dropped.
    /// - No reference into the slot may be alive.
    #[inline]
    pub unsafe fn write(&self, value: T) -> NonNull<T> {
        // SAFETY: `UnsafeCell::get` is never null and the caller guarantees exclusivity.
        unsafe {
            let ptr = NonNull::new_unchecked(self.as_ptr());
            ptr.write(value);
            ptr
        }
    }

    /// Runs the destructor of the stored value, leaving the slot empty.
    ///
    /// The memory is not freed; it stays allocated as part of whatever
    /// contains the slot.
    ///
    /// # Safety
    ///
    /// - The slot must hold a value written by [`write`](Self::write).
    /// - No reference into the slot may be alive, and none may be created afterwards.
    #[inline]
    pub unsafe fn drop_in_place(&self) {
        // SAFETY: See `ptr::drop_in_place`
        unsafe { self.as_ptr().drop_in_place() }
    }
}

impl<T> fmt::Debug for InlineSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InlineSlot({:p})", self.as_ptr())
    }
}
