use alloc::boxed::Box;

/// Destroys an object whose ownership was adopted by a [`SharedRef`](crate::SharedRef).
///
/// Every `FnOnce(*mut T)` closure is a deleter.
///
/// # Examples
///
/// ```
/// use core::cell::Cell;
/// use twinref_rc::SharedRef;
///
/// let deleted = Cell::new(false);
/// let raw = Box::into_raw(Box::new(3u8));
///
/// let shared = unsafe {
///     SharedRef::from_raw_with(raw, |ptr: *mut u8| {
///         deleted.set(true);
///         drop(unsafe { Box::from_raw(ptr) });
///     })
/// };
///
/// drop(shared);
/// assert!(deleted.get());
/// ```
pub trait Deleter<T: ?Sized> {
    /// Destroys the object at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be the pointer that was adopted together with this deleter,
    /// and nothing may use the object afterwards.
    unsafe fn delete(self, ptr: *mut T);
}

impl<T: ?Sized, F: FnOnce(*mut T)> Deleter<T> for F {
    #[inline]
    unsafe fn delete(self, ptr: *mut T) {
        self(ptr);
    }
}

/// Deleter for pointers produced by [`Box::into_raw`].
///
/// Null pointers are ignored.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    #[inline]
    unsafe fn delete(self, ptr: *mut T) {
        if !ptr.is_null() {
            // SAFETY: adopted pointers for `DefaultDelete` come from `Box::into_raw`.
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}
