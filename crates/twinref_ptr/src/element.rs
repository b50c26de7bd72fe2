use core::fmt;
use core::hash::{Hash, Hasher};
use core::ptr::{self, NonNull};

/// A nullable pointer to the element exposed by a handle.
///
/// Equality and hashing look at the address only, so two pointers of
/// different pointee types are equal when they point at the same byte, and
/// the metadata of wide pointers is ignored.
///
/// # Examples
///
/// ```
/// use twinref_ptr::ElementPtr;
///
/// let x = [10u32, 20, 30];
///
/// let whole = ElementPtr::from_ref(&x);
/// let first = ElementPtr::new(x.as_ptr().cast_mut());
///
/// assert!(whole == first);
/// assert_eq!(unsafe { *first.index_unchecked(2) }, 30);
/// ```
#[repr(transparent)]
pub struct ElementPtr<T: ?Sized>(Option<NonNull<T>>);

impl<T: ?Sized> ElementPtr<T> {
    /// The null element pointer.
    #[inline(always)]
    pub const fn null() -> Self {
        Self(None)
    }

    /// Create a new `ElementPtr`, which is null if `ptr` is null.
    ///
    /// # Examples
    ///
    /// ```
    /// use twinref_ptr::ElementPtr;
    ///
    /// let mut x = 0u32;
    /// assert!(!ElementPtr::new(&raw mut x).is_null());
    /// assert!(ElementPtr::new(core::ptr::null_mut::<u32>()).is_null());
    /// ```
    #[inline]
    pub const fn new(ptr: *mut T) -> Self {
        Self(NonNull::new(ptr))
    }

    /// Wraps a pointer that is known to be non-null.
    #[inline(always)]
    pub const fn from_non_null(ptr: NonNull<T>) -> Self {
        Self(Some(ptr))
    }

    /// Converts a reference to an `ElementPtr`.
    #[inline(always)]
    pub fn from_ref(r: &T) -> Self {
        Self(Some(NonNull::from(r)))
    }

    /// Returns `true` if the pointer is null.
    #[inline(always)]
    pub const fn is_null(self) -> bool {
        self.0.is_none()
    }

    /// Acquires the underlying `NonNull`, if any.
    #[inline(always)]
    pub const fn as_non_null(self) -> Option<NonNull<T>> {
        self.0
    }

    /// The address of the pointee, `0` when null.
    #[inline]
    pub fn addr(self) -> usize {
        match self.0 {
            Some(ptr) => ptr.cast::<u8>().as_ptr().addr(),
            None => 0,
        }
    }

    /// Returns a shared reference to the pointee, or `None` when null.
    ///
    /// # Safety
    ///
    /// When non-null, the pointer must be
    /// [convertible to a reference](https://doc.rust-lang.org/stable/core/ptr/index.html#pointer-to-reference-conversion)
    /// for the whole lifetime `'a`.
    #[inline(always)]
    pub const unsafe fn as_ref<'a>(self) -> Option<&'a T> {
        match self.0 {
            // SAFETY: See `NonNull::as_ref`
            Some(ptr) => Some(unsafe { ptr.as_ref() }),
            None => None,
        }
    }

    /// Maps the pointer to another pointee type, keeping null as null.
    ///
    /// `f` is only called for non-null pointers. Nothing is dereferenced, so
    /// this is safe; whether the result may be dereferenced is up to `f`.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::fmt::Debug;
    /// use twinref_ptr::ElementPtr;
    ///
    /// let x = 7i32;
    /// let ptr = ElementPtr::from_ref(&x);
    ///
    /// let erased = ptr.cast_with(|p| p as *mut dyn Debug);
    /// assert!(erased == ptr);
    /// ```
    #[inline]
    pub fn cast_with<U: ?Sized>(self, f: impl FnOnce(*mut T) -> *mut U) -> ElementPtr<U> {
        match self.0 {
            Some(ptr) => ElementPtr::new(f(ptr.as_ptr())),
            None => ElementPtr::null(),
        }
    }
}

impl<T> ElementPtr<T> {
    /// Indexes forward from the pointee without doing bounds checks.
    ///
    /// This treats the pointer as the start of an array of `T`.
    ///
    /// # Safety
    ///
    /// - The pointer must be non-null.
    /// - `index` must be in-bounds of the array it points into, and that element
    ///   must be valid for reads for the whole lifetime `'a`.
    #[cfg_attr(debug_assertions, track_caller)]
    #[cfg_attr(not(debug_assertions), inline(always))]
    pub unsafe fn index_unchecked<'a>(self, index: usize) -> &'a T {
        debug_assert!(self.0.is_some(), "tried to index through a null element pointer");

        // SAFETY: the caller guarantees a non-null base and an in-bounds index.
        unsafe { &*self.0.unwrap_unchecked().as_ptr().add(index) }
    }
}

impl<T: ?Sized> Clone for ElementPtr<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ElementPtr<T> {}

impl<T: ?Sized> Default for ElementPtr<T> {
    #[inline(always)]
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> From<NonNull<T>> for ElementPtr<T> {
    #[inline(always)]
    fn from(value: NonNull<T>) -> Self {
        Self(Some(value))
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<ElementPtr<U>> for ElementPtr<T> {
    #[inline]
    fn eq(&self, other: &ElementPtr<U>) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for ElementPtr<T> {}

impl<T: ?Sized> Hash for ElementPtr<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl<T: ?Sized> fmt::Pointer for ElementPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = match self.0 {
            Some(ptr) => ptr.cast::<u8>().as_ptr().cast_const(),
            None => ptr::null(),
        };
        fmt::Pointer::fmt(&raw, f)
    }
}

impl<T: ?Sized> fmt::Debug for ElementPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementPtr({:p})", self)
    }
}
