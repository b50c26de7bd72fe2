use core::fmt;

use twinref_ptr::ElementPtr;

use crate::block::BlockRef;
use crate::shared::SharedRef;

/// A weak handle: observes a managed object without keeping it alive.
///
/// A `WeakRef` keeps the control block allocated, so it can always tell
/// whether the object still exists. The element pointer it caches is only
/// usable through [`lock`](Self::lock).
///
/// # Examples
///
/// ```
/// use twinref_rc::{SharedRef, WeakRef, make_shared};
///
/// let shared = make_shared(vec![1, 2, 3]);
/// let weak = WeakRef::from(&shared);
///
/// let again = weak.lock();
/// assert_eq!(again.len(), 3);
/// assert_eq!(weak.use_count(), 2);
///
/// drop((shared, again));
/// assert!(weak.expired());
/// ```
pub struct WeakRef<T: ?Sized> {
    pub(crate) block: Option<BlockRef>,
    pub(crate) element: ElementPtr<T>,
}

impl<T: ?Sized> WeakRef<T> {
    /// Creates a weak handle that observes nothing. It is always expired.
    #[inline]
    pub const fn new() -> Self {
        Self {
            block: None,
            element: ElementPtr::null(),
        }
    }

    /// Returns `true` if there is no object to observe anymore, or never was.
    #[inline]
    pub fn expired(&self) -> bool {
        self.block.is_none_or(|block| block.strong_count() == 0)
    }

    /// Tries to obtain a strong handle to the object.
    ///
    /// Returns a null handle if the object has been disposed.
    #[inline]
    pub fn lock(&self) -> SharedRef<T> {
        SharedRef::from(self)
    }

    /// The number of strong handles keeping the object alive.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.block.map_or(0, BlockRef::strong_count)
    }

    /// The number of weak handles observing the object, this one included.
    #[inline]
    pub fn weak_count(&self) -> usize {
        self.block.map_or(0, BlockRef::observer_count)
    }

    /// Stops observing, leaving an empty handle.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Starts observing `shared`'s object instead.
    ///
    /// Nothing is counted when already observing the same block; only the
    /// element pointer is rebound.
    pub fn observe(&mut self, shared: &SharedRef<T>) {
        if self.block == shared.block {
            self.element = shared.element;
        } else {
            *self = Self::from(shared);
        }
    }

    /// Returns `true` if both handles point at the same address.
    #[inline]
    pub fn ptr_eq<U: ?Sized>(&self, other: &WeakRef<U>) -> bool {
        self.element == other.element
    }

    /// Converts the cached element pointer, moving the weak unit without
    /// touching the counts.
    ///
    /// # Safety
    ///
    /// The pointer returned by `f` must satisfy the requirements of
    /// [`SharedRef::aliasing`] for the observed object.
    #[inline]
    pub unsafe fn convert<U: ?Sized>(self, f: impl FnOnce(*mut T) -> *mut U) -> WeakRef<U> {
        let this = core::mem::ManuallyDrop::new(self);
        WeakRef {
            block: this.block,
            element: this.element.cast_with(f),
        }
    }
}

// -----------------------------------------------------------------------------
// Lifecycle

impl<T: ?Sized> Clone for WeakRef<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            block: self.block.map(BlockRef::add_weak),
            element: self.element,
        }
    }

    /// Rebinds to `source`'s block, leaving the counts alone when both
    /// handles already observe it.
    fn clone_from(&mut self, source: &Self) {
        if self.block == source.block {
            self.element = source.element;
        } else {
            *self = source.clone();
        }
    }
}

impl<T: ?Sized> Drop for WeakRef<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            // SAFETY: this handle owned one weak unit.
            unsafe { block.release_weak() }
        }
    }
}

impl<T: ?Sized> Default for WeakRef<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> From<&SharedRef<T>> for WeakRef<T> {
    #[inline]
    fn from(shared: &SharedRef<T>) -> Self {
        Self {
            block: shared.block.map(BlockRef::add_weak),
            element: shared.element,
        }
    }
}

impl<T: ?Sized> fmt::Debug for WeakRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(WeakRef)")
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;
    use alloc::vec;
    use core::cell::{Cell, RefCell};
    use core::fmt::Debug;

    use super::WeakRef;
    use crate::make::make_shared;
    use crate::shared::SharedRef;

    #[test]
    fn empty_weak() {
        let weak = WeakRef::<u32>::new();
        assert!(weak.expired());
        assert_eq!(weak.use_count(), 0);
        assert_eq!(weak.weak_count(), 0);
        assert!(SharedRef::is_null(&weak.lock()));
        assert_eq!(format!("{weak:?}"), "(WeakRef)");
    }

    #[test]
    fn lock_shares_ownership() {
        let shared = make_shared(String::from("alive"));
        let weak = SharedRef::downgrade(&shared);
        assert_eq!(weak.use_count(), 1);

        let locked = weak.lock();
        assert_eq!(weak.use_count(), 2);
        assert!(locked == shared);

        drop(shared);
        assert!(!weak.expired());
        assert_eq!(*locked, "alive");

        drop(locked);
        assert!(weak.expired());
        assert!(SharedRef::is_null(&weak.lock()));
    }

    #[test]
    fn weak_counts() {
        let shared = make_shared(0u8);
        let first = WeakRef::from(&shared);
        let second = first.clone();
        let extra = shared.clone();

        assert_eq!(first.weak_count(), 2);
        assert_eq!(SharedRef::weak_count(&shared), 2);
        assert_eq!(second.use_count(), 2);

        drop((shared, extra));
        assert_eq!(first.weak_count(), 2);

        drop(second);
        assert_eq!(first.weak_count(), 1);
    }

    #[test]
    fn counts_seen_while_disposing() {
        struct Node<'a> {
            this: RefCell<WeakRef<Node<'a>>>,
            seen: &'a Cell<Option<(usize, usize)>>,
        }

        impl Drop for Node<'_> {
            fn drop(&mut self) {
                let this = self.this.borrow();
                self.seen.set(Some((this.weak_count(), this.use_count())));
            }
        }

        let seen = Cell::new(None);
        let node = make_shared(Node {
            this: RefCell::new(WeakRef::new()),
            seen: &seen,
        });
        node.this.borrow_mut().observe(&node);
        let outside = SharedRef::downgrade(&node);
        assert_eq!(outside.weak_count(), 2);

        drop(node);
        assert_eq!(seen.get(), Some((2, 0)));
        assert_eq!(outside.weak_count(), 1);
        assert!(outside.expired());
    }

    #[test]
    fn observe_rebinds() {
        let a = make_shared(1);
        let b = make_shared(2);

        let mut weak = SharedRef::downgrade(&a);
        weak.observe(&a);
        assert_eq!(SharedRef::weak_count(&a), 1);

        weak.observe(&b);
        assert_eq!(SharedRef::weak_count(&a), 0);
        assert_eq!(SharedRef::weak_count(&b), 1);
        assert_eq!(*weak.lock(), 2);

        let mut other = WeakRef::new();
        other.clone_from(&weak);
        assert_eq!(SharedRef::weak_count(&b), 2);
        other.clone_from(&weak);
        assert_eq!(SharedRef::weak_count(&b), 2);

        other.reset();
        assert!(other.expired());
        assert_eq!(SharedRef::weak_count(&b), 1);
    }

    #[test]
    fn convert_keeps_observing() {
        let shared = make_shared(vec![1u8]);
        let weak = SharedRef::downgrade(&shared);
        let erased = unsafe { weak.convert(|p| p as *mut dyn Debug) };

        assert_eq!(SharedRef::weak_count(&shared), 1);
        assert_eq!(format!("{:?}", erased.lock()), "[1]");
        assert!(erased.ptr_eq(&SharedRef::downgrade(&shared)));

        drop(shared);
        assert!(erased.expired());
    }
}
