use alloc::alloc as malloc;
use alloc::boxed::Box;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop};
use core::ops::Deref;

use twinref_ptr::ElementPtr;

use crate::block::{BlockRef, ExternalBlock};
use crate::deleter::{DefaultDelete, Deleter};
use crate::error::AllocError;
use crate::weak::WeakRef;

// -----------------------------------------------------------------------------
// SharedRef

/// A strong handle: shares ownership of a managed object.
///
/// A `SharedRef` is a pair of a control block (which decides how long the
/// object lives) and an element pointer (what the handle exposes). The two
/// usually describe the same object, but an *aliasing* handle keeps one object
/// alive while exposing another, typically a field of it.
///
/// Like `Rc`, `SharedRef` dereferences to its element, so its own operations
/// are associated functions: `SharedRef::use_count(&s)` rather than
/// `s.use_count()`.
///
/// # Null handles
///
/// A null handle has no element. [`SharedRef::get`] returns `None` for it and
/// dereferencing it panics.
///
/// # Examples
///
/// ```
/// use twinref_rc::{SharedRef, make_shared};
///
/// let a = make_shared(String::from("shared"));
/// let b = a.clone();
///
/// assert_eq!(SharedRef::use_count(&a), 2);
/// assert_eq!(*b, "shared");
/// assert!(a == b);
///
/// drop(a);
/// assert_eq!(SharedRef::use_count(&b), 1);
/// ```
pub struct SharedRef<T: ?Sized> {
    pub(crate) block: Option<BlockRef>,
    pub(crate) element: ElementPtr<T>,
    _marker: PhantomData<T>,
}

impl<T: ?Sized> SharedRef<T> {
    /// Creates a null handle, which owns nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use twinref_rc::SharedRef;
    ///
    /// let null = SharedRef::<str>::null();
    /// assert!(SharedRef::is_null(&null));
    /// assert_eq!(SharedRef::use_count(&null), 0);
    /// ```
    #[inline]
    pub const fn null() -> Self {
        Self {
            block: None,
            element: ElementPtr::null(),
            _marker: PhantomData,
        }
    }

    /// Assembles a handle from parts.
    ///
    /// # Safety
    ///
    /// The caller transfers one strong unit on `block` (if any) to the handle,
    /// and `element` must stay valid while the block's object is alive.
    #[inline]
    pub(crate) const unsafe fn from_parts(block: Option<BlockRef>, element: ElementPtr<T>) -> Self {
        Self {
            block,
            element,
            _marker: PhantomData,
        }
    }

    /// Disassembles the handle without touching the counts.
    #[inline]
    fn into_parts(this: Self) -> (Option<BlockRef>, ElementPtr<T>) {
        let this = ManuallyDrop::new(this);
        (this.block, this.element)
    }

    // -------------------------------------------------------------------------
    // Adoption

    /// Takes ownership of an object produced by [`Box::into_raw`].
    ///
    /// A null `ptr` is allowed: the result owns a block but has no element.
    /// Calls [`handle_alloc_error`](malloc::handle_alloc_error) if the control
    /// block cannot be allocated, after the object has been dropped.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from `Box::into_raw`, and nothing else may
    /// free it.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { Self::from_raw_with(ptr, DefaultDelete) }
    }

    /// Takes ownership of `ptr`, destroying it with `deleter` once the last
    /// strong handle is gone.
    ///
    /// If the control block cannot be allocated, `deleter` runs on `ptr` and
    /// then [`handle_alloc_error`](malloc::handle_alloc_error) is called.
    ///
    /// # Safety
    ///
    /// Passing `ptr` to `deleter` once must be sound, `ptr` must stay valid
    /// until then, and nothing else may destroy the object.
    ///
    /// The block stores `deleter`, but `D` is not part of the handle's type.
    /// The deleter and everything it borrows must therefore stay valid until
    /// the last strong handle sharing the block is released, even though the
    /// borrow checker does not enforce it.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::cell::Cell;
    /// use twinref_rc::SharedRef;
    ///
    /// let mut slot = 7u32;
    /// let released = Cell::new(0);
    ///
    /// let shared = unsafe {
    ///     SharedRef::from_raw_with(&raw mut slot, |_: *mut u32| released.set(released.get() + 1))
    /// };
    /// assert_eq!(*shared, 7);
    ///
    /// drop(shared);
    /// assert_eq!(released.get(), 1);
    /// ```
    pub unsafe fn from_raw_with<D: Deleter<T>>(ptr: *mut T, deleter: D) -> Self {
        // SAFETY: forwarded to the caller.
        match unsafe { Self::try_from_raw_with(ptr, deleter) } {
            Ok(this) => this,
            Err(err) => malloc::handle_alloc_error(err.layout()),
        }
    }

    /// Fallible version of [`from_raw`](Self::from_raw).
    ///
    /// # Safety
    ///
    /// Same as [`from_raw`](Self::from_raw).
    #[inline]
    pub unsafe fn try_from_raw(ptr: *mut T) -> Result<Self, AllocError> {
        // SAFETY: forwarded to the caller.
        unsafe { Self::try_from_raw_with(ptr, DefaultDelete) }
    }

    /// Fallible version of [`from_raw_with`](Self::from_raw_with).
    ///
    /// On error the object has already been passed to `deleter`; the caller
    /// must not use `ptr` again.
    ///
    /// # Safety
    ///
    /// Same as [`from_raw_with`](Self::from_raw_with). In particular
    /// `deleter`, and anything it borrows, must outlive every strong handle
    /// sharing the new block.
    pub unsafe fn try_from_raw_with<D: Deleter<T>>(
        ptr: *mut T,
        deleter: D,
    ) -> Result<Self, AllocError> {
        // SAFETY: forwarded to the caller.
        let block = unsafe { ExternalBlock::adopt(ptr, deleter) }?;
        // SAFETY: `adopt` hands over the block's initial strong unit.
        Ok(unsafe { Self::from_parts(Some(block), ElementPtr::new(ptr)) })
    }

    // -------------------------------------------------------------------------
    // Aliasing and conversion

    /// Shares ownership with `master` while exposing `element`.
    ///
    /// The result keeps `master`'s object alive, whatever `element` points at.
    /// If `master` owns no block, neither does the result.
    ///
    /// # Safety
    ///
    /// `element` must be null or valid for shared access for as long as
    /// `master`'s object is alive, and must not be mutated during that time
    /// except through interior mutability.
    ///
    /// # Examples
    ///
    /// ```
    /// use twinref_rc::{SharedRef, make_shared};
    ///
    /// struct Node {
    ///     id: u32,
    ///     label: String,
    /// }
    ///
    /// let node = make_shared(Node { id: 3, label: "root".into() });
    /// let field = &node.label as *const String as *mut String;
    /// let label = unsafe { SharedRef::aliasing(&node, field) };
    /// assert_eq!(node.id, 3);
    ///
    /// drop(node);
    /// assert_eq!(*label, "root");
    /// assert_eq!(SharedRef::use_count(&label), 1);
    /// ```
    #[inline]
    pub unsafe fn aliasing<U: ?Sized>(master: &SharedRef<U>, element: *mut T) -> Self {
        let block = master.block.map(BlockRef::add_strong);
        // SAFETY: `add_strong` acquired the unit the new handle owns.
        unsafe { Self::from_parts(block, ElementPtr::new(element)) }
    }

    /// Converts the element pointer, moving ownership without touching the
    /// counts.
    ///
    /// `f` only runs for a non-null element. For conversions that can be
    /// written on references, [`SharedRef::map`] is the safe alternative.
    ///
    /// # Safety
    ///
    /// The pointer returned by `f` must satisfy the requirements of
    /// [`aliasing`](Self::aliasing) for this handle's object.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::fmt::Display;
    /// use twinref_rc::{SharedRef, make_shared};
    ///
    /// let number = make_shared(42u16);
    /// let shown = unsafe { SharedRef::convert(number, |p| p as *mut dyn Display) };
    ///
    /// assert_eq!(shown.to_string(), "42");
    /// ```
    #[inline]
    pub unsafe fn convert<U: ?Sized>(this: Self, f: impl FnOnce(*mut T) -> *mut U) -> SharedRef<U> {
        let (block, element) = Self::into_parts(this);
        // SAFETY: the strong unit moves over; the caller vouches for the pointer.
        unsafe { SharedRef::from_parts(block, element.cast_with(f)) }
    }

    /// Moves the handle out, leaving a null handle behind.
    ///
    /// The counts do not change.
    #[inline]
    pub fn take(this: &mut Self) -> Self {
        mem::take(this)
    }

    // -------------------------------------------------------------------------
    // Reset

    /// Releases ownership and leaves the handle null.
    ///
    /// If this was the last strong handle, the object is disposed before this
    /// returns.
    #[inline]
    pub fn reset(this: &mut Self) {
        drop(Self::take(this));
    }

    /// Releases ownership, then adopts `ptr` like [`from_raw`](Self::from_raw).
    ///
    /// # Safety
    ///
    /// Same as [`from_raw`](Self::from_raw).
    #[inline]
    pub unsafe fn reset_raw(this: &mut Self, ptr: *mut T) {
        // SAFETY: forwarded to the caller.
        unsafe { Self::reset_raw_with(this, ptr, DefaultDelete) }
    }

    /// Releases ownership, then adopts `ptr` like
    /// [`from_raw_with`](Self::from_raw_with).
    ///
    /// # Safety
    ///
    /// Same as [`from_raw_with`](Self::from_raw_with), including that
    /// `deleter` and anything it borrows outlive every strong handle sharing
    /// the new block.
    pub unsafe fn reset_raw_with<D: Deleter<T>>(this: &mut Self, ptr: *mut T, deleter: D) {
        Self::reset(this);
        // SAFETY: forwarded to the caller.
        *this = unsafe { Self::from_raw_with(ptr, deleter) };
    }

    /// Fallible version of [`reset_raw_with`](Self::reset_raw_with).
    ///
    /// The previous ownership is released either way. On error the handle is
    /// null and `ptr` has already been passed to `deleter`.
    ///
    /// # Safety
    ///
    /// Same as [`from_raw_with`](Self::from_raw_with), including that
    /// `deleter` and anything it borrows outlive every strong handle sharing
    /// the new block.
    pub unsafe fn try_reset_raw_with<D: Deleter<T>>(
        this: &mut Self,
        ptr: *mut T,
        deleter: D,
    ) -> Result<(), AllocError> {
        Self::reset(this);
        // SAFETY: forwarded to the caller.
        *this = unsafe { Self::try_from_raw_with(ptr, deleter) }?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Observers

    /// Returns the element, or `None` for a null handle.
    #[inline]
    pub fn get(this: &Self) -> Option<&T> {
        // SAFETY: a non-null element is valid while this handle keeps the
        // object alive.
        unsafe { this.element.as_ref() }
    }

    /// Returns the element without checking for null.
    ///
    /// # Safety
    ///
    /// The handle must not be null.
    #[inline(always)]
    pub unsafe fn get_unchecked(this: &Self) -> &T {
        // SAFETY: the caller guarantees the handle is not null.
        unsafe { Self::get(this).unwrap_unchecked() }
    }

    /// The raw element pointer.
    #[inline(always)]
    pub fn as_element(this: &Self) -> ElementPtr<T> {
        this.element
    }

    /// Returns `true` if the handle exposes no element.
    ///
    /// A handle may own a block and still be null, e.g. after adopting a null
    /// pointer.
    #[inline(always)]
    pub fn is_null(this: &Self) -> bool {
        this.element.is_null()
    }

    /// The number of strong handles sharing this handle's block, `0` if it
    /// has none.
    #[inline]
    pub fn use_count(this: &Self) -> usize {
        this.block.map_or(0, BlockRef::strong_count)
    }

    /// The number of [`WeakRef`]s observing this handle's block.
    #[inline]
    pub fn weak_count(this: &Self) -> usize {
        this.block.map_or(0, BlockRef::observer_count)
    }

    /// Returns `true` if both handles expose the same address.
    ///
    /// This is what `==` compares as well.
    #[inline]
    pub fn ptr_eq<U: ?Sized>(this: &Self, other: &SharedRef<U>) -> bool {
        this.element == other.element
    }

    /// Returns `true` if both handles share the same control block, whatever
    /// elements they expose.
    #[inline]
    pub fn same_block<U: ?Sized>(this: &Self, other: &SharedRef<U>) -> bool {
        this.block.is_some() && this.block == other.block
    }

    /// Creates a [`WeakRef`] observing this handle's object.
    #[inline]
    pub fn downgrade(this: &Self) -> WeakRef<T> {
        WeakRef::from(this)
    }
}

impl<T: ?Sized + 'static> SharedRef<T> {
    /// Shares ownership while exposing a part of the element.
    ///
    /// The safe counterpart of [`aliasing`](Self::aliasing): the projected
    /// reference is derived from the element, so it lives exactly as long as
    /// the object. A null handle projects to a null handle that still shares
    /// the block.
    ///
    /// # Examples
    ///
    /// ```
    /// use twinref_rc::{SharedRef, make_shared};
    ///
    /// let pair = make_shared((1u8, String::from("two")));
    /// let second = SharedRef::project(&pair, |p| &p.1);
    ///
    /// assert_eq!(SharedRef::use_count(&pair), 2);
    /// drop(pair);
    /// assert_eq!(*second, "two");
    /// ```
    #[inline]
    pub fn project<U: ?Sized>(this: &Self, f: impl FnOnce(&T) -> &U) -> SharedRef<U> {
        let element = match Self::get(this) {
            Some(value) => ElementPtr::from_ref(f(value)),
            None => ElementPtr::null(),
        };
        // SAFETY: `add_strong` acquired the unit, and `element` points into the object.
        unsafe { SharedRef::from_parts(this.block.map(BlockRef::add_strong), element) }
    }

    /// Converts the element by reference, moving ownership without touching
    /// the counts.
    ///
    /// # Examples
    ///
    /// ```
    /// use core::fmt::Debug;
    /// use twinref_rc::{SharedRef, make_shared};
    ///
    /// fn as_debug(v: &Vec<u8>) -> &(dyn Debug + 'static) {
    ///     v
    /// }
    ///
    /// let bytes = make_shared(vec![1u8, 2]);
    /// let debug = SharedRef::map(bytes, as_debug);
    ///
    /// assert_eq!(format!("{debug:?}"), "[1, 2]");
    /// ```
    #[inline]
    pub fn map<U: ?Sized>(this: Self, f: impl FnOnce(&T) -> &U) -> SharedRef<U> {
        let element = match Self::get(&this) {
            Some(value) => ElementPtr::from_ref(f(value)),
            None => ElementPtr::null(),
        };
        let (block, _) = Self::into_parts(this);
        // SAFETY: the strong unit moves over, and `element` points into the object.
        unsafe { SharedRef::from_parts(block, element) }
    }
}

impl<T> SharedRef<T> {
    /// Accesses the `index`-th `T` of an array whose first element this handle
    /// exposes.
    ///
    /// # Safety
    ///
    /// The handle must not be null, and `index` must be in-bounds of the array
    /// the element belongs to.
    ///
    /// # Examples
    ///
    /// ```
    /// use twinref_rc::SharedRef;
    ///
    /// let raw = Box::into_raw(vec![1u32, 2, 3].into_boxed_slice());
    /// let first = unsafe {
    ///     SharedRef::from_raw_with(raw.cast::<u32>(), move |_: *mut u32| {
    ///         drop(Box::from_raw(raw));
    ///     })
    /// };
    ///
    /// assert_eq!(unsafe { *SharedRef::index_unchecked(&first, 2) }, 3);
    /// ```
    #[cfg_attr(debug_assertions, track_caller)]
    #[inline]
    pub unsafe fn index_unchecked(this: &Self, index: usize) -> &T {
        // SAFETY: forwarded to the caller.
        unsafe { this.element.index_unchecked(index) }
    }
}

// -----------------------------------------------------------------------------
// Lifecycle

impl<T: ?Sized> Clone for SharedRef<T> {
    #[inline]
    fn clone(&self) -> Self {
        let block = self.block.map(BlockRef::add_strong);
        // SAFETY: `add_strong` acquired the unit the clone owns.
        unsafe { Self::from_parts(block, self.element) }
    }

    /// Rebinds to `source`'s block, leaving the counts alone when both
    /// handles already share it.
    fn clone_from(&mut self, source: &Self) {
        if self.block == source.block {
            self.element = source.element;
        } else {
            *self = source.clone();
        }
    }
}

impl<T: ?Sized> Drop for SharedRef<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            // SAFETY: this handle owned one strong unit.
            unsafe { block.release_strong() }
        }
    }
}

impl<T: ?Sized> Default for SharedRef<T> {
    #[inline]
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> From<Box<T>> for SharedRef<T> {
    /// Adopts a boxed value, which keeps its separate allocation.
    #[inline]
    fn from(value: Box<T>) -> Self {
        // SAFETY: straight from `Box::into_raw`.
        unsafe { Self::from_raw(Box::into_raw(value)) }
    }
}

impl<T: ?Sized> From<&WeakRef<T>> for SharedRef<T> {
    /// Promotes a weak handle, yielding a null handle if it has expired.
    #[inline]
    fn from(weak: &WeakRef<T>) -> Self {
        match weak.block.and_then(BlockRef::try_add_strong) {
            // SAFETY: `try_add_strong` acquired the unit; the object is alive.
            Some(block) => unsafe { Self::from_parts(Some(block), weak.element) },
            None => Self::null(),
        }
    }
}

// -----------------------------------------------------------------------------
// Access

impl<T: ?Sized> Deref for SharedRef<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is null.
    #[inline]
    #[track_caller]
    fn deref(&self) -> &T {
        match Self::get(self) {
            Some(value) => value,
            None => null_deref(),
        }
    }
}

#[cold]
#[track_caller]
fn null_deref() -> ! {
    panic!("dereferenced a null `SharedRef`")
}

impl<T: ?Sized> AsRef<T> for SharedRef<T> {
    #[inline]
    fn as_ref(&self) -> &T {
        self
    }
}

// -----------------------------------------------------------------------------
// Comparison

impl<T: ?Sized, U: ?Sized> PartialEq<SharedRef<U>> for SharedRef<T> {
    /// Handles are equal when they expose the same address.
    #[inline]
    fn eq(&self, other: &SharedRef<U>) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Eq for SharedRef<T> {}

impl<T: ?Sized> Hash for SharedRef<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.element.hash(state);
    }
}

// -----------------------------------------------------------------------------
// Formatting

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for SharedRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for SharedRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.element, f)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::format;
    use alloc::string::{String, ToString};
    use core::cell::{Cell, RefCell};
    use core::ptr;

    use super::SharedRef;
    use crate::deleter::DefaultDelete;
    use crate::make::make_shared;
    use crate::probe::{self, Event, Tracked};
    use crate::weak::WeakRef;

    fn block_addr<T: ?Sized>(shared: &SharedRef<T>) -> usize {
        shared.block.map_or(0, |block| block.addr())
    }

    #[test]
    fn counts_follow_clones() {
        let drops = Cell::new(0);
        let a = make_shared(Tracked(&drops));
        let b = a.clone();
        let c = b.clone();
        assert_eq!(SharedRef::use_count(&a), 3);
        assert_eq!(SharedRef::weak_count(&a), 0);

        drop(b);
        assert_eq!(SharedRef::use_count(&c), 2);

        drop(a);
        assert_eq!(drops.get(), 0);
        drop(c);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn weak_expires_after_reset() {
        let mut owner = make_shared(5);
        let weak = SharedRef::downgrade(&owner);
        assert!(!weak.expired());
        assert_eq!(SharedRef::weak_count(&owner), 1);

        SharedRef::reset(&mut owner);
        assert!(SharedRef::is_null(&owner));
        assert_eq!(SharedRef::use_count(&owner), 0);

        assert!(weak.expired());
        assert_eq!(weak.use_count(), 0);
        assert!(SharedRef::is_null(&weak.lock()));
    }

    #[test]
    fn adopted_object_behind_trait_object() {
        trait Shape {
            fn area(&self) -> u32;
        }

        struct Square(u32);

        impl Shape for Square {
            fn area(&self) -> u32 {
                self.0 * self.0
            }
        }

        let deleted = Cell::new(None);
        let raw = Box::into_raw(Box::new(Square(4)));
        let deleter = |ptr: *mut Square| {
            deleted.set(Some(ptr.addr()));
            // SAFETY: `raw` came from `Box::into_raw`.
            drop(unsafe { Box::from_raw(ptr) });
        };

        let square = unsafe { SharedRef::from_raw_with(raw, deleter) };
        let shape: SharedRef<dyn Shape> =
            unsafe { SharedRef::convert(square, |p| p as *mut dyn Shape) };
        assert_eq!(shape.area(), 16);
        assert_eq!(SharedRef::use_count(&shape), 1);

        let other = shape.clone();
        assert!(shape == other);
        drop(shape);
        assert_eq!(deleted.get(), None);

        drop(other);
        assert_eq!(deleted.get(), Some(raw.addr()));
    }

    #[test]
    fn block_outlives_object_while_observed() {
        let shared = make_shared(String::from("observed"));
        let addr = block_addr(&shared);
        let weak = SharedRef::downgrade(&shared);

        drop(shared);
        assert_eq!(probe::events_for(addr), [Event::Disposed(addr)]);

        drop(weak);
        assert_eq!(probe::events_for(addr), [Event::Freed(addr)]);
    }

    #[test]
    fn unobserved_block_is_freed_with_object() {
        let shared = make_shared(1u8);
        let addr = block_addr(&shared);

        drop(shared);
        assert_eq!(
            probe::events_for(addr),
            [Event::Disposed(addr), Event::Freed(addr)]
        );
    }

    #[test]
    fn object_observing_itself() {
        struct Node {
            this: RefCell<WeakRef<Node>>,
        }

        let node = make_shared(Node {
            this: RefCell::new(WeakRef::new()),
        });
        node.this.borrow_mut().observe(&node);
        assert_eq!(SharedRef::weak_count(&node), 1);
        assert!(node.this.borrow().lock() == node);

        let addr = block_addr(&node);
        drop(node);
        assert_eq!(
            probe::events_for(addr),
            [Event::Disposed(addr), Event::Freed(addr)]
        );
    }

    #[test]
    fn aliasing_keeps_owner_alive() {
        let drops = Cell::new(0);
        let pair = make_shared((Tracked(&drops), 9u32));
        let field = &pair.1 as *const u32 as *mut u32;
        let second = unsafe { SharedRef::aliasing(&pair, field) };

        assert!(SharedRef::same_block(&pair, &second));
        assert_eq!(SharedRef::use_count(&pair), 2);

        drop(pair);
        assert_eq!(drops.get(), 0);
        assert_eq!(*second, 9);

        drop(second);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn aliasing_an_empty_handle() {
        let mut local = 4u32;
        let null = SharedRef::<u8>::null();
        let alias = unsafe { SharedRef::aliasing(&null, &raw mut local) };

        assert!(!SharedRef::is_null(&alias));
        assert_eq!(SharedRef::use_count(&alias), 0);
        assert!(!SharedRef::same_block(&alias, &null));
    }

    #[test]
    fn projection() {
        #[repr(C)]
        struct Record {
            tag: u32,
            name: String,
        }

        let record = make_shared(Record {
            tag: 1,
            name: "record".into(),
        });
        let tag = SharedRef::project(&record, |r| &r.tag);
        let name = SharedRef::project(&record, |r| &r.name);

        assert!(record == tag);
        assert!(record != name);
        assert_eq!(SharedRef::use_count(&record), 3);

        drop(record);
        assert_eq!(*tag, 1);
        assert_eq!(*name, "record");

        let text = SharedRef::map(name, |s| s.as_str());
        assert_eq!(&*text, "record");
        assert_eq!(SharedRef::use_count(&tag), 2);
    }

    #[test]
    fn take_moves_ownership() {
        let mut a = make_shared(3);
        let b = a.clone();

        let moved = SharedRef::take(&mut a);
        assert!(SharedRef::is_null(&a));
        assert_eq!(SharedRef::use_count(&a), 0);
        assert_eq!(SharedRef::use_count(&moved), 2);
        assert!(moved == b);
    }

    #[test]
    fn clone_from_same_block() {
        let a = make_shared(1);
        let mut b = a.clone();

        b.clone_from(&a);
        assert_eq!(SharedRef::use_count(&a), 2);

        let other = make_shared(2);
        b.clone_from(&other);
        assert_eq!(SharedRef::use_count(&a), 1);
        assert_eq!(SharedRef::use_count(&other), 2);
        assert_eq!(*b, 2);
    }

    #[test]
    fn adopting_null() {
        let shared = unsafe { SharedRef::<u8>::from_raw(ptr::null_mut()) };

        assert!(SharedRef::is_null(&shared));
        assert!(SharedRef::get(&shared).is_none());
        assert_eq!(SharedRef::use_count(&shared), 1);
    }

    #[test]
    fn deleter_borrows_until_last_strong_handle() {
        let hits = Cell::new(0);
        let mut value = 1u32;

        let first = unsafe {
            SharedRef::from_raw_with(&raw mut value, |_: *mut u32| hits.set(hits.get() + 1))
        };
        let second = first.clone();
        let weak = SharedRef::downgrade(&second);

        drop(first);
        assert_eq!(hits.get(), 0);
        drop(second);
        assert_eq!(hits.get(), 1);

        drop(weak);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn failed_adoption_runs_deleter() {
        let deleted = Cell::new(0);
        let mut value = 5u32;

        probe::fail_next_alloc();
        let result = unsafe {
            SharedRef::try_from_raw_with(&raw mut value, |_: *mut u32| {
                deleted.set(deleted.get() + 1);
            })
        };

        let err = result.unwrap_err();
        assert!(err.layout().size() > 0);
        assert_eq!(deleted.get(), 1);
    }

    #[test]
    fn failed_reset_leaves_null() {
        let drops = Cell::new(0);
        let mut owner = make_shared(Tracked(&drops));
        let raw = Box::into_raw(Box::new(Tracked(&drops)));

        probe::fail_next_alloc();
        let result = unsafe { SharedRef::try_reset_raw_with(&mut owner, raw, DefaultDelete) };

        assert!(result.is_err());
        assert!(SharedRef::is_null(&owner));
        assert_eq!(SharedRef::use_count(&owner), 0);
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn reset_adopts_new_object() {
        let mut handle = make_shared(1u32);
        let old = SharedRef::downgrade(&handle);

        unsafe { SharedRef::reset_raw(&mut handle, Box::into_raw(Box::new(2u32))) };
        assert!(old.expired());
        assert_eq!(*handle, 2);
        assert_eq!(SharedRef::use_count(&handle), 1);
    }

    #[test]
    #[should_panic(expected = "null `SharedRef`")]
    fn deref_null() {
        let null = SharedRef::<u32>::null();
        let _value = *null;
    }

    #[test]
    fn equality_and_hashing() {
        use std::collections::HashSet;

        let a = make_shared(1u32);
        let b = make_shared(1u32);
        assert!(a == a.clone());
        assert!(a != b);
        assert!(SharedRef::<u8>::null() == SharedRef::<str>::null());

        let set: HashSet<_> = [a.clone(), a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }

    #[test]
    fn from_box() {
        let text = SharedRef::<str>::from(Box::<str>::from("boxed"));
        assert_eq!(&*text, "boxed");
        assert_eq!(SharedRef::use_count(&text), 1);

        let number = SharedRef::from(Box::new(8u64));
        assert_eq!(*number, 8);
    }

    #[test]
    fn formatting() {
        let value = make_shared(3);
        assert_eq!(format!("{value:?}"), "3");
        assert_eq!(value.to_string(), "3");

        let null = SharedRef::<i32>::null();
        assert_eq!(format!("{null:?}"), "null");
        assert_eq!(null.to_string(), "null");
    }
}
