//! Control blocks: the bookkeeping shared by every handle to one object.
//!
//! A concrete block is a `#[repr(C)]` struct that starts with a [`Header`].
//! The header carries both counts and a pointer to a per-type [`BlockVTable`],
//! so handles only ever hold a thin, type-erased [`BlockRef`] no matter what
//! element type they expose.

mod external;
mod owning;

pub(crate) use external::ExternalBlock;
pub(crate) use owning::OwningBlock;

use alloc::alloc as malloc;
use core::alloc::Layout;
use core::cell::Cell;
use core::mem;
use core::ptr::NonNull;

use crate::error::AllocError;

// -----------------------------------------------------------------------------
// Tracing

macro_rules! trace_block {
    ($($arg:tt)+) => {
        crate::cfg::debug! { log::trace!($($arg)+); }
    };
}

// -----------------------------------------------------------------------------
// Count overflow

#[cold]
#[inline(never)]
fn count_overflow() -> ! {
    crate::cfg::std! {
        if {
            ::std::eprintln!("Aborting due to reference count overflow.");
            ::std::process::abort()
        } else {
            panic!("reference count overflow")
        }
    }
}

#[inline(always)]
fn increment(count: &Cell<usize>) {
    let n = count.get();
    if n == usize::MAX {
        count_overflow();
    }
    count.set(n + 1);
}

#[inline(always)]
fn decrement(count: &Cell<usize>) -> usize {
    let n = count.get();
    debug_assert!(n > 0, "reference count underflow");
    count.set(n - 1);
    n - 1
}

// -----------------------------------------------------------------------------
// VTable

/// Type-specific operations of a control block.
///
/// One instance exists per concrete block type, created from
/// [`ControlBlock::VTABLE`].
pub(crate) struct BlockVTable {
    dispose: unsafe fn(NonNull<Header>),
    free: unsafe fn(NonNull<Header>),
    name: fn() -> &'static str,
}

/// # Safety
/// `header` must be the header of a live `B` whose object has not been disposed.
unsafe fn dispose_erased<B: ControlBlock>(header: NonNull<Header>) {
    // SAFETY: `B` is `#[repr(C)]` with the header as its first field.
    unsafe { header.cast::<B>().as_ref().dispose() }
}

/// # Safety
/// `header` must be the header of a `B` allocated by [`RawBlock`], with no
/// reference into the block left alive.
unsafe fn free_erased<B: ControlBlock>(header: NonNull<Header>) {
    let block = header.cast::<B>();
    // SAFETY: allocated by `RawBlock::<B>::allocate` with `Layout::new::<B>()`.
    unsafe {
        block.drop_in_place();
        malloc::dealloc(block.as_ptr().cast(), Layout::new::<B>());
    }
}

// -----------------------------------------------------------------------------
// ControlBlock

/// A concrete control block.
///
/// # Safety
///
/// - Implementors must be `#[repr(C)]` with a [`Header`] as the first field.
/// - Instances must be created through [`RawBlock`], and their header built
///   with [`Header::new::<Self>`](Header::new).
/// - Dropping the block must not touch the managed object; only
///   [`dispose`](Self::dispose) may destroy it.
pub(crate) unsafe trait ControlBlock: Sized {
    const VTABLE: BlockVTable = BlockVTable {
        dispose: dispose_erased::<Self>,
        free: free_erased::<Self>,
        name: core::any::type_name::<Self>,
    };

    /// Destroys the managed object.
    ///
    /// # Safety
    ///
    /// Called exactly once, when the strong count reaches zero. The block stays
    /// allocated afterwards until the weak count also reaches zero.
    unsafe fn dispose(&self);
}

// -----------------------------------------------------------------------------
// Header

/// The common prefix of every control block.
///
/// Starts with `strong == 1` and `weak == 1`: the handle that created the block
/// holds one strong unit and the weak unit paired with it.
///
/// `disposing` is set while the last strong unit's paired weak unit is held
/// across disposal.
#[repr(C)]
pub(crate) struct Header {
    strong: Cell<usize>,
    weak: Cell<usize>,
    disposing: Cell<bool>,
    vtable: &'static BlockVTable,
}

impl Header {
    #[inline]
    pub(crate) fn new<B: ControlBlock>() -> Self {
        Self {
            strong: Cell::new(1),
            weak: Cell::new(1),
            disposing: Cell::new(false),
            vtable: &B::VTABLE,
        }
    }
}

// -----------------------------------------------------------------------------
// BlockRef

/// A type-erased reference to a live control block.
///
/// Copying a `BlockRef` does not touch the counts. Whoever holds one must
/// also hold a strong or weak unit on the block, which keeps it allocated.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct BlockRef(NonNull<Header>);

/// Gives back the weak unit paired with a strong unit, even if disposal unwinds.
struct PairedWeak(BlockRef);

impl Drop for PairedWeak {
    #[inline]
    fn drop(&mut self) {
        self.0.header().disposing.set(false);
        // SAFETY: the unit was held by the strong handle being released.
        unsafe { self.0.release_weak() }
    }
}

impl BlockRef {
    #[inline(always)]
    fn header(&self) -> &Header {
        // SAFETY: the holder of a `BlockRef` keeps the block allocated.
        unsafe { self.0.as_ref() }
    }

    /// Address of the block, used to identify it in lifecycle probes.
    #[cfg(test)]
    pub(crate) fn addr(self) -> usize {
        self.0.as_ptr().addr()
    }

    #[inline]
    pub(crate) fn strong_count(self) -> usize {
        self.header().strong.get()
    }

    #[inline]
    pub(crate) fn weak_count(self) -> usize {
        self.header().weak.get()
    }

    /// The number of weak units held by weak handles, leaving out those
    /// paired with strong units.
    #[inline]
    pub(crate) fn observer_count(self) -> usize {
        let header = self.header();
        header.weak.get() - header.strong.get() - usize::from(header.disposing.get())
    }

    /// Acquires a strong unit and its paired weak unit.
    #[inline]
    pub(crate) fn add_strong(self) -> Self {
        let header = self.header();
        increment(&header.strong);
        increment(&header.weak);
        self
    }

    /// Acquires a weak unit.
    #[inline]
    pub(crate) fn add_weak(self) -> Self {
        increment(&self.header().weak);
        self
    }

    /// Acquires a strong unit unless the object has already been disposed.
    #[inline]
    pub(crate) fn try_add_strong(self) -> Option<Self> {
        if self.strong_count() == 0 {
            None
        } else {
            Some(self.add_strong())
        }
    }

    /// Gives back a strong unit and its paired weak unit.
    ///
    /// Disposes the object when this was the last strong unit, and frees the
    /// block when the weak side reaches zero as well. The paired weak unit is
    /// held until disposal has finished, so nothing dropped by the object can
    /// free the block underneath it.
    ///
    /// # Safety
    ///
    /// The caller must own a strong unit on this block and not use it again.
    pub(crate) unsafe fn release_strong(self) {
        let paired = PairedWeak(self);
        if decrement(&self.header().strong) == 0 {
            let vtable = self.header().vtable;
            self.header().disposing.set(true);
            trace_block!("disposing object of {} at {:p}", (vtable.name)(), self.0);
            // SAFETY: strong just reached zero, so this is the only disposal.
            unsafe { (vtable.dispose)(self.0) };

            #[cfg(test)]
            crate::probe::record(crate::probe::Event::Disposed(self.addr()));
        }
        drop(paired);
    }

    /// Gives back a weak unit, freeing the block if it was the last one.
    ///
    /// # Safety
    ///
    /// The caller must own a weak unit on this block and not use it again.
    pub(crate) unsafe fn release_weak(self) {
        if decrement(&self.header().weak) == 0 {
            let vtable = self.header().vtable;
            debug_assert_eq!(
                self.strong_count(),
                0,
                "freeing {} with strong owners",
                (vtable.name)()
            );
            trace_block!("freeing {} at {:p}", (vtable.name)(), self.0);

            #[cfg(test)]
            crate::probe::record(crate::probe::Event::Freed(self.addr()));

            // SAFETY: no unit is left, so no handle can reach the block anymore.
            unsafe { (vtable.free)(self.0) };
        }
    }
}

// -----------------------------------------------------------------------------
// RawBlock

/// Uninitialised memory for one block of type `B`.
///
/// The memory is returned to the allocator when this is dropped, so an early
/// return or a panic between allocation and [`init`](Self::init) rolls the
/// allocation back.
pub(crate) struct RawBlock<B: ControlBlock> {
    ptr: NonNull<B>,
}

impl<B: ControlBlock> RawBlock<B> {
    pub(crate) fn allocate() -> Result<Self, AllocError> {
        let layout = Layout::new::<B>();

        #[cfg(test)]
        let raw = if crate::probe::take_alloc_failure() {
            core::ptr::null_mut()
        } else {
            // SAFETY: every block starts with a `Header`, so `layout` is not zero-sized.
            unsafe { malloc::alloc(layout) }
        };
        #[cfg(not(test))]
        // SAFETY: every block starts with a `Header`, so `layout` is not zero-sized.
        let raw = unsafe { malloc::alloc(layout) };

        let Some(ptr) = NonNull::new(raw.cast::<B>()) else {
            let err = AllocError::new(layout);
            log::warn!("control block allocation failed: {err}");
            return Err(err);
        };

        trace_block!("allocated {} at {:p}", core::any::type_name::<B>(), ptr);
        Ok(Self { ptr })
    }

    /// Moves `block` into the allocation. The returned handle owns the initial
    /// strong unit described by the block's header.
    #[inline]
    pub(crate) fn init(self, block: B) -> (BlockRef, NonNull<B>) {
        let ptr = self.ptr;
        mem::forget(self);
        // SAFETY: freshly allocated with the layout of `B`.
        unsafe { ptr.write(block) };
        (BlockRef(ptr.cast::<Header>()), ptr)
    }
}

impl<B: ControlBlock> Drop for RawBlock<B> {
    fn drop(&mut self) {
        trace_block!("rolling back {} at {:p}", core::any::type_name::<B>(), self.ptr);
        // SAFETY: allocated in `allocate` with this layout and never initialised.
        unsafe { malloc::dealloc(self.ptr.as_ptr().cast(), Layout::new::<B>()) }
    }
}

// -----------------------------------------------------------------------------
// Tests
