use alloc::alloc as malloc;
use core::convert::Infallible;

use twinref_ptr::ElementPtr;

use crate::block::OwningBlock;
use crate::error::{AllocError, MakeError};
use crate::shared::SharedRef;

/// Creates a [`SharedRef`] whose object lives inside its control block.
///
/// One allocation holds both the counts and the value. Calls
/// [`handle_alloc_error`](malloc::handle_alloc_error) if it fails.
///
/// # Examples
///
/// ```
/// use twinref_rc::{SharedRef, make_shared};
///
/// let answer = make_shared(42);
/// assert_eq!(*answer, 42);
/// assert_eq!(SharedRef::use_count(&answer), 1);
/// ```
#[inline]
pub fn make_shared<T>(value: T) -> SharedRef<T> {
    make_shared_with(move || value)
}

/// Fallible version of [`make_shared`]. The value is dropped on error.
#[inline]
pub fn try_make_shared<T>(value: T) -> Result<SharedRef<T>, AllocError> {
    match try_make_shared_with(move || Ok::<_, Infallible>(value)) {
        Ok(shared) => Ok(shared),
        Err(MakeError::Alloc(err)) => Err(err),
        Err(MakeError::Construct(never)) => match never {},
    }
}

/// Allocates the control block first, then constructs the value with `f`.
///
/// If `f` panics, the allocation is released before the panic continues.
///
/// # Examples
///
/// ```
/// use twinref_rc::make_shared_with;
///
/// let table = make_shared_with(|| [0u8; 4096]);
/// assert_eq!(table.len(), 4096);
/// ```
#[inline]
pub fn make_shared_with<T>(f: impl FnOnce() -> T) -> SharedRef<T> {
    match try_make_shared_with(move || Ok::<_, Infallible>(f())) {
        Ok(shared) => shared,
        Err(MakeError::Alloc(err)) => malloc::handle_alloc_error(err.layout()),
        Err(MakeError::Construct(never)) => match never {},
    }
}

/// Allocates the control block first, then constructs the value with a
/// fallible `f`.
///
/// If `f` fails, the allocation is released and the error is returned as
/// [`MakeError::Construct`]; no handle is created.
///
/// # Examples
///
/// ```
/// use twinref_rc::{MakeError, try_make_shared_with};
///
/// let port = try_make_shared_with(|| "8080".parse::<u16>()).unwrap();
/// assert_eq!(*port, 8080);
///
/// let bad = try_make_shared_with(|| "eighty".parse::<u16>());
/// assert!(matches!(bad, Err(MakeError::Construct(_))));
/// ```
pub fn try_make_shared_with<T, E>(
    f: impl FnOnce() -> Result<T, E>,
) -> Result<SharedRef<T>, MakeError<E>> {
    let (block, object) = OwningBlock::try_new_with(f)?;
    // SAFETY: the new block's initial strong unit moves into the handle, and
    // `object` is the embedded value.
    Ok(unsafe { SharedRef::from_parts(Some(block), ElementPtr::from_non_null(object)) })
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use core::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};

    use super::{make_shared, make_shared_with, try_make_shared, try_make_shared_with};
    use crate::error::MakeError;
    use crate::probe::{self, Event, Tracked};
    use crate::shared::SharedRef;

    #[test]
    fn object_lives_in_block() {
        let drops = Cell::new(0);
        let shared = make_shared(Tracked(&drops));
        let addr = shared.block.map_or(0, |block| block.addr());
        let object = SharedRef::as_element(&shared).addr();

        assert!(object > addr);
        assert!(object - addr < 64);
        assert_eq!(SharedRef::use_count(&shared), 1);

        drop(shared);
        assert_eq!(drops.get(), 1);
        assert_eq!(
            probe::events_for(addr),
            [Event::Disposed(addr), Event::Freed(addr)]
        );
    }

    #[test]
    fn constructor_error() {
        let calls = Cell::new(0);
        let result = try_make_shared_with(|| {
            calls.set(calls.get() + 1);
            Err::<u32, _>("no value")
        });

        assert!(matches!(result, Err(MakeError::Construct("no value"))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn constructor_panic() {
        let result = panic::catch_unwind(|| make_shared_with(|| -> String { panic!("boom") }));
        assert!(result.is_err());

        let shared = make_shared_with(|| String::from("after"));
        assert_eq!(*shared, "after");
    }

    #[test]
    fn allocation_failure() {
        let drops = Cell::new(0);

        probe::fail_next_alloc();
        let result = try_make_shared(Tracked(&drops));
        assert!(result.is_err());
        assert_eq!(drops.get(), 1);

        let calls = Cell::new(0);
        probe::fail_next_alloc();
        let result = try_make_shared_with(|| {
            calls.set(calls.get() + 1);
            Ok::<_, ()>(5u8)
        });
        assert!(matches!(result, Err(MakeError::Alloc(_))));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn panic_in_destructor_still_frees() {
        struct Explode;

        impl Drop for Explode {
            fn drop(&mut self) {
                panic!("explode");
            }
        }

        let shared = make_shared(Explode);
        let addr = shared.block.map_or(0, |block| block.addr());
        let weak = SharedRef::downgrade(&shared);

        let result = panic::catch_unwind(AssertUnwindSafe(move || drop(shared)));
        assert!(result.is_err());
        assert!(weak.expired());

        drop(weak);
        assert_eq!(probe::events_for(addr), [Event::Freed(addr)]);
    }
}
