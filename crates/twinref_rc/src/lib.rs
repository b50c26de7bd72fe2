//! Single-threaded shared ownership with separate object and block lifetimes.
//!
//! A [`SharedRef<T>`] owns a share of a managed object; a [`WeakRef<T>`]
//! observes it without keeping it alive. Both talk to a *control block* that
//! carries two counts:
//!
//! - the **strong** count is the number of `SharedRef`s. When it drops to zero
//!   the managed object is *disposed* (its destructor or deleter runs).
//! - the **weak** count is the number of `WeakRef`s plus one unit per strong
//!   acquisition. When it drops to zero the control block itself is freed.
//!
//! Because the block outlives the object, a `WeakRef` can always ask the block
//! whether the object is still there, even after it has been destroyed.
//!
//! # Construction
//!
//! - [`make_shared`] and friends place the object inside the control block,
//!   so one allocation serves both.
//! - [`SharedRef::from_raw_with`] and friends adopt an object allocated
//!   elsewhere together with a [`Deleter`]. If the block cannot be allocated
//!   the deleter runs before the error is reported.
//!
//! # Threads
//!
//! Counts are plain integers. `SharedRef` and `WeakRef` are neither `Send`
//! nor `Sync`, so a control block can never be touched from two threads.
//!
//! # Teardown depth
//!
//! Disposal runs synchronously inside whatever call released the last
//! `SharedRef`. A long chain of objects that each own the next is torn down
//! recursively, one stack frame group per link.
//!
//! # Examples
//!
//! ```
//! use twinref_rc::{SharedRef, make_shared};
//!
//! let shared = make_shared(5);
//! let weak = SharedRef::downgrade(&shared);
//!
//! assert_eq!(SharedRef::use_count(&shared), 1);
//! assert_eq!(*weak.lock(), 5);
//!
//! drop(shared);
//! assert!(weak.expired());
//! assert!(SharedRef::is_null(&weak.lock()));
//! ```
#![expect(unsafe_code, reason = "Control blocks manage raw allocations.")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// Compilation config

/// Some macros used for compilation control.
pub mod cfg {
    twinref_cfg::define_alias! {
        #[cfg(feature = "std")] => std,
        #[cfg(all(debug_assertions, feature = "debug"))] => debug,
    }
}

// -----------------------------------------------------------------------------
// no_std support

crate::cfg::std! { extern crate std; }

#[cfg(all(test, not(feature = "std")))]
extern crate std;

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod block;
mod deleter;
mod make;
mod shared;
mod weak;

pub mod error;

#[cfg(test)]
mod probe;

// -----------------------------------------------------------------------------
// Top-level exports

pub use deleter::{DefaultDelete, Deleter};
pub use error::{AllocError, MakeError};
pub use make::{make_shared, make_shared_with, try_make_shared, try_make_shared_with};
pub use shared::SharedRef;
pub use weak::WeakRef;
