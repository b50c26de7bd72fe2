//! Pointer primitives used by the reference-counted handles.
//!
//! Nothing in this crate counts references. The types here only describe
//! *where* a value lives; deciding *how long* it lives is left to the caller.
//!
//! **ElementPtr**
//!
//! [`ElementPtr<T>`] is a nullable `NonNull<T>` that compares and hashes by
//! address only. It supports unsized pointees, so it can describe a `dyn Trait`
//! or a slice as well as a plain value, and it never dereferences on its own.
//!
//! **InlineSlot**
//!
//! [`InlineSlot<T>`] is uninitialised storage sized and aligned for one `T`,
//! meant to be embedded in a larger allocation. The value inside is created
//! with [`write`](InlineSlot::write) and destroyed with
//! [`drop_in_place`](InlineSlot::drop_in_place); the slot itself never drops it.
#![expect(unsafe_code, reason = "Raw pointers are inherently unsafe.")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// Modules

mod element;
mod slot;

// -----------------------------------------------------------------------------
// Top-level exports

pub use element::ElementPtr;
pub use slot::InlineSlot;
