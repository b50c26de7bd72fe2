//! Macros for compile-time configuration.
//!
//! [`define_alias!`] turns `#[cfg(...)]` predicates into macros, so feature
//! checks read like ordinary code instead of attribute soup:
//!
//! ```
//! mod cfg {
//!     twinref_cfg::define_alias! {
//!         #[cfg(all())] => always,
//!         #[cfg(any())] => never,
//!     }
//! }
//!
//! // Item or statement position: the tokens are kept or discarded.
//! cfg::always! { let kept = 1; }
//! assert_eq!(kept, 1);
//!
//! // Branch form, usable as an expression.
//! let mode = cfg::never! { if { "never" } else { "fallback" } };
//! assert_eq!(mode, "fallback");
//!
//! // Empty form evaluates to a `bool`.
//! assert!(cfg::always!());
//! assert!(!cfg::never!());
//! ```
#![no_std]

/// Keeps its input. Target of aliases whose predicate holds.
#[doc(hidden)]
#[macro_export]
macro_rules! enabled {
    () => { true };
    (if { $($p:tt)* } else { $($n:tt)* }) => { $($p)* };
    ($($p:tt)*) => { $($p)* };
}

/// Discards its input. Target of aliases whose predicate does not hold.
#[doc(hidden)]
#[macro_export]
macro_rules! disabled {
    () => { false };
    (if { $($p:tt)* } else { $($n:tt)* }) => { $($n)* };
    ($($p:tt)*) => {};
}

/// Defines one macro per `#[cfg(...)] => name` pair.
///
/// Each generated macro accepts three forms:
///
/// - `name! { tokens }`: the tokens when the predicate holds, nothing otherwise.
/// - `name! { if { a } else { b } }`: `a` when the predicate holds, `b` otherwise.
/// - `name!()`: `true` when the predicate holds, `false` otherwise.
///
/// The macros are re-exports, so invoke them through the module they were
/// defined in, e.g. `crate::cfg::std! { .. }`.
#[macro_export]
macro_rules! define_alias {
    ($(#[cfg($meta:meta)] => $alias:ident),+ $(,)?) => {
        $(
            #[cfg($meta)]
            #[doc(hidden)]
            pub use $crate::enabled as $alias;

            #[cfg(not($meta))]
            #[doc(hidden)]
            pub use $crate::disabled as $alias;
        )+
    };
}
