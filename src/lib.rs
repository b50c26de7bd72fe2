#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

pub use twinref_cfg as cfg;
pub use twinref_ptr as ptr;
pub use twinref_rc as rc;

pub use twinref_rc::{
    AllocError, DefaultDelete, Deleter, MakeError, SharedRef, WeakRef, make_shared,
    make_shared_with, try_make_shared, try_make_shared_with,
};
