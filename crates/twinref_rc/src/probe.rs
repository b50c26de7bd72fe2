//! Per-thread instrumentation of control block lifecycles.
//!
//! Events are keyed by block address, so tests running on other threads never
//! see each other's blocks.

use core::cell::{Cell, RefCell};
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Disposed(usize),
    Freed(usize),
}

std::thread_local! {
    static FAIL_NEXT_ALLOC: Cell<bool> = const { Cell::new(false) };
    static EVENTS: RefCell<Vec<Event>> = const { RefCell::new(Vec::new()) };
}

/// Makes the next control block allocation on this thread fail.
pub(crate) fn fail_next_alloc() {
    FAIL_NEXT_ALLOC.with(|flag| flag.set(true));
}

pub(crate) fn take_alloc_failure() -> bool {
    FAIL_NEXT_ALLOC.with(|flag| flag.replace(false))
}

pub(crate) fn record(event: Event) {
    EVENTS.with(|events| events.borrow_mut().push(event));
}

/// Drains the events recorded for the block at `addr`.
pub(crate) fn events_for(addr: usize) -> Vec<Event> {
    EVENTS.with(|events| {
        let mut events = events.borrow_mut();
        let (mine, rest): (Vec<Event>, Vec<Event>) =
            events.drain(..).partition(|event| match *event {
                Event::Disposed(at) | Event::Freed(at) => at == addr,
            });
        *events = rest;
        mine
    })
}

/// Counts how many times it has been dropped.
pub(crate) struct Tracked<'a>(pub(crate) &'a Cell<u32>);

impl Drop for Tracked<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}
