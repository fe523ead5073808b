use bitflags::bitflags;
use std::cell::RefCell;
use std::os::fd::RawFd;
use std::rc::Rc;

use crate::reactor::EventLoop;
use crate::reactor::Poller;

// -----------------------------------------------------------------------------
// Event Mask
// -----------------------------------------------------------------------------

bitflags! {
  /// Readiness directions for a registered file descriptor.
  ///
  /// `BARRIER` is not a readiness direction: it is a dispatch-order flag
  /// that inverts the usual read-then-write callback order for its file
  /// descriptor, so an application can (for example) flush state to disk
  /// in the write handler before the read handler produces a reply in
  /// the same iteration. The polling backend never sees it.
  #[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
  pub struct EventMask: u32 {
    /// Fire when the descriptor is readable.
    const READABLE = 1;
    /// Fire when the descriptor is writable.
    const WRITABLE = 2;
    /// Dispatch the write callback before the read callback.
    const BARRIER = 4;
  }
}

impl EventMask {
  /// No events registered.
  pub const NONE: Self = Self::empty();
}

// -----------------------------------------------------------------------------
// Dispatch Flags
// -----------------------------------------------------------------------------

bitflags! {
  /// Event classes and behaviors selected for one [`process_events`]
  /// call.
  ///
  /// [`process_events`]: EventLoop::process_events
  #[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
  pub struct DispatchFlags: u32 {
    /// Dispatch file events.
    const FILE_EVENTS = 1;
    /// Dispatch time events.
    const TIME_EVENTS = 2;
    /// Poll without blocking, even if no timer is due.
    const DONT_WAIT = 4;
    /// Invoke the before-sleep hook ahead of the poll.
    const CALL_BEFORE_SLEEP = 8;
    /// Invoke the after-sleep hook behind the poll.
    const CALL_AFTER_SLEEP = 16;
  }
}

impl DispatchFlags {
  /// Both file and time events.
  pub const ALL_EVENTS: Self = Self::FILE_EVENTS.union(Self::TIME_EVENTS);
}

// -----------------------------------------------------------------------------
// Fired Event
// -----------------------------------------------------------------------------

/// A readiness notification produced by the polling backend for one
/// iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fired {
  /// The descriptor that became ready.
  pub fd: RawFd,
  /// The directions that became ready.
  pub mask: EventMask,
}

// -----------------------------------------------------------------------------
// Callbacks
// -----------------------------------------------------------------------------

/// A file event callback: invoked with the loop, the ready descriptor,
/// and the fired mask.
///
/// The shared handle is what lets one closure serve both directions of a
/// registration: registering `READABLE | WRITABLE` in a single call
/// stores one handle in both slots, and dispatch uses handle identity to
/// avoid invoking the same closure twice when a level-triggered backend
/// reports both directions at once.
pub type FileProc<P> = Rc<RefCell<dyn FnMut(&mut EventLoop<P>, RawFd, EventMask)>>;

/// A timer callback: invoked with the loop and the timer id.
///
/// The return value reschedules the timer that many milliseconds ahead,
/// or retires it when equal to [`NOMORE`].
///
/// [`NOMORE`]: crate::reactor::NOMORE
pub type TimeProc<P> = Rc<RefCell<dyn FnMut(&mut EventLoop<P>, i64) -> i64>>;

/// A timer finalizer: invoked exactly once when a retired timer is
/// released.
pub type TimerFinalizer<P> = Box<dyn FnOnce(&mut EventLoop<P>)>;

/// A pre- or post-sleep hook: invoked around the blocking poll.
pub type SleepHook<P> = Rc<RefCell<dyn FnMut(&mut EventLoop<P>)>>;

// -----------------------------------------------------------------------------
// File Event
// -----------------------------------------------------------------------------

/// Registration state for one file descriptor.
pub(super) struct FileEvent<P: Poller> {
  pub(super) mask: EventMask,
  pub(super) rfile: Option<FileProc<P>>,
  pub(super) wfile: Option<FileProc<P>>,
}

impl<P: Poller> FileEvent<P> {
  #[inline]
  pub(super) const fn empty() -> Self {
    Self {
      mask: EventMask::NONE,
      rfile: None,
      wfile: None,
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_mask_bits() {
    assert_eq!(EventMask::NONE.bits(), 0);
    assert_eq!(EventMask::READABLE.bits(), 1);
    assert_eq!(EventMask::WRITABLE.bits(), 2);
    assert_eq!(EventMask::BARRIER.bits(), 4);
  }

  #[test]
  fn test_dispatch_flag_bits() {
    assert_eq!(DispatchFlags::FILE_EVENTS.bits(), 1);
    assert_eq!(DispatchFlags::TIME_EVENTS.bits(), 2);
    assert_eq!(DispatchFlags::DONT_WAIT.bits(), 4);
    assert_eq!(DispatchFlags::CALL_BEFORE_SLEEP.bits(), 8);
    assert_eq!(DispatchFlags::CALL_AFTER_SLEEP.bits(), 16);
    assert_eq!(DispatchFlags::ALL_EVENTS.bits(), 3);
  }
}
