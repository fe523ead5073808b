//! The polling capability required by the event loop.
//!
//! The reactor multiplexes over whatever readiness primitive the host
//! offers, abstracted behind [`Poller`]. Any edge- or level-triggered
//! backend satisfies the contract: the loop's own dispatch logic masks
//! spurious repeats, so a backend is free to report a direction as ready
//! more than once per actual transition.

mod sys;

pub use self::sys::SysPoller;

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::reactor::EventMask;
use crate::reactor::Fired;

// -----------------------------------------------------------------------------
// Poller
// -----------------------------------------------------------------------------

/// A readiness multiplexer.
///
/// The loop tracks registration state itself and hands the backend the
/// old and new readiness masks on every change, so implementations stay
/// stateless beyond their OS handle. Masks passed here never contain
/// dispatch-order flags, only [`READABLE`] and [`WRITABLE`].
///
/// [`READABLE`]: EventMask::READABLE
/// [`WRITABLE`]: EventMask::WRITABLE
pub trait Poller: Sized {
  /// Creates a backend able to report up to `setsize` descriptors per
  /// poll.
  fn create(setsize: usize) -> io::Result<Self>;

  /// Adjusts the per-poll capacity to `setsize`.
  fn resize(&mut self, setsize: usize) -> io::Result<()>;

  /// Starts or updates the watch on `fd`, moving from `old` to `new`
  /// readiness interest. `old` is empty for a fresh registration.
  fn add(&mut self, fd: RawFd, old: EventMask, new: EventMask) -> io::Result<()>;

  /// Reduces or removes the watch on `fd`, moving from `old` to `new`
  /// readiness interest. `new` is empty when the descriptor is dropped
  /// entirely.
  fn del(&mut self, fd: RawFd, old: EventMask, new: EventMask) -> io::Result<()>;

  /// Waits up to `timeout` (indefinitely if `None`) and appends one
  /// [`Fired`] tuple per ready descriptor to `fired`, returning the
  /// count.
  ///
  /// `fired` is cleared by the implementation before filling. An
  /// interrupted wait surfaces as [`io::ErrorKind::Interrupted`]; the
  /// loop treats it as zero fired events.
  fn poll(&mut self, fired: &mut Vec<Fired>, timeout: Option<Duration>) -> io::Result<usize>;

  /// Returns a human-readable backend tag.
  fn name(&self) -> &'static str;
}
